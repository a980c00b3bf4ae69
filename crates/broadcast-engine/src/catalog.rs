use crate::Topic;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

/// Query value that asks for a uniformly sampled catalog topic.
pub const RANDOM_TOPIC: &str = "random";

const FALLBACK_QUERY: &str = "top hits";
const FALLBACK_DISPLAY_NAME: &str = "Random";

/// A node of the topic tree: either a named category or a playable leaf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CatalogNode {
    Category {
        name: String,
        children: Vec<CatalogNode>,
    },
    Leaf {
        name: String,
        query: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        era: Option<String>,
    },
}

/// Flattened view of a leaf together with the names of its parent categories.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogLeaf {
    pub path: Vec<String>,
    pub name: String,
    pub query: String,
    pub era: Option<String>,
}

impl From<CatalogLeaf> for Topic {
    fn from(leaf: CatalogLeaf) -> Self {
        Topic {
            query: leaf.query,
            display_name: leaf.name,
            era: leaf.era,
        }
    }
}

pub trait Catalog: Send + Sync {
    fn leaves(&self) -> Vec<CatalogLeaf>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CatalogTree {
    roots: Vec<CatalogNode>,
}

impl CatalogTree {
    pub fn new(roots: Vec<CatalogNode>) -> Self {
        Self { roots }
    }

    pub fn from_json(raw_json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw_json)
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Visits every node depth-first, passing the names of the enclosing categories.
    pub fn walk<'a, F>(&'a self, mut visit: F)
    where
        F: FnMut(&[&'a str], &'a CatalogNode),
    {
        let mut path = vec![];
        walk_nodes(&self.roots, &mut path, &mut visit);
    }
}

fn walk_nodes<'a, F>(nodes: &'a [CatalogNode], path: &mut Vec<&'a str>, visit: &mut F)
where
    F: FnMut(&[&'a str], &'a CatalogNode),
{
    for node in nodes {
        visit(path, node);

        if let CatalogNode::Category { name, children } = node {
            path.push(name);
            walk_nodes(children, path, visit);
            path.pop();
        }
    }
}

impl Catalog for CatalogTree {
    fn leaves(&self) -> Vec<CatalogLeaf> {
        let mut leaves = vec![];

        self.walk(|path, node| {
            if let CatalogNode::Leaf { name, query, era } = node {
                leaves.push(CatalogLeaf {
                    path: path.iter().map(|name| name.to_string()).collect(),
                    name: name.clone(),
                    query: query.clone(),
                    era: era.clone(),
                });
            }
        });

        leaves
    }
}

/// Picks a uniformly random leaf, avoiding `current_query` when another leaf exists.
pub fn random_topic(catalog: &dyn Catalog, current_query: Option<&str>) -> Topic {
    let leaves = catalog.leaves();
    let candidates = leaves
        .iter()
        .filter(|leaf| Some(leaf.query.as_str()) != current_query)
        .collect::<Vec<_>>();

    let mut rng = rand::rng();
    let picked = match candidates.choose(&mut rng) {
        Some(leaf) => Some(*leaf),
        None => leaves.choose(&mut rng),
    };

    match picked {
        Some(leaf) => leaf.clone().into(),
        None => Topic::new(FALLBACK_QUERY, FALLBACK_DISPLAY_NAME),
    }
}
