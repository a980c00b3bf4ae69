use crate::broadcast::types::Topic;
use crate::TrackId;
use rand::seq::{IndexedRandom, SliceRandom};
use std::collections::{HashSet, VecDeque};

const RECENT_ERAS: [&str; 3] = ["2020s", "2010s", "2000s"];

/// Identifiers delivered under the current topic, most recent last.
///
/// Once more than `cap` ids are stored, only the most recent `cap / 2` survive.
#[derive(Debug)]
pub(crate) struct PlayedSet {
    order: VecDeque<TrackId>,
    ids: HashSet<TrackId>,
    cap: usize,
}

impl PlayedSet {
    pub(crate) fn new(cap: usize) -> Self {
        Self {
            order: VecDeque::new(),
            ids: HashSet::new(),
            cap,
        }
    }

    pub(crate) fn insert(&mut self, id: TrackId) {
        if !self.ids.insert(id.clone()) {
            return;
        }

        self.order.push_back(id);

        if self.order.len() > self.cap {
            let evicted = self.order.len() - self.cap / 2;

            for id in self.order.drain(..evicted) {
                self.ids.remove(&id);
            }
        }
    }

    pub(crate) fn contains(&self, id: &TrackId) -> bool {
        self.ids.contains(id)
    }

    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }

    pub(crate) fn clear(&mut self) {
        self.order.clear();
        self.ids.clear();
    }
}

/// Search queries tried when the playlist runs low, in random order.
pub(crate) fn query_variants(topic: &Topic) -> Vec<String> {
    let mut rng = rand::rng();
    let era = match &topic.era {
        Some(era) => era.clone(),
        None => RECENT_ERAS
            .choose(&mut rng)
            .map(|era| era.to_string())
            .unwrap_or_default(),
    };

    let mut variants = vec![
        topic.query.clone(),
        format!("{} mix", topic.query),
        format!("{} best songs", topic.query),
        format!("{} {}", topic.query, era).trim().to_string(),
    ];
    variants.shuffle(&mut rng);
    variants
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_ignore_duplicate_inserts() {
        let mut played = PlayedSet::new(10);

        played.insert("a".into());
        played.insert("a".into());

        assert_eq!(played.len(), 1);
        assert!(played.contains(&"a".into()));
    }

    #[test]
    fn should_keep_most_recent_half_on_overflow() {
        let mut played = PlayedSet::new(4);

        for id in ["1", "2", "3", "4", "5"] {
            played.insert(id.into());
        }

        assert_eq!(played.len(), 2);
        assert!(!played.contains(&"1".into()));
        assert!(!played.contains(&"3".into()));
        assert!(played.contains(&"4".into()));
        assert!(played.contains(&"5".into()));
    }

    #[test]
    fn should_clear_history() {
        let mut played = PlayedSet::new(4);
        played.insert("1".into());

        played.clear();

        assert_eq!(played.len(), 0);
        assert!(!played.contains(&"1".into()));
    }

    #[test]
    fn should_build_variants_with_topic_era() {
        let topic = Topic {
            query: "synthwave".into(),
            display_name: "Synthwave".into(),
            era: Some("80s".into()),
        };

        let mut variants = query_variants(&topic);
        variants.sort();

        assert_eq!(
            variants,
            vec![
                "synthwave",
                "synthwave 80s",
                "synthwave best songs",
                "synthwave mix"
            ]
        );
    }

    #[test]
    fn should_use_recent_era_when_topic_has_none() {
        let variants = query_variants(&Topic::new("phonk", "Phonk"));

        assert_eq!(variants.len(), 4);
        assert!(variants.contains(&"phonk".to_string()));
        assert!(variants
            .iter()
            .any(|v| RECENT_ERAS.iter().any(|era| *v == format!("phonk {}", era))));
    }
}
