use broadcast_engine::CatalogTree;
use std::path::Path;
use tracing::info;

const BUILTIN_CATALOG: &str = include_str!("../../catalog.json");

#[derive(Debug, thiserror::Error)]
pub(crate) enum CatalogLoadError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Reads the topic tree from `path`, or the built-in one when no path is configured.
pub(crate) async fn load_catalog(path: Option<&Path>) -> Result<CatalogTree, CatalogLoadError> {
    let catalog = match path {
        Some(path) => {
            let raw_json = tokio::fs::read_to_string(path).await?;
            CatalogTree::from_json(&raw_json)?
        }
        None => CatalogTree::from_json(BUILTIN_CATALOG)?,
    };

    info!(source = ?path, "Catalog loaded");

    Ok(catalog)
}
