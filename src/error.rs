//! Error types for planning and import

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("item {0} is not in the catalog")]
    UnknownItem(u64),

    #[error("no node at path {0:?}")]
    NoSuchNode(Vec<usize>),
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid item data in {path}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid rarity in {path}: {detail}")]
    Rarity { path: PathBuf, detail: String },
}
