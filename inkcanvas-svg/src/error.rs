use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SvgError {
    #[error("failed to read file {path:?}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse svg from {origin}: {source}")]
    ParseError {
        origin: String,
        #[source]
        source: roxmltree::Error,
    },
    #[error("failed to write file {path:?}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize document: {0}")]
    SerializeError(#[from] quick_xml::Error),
    #[error("invalid query `{expr}`: {message}")]
    InvalidQuery { expr: String, message: String },
    #[error("unsupported attribute: {0}")]
    UnsupportedAttribute(String),
    #[error("group {id:?} has no parent reference")]
    NoParent { id: Option<String> },
    #[error("node {id:?} is already detached from its parent")]
    Detached { id: Option<String> },
    #[error("invalid document structure: {0}")]
    InvalidDocument(String),
}
