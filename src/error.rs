// src/error.rs

use std::path::PathBuf;

use thiserror::Error;

use crate::tree::ElementRef;

/// Contract violations surfaced to the caller.
///
/// Data-quality anomalies in the mapping sources are never reported through
/// this type; they become analyzer problems or silent non-matches instead.
#[derive(Debug, Error)]
pub enum Error {
    #[error("namespace not found: {0}")]
    NamespaceNotFound(String),

    #[error("invalid namespace {0}: collides with the source namespace")]
    InvalidNamespace(String),

    #[error("namespace {0} already exists")]
    DuplicateNamespace(String),

    #[error("tree does not support adding namespace {0} at runtime")]
    NamespaceAdditionUnsupported(String),

    /// Override completion needs the super-class/interface columns.
    #[error("structural namespace {0} is missing from the tree")]
    MissingStructuralNamespace(&'static str),

    #[error("ancestry namespace {0} is not one of the display namespaces")]
    UnknownAncestryNamespace(String),

    #[error("element not found: {0}")]
    ElementNotFound(ElementRef),

    #[error("parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
