//! Error types shared by the loader, compiler and compute backends
//!
//! Every failure in this crate is fatal for the load it happens in: there are no
//! retryable errors. Runtime parameter changes never produce errors because the
//! configuration surface clamps them (see [`crate::params`]).

use thiserror::Error;

/// Errors that can occur while loading a graph or preparing device resources
#[derive(Error, Debug)]
pub enum LayoutError {
    /// The graph source could not be read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No reader is registered for the file's extension
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The graph payload is malformed
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// A value could not be encoded for output
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A link endpoint points outside the node array
    #[error("link {link} references node {endpoint}, but the graph has {node_count} nodes")]
    Topology {
        /// Index of the offending link in the link list
        link: usize,
        /// The out-of-range endpoint
        endpoint: u32,
        /// Number of nodes in the graph
        node_count: usize,
    },

    /// A compute or render device resource could not be created
    #[error("device resource error: {0}")]
    DeviceResource(String),
}

/// Result type for loading and simulation setup
pub type LayoutResult<T> = Result<T, LayoutError>;
