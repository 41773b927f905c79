//! Error definitions for the dashboard core

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the widget registry, the canvas and individual widgets
#[derive(Debug, Error)]
pub enum DashboardError {
    /// The requested widget kind does not exist; nothing was created
    #[error("Unknown widget type: {0}")]
    UnknownWidgetKind(String),

    /// An inbound payload could not be read as the widget's value type
    #[error("Invalid payload {payload:?} on {topic}: {reason}")]
    PayloadParse {
        topic: String,
        payload: String,
        reason: String,
    },

    /// The transport refused an outbound publish
    #[error("Publish to {topic} failed: {reason}")]
    PublishFailure { topic: String, reason: String },

    /// The handle refers to a widget that has already been removed
    #[error("Widget no longer exists")]
    StaleHandle,

    #[error("Invalid topic: {0}")]
    InvalidTopic(String),
}

/// Errors raised while reading or writing a layout document.
///
/// A failed load never touches the canvas.
#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("Failed to access layout file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed layout JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid layout document: {0}")]
    InvalidDocument(String),
}
