use thiserror::Error;

/// The map host could not be brought up. Terminal for the session.
#[derive(Error, Debug)]
pub enum InitializationError {
    #[error("invalid container handle {0:?}")]
    InvalidContainer(String),
    #[error("failed to load map service {url}: {source}")]
    ServiceUnavailable {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("map service {url} reported error {code}: {message}")]
    Service { url: String, code: i64, message: String },
    #[error("unreadable metadata from {url}: {source}")]
    Metadata {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// An attribute query failed at the network or service layer.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("query request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("query service returned error {code}: {message}")]
    Service { code: i64, message: String },
    #[error("undecodable query response: {0}")]
    Decode(String),
}

/// A feature lacked the attributes the census projection needs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataShapeError {
    #[error("attribute {0} is missing")]
    MissingField(String),
    #[error("attribute {field} is not numeric: {value}")]
    NotNumeric { field: String, value: String },
    #[error("attribute {field} is not text: {value}")]
    NotText { field: String, value: String },
}
