//! Error types for the TaguchiMail API client.
//!
//! # Design
//! `NotFound` gets a dedicated variant because callers frequently distinguish
//! "the record does not exist" from "the server rejected the request." All
//! other non-2xx responses land in `HttpError` with the raw status code and
//! body. Transport failures keep the underlying error as their `source`,
//! tagged with the resource and command that were being issued.

use std::string::FromUtf8Error;

use thiserror::Error;

/// Boxed error produced by a [`Transport`](crate::http::Transport).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors returned by `Context::make_request` and the record operations.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced an HTTP response (DNS, connect, timeout).
    #[error("{command} {resource}: transport failed: {source}")]
    Transport {
        resource: String,
        command: String,
        #[source]
        source: BoxError,
    },

    /// The server returned 404.
    #[error("resource not found: {body}")]
    NotFound { body: String },

    /// The server returned a non-2xx status other than 404.
    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    /// The response body was not valid UTF-8.
    #[error("response is not valid UTF-8: {0}")]
    Decode(#[from] FromUtf8Error),

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    DeserializationError(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    SerializationError(String),

    /// A single-record operation received an empty result array.
    #[error("{resource}: server returned no records")]
    EmptyResponse { resource: String },

    /// The operation needs a record id but the record has not been saved.
    #[error("{resource}: record has no id")]
    MissingRecordId { resource: String },

    /// The operation needs the id of a stored revision and none is loaded.
    #[error("{resource}: no saved revision loaded")]
    MissingRevisionId { resource: String },

    /// A GET request was given a body; GET requests cannot carry one.
    #[error("{command} {resource}: request body not allowed")]
    BodyNotAllowed { resource: String, command: String },
}

impl ApiError {
    /// HTTP status carried by this error, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::NotFound { .. } => Some(404),
            ApiError::HttpError { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_exposed_for_http_failures() {
        let err = ApiError::NotFound {
            body: "no such subscriber".to_string(),
        };
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.to_string(), "resource not found: no such subscriber");
        let err = ApiError::HttpError {
            status: 422,
            body: "bad email".to_string(),
        };
        assert_eq!(err.status(), Some(422));
        assert_eq!(err.to_string(), "HTTP 422: bad email");
        let err = ApiError::EmptyResponse {
            resource: "list".to_string(),
        };
        assert_eq!(err.status(), None);
    }

    #[test]
    fn transport_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = ApiError::Transport {
            resource: "subscriber".to_string(),
            command: "GET".to_string(),
            source: Box::new(io),
        };
        assert_eq!(err.to_string(), "GET subscriber: transport failed: refused");
        let source = std::error::Error::source(&err).unwrap();
        let io = source.downcast_ref::<std::io::Error>().unwrap();
        assert_eq!(io.kind(), std::io::ErrorKind::ConnectionRefused);
    }
}
