/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::error::Error as StdError;
use std::fmt;

/// Boxed error type used for error sources.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// The kind of [`StoreError`] that occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum StoreErrorKind {
    /// The request could not be sent, or the connection failed before a response arrived.
    Dispatch,
    /// The request did not complete in time.
    Timeout,
    /// The request was rejected before it was sent.
    InvalidRequest,
    /// A response arrived but could not be understood.
    MalformedResponse,
    /// The store no longer accepts requests.
    Closed,
}

/// A request that never produced a store response.
///
/// A response with a non-success [`Status`](crate::Status) is *not* a `StoreError`; it is an
/// `Ok` value carrying that status.
#[derive(Debug)]
pub struct StoreError {
    kind: StoreErrorKind,
    source: Option<BoxError>,
}

impl StoreError {
    fn new(kind: StoreErrorKind, source: Option<BoxError>) -> Self {
        Self { kind, source }
    }

    /// The request could not be dispatched.
    pub fn dispatch(source: impl Into<BoxError>) -> Self {
        Self::new(StoreErrorKind::Dispatch, Some(source.into()))
    }

    /// The request timed out.
    pub fn timeout(source: impl Into<BoxError>) -> Self {
        Self::new(StoreErrorKind::Timeout, Some(source.into()))
    }

    /// The request was invalid and was never sent.
    pub fn invalid_request(source: impl Into<BoxError>) -> Self {
        Self::new(StoreErrorKind::InvalidRequest, Some(source.into()))
    }

    /// The response could not be parsed.
    pub fn malformed_response(source: impl Into<BoxError>) -> Self {
        Self::new(StoreErrorKind::MalformedResponse, Some(source.into()))
    }

    /// The store has been shut down.
    pub fn closed() -> Self {
        Self::new(StoreErrorKind::Closed, None)
    }

    /// Returns the kind of error.
    pub fn kind(&self) -> StoreErrorKind {
        self.kind
    }

    /// Returns true when no further requests can be issued to the store.
    pub fn is_fatal(&self) -> bool {
        self.kind == StoreErrorKind::Closed
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            StoreErrorKind::Dispatch => write!(f, "failed to dispatch request"),
            StoreErrorKind::Timeout => write!(f, "request timed out"),
            StoreErrorKind::InvalidRequest => write!(f, "invalid request"),
            StoreErrorKind::MalformedResponse => write!(f, "malformed response"),
            StoreErrorKind::Closed => write!(f, "store is closed"),
        }
    }
}

impl StdError for StoreError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source.as_ref().map(|err| err.as_ref() as _)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_closed_is_fatal() {
        assert!(StoreError::closed().is_fatal());
        assert!(!StoreError::dispatch("connection reset").is_fatal());
        assert!(!StoreError::timeout("slow").is_fatal());
        assert!(!StoreError::invalid_request("too many keys").is_fatal());
        assert!(!StoreError::malformed_response("missing id").is_fatal());
    }

    #[test]
    fn source_is_preserved() {
        let err = StoreError::dispatch("connection reset");
        assert_eq!("failed to dispatch request", err.to_string());
        assert_eq!(
            "connection reset",
            err.source().expect("has a source").to_string()
        );
        assert!(StoreError::closed().source().is_none());
    }
}
