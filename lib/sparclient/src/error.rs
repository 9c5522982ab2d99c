use sparstream::StreamError;
use std::io;
use std::time::Duration;

/// Error returned by [`Endpoint`](crate::Endpoint) operations.
#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    /// The endpoint answered with a non-success status.
    #[error(transparent)]
    Query(#[from] QueryError),
    /// The endpoint could not be reached or the exchange was interrupted.
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Stream(#[from] StreamError),
    /// The response can't be handled, for example because of its media type.
    #[error("{0}")]
    Unsupported(String),
}

/// An error status returned by a SPARQL endpoint, together with the response body.
#[derive(Debug, Clone, thiserror::Error)]
#[error("the endpoint returned HTTP {status}: {message}")]
pub struct QueryError {
    status: u16,
    message: String,
}

impl QueryError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// The HTTP status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// The response body, as sent by the endpoint.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A network or protocol level failure.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error(transparent)]
    Io(#[from] io::Error),
    /// The request could not be built.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl TransportError {
    /// Returns `true` if the exchange failed because a timeout elapsed.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Io(error) if error.kind() == io::ErrorKind::TimedOut)
    }
}

/// A failure of the [`KeyValueStore`](crate::KeyValueStore) backing the throttle.
#[derive(Debug, Clone, thiserror::Error)]
#[error("key-value store failure: {0}")]
pub struct StoreError(String);

impl StoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Error returned by [`Throttle::run`](crate::Throttle::run).
#[derive(Debug, thiserror::Error)]
pub enum ThrottleError<E> {
    /// The client has been querying too much recently.
    #[error(transparent)]
    Excessive(#[from] ExcessiveQueryError),
    /// The client already has a query in flight.
    #[error("the client already has a query in progress")]
    ConcurrentQuery,
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The throttled operation itself failed.
    #[error(transparent)]
    Query(E),
}

/// A query refused because the intensity of the client reached the deny threshold.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error(
    "query intensity {intensity:.2} reached the deny threshold {deny_threshold}, retry in {} seconds",
    retry_after.as_secs()
)]
pub struct ExcessiveQueryError {
    intensity: f64,
    deny_threshold: f64,
    retry_after: Duration,
}

impl ExcessiveQueryError {
    /// Builds the error, computing the retry-after hint as the whole number of seconds
    /// the intensity needs to decay below the threshold, plus one.
    pub fn new(intensity: f64, deny_threshold: f64, intensity_decay: f64) -> Self {
        let wait = if intensity_decay > 0. {
            ((intensity - deny_threshold) / intensity_decay).ceil().max(0.) + 1.
        } else {
            f64::from(u32::MAX)
        };
        Self {
            intensity,
            deny_threshold,
            retry_after: Duration::from_secs_f64(wait),
        }
    }

    /// The intensity of the client when the query was refused.
    pub fn intensity(&self) -> f64 {
        self.intensity
    }

    pub fn deny_threshold(&self) -> f64 {
        self.deny_threshold
    }

    /// How long the client should wait before querying again.
    pub fn retry_after(&self) -> Duration {
        self.retry_after
    }
}
