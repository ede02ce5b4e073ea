use std::{
    sync::mpsc::{self, RecvTimeoutError, TryRecvError},
    time::Duration,
};

use derive_more::{From, Into};
use serde::{Deserialize, Serialize};

pub mod random_org;

/// Precision requested from the service for every decimal.
pub const DECIMAL_PLACES: u32 = 5;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("no API key configured")]
    MissingCredential,
    #[error("transport error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("service error {code}: {message}")]
    Service { code: i64, message: String },
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("short response: expected {expected} values, received {received}")]
    ShortResponse { expected: usize, received: usize },
    #[error("fetch was abandoned before completing")]
    Disconnected,
}

pub type FetchResult = Result<Vec<f64>, SourceError>;

/// Credential for the randomness service. Never printed in full.
#[derive(Clone, Default, PartialEq, Eq, From, Into, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_usable(&self) -> bool {
        !self.0.trim().is_empty()
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let visible: String = self.0.chars().take(4).collect();
        write!(f, "ApiKey({visible}…)")
    }
}

pub trait RandomSource: Send {
    fn has_credential(&self) -> bool;

    /// Requests `count` decimals in [0, 1) with the given precision.
    fn fetch(&self, count: usize, decimal_places: u32) -> PendingFetch;
}

/// Handle to a fetch that may not have completed yet.
///
/// Dropping the handle detaches the fetch; its result is discarded.
#[derive(Debug)]
pub struct PendingFetch {
    requested: usize,
    rx: mpsc::Receiver<FetchResult>,
}

#[derive(Debug)]
pub struct FetchResolver {
    tx: mpsc::Sender<FetchResult>,
}

impl FetchResolver {
    pub fn resolve(self, result: FetchResult) {
        // the handle may already be gone, which is fine
        let _ = self.tx.send(result);
    }
}

impl PendingFetch {
    pub fn channel(requested: usize) -> (FetchResolver, PendingFetch) {
        let (tx, rx) = mpsc::channel();
        (FetchResolver { tx }, PendingFetch { requested, rx })
    }

    pub fn ready(requested: usize, result: FetchResult) -> Self {
        let (resolver, pending) = Self::channel(requested);
        resolver.resolve(result);
        pending
    }

    /// Runs `job` on a worker thread and resolves with its result.
    pub fn spawn<F>(requested: usize, job: F) -> Self
    where
        F: FnOnce() -> FetchResult + Send + 'static,
    {
        let (resolver, pending) = Self::channel(requested);
        std::thread::spawn(move || resolver.resolve(job()));
        pending
    }

    pub fn requested(&self) -> usize {
        self.requested
    }

    pub fn try_take(&self) -> Option<FetchResult> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(SourceError::Disconnected)),
        }
    }

    pub fn wait(&self, timeout: Duration) -> Option<FetchResult> {
        match self.rx.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Err(SourceError::Disconnected)),
        }
    }
}

/// Accepts a batch only if it is complete and every value is a finite decimal
/// in [0, 1).
pub fn validate_batch(values: Vec<f64>, expected: usize) -> FetchResult {
    if values.len() < expected {
        return Err(SourceError::ShortResponse {
            expected,
            received: values.len(),
        });
    }
    if values.len() > expected {
        return Err(SourceError::Malformed(format!(
            "expected {expected} values, received {}",
            values.len()
        )));
    }
    if let Some(bad) = values
        .iter()
        .find(|v| !v.is_finite() || !(0.0..1.0).contains(*v))
    {
        return Err(SourceError::Malformed(format!(
            "value {bad} is outside [0, 1)"
        )));
    }
    Ok(values)
}
