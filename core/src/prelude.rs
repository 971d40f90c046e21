use std::sync::Arc;

use crate::detection::{Channel, DetectionRecord};

/// Records are shared between the dataset, the scheduler and every observer.
pub type SharedRecord = Arc<DetectionRecord>;

/// Failure raised by an observer while handling a delivered record.
pub type ObserverError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type ObserverResult = Result<(), ObserverError>;

/// Why a raw record was rejected during dataset construction.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordDefect {
    #[error("missing id")]
    MissingId,
    #[error("id must be a non-empty string or an integer")]
    MalformedId,
    #[error("missing channel")]
    MissingChannel,
    #[error("unknown channel `{0}`")]
    UnknownChannel(String),
    #[error("channel `{declared}` conflicts with enclosing channel `{expected}`")]
    ChannelMismatch { declared: String, expected: Channel },
    #[error("missing activation time")]
    MissingActivationTime,
    #[error("invalid activation time: {0}")]
    InvalidActivationTime(String),
    #[error("duplicate id `{0}` within channel")]
    DuplicateId(String),
}

/// Errors surfaced while building an [`EventDataset`](crate::dataset::EventDataset).
#[derive(thiserror::Error, Debug)]
pub enum DatasetError {
    #[error("invalid record at index {index}: {defect}")]
    InvalidRecord { index: usize, defect: RecordDefect },
    #[error("malformed dataset document: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("dataset document must be an array of records or an object keyed by channel")]
    UnsupportedLayout,
    #[error("reading dataset {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl DatasetError {
    pub fn invalid(index: usize, defect: RecordDefect) -> Self {
        DatasetError::InvalidRecord { index, defect }
    }
}

pub type DatasetResult<T> = Result<T, DatasetError>;

/// Errors raised by the playback machinery itself.
#[derive(thiserror::Error, Debug)]
pub enum PlaybackError {
    #[error("no timer runtime available: {0}")]
    Runtime(String),
}

pub type PlaybackResult<T> = Result<T, PlaybackError>;

/// Receives each record exactly once when its activation instant is reached.
///
/// Observers are invoked from the synchronous start path as well as from
/// timer callbacks, so they must be shareable across threads.
pub trait DetectionObserver: Send + Sync {
    fn on_detection(&self, record: &SharedRecord) -> ObserverResult;
}

impl<F> DetectionObserver for F
where
    F: Fn(&SharedRecord) -> ObserverResult + Send + Sync,
{
    fn on_detection(&self, record: &SharedRecord) -> ObserverResult {
        self(record)
    }
}
