use std::time::Duration;

use thiserror::Error;

use crate::partition::WorkRange;

/// Why a dispatched unit of work did not complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerFault {
    /// The kernel panicked; carries the panic message when it was a string.
    Panicked(String),
    /// The kernel reported a failure of its own.
    Kernel(String),
    /// The stage join did not finish within the configured timeout.
    TimedOut(Duration),
}

impl std::fmt::Display for WorkerFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerFault::Panicked(msg) => write!(f, "kernel panicked: {msg}"),
            WorkerFault::Kernel(msg) => write!(f, "kernel failed: {msg}"),
            WorkerFault::TimedOut(limit) => {
                write!(f, "did not finish within {} ms", limit.as_millis())
            }
        }
    }
}

/// Errors from resolving, dispatching and persisting effects.
#[derive(Error, Debug)]
pub enum FxError {
    /// The color model or depth name is not one the kernels understand.
    #[error("unsupported color space: model {model:?}, depth {depth:?}")]
    UnsupportedColorSpace { model: String, depth: String },

    /// Width or height is not positive.
    #[error("invalid image extent {width}x{height}")]
    InvalidExtent { width: i64, height: i64 },

    /// A buffer handed to the engine does not match the size the layout implies.
    #[error("{what} buffer holds {actual} elements, expected {expected}")]
    BufferSize {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A worker of a stage failed; the stage output must be discarded.
    #[error(
        "stage '{stage}' worker {worker} (items {}..{}) failed: {fault}",
        .range.start,
        .range.end()
    )]
    WorkerFailure {
        stage: &'static str,
        worker: usize,
        range: WorkRange,
        fault: WorkerFault,
    },

    /// The apply was cancelled through its cancellation token.
    #[error("stage '{stage}' was cancelled")]
    Cancelled { stage: &'static str },

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// The host document rejected a read, write or blur request.
    #[error("host error: {0}")]
    Host(String),

    #[error("settings I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("settings file is malformed: {0}")]
    SettingsFormat(String),
}

impl From<toml::de::Error> for FxError {
    fn from(err: toml::de::Error) -> Self {
        FxError::SettingsFormat(err.to_string())
    }
}

impl From<toml::ser::Error> for FxError {
    fn from(err: toml::ser::Error) -> Self {
        FxError::SettingsFormat(err.to_string())
    }
}

pub type FxResult<T> = Result<T, FxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_failure_names_stage_and_range() {
        let err = FxError::WorkerFailure {
            stage: "threshold",
            worker: 2,
            range: WorkRange::new(50, 25),
            fault: WorkerFault::Panicked("boom".to_string()),
        };
        let msg = err.to_string();
        assert!(msg.contains("threshold"));
        assert!(msg.contains("50..75"));
        assert!(msg.contains("boom"));
    }

    #[test]
    fn unsupported_color_space_message() {
        let err = FxError::UnsupportedColorSpace {
            model: "RGBA".to_string(),
            depth: "F16".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "unsupported color space: model \"RGBA\", depth \"F16\""
        );
    }
}
