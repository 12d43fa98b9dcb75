use std::{error::Error, fmt, io};

/// The worker module's result type.
pub type Result<T> = std::result::Result<T, WorkerError>;

/// Worker runtime failures.
#[derive(Debug)]
pub enum WorkerError {
    Io(io::Error),
    UnexpectedResponse {
        operation: &'static str,
    },
    NotInitialized,
    SyncTimeout {
        iteration: u64,
        polls: u32,
    },
    IterationFailed {
        iteration: u64,
        attempts: u32,
    },
}

impl fmt::Display for WorkerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerError::Io(e) => write!(f, "io error: {e}"),
            WorkerError::UnexpectedResponse { operation } => {
                write!(f, "unexpected response kind for {operation}")
            }
            WorkerError::NotInitialized => {
                write!(f, "worker used before initialize() completed")
            }
            WorkerError::SyncTimeout { iteration, polls } => {
                write!(f, "iteration {iteration} not ready after {polls} polls")
            }
            WorkerError::IterationFailed {
                iteration,
                attempts,
            } => write!(f, "iteration {iteration} failed after {attempts} attempts"),
        }
    }
}

impl Error for WorkerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            WorkerError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for WorkerError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}
