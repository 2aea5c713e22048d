use serde::{Deserialize, Serialize};
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusState {
    Idle,
    Working,
    Error,
    Success,
}

/// A single line of user-facing progress, already localized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    pub state: StatusState,
    pub message: String,
}

impl Status {
    pub fn idle() -> Self {
        Self { state: StatusState::Idle, message: String::new() }
    }

    pub fn working(message: impl Into<String>) -> Self {
        Self { state: StatusState::Working, message: message.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { state: StatusState::Error, message: message.into() }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self { state: StatusState::Success, message: message.into() }
    }
}

/// Receives every status transition the pipeline emits. The CLI logs them;
/// tests record them.
pub trait StatusSink {
    fn update(&self, status: Status);
}

/// Sink that forwards transitions to the log stream.
pub struct TracingStatusSink;

impl StatusSink for TracingStatusSink {
    fn update(&self, status: Status) {
        match status.state {
            StatusState::Error => error!("{}", status.message),
            StatusState::Idle => {}
            _ => info!("{}", status.message),
        }
    }
}

/// Sink that drops everything, for callers that only care about results.
pub struct NullStatusSink;

impl StatusSink for NullStatusSink {
    fn update(&self, _status: Status) {}
}
