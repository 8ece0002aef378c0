//! What sessions report to the outside world, and what it can ask of them.

use crate::device::DeviceClass;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Connected(DeviceClass),
    Disconnected(DeviceClass),
    /// A step worth a progress tick ("BOOTP request received", ...).
    Milestone {
        class: DeviceClass,
        description: String,
    },
    /// Non-fatal or session-fatal problem; sessions never take the process down.
    Error {
        class: Option<DeviceClass>,
        message: String,
    },
    ConsoleStarted(DeviceClass),
    ConsoleOutput(Vec<u8>),
}

impl SessionEvent {
    pub fn milestone(class: DeviceClass, description: impl Into<String>) -> Self {
        SessionEvent::Milestone {
            class,
            description: description.into(),
        }
    }

    pub fn error(class: DeviceClass, message: impl Into<String>) -> Self {
        SessionEvent::Error {
            class: Some(class),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    /// Send a line of text to the device's netconsole.
    Console(String),
}

pub type EventSender = mpsc::UnboundedSender<SessionEvent>;

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressReport {
    pub description: String,
    pub complete: f64,
}

/// Percent-complete counter owned by whoever consumes milestones.
#[derive(Debug, Clone)]
pub struct Progress {
    percent: f64,
    increment: f64,
}

/// Milestones expected per boot stage.
const STEPS_PER_STAGE: usize = 10;

impl Progress {
    pub fn new(stages: usize) -> Self {
        let increment = 100.0 / (stages.max(1) * STEPS_PER_STAGE) as f64;
        Self {
            percent: 0.0,
            increment,
        }
    }

    /// Start over from the first tick, as when the first stage re-enumerates.
    pub fn restart(&mut self) {
        self.percent = self.increment;
    }

    pub fn advance(&mut self, description: impl Into<String>) -> ProgressReport {
        let report = ProgressReport {
            description: description.into(),
            complete: (self.percent.min(100.0) * 100.0).round() / 100.0,
        };
        if self.percent <= 100.0 {
            self.percent += self.increment;
        }
        report
    }
}
