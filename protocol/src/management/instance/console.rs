use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    Stdout,
    Stderr,
}

/// One line of server output, as shown in a host console.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleLine {
    pub instance: Uuid,
    pub stream: StreamKind,
    pub text: String,
    pub time: DateTime<Local>,
}

impl ConsoleLine {
    pub fn new(instance: Uuid, stream: StreamKind, text: impl Into<String>) -> Self {
        Self {
            instance,
            stream,
            text: text.into(),
            time: Local::now(),
        }
    }
}
