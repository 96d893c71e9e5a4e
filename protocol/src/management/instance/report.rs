use serde::{Deserialize, Serialize};

/// The `Error`/`Notice` pair a host shows after each adapter call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterReport {
    pub error: Option<String>,
    pub notice: Option<String>,
}

impl AdapterReport {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            notice: None,
        }
    }

    pub fn notice(message: impl Into<String>) -> Self {
        Self {
            error: None,
            notice: Some(message.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.as_deref().map_or(true, |e| e.trim().is_empty())
    }
}
