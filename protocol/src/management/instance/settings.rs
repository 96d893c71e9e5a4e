use crate::game::{DEFAULT_MAX_PLAYERS, DEFAULT_PORT, DEFAULT_QUERY_PORT};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Host-level settings of one server instance.
///
/// Ports are kept as strings: a blank value means the launch flag is left out
/// and the server falls back to its own default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceSettings {
    #[serde(default = "uuid::Uuid::new_v4")]
    pub uuid: Uuid,

    #[serde(default)]
    pub name: String,
    /// bind address, passed as `-Multihome` when set
    #[serde(default)]
    pub ip: String,
    #[serde(default = "default_port")]
    pub port: String,
    #[serde(default = "default_query_port")]
    pub query_port: String,
    #[serde(default = "default_max_players")]
    pub max_players: u32,
    #[serde(default)]
    pub extra_params: String,
    /// update channel handed to the installer
    #[serde(default)]
    pub beta: Option<String>,
    #[serde(default = "default_embed_console")]
    pub embed_console: bool,
}

fn default_port() -> String {
    DEFAULT_PORT.to_owned()
}

fn default_query_port() -> String {
    DEFAULT_QUERY_PORT.to_owned()
}

fn default_max_players() -> u32 {
    DEFAULT_MAX_PLAYERS
}

fn default_embed_console() -> bool {
    true
}

impl Default for InstanceSettings {
    fn default() -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: String::new(),
            ip: String::new(),
            port: default_port(),
            query_port: default_query_port(),
            max_players: default_max_players(),
            extra_params: String::new(),
            beta: None,
            embed_console: default_embed_console(),
        }
    }
}

impl InstanceSettings {
    pub fn new(uuid: Uuid) -> Self {
        Self {
            uuid,
            ..Default::default()
        }
    }

    /// Channel to update from, ignoring blank values.
    pub fn beta_channel(&self) -> Option<&str> {
        self.beta
            .as_deref()
            .map(str::trim)
            .filter(|beta| !beta.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::str::FromStr;

    const SETTINGS_TEXT: &str = r#"{
        "uuid": "2a42f6ab-8bd9-450c-a391-5ee3bffffb64",
        "name": "factory",
        "query_port": "",
        "max_players": 8,
        "beta": "experimental"
    }"#;

    #[test]
    fn settings_deserialize_with_defaults() {
        let settings: InstanceSettings = serde_json::from_str(SETTINGS_TEXT).unwrap();
        assert_eq!(
            settings,
            InstanceSettings {
                uuid: Uuid::from_str("2a42f6ab-8bd9-450c-a391-5ee3bffffb64").unwrap(),
                name: "factory".to_string(),
                ip: String::new(),
                port: "7777".to_string(),
                query_port: String::new(),
                max_players: 8,
                extra_params: String::new(),
                beta: Some("experimental".to_string()),
                embed_console: true,
            }
        );
    }

    #[test]
    fn blank_beta_is_no_channel() {
        let mut settings = InstanceSettings::default();
        assert_eq!(settings.beta_channel(), None);
        settings.beta = Some("  ".into());
        assert_eq!(settings.beta_channel(), None);
        settings.beta = Some("public ".into());
        assert_eq!(settings.beta_channel(), Some("public"));
    }
}
