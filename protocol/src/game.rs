use serde::Serialize;

/// Steam application id of the dedicated server.
pub const APP_ID: &str = "1690800";
pub const FULL_NAME: &str = "Satisfactory Dedicated Server Early";

/// SteamCMD logs in anonymously for this app.
pub const LOGIN_ANONYMOUS: bool = true;

pub const DEFAULT_PORT: &str = "7777";
/// Port entered in the client's Server Manager to reach the server.
pub const DEFAULT_QUERY_PORT: &str = "15777";
/// Cannot be changed on the server side.
pub const BEACON_PORT: &str = "15000";
/// Informational only, the server picks its own map.
pub const DEFAULT_MAP: &str = "Dedicated";
pub const DEFAULT_MAX_PLAYERS: u32 = 16;
/// How many ports a host should skip after installing an instance.
pub const PORT_INCREMENTS: u16 = 1;

/// Project name passed as the first launch argument.
pub const PROJECT_NAME: &str = "FactoryGame";
pub const SESSION_SECTION: &str = "/Script/Engine.GameSession";
pub const MAX_PLAYERS_KEY: &str = "MaxPlayers";
pub const GAME_INI: &str = "Game.ini";

/// Executable location relative to the instance root, one segment per item.
#[cfg(windows)]
pub const START_PATH: &[&str] = &[
    "Engine",
    "Binaries",
    "Win64",
    "UE4Server-Win64-Shipping.exe",
];
#[cfg(not(windows))]
pub const START_PATH: &[&str] = &[
    "Engine",
    "Binaries",
    "Linux",
    "UE4Server-Linux-Shipping",
];

/// Directory holding `Game.ini`, relative to the instance root.
#[cfg(windows)]
pub const CONFIG_DIR: &[&str] = &["FactoryGame", "Saved", "Config", "WindowsServer"];
#[cfg(not(windows))]
pub const CONFIG_DIR: &[&str] = &["FactoryGame", "Saved", "Config", "LinuxServer"];

/// Server query protocol used by the host. The dedicated server answers none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryMethod {
    None,
}

#[derive(Debug, Clone, Serialize)]
pub struct PluginInfo {
    pub name: &'static str,
    pub author: &'static str,
    pub description: &'static str,
    pub version: &'static str,
    pub url: &'static str,
    /// hex color used by hosts when listing the plugin
    pub color: &'static str,
}

pub const PLUGIN: PluginInfo = PluginInfo {
    name: "Satisfactory.Early",
    author: "werewolf2150",
    description: "Adapter for the Satisfactory Dedicated Server Early Access",
    version: "1.3",
    url: "https://github.com/werewolf2150/WindowsGSM.Satisfactory",
    color: "#34c9eb",
};

/// Static facts about the game a host can display or use for defaults.
#[derive(Debug, Clone, Serialize)]
pub struct GameInfo {
    pub plugin: PluginInfo,
    pub full_name: &'static str,
    pub app_id: &'static str,
    pub start_path: String,
    pub allows_embed_console: bool,
    pub port_increments: u16,
    pub query_method: QueryMethod,
    pub default_port: &'static str,
    pub default_query_port: &'static str,
    pub beacon_port: &'static str,
    pub default_map: &'static str,
    pub default_max_players: u32,
}

impl GameInfo {
    pub fn get() -> Self {
        GameInfo {
            plugin: PLUGIN,
            full_name: FULL_NAME,
            app_id: APP_ID,
            start_path: START_PATH.join("/"),
            allows_embed_console: true,
            port_increments: PORT_INCREMENTS,
            query_method: QueryMethod::None,
            default_port: DEFAULT_PORT,
            default_query_port: DEFAULT_QUERY_PORT,
            beacon_port: BEACON_PORT,
            default_map: DEFAULT_MAP,
            default_max_players: DEFAULT_MAX_PLAYERS,
        }
    }
}
