//! Config schema types (server, caldav account, MCP server identity).

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CalMcpConfig {
    pub server: ServerConfig,
    pub caldav: CalDavConfig,
    pub mcp: McpServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to. Defaults to "127.0.0.1".
    pub bind: String,
    /// Port to listen on. Defaults to 8000.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".into(),
            port: 8000,
        }
    }
}

/// The CalDAV account the tools operate on.
///
/// Credentials are passed through as HTTP basic auth; for iCloud this is the
/// Apple ID plus an app-specific password.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalDavConfig {
    /// Well-known provider name: "icloud", "fastmail" or "generic".
    pub provider: Option<String>,
    /// Explicit server URL. Required for "generic", optional otherwise.
    pub url: Option<String>,
    pub username: Option<String>,
    #[serde(
        default,
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub password: Option<Secret<String>>,
}

impl Default for CalDavConfig {
    fn default() -> Self {
        Self {
            provider: Some("icloud".into()),
            url: None,
            username: None,
            password: None,
        }
    }
}

/// Identity reported to MCP clients during `initialize`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct McpServerConfig {
    pub name: String,
    pub title: Option<String>,
}

impl Default for McpServerConfig {
    fn default() -> Self {
        Self {
            name: "calmcp".into(),
            title: Some("Personal Calendar MCP".into()),
        }
    }
}

// ── Serde helpers for Secret<String> ────────────────────────────────────────

fn serialize_option_secret<S: serde::Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(s) => serializer.serialize_some(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}
