//! Configuration loading, env substitution, overrides and validation.
//!
//! Config files: `calmcp.toml`, `calmcp.yaml`, or `calmcp.json`
//! Searched in `./` then `~/.config/calmcp/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    loader::{apply_env_overrides, config_dir, discover_and_load, load_config},
    schema::{CalDavConfig, CalMcpConfig, McpServerConfig, ServerConfig},
    validate::{Diagnostic, Severity, ValidationResult, validate},
};
