//! Configuration validation.
//!
//! Checks the loaded configuration for problems that would only surface on
//! the first tool call (missing credentials, unusable server URL) so the
//! binary can refuse to start instead.

use crate::schema::CalMcpConfig;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Dotted path, e.g. "caldav.username"
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}]: {}", self.severity, self.path, self.message)
    }
}

/// Result of validating a configuration.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    fn push(&mut self, severity: Severity, path: &str, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity,
            path: path.to_string(),
            message: message.into(),
        });
    }
}

/// Providers with a well-known CalDAV endpoint.
const KNOWN_PROVIDERS: &[&str] = &["icloud", "fastmail", "generic"];

/// Validate a loaded configuration.
#[must_use]
pub fn validate(config: &CalMcpConfig) -> ValidationResult {
    let mut result = ValidationResult::default();
    let caldav = &config.caldav;

    if caldav.username.as_deref().is_none_or(|u| u.trim().is_empty()) {
        result.push(
            Severity::Error,
            "caldav.username",
            "missing CalDAV username (set ICLOUD_USERNAME or caldav.username)",
        );
    }
    if caldav.password.is_none() {
        result.push(
            Severity::Error,
            "caldav.password",
            "missing CalDAV password (set ICLOUD_APP_PASSWORD or caldav.password)",
        );
    }

    let provider = caldav.provider.as_deref().unwrap_or("generic");
    if !KNOWN_PROVIDERS.contains(&provider) {
        result.push(
            Severity::Warning,
            "caldav.provider",
            format!(
                "unknown provider '{provider}', expected one of: {}",
                KNOWN_PROVIDERS.join(", ")
            ),
        );
    }

    match caldav.url.as_deref() {
        None if provider == "generic" || !KNOWN_PROVIDERS.contains(&provider) => {
            result.push(
                Severity::Error,
                "caldav.url",
                format!("provider '{provider}' requires an explicit CalDAV URL"),
            );
        },
        Some(url) if url.starts_with("http://") => {
            result.push(
                Severity::Warning,
                "caldav.url",
                "credentials will be sent over plain HTTP",
            );
        },
        Some(url) if !url.starts_with("https://") => {
            result.push(
                Severity::Error,
                "caldav.url",
                format!("'{url}' is not an http(s) URL"),
            );
        },
        _ => {},
    }

    if config.server.port == 0 {
        result.push(
            Severity::Warning,
            "server.port",
            "port 0 binds a random port",
        );
    }

    result
}
