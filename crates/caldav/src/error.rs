#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("missing required field 'summary'")]
    MissingSummary,
    #[error("invalid '{field}': {reason}")]
    InvalidParameter { field: String, reason: String },
    #[error("failed to parse iCalendar data: {0}")]
    Ical(String),
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
}

impl Error {
    #[must_use]
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Whether the caller, not the server, is at fault.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::MissingSummary | Self::InvalidParameter { .. } | Self::SerdeJson(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
