use thiserror::Error;

/// Invalid configuration passed to a crewguard builder.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A numeric setting was outside its permitted range.
    #[error("invalid value for `{field}`: {reason}")]
    InvalidValue {
        /// The offending setting.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// Two settings contradict each other.
    #[error("conflicting settings: {0}")]
    Conflict(String),
}

impl ConfigError {
    /// Convenience constructor for [`ConfigError::InvalidValue`].
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}
