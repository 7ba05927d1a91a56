use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Address lookup failed for postal code '{postal_code}': {reason}")]
    LookupFailed { postal_code: String, reason: String },

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid configuration value for '{field}' ({value}): {reason}")]
    InvalidConfigValue {
        field: String,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Lookup,
    Storage,
    Configuration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ServiceError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn lookup_failed(postal_code: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::LookupFailed {
            postal_code: postal_code.into(),
            reason: reason.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidArgument { .. } | Self::NotFound { .. } => ErrorCategory::Input,
            Self::LookupFailed { .. } | Self::Http(_) => ErrorCategory::Lookup,
            Self::Io(_) | Self::Serialization(_) => ErrorCategory::Storage,
            Self::Config { .. } | Self::InvalidConfigValue { .. } => {
                ErrorCategory::Configuration
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NotFound { .. } => ErrorSeverity::Low,
            Self::LookupFailed { .. } | Self::Http(_) => ErrorSeverity::Medium,
            Self::InvalidArgument { .. } | Self::Config { .. } | Self::InvalidConfigValue { .. } => {
                ErrorSeverity::High
            }
            Self::Io(_) | Self::Serialization(_) => ErrorSeverity::Critical,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::InvalidArgument { message } => format!("Invalid input: {}", message),
            Self::NotFound { message } => message.clone(),
            Self::LookupFailed { postal_code, .. } => {
                format!("Could not resolve an address for postal code {}", postal_code)
            }
            Self::Http(_) => "The postal code service could not be reached".to_string(),
            Self::Io(_) | Self::Serialization(_) => {
                "Customer data could not be read or written".to_string()
            }
            Self::Config { .. } | Self::InvalidConfigValue { .. } => {
                format!("Configuration problem: {}", self)
            }
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            Self::InvalidArgument { .. } => {
                "Check the customer id (positive integer) and that the payload carries a postal code"
            }
            Self::NotFound { .. } => "Run `list` to see the existing customer ids",
            Self::LookupFailed { .. } => {
                "Verify the postal code has 8 digits and that the lookup endpoint is reachable"
            }
            Self::Http(_) => "Check network connectivity or raise --lookup-timeout-seconds",
            Self::Io(_) | Self::Serialization(_) => {
                "Check permissions on --data-dir and that its JSON files are not corrupted"
            }
            Self::Config { .. } | Self::InvalidConfigValue { .. } => {
                "Review the TOML file and command line flags"
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;
