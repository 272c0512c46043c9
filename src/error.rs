use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SlackError {
    #[error("Too many requests - wait until {until}")]
    RateLimited { until: DateTime<Utc> },

    #[error("Slack API error: {0}")]
    Api(String),

    #[error("Channel not found: {0}")]
    ChannelNotFound(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl SlackError {
    /// Name resolution failed for either a channel or a user
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ChannelNotFound(_) | Self::UserNotFound(_))
    }

    /// Check if the request was refused by the rate-limit gate
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// The platform error code, if the API itself reported the failure
    pub fn api_code(&self) -> Option<&str> {
        match self {
            Self::Api(code) => Some(code),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SlackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(SlackError::ChannelNotFound("general".into()).is_not_found());
        assert!(SlackError::UserNotFound("bob".into()).is_not_found());
        assert!(!SlackError::Api("x".into()).is_not_found());

        let err = SlackError::RateLimited { until: Utc::now() };
        assert!(err.is_rate_limited());
        assert_eq!(err.api_code(), None);
    }

    #[test]
    fn test_api_code_display() {
        let err = SlackError::Api("channel_not_found".to_string());
        assert_eq!(err.api_code(), Some("channel_not_found"));
        assert_eq!(err.to_string(), "Slack API error: channel_not_found");
    }
}
