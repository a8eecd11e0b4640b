//! Remote failure classification
//!
//! Remote errors are matched case-insensitively against known substrings,
//! in a fixed order, and replaced with a user-facing advisory.

use std::fmt;

const RATE_LIMIT_MARKERS: &[&str] = &["rate_limit", "rate limit", "too many requests"];
const AUTH_MARKERS: &[&str] = &["api_key", "authentication", "unauthorized"];
const TIMEOUT_MARKERS: &[&str] = &["timeout", "timed out"];
const MODEL_MARKERS: &[&str] = &["model", "not found"];

/// User-facing text substituted for a remote error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advisory {
    /// The provider throttled the request
    RateLimit,
    /// The credential was missing or rejected
    Authentication,
    /// The request did not complete in time
    Timeout,
    /// The configured model is unknown or unavailable
    ModelUnavailable {
        /// Model identifier that was requested
        model: String,
    },
    /// Anything else; carries the raw error text
    Generic {
        /// Original error text
        detail: String,
    },
}

impl Advisory {
    /// Classify an error message
    ///
    /// The first matching category wins: rate limit, authentication,
    /// timeout, model availability, then generic.
    ///
    /// # Examples
    ///
    /// ```
    /// use contextiq::orchestrator::Advisory;
    ///
    /// let advisory = Advisory::classify("Rate limit reached for requests", "gemma2-9b-it");
    /// assert_eq!(advisory, Advisory::RateLimit);
    /// ```
    pub fn classify(error_text: &str, model: &str) -> Self {
        let lowered = error_text.to_lowercase();
        let hit = |markers: &[&str]| markers.iter().any(|m| lowered.contains(m));

        if hit(RATE_LIMIT_MARKERS) {
            Self::RateLimit
        } else if hit(AUTH_MARKERS) {
            Self::Authentication
        } else if hit(TIMEOUT_MARKERS) {
            Self::Timeout
        } else if hit(MODEL_MARKERS) {
            Self::ModelUnavailable {
                model: model.to_string(),
            }
        } else {
            Self::Generic {
                detail: error_text.to_string(),
            }
        }
    }

    /// Markdown text shown to the user in place of an assistant reply
    pub fn message(&self) -> String {
        match self {
            Self::RateLimit => "⚠️ **Rate Limit Reached**\n\n\
                Please wait a moment and try again. Groq has generous free tier limits, \
                but they do apply per minute."
                .to_string(),
            Self::Authentication => "⚠️ **API Key Issue**\n\n\
                Please check that your GROQ_API_KEY is set correctly in the environment, \
                the secrets file, or the keyring."
                .to_string(),
            Self::Timeout => "⚠️ **Request Timeout**\n\n\
                The request took too long. Please try again or select a different model."
                .to_string(),
            Self::ModelUnavailable { model } => format!(
                "⚠️ **Model Error**\n\n\
                The model '{}' may not be available. Try selecting a different model.",
                model
            ),
            Self::Generic { detail } => format!(
                "⚠️ **Error**: {}\n\nPlease try again or contact support if the issue persists.",
                detail
            ),
        }
    }
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}
