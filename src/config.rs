//! Process-wide configuration.
//!
//! The leaflet images and the output file live at fixed paths relative to the
//! working directory. Credentials for the reasoning service come from the
//! environment (optionally populated from a `.env` file by `main`).

use std::{env, error, fmt};

/// The leaflet images processed by `extract`, in output order.
pub const LEAFLET_IMAGES: [&str; 2] = ["I&M_Image_2.jpg", "I_and_m_image4.jpg"];

/// Where `extract` writes its records and where `dashboard` reads them.
pub const OUTPUT_PATH: &str = "data.json";

/// Environment variable holding the API key.
pub const API_KEY_VAR: &str = "OPENAI_API_KEY";

/// Environment variable overriding the API base URL.
pub const API_BASE_VAR: &str = "OPENAI_API_BASE";

/// Credentials and endpoint for the reasoning service.
#[derive(Clone)]
pub struct ServiceConfig {
    /// The secret API key.
    pub api_key: String,

    /// An alternate OpenAI-compatible endpoint (LiteLLM, Ollama, etc).
    pub api_base: Option<String>,
}

impl ServiceConfig {
    /// Load our configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load our configuration using an arbitrary variable lookup.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let api_key = lookup(API_KEY_VAR)
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)?;
        let api_base = lookup(API_BASE_VAR).filter(|base| !base.trim().is_empty());
        Ok(Self { api_key, api_base })
    }
}

// Never print the key itself.
impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("api_key", &"<redacted>")
            .field("api_base", &self.api_base)
            .finish()
    }
}

/// A configuration problem detected at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No API key was provided.
    MissingApiKey,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingApiKey => write!(
                f,
                "{API_KEY_VAR} is not set; export it or add it to a .env file in the working directory"
            ),
        }
    }
}

impl error::Error for ConfigError {}
