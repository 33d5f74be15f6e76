//! Screen configuration.

use std::path::Path;

use locator_location::LocationRequest;
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Everything the location screen can be tuned with.
///
/// Every field has a default, so an empty JSON object is a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScreenConfig {
    /// Title bar text.
    pub title: String,
    /// Preference key remembering that permission was requested once.
    pub permission_flag_key: String,
    /// Cadence and accuracy of the update subscription.
    pub request: LocationRequest,
    /// How many times one run re-enters the fetch flow after a settings failure.
    pub max_settings_retries: u32,
    /// Request code attached to the permission prompt.
    pub permission_request_code: i32,
    /// Request code attached to the settings-resolution prompt.
    pub resolution_request_code: i32,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            title: "Location".to_owned(),
            permission_flag_key: "LOCATION".to_owned(),
            request: LocationRequest::default(),
            max_settings_retries: 3,
            permission_request_code: 1,
            resolution_request_code: 1,
        }
    }
}

impl ScreenConfig {
    /// Parses a JSON configuration.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed JSON or unknown fields.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }
}
