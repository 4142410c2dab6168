//! Provisioning settings
//!
//! Settings can be built in code, parsed from TOML, or read from environment
//! variables.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default limit for nested provisions on one context.
pub const DEFAULT_MAX_PROVISION_DEPTH: usize = 100;

/// Settings errors
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SettingsError {
	/// TOML could not be parsed into settings.
	#[error("failed to parse provision settings: {0}")]
	Parse(String),

	/// An environment variable held an unusable value.
	#[error("invalid value for {name}: {value}")]
	InvalidEnv {
		/// Variable name.
		name: &'static str,
		/// Raw value.
		value: String,
	},

	/// Settings were parsed but are inconsistent.
	#[error("invalid provision settings: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for SettingsError {
	fn from(err: toml::de::Error) -> Self {
		Self::Parse(err.to_string())
	}
}

/// Runtime settings for the provisioning pipeline.
///
/// # Examples
///
/// ```
/// use reinhardt_provision::ProvisionSettings;
///
/// let settings = ProvisionSettings::from_toml_str("max_provision_depth = 16").unwrap();
/// assert_eq!(settings.max_provision_depth, 16);
/// assert!(settings.log_listener_faults);
/// ```
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionSettings {
	/// Maximum number of provisions that may be nested on one context
	#[serde(default = "default_max_provision_depth")]
	pub max_provision_depth: usize,

	/// Emit a warning whenever a listener fault is reported
	#[serde(default = "default_log_listener_faults")]
	pub log_listener_faults: bool,
}

fn default_max_provision_depth() -> usize {
	DEFAULT_MAX_PROVISION_DEPTH
}

fn default_log_listener_faults() -> bool {
	true
}

impl Default for ProvisionSettings {
	fn default() -> Self {
		Self {
			max_provision_depth: default_max_provision_depth(),
			log_listener_faults: default_log_listener_faults(),
		}
	}
}

impl ProvisionSettings {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_max_provision_depth(mut self, depth: usize) -> Self {
		self.max_provision_depth = depth;
		self
	}

	pub fn with_log_listener_faults(mut self, enabled: bool) -> Self {
		self.log_listener_faults = enabled;
		self
	}

	/// Parses and validates settings from a TOML document.
	pub fn from_toml_str(input: &str) -> Result<Self, SettingsError> {
		let settings: Self = toml::from_str(input)?;
		settings.validate()?;
		Ok(settings)
	}

	/// Load settings from environment variables
	///
	/// Reads `REINHARDT_PROVISION_MAX_DEPTH` and
	/// `REINHARDT_PROVISION_LOG_LISTENER_FAULTS`; unset variables keep their
	/// defaults.
	pub fn from_env() -> Result<Self, SettingsError> {
		let mut settings = Self::default();

		if let Ok(depth) = std::env::var("REINHARDT_PROVISION_MAX_DEPTH") {
			settings.max_provision_depth =
				depth.trim().parse().map_err(|_| SettingsError::InvalidEnv {
					name: "REINHARDT_PROVISION_MAX_DEPTH",
					value: depth.clone(),
				})?;
		}

		if let Ok(flag) = std::env::var("REINHARDT_PROVISION_LOG_LISTENER_FAULTS") {
			settings.log_listener_faults = flag.to_lowercase() == "true" || flag == "1";
		}

		settings.validate()?;
		Ok(settings)
	}

	pub fn validate(&self) -> Result<(), SettingsError> {
		if self.max_provision_depth == 0 {
			return Err(SettingsError::Validation(
				"max_provision_depth must be at least 1".to_string(),
			));
		}
		Ok(())
	}
}
