//! Viewer configuration supplied by the host page.

use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Hard limits for any configured zoom range.
pub const ZOOM_FLOOR: f64 = 0.5;
pub const ZOOM_CEIL: f64 = 3.0;

/// Top-level settings for one `<CampusMap/>` instance.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
	/// Base URL of the campus backend serving `/map-data`, `/route` and `/classes`.
	pub api_base_url: String,
	/// Node every route starts from.
	pub origin_node_id: String,
	pub viewport: ViewportConfig,
	pub session: SessionConfig,
}

impl Default for ViewerConfig {
	fn default() -> Self {
		Self {
			api_base_url: "http://localhost:5000".into(),
			origin_node_id: "n1".into(),
			viewport: ViewportConfig::default(),
			session: SessionConfig::default(),
		}
	}
}

impl ViewerConfig {
	/// Parse host overrides; missing keys keep their defaults.
	pub fn from_json(json: &str) -> Result<Self, ConfigError> {
		let config: Self = serde_json::from_str(json)?;
		config.viewport.validate()?;
		Ok(config)
	}
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
	pub min_zoom: f64,
	pub max_zoom: f64,
	/// Zoom change per unit of wheel `deltaY`.
	pub wheel_sensitivity: f64,
	/// Logical units added around the node bounds.
	pub view_margin: f64,
	/// Screen pixels a press may travel and still count as a click.
	pub click_slop: f64,
}

impl Default for ViewportConfig {
	fn default() -> Self {
		Self {
			min_zoom: 0.5,
			max_zoom: 3.0,
			wheel_sensitivity: 0.001,
			view_margin: 50.0,
			click_slop: 4.0,
		}
	}
}

impl ViewportConfig {
	/// Zoom bounds must be ordered and inside [`ZOOM_FLOOR`]..=[`ZOOM_CEIL`].
	pub fn validate(&self) -> Result<(), ConfigError> {
		let (min, max) = (self.min_zoom, self.max_zoom);
		let in_range = |z: f64| (ZOOM_FLOOR..=ZOOM_CEIL).contains(&z);
		if !(in_range(min) && in_range(max) && min <= max) {
			return Err(ConfigError::ZoomRange {
				min,
				max,
				floor: ZOOM_FLOOR,
				ceil: ZOOM_CEIL,
			});
		}
		for (field, value) in [
			("wheel_sensitivity", self.wheel_sensitivity),
			("view_margin", self.view_margin),
			("click_slop", self.click_slop),
		] {
			if !value.is_finite() || value < 0.0 {
				return Err(ConfigError::InvalidSetting { field, value });
			}
		}
		Ok(())
	}
}

/// How input received while the presence prompt is open is treated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcknowledgePolicy {
	/// Only the "I'm here" action dismisses the prompt.
	#[default]
	Explicit,
	/// Any qualifying input dismisses the prompt.
	AnyInput,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
	pub idle_timeout_ms: u64,
	pub confirm_timeout_ms: u64,
	pub acknowledge: AcknowledgePolicy,
}

impl Default for SessionConfig {
	fn default() -> Self {
		Self {
			idle_timeout_ms: 30_000,
			confirm_timeout_ms: 15_000,
			acknowledge: AcknowledgePolicy::Explicit,
		}
	}
}

impl SessionConfig {
	pub fn idle_timeout(&self) -> Duration {
		Duration::from_millis(self.idle_timeout_ms)
	}

	pub fn confirm_timeout(&self) -> Duration {
		Duration::from_millis(self.confirm_timeout_ms)
	}
}

#[cfg(test)]
mod tests {
	use rstest::rstest;

	use super::*;

	#[test]
	fn partial_overrides_keep_defaults() {
		let config = ViewerConfig::from_json(
			r#"{ "origin_node_id": "gate", "session": { "acknowledge": "any_input" } }"#,
		)
		.unwrap();

		assert_eq!(config.origin_node_id, "gate");
		assert_eq!(config.api_base_url, "http://localhost:5000");
		assert_eq!(config.session.acknowledge, AcknowledgePolicy::AnyInput);
		assert_eq!(config.session.idle_timeout(), Duration::from_secs(30));
		assert_eq!(config.session.confirm_timeout(), Duration::from_secs(15));
		assert_eq!(config.viewport, ViewportConfig::default());
	}

	#[rstest]
	#[case::inverted(r#"{ "viewport": { "min_zoom": 3.0, "max_zoom": 0.5 } }"#)]
	#[case::below_floor(r#"{ "viewport": { "min_zoom": 0.01 } }"#)]
	#[case::above_ceiling(r#"{ "viewport": { "max_zoom": 50.0 } }"#)]
	#[case::negative(r#"{ "viewport": { "min_zoom": -1.0, "max_zoom": -0.5 } }"#)]
	fn rejects_zoom_ranges_outside_the_fixed_bounds(#[case] json: &str) {
		assert!(matches!(
			ViewerConfig::from_json(json),
			Err(ConfigError::ZoomRange { .. })
		));
	}

	#[test]
	fn accepts_a_narrower_zoom_range() {
		let config =
			ViewerConfig::from_json(r#"{ "viewport": { "min_zoom": 1.0, "max_zoom": 2.0 } }"#)
				.unwrap();
		assert_eq!(config.viewport.max_zoom, 2.0);
	}

	#[test]
	fn rejects_negative_click_slop() {
		assert!(matches!(
			ViewerConfig::from_json(r#"{ "viewport": { "click_slop": -4 } }"#),
			Err(ConfigError::InvalidSetting { field: "click_slop", .. })
		));
	}

	#[test]
	fn rejects_unknown_policy() {
		assert!(ViewerConfig::from_json(r#"{ "session": { "acknowledge": "maybe" } }"#).is_err());
	}
}
