//! Error taxonomy for the viewer.
//!
//! Stale responses are not errors: they surface as `Stale` outcomes from the
//! route and map loaders. Timer races are logged and recovered inside the
//! session machine and never reach this module.

use thiserror::Error;

use crate::components::campus_map::Axis;

/// The first offending item found while validating a map payload.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum MalformedMapData {
	#[error("map data is not a valid map description: {0}")]
	Syntax(String),
	#[error("node `{node}` has a missing or non-finite {axis} coordinate")]
	InvalidCoordinate { node: String, axis: Axis },
	#[error("node keyed `{key}` declares a different id `{id}`")]
	IdMismatch { key: String, id: String },
	#[error("edge #{index} ({from} -> {to}) references unknown node `{missing}`")]
	DanglingEdge {
		index: usize,
		from: String,
		to: String,
		missing: String,
	},
}

#[derive(Clone, Debug, PartialEq, Error)]
pub enum LoadError {
	#[error("malformed map data: {0}")]
	MalformedMapData(#[from] MalformedMapData),
}

/// Host configuration that cannot drive a viewer.
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("viewer config is not valid JSON: {0}")]
	Syntax(#[from] serde_json::Error),
	#[error("zoom range {min}..={max} must lie within {floor}..={ceil} with min <= max")]
	ZoomRange {
		min: f64,
		max: f64,
		floor: f64,
		ceil: f64,
	},
	#[error("`{field}` must be a finite, non-negative number, got {value}")]
	InvalidSetting { field: &'static str, value: f64 },
}

/// Failures at the boundary to the campus backend.
#[derive(Debug, Error)]
pub enum ServiceError {
	#[error("request failed: {0}")]
	Request(#[from] gloo_net::Error),
	#[error("backend answered with HTTP {0}")]
	Status(u16),
	#[error("failed to decode response: {0}")]
	Decode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ViewerError {
	#[error(transparent)]
	MapLoad(#[from] LoadError),
	#[error("map data request failed: {0}")]
	MapFetchFailed(#[source] ServiceError),
	#[error("route request failed: {0}")]
	RouteRequestFailed(#[source] ServiceError),
	#[error("schedule request failed: {0}")]
	ScheduleFetchFailed(#[source] ServiceError),
}
