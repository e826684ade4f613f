use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Add, Sub};

use serde::Deserialize;
use serde_json::Value;

use crate::error::{LoadError, MalformedMapData};

/// A 2D coordinate, logical or screen-space depending on context.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
	pub x: f64,
	pub y: f64,
}

impl Point {
	pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

	pub const fn new(x: f64, y: f64) -> Self {
		Self { x, y }
	}

	pub fn is_finite(&self) -> bool {
		self.x.is_finite() && self.y.is_finite()
	}

	pub fn distance(&self, other: Point) -> f64 {
		let (dx, dy) = (self.x - other.x, self.y - other.y);
		(dx * dx + dy * dy).sqrt()
	}
}

impl Add for Point {
	type Output = Point;

	fn add(self, rhs: Point) -> Point {
		Point::new(self.x + rhs.x, self.y + rhs.y)
	}
}

impl Sub for Point {
	type Output = Point;

	fn sub(self, rhs: Point) -> Point {
		Point::new(self.x - rhs.x, self.y - rhs.y)
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
	X,
	Y,
}

impl fmt::Display for Axis {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Axis::X => "x",
			Axis::Y => "y",
		})
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct MapNode {
	pub id: String,
	pub name: String,
	pub position: Point,
}

impl MapNode {
	/// Display text, falling back to the id for unnamed nodes.
	pub fn label(&self) -> &str {
		if self.name.is_empty() { &self.id } else { &self.name }
	}
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MapEdge {
	pub from: String,
	pub to: String,
}

/// Validated campus graph. Every edge endpoint resolves to a node.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MapGraph {
	nodes: BTreeMap<String, MapNode>,
	edges: Vec<MapEdge>,
}

impl MapGraph {
	pub fn node(&self, id: &str) -> Option<&MapNode> {
		self.nodes.get(id)
	}

	pub fn contains(&self, id: &str) -> bool {
		self.nodes.contains_key(id)
	}

	/// Nodes in ascending id order.
	pub fn nodes(&self) -> impl Iterator<Item = &MapNode> {
		self.nodes.values()
	}

	pub fn edges(&self) -> &[MapEdge] {
		&self.edges
	}

	pub fn edge_endpoints(&self) -> impl Iterator<Item = (&MapNode, &MapNode)> {
		self.edges
			.iter()
			.filter_map(|edge| Some((self.nodes.get(&edge.from)?, self.nodes.get(&edge.to)?)))
	}

	pub fn node_count(&self) -> usize {
		self.nodes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}
}

/// Untrusted `/map-data` payload before validation.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawMapData {
	#[serde(default)]
	pub nodes: BTreeMap<String, RawNode>,
	#[serde(default)]
	pub edges: Vec<RawEdge>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawNode {
	#[serde(default)]
	pub id: Option<String>,
	#[serde(default)]
	pub name: Option<String>,
	#[serde(default)]
	pub x: Value,
	#[serde(default)]
	pub y: Value,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RawEdge {
	pub from: String,
	pub to: String,
}

/// Parse and validate a JSON map description.
pub fn load_map_json(json: &str) -> Result<MapGraph, LoadError> {
	let raw: RawMapData = serde_json::from_str(json)
		.map_err(|err| MalformedMapData::Syntax(err.to_string()))?;
	load_map(raw)
}

/// Validate a raw payload into a [`MapGraph`].
///
/// Nodes are checked in ascending id order, then edges in sequence order; the
/// first offender is reported and no partial graph is produced.
pub fn load_map(raw: RawMapData) -> Result<MapGraph, LoadError> {
	let mut nodes = BTreeMap::new();
	for (key, node) in raw.nodes {
		if let Some(id) = node.id.as_deref() {
			if id != key {
				return Err(MalformedMapData::IdMismatch {
					key,
					id: id.to_owned(),
				}
				.into());
			}
		}
		let x = coordinate(&key, Axis::X, &node.x)?;
		let y = coordinate(&key, Axis::Y, &node.y)?;
		let name = node.name.unwrap_or_default();
		nodes.insert(key.clone(), MapNode {
			id: key,
			name,
			position: Point::new(x, y),
		});
	}

	let mut edges = Vec::with_capacity(raw.edges.len());
	for (index, edge) in raw.edges.into_iter().enumerate() {
		let missing = [&edge.from, &edge.to]
			.into_iter()
			.find(|id| !nodes.contains_key(id.as_str()))
			.cloned();
		if let Some(missing) = missing {
			return Err(MalformedMapData::DanglingEdge {
				index,
				from: edge.from,
				to: edge.to,
				missing,
			}
			.into());
		}
		edges.push(MapEdge {
			from: edge.from,
			to: edge.to,
		});
	}

	Ok(MapGraph { nodes, edges })
}

fn coordinate(node: &str, axis: Axis, value: &Value) -> Result<f64, MalformedMapData> {
	value
		.as_f64()
		.filter(|v| v.is_finite())
		.ok_or_else(|| MalformedMapData::InvalidCoordinate {
			node: node.to_owned(),
			axis,
		})
}

/// Selected and hovered nodes. Ids are plain references into the current graph.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Selection {
	pub selected_node_id: Option<String>,
	pub hovered_node_id: Option<String>,
}

impl Selection {
	pub fn is_selected(&self, id: &str) -> bool {
		self.selected_node_id.as_deref() == Some(id)
	}

	pub fn is_hovered(&self, id: &str) -> bool {
		self.hovered_node_id.as_deref() == Some(id)
	}

	/// Drop ids the graph no longer contains. Returns whether the selection survived.
	pub fn retain_in(&mut self, graph: &MapGraph) -> bool {
		if self.hovered_node_id.as_deref().is_some_and(|id| !graph.contains(id)) {
			self.hovered_node_id = None;
		}
		match self.selected_node_id.as_deref() {
			Some(id) if !graph.contains(id) => {
				self.selected_node_id = None;
				false
			}
			_ => true,
		}
	}
}

#[cfg(test)]
mod tests {
	use rstest::rstest;

	use super::*;

	const CAMPUS: &str = r#"{
		"nodes": {
			"n1": { "id": "n1", "name": "Main gate", "x": 0, "y": 0 },
			"n2": { "id": "n2", "name": "Library", "x": 100, "y": 40.5 },
			"n3": { "name": "", "x": 60, "y": 100 }
		},
		"edges": [
			{ "from": "n1", "to": "n2", "w": 3 },
			{ "from": "n2", "to": "n3" }
		]
	}"#;

	#[test]
	fn loads_nodes_and_edges() {
		let graph = load_map_json(CAMPUS).unwrap();

		assert_eq!(graph.node_count(), 3);
		assert_eq!(graph.edges().len(), 2);
		let library = graph.node("n2").unwrap();
		assert_eq!(library.label(), "Library");
		assert_eq!(library.position, Point::new(100.0, 40.5));
		assert_eq!(graph.node("n3").unwrap().label(), "n3");
		let ids: Vec<_> = graph.nodes().map(|n| n.id.as_str()).collect();
		assert_eq!(ids, ["n1", "n2", "n3"]);
		assert_eq!(graph.edge_endpoints().count(), 2);
	}

	#[test]
	fn empty_payload_is_an_empty_graph() {
		let graph = load_map_json("{}").unwrap();
		assert!(graph.is_empty());
		assert!(graph.edges().is_empty());
	}

	#[rstest]
	#[case::dangling_target(
		r#"{ "nodes": { "a": { "x": 0, "y": 0 } }, "edges": [ { "from": "a", "to": "ghost" } ] }"#,
		MalformedMapData::DanglingEdge { index: 0, from: "a".into(), to: "ghost".into(), missing: "ghost".into() }
	)]
	#[case::dangling_source_reported_first(
		r#"{ "nodes": { "a": { "x": 0, "y": 0 } },
		     "edges": [ { "from": "a", "to": "a" }, { "from": "x", "to": "y" } ] }"#,
		MalformedMapData::DanglingEdge { index: 1, from: "x".into(), to: "y".into(), missing: "x".into() }
	)]
	#[case::string_coordinate(
		r#"{ "nodes": { "a": { "x": "12", "y": 0 } } }"#,
		MalformedMapData::InvalidCoordinate { node: "a".into(), axis: Axis::X }
	)]
	#[case::missing_coordinate(
		r#"{ "nodes": { "a": { "x": 1 } } }"#,
		MalformedMapData::InvalidCoordinate { node: "a".into(), axis: Axis::Y }
	)]
	#[case::first_node_in_id_order(
		r#"{ "nodes": { "b": { "x": null, "y": 0 }, "a": { "x": 0, "y": null } } }"#,
		MalformedMapData::InvalidCoordinate { node: "a".into(), axis: Axis::Y }
	)]
	#[case::id_mismatch(
		r#"{ "nodes": { "a": { "id": "b", "x": 0, "y": 0 } } }"#,
		MalformedMapData::IdMismatch { key: "a".into(), id: "b".into() }
	)]
	fn rejects_malformed_maps(#[case] json: &str, #[case] expected: MalformedMapData) {
		assert_eq!(load_map_json(json), Err(LoadError::MalformedMapData(expected)));
	}

	#[test]
	fn rejects_invalid_json() {
		let err = load_map_json(r#"{ "nodes": [1, 2] }"#).unwrap_err();
		assert!(matches!(err, LoadError::MalformedMapData(MalformedMapData::Syntax(_))));
	}

	#[test]
	fn non_finite_coordinates_are_rejected() {
		let mut raw = RawMapData::default();
		raw.nodes.insert("a".into(), RawNode {
			x: Value::from(f64::NAN),
			y: Value::from(1.0),
			..RawNode::default()
		});
		assert_eq!(
			load_map(raw),
			Err(LoadError::MalformedMapData(MalformedMapData::InvalidCoordinate {
				node: "a".into(),
				axis: Axis::X,
			}))
		);
	}

	#[test]
	fn selection_survives_refresh_only_if_node_remains() {
		let graph = load_map_json(CAMPUS).unwrap();
		let smaller = load_map_json(r#"{ "nodes": { "n1": { "x": 0, "y": 0 } } }"#).unwrap();

		let mut selection = Selection {
			selected_node_id: Some("n1".into()),
			hovered_node_id: Some("n2".into()),
		};
		assert!(selection.retain_in(&graph));
		assert!(selection.retain_in(&smaller));
		assert!(selection.is_selected("n1"));
		assert_eq!(selection.hovered_node_id, None);

		selection.selected_node_id = Some("n3".into());
		assert!(!selection.retain_in(&smaller));
		assert_eq!(selection.selected_node_id, None);
	}
}
