//! Declarative scene description derived from viewer state.
//!
//! [`compose`] only reads its inputs and returns a fresh [`LayerList`] in
//! z-order; it is called after every state change.

use super::route::RouteOverlay;
use super::types::{MapGraph, Point, Selection};
use super::viewport::{ViewBox, Viewport};

pub const BACKGROUND_FILL: &str = "#f7fbff";
pub const EDGE_STROKE: &str = "#cbd5e1";
pub const EDGE_WIDTH: f64 = 6.0;
pub const ROUTE_STROKE: &str = "#00b894";
pub const ROUTE_WIDTH: f64 = 10.0;
pub const ROUTE_OPACITY: f64 = 0.9;
pub const NODE_RADIUS: f64 = 10.0;
pub const SELECTED_NODE_RADIUS: f64 = 14.0;
pub const NODE_FILL: &str = "#0984e3";
pub const SELECTED_NODE_FILL: &str = "#00b894";
pub const NODE_STROKE: &str = "#ffffff";
pub const NODE_STROKE_WIDTH: f64 = 2.0;
const LABEL_GAP: f64 = 4.0;

#[derive(Clone, Debug, PartialEq)]
pub struct Line {
	pub from: Point,
	pub to: Point,
	pub stroke: &'static str,
	pub width: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Polyline {
	pub points: Vec<Point>,
	pub stroke: &'static str,
	pub width: f64,
	pub opacity: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NodeMarker {
	pub id: String,
	pub center: Point,
	pub radius: f64,
	pub fill: &'static str,
	pub stroke: &'static str,
	pub stroke_width: f64,
	pub selected: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Label {
	pub text: String,
	pub anchor: Point,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Layer {
	Background { rect: ViewBox, fill: &'static str },
	Edge(Line),
	Route(Polyline),
	Node(NodeMarker),
	Label(Label),
}

#[derive(Clone, Debug, PartialEq)]
pub struct LayerList {
	pub view_box: ViewBox,
	pub layers: Vec<Layer>,
}

impl LayerList {
	pub fn iter(&self) -> impl Iterator<Item = &Layer> {
		self.layers.iter()
	}
}

/// Background, edges, route, nodes, then labels for the selected and hovered nodes.
pub fn compose(
	graph: &MapGraph,
	viewport: &Viewport,
	selection: &Selection,
	route: &RouteOverlay,
) -> LayerList {
	let view_box = viewport.compute_view_box(graph.nodes());
	let mut layers = Vec::with_capacity(2 + graph.edges().len() + 2 * graph.node_count());

	layers.push(Layer::Background {
		rect: view_box,
		fill: BACKGROUND_FILL,
	});

	layers.extend(graph.edge_endpoints().map(|(a, b)| {
		Layer::Edge(Line {
			from: a.position,
			to: b.position,
			stroke: EDGE_STROKE,
			width: EDGE_WIDTH,
		})
	}));

	if !route.path().is_empty() {
		layers.push(Layer::Route(Polyline {
			points: route.path().to_vec(),
			stroke: ROUTE_STROKE,
			width: ROUTE_WIDTH,
			opacity: ROUTE_OPACITY,
		}));
	}

	let mut labels = Vec::new();
	for node in graph.nodes() {
		let selected = selection.is_selected(&node.id);
		let radius = if selected { SELECTED_NODE_RADIUS } else { NODE_RADIUS };
		layers.push(Layer::Node(NodeMarker {
			id: node.id.clone(),
			center: node.position,
			radius,
			fill: if selected { SELECTED_NODE_FILL } else { NODE_FILL },
			stroke: NODE_STROKE,
			stroke_width: NODE_STROKE_WIDTH,
			selected,
		}));
		if selected || selection.is_hovered(&node.id) {
			labels.push(Layer::Label(Label {
				text: node.label().to_owned(),
				anchor: Point::new(
					node.position.x + radius + LABEL_GAP,
					node.position.y + LABEL_GAP,
				),
			}));
		}
	}
	layers.extend(labels);

	LayerList { view_box, layers }
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::components::campus_map::types::load_map_json;
	use crate::config::ViewportConfig;

	fn graph() -> MapGraph {
		load_map_json(
			r#"{
				"nodes": {
					"n1": { "name": "Gate", "x": 0, "y": 0 },
					"n2": { "name": "Library", "x": 100, "y": 100 },
					"n3": { "name": "Cafeteria", "x": 100, "y": 0 }
				},
				"edges": [ { "from": "n1", "to": "n2" }, { "from": "n2", "to": "n3" } ]
			}"#,
		)
		.unwrap()
	}

	fn viewport() -> Viewport {
		Viewport::new(ViewportConfig::default(), 800.0, 600.0)
	}

	fn rank(layer: &Layer) -> u8 {
		match layer {
			Layer::Background { .. } => 0,
			Layer::Edge(_) => 1,
			Layer::Route(_) => 2,
			Layer::Node(_) => 3,
			Layer::Label(_) => 4,
		}
	}

	fn routed(points: &[Point]) -> RouteOverlay {
		let mut route = RouteOverlay::default();
		let request = route.begin("n1", "n2");
		route.resolve(request.token, Ok(points.to_vec()));
		route
	}

	#[test]
	fn layers_are_in_z_order() {
		let route = routed(&[Point::new(0.0, 0.0), Point::new(100.0, 100.0)]);
		let selection = Selection {
			selected_node_id: Some("n2".into()),
			hovered_node_id: Some("n3".into()),
		};
		let list = compose(&graph(), &viewport(), &selection, &route);

		let ranks: Vec<u8> = list.iter().map(rank).collect();
		assert_eq!(ranks, [0, 1, 1, 2, 3, 3, 3, 4, 4]);
		assert_eq!(list.layers[0], Layer::Background {
			rect: ViewBox { x: -50.0, y: -50.0, width: 200.0, height: 200.0 },
			fill: BACKGROUND_FILL,
		});
	}

	#[test]
	fn edges_connect_endpoint_coordinates() {
		let list = compose(&graph(), &viewport(), &Selection::default(), &RouteOverlay::default());
		let edges: Vec<_> = list
			.iter()
			.filter_map(|layer| match layer {
				Layer::Edge(line) => Some((line.from, line.to)),
				_ => None,
			})
			.collect();
		assert_eq!(edges, [
			(Point::new(0.0, 0.0), Point::new(100.0, 100.0)),
			(Point::new(100.0, 100.0), Point::new(100.0, 0.0)),
		]);
	}

	#[test]
	fn only_selected_marker_is_highlighted() {
		let selection = Selection {
			selected_node_id: Some("n3".into()),
			hovered_node_id: None,
		};
		let list = compose(&graph(), &viewport(), &selection, &RouteOverlay::default());
		for layer in list.iter() {
			if let Layer::Node(marker) = layer {
				let expected = marker.id == "n3";
				assert_eq!(marker.selected, expected);
				assert_eq!(marker.radius > NODE_RADIUS, expected);
				assert_eq!(marker.fill == SELECTED_NODE_FILL, expected);
			}
		}
		let labels: Vec<_> = list
			.iter()
			.filter_map(|layer| match layer {
				Layer::Label(label) => Some(label.text.as_str()),
				_ => None,
			})
			.collect();
		assert_eq!(labels, ["Cafeteria"]);
	}

	#[test]
	fn empty_route_adds_no_overlay() {
		let route = routed(&[]);
		let list = compose(&graph(), &viewport(), &Selection::default(), &route);
		assert!(!list.iter().any(|layer| matches!(layer, Layer::Route(_))));
	}

	#[test]
	fn composing_is_repeatable_and_leaves_inputs_alone() {
		let (graph, viewport) = (graph(), viewport());
		let selection = Selection {
			selected_node_id: Some("n1".into()),
			hovered_node_id: None,
		};
		let route = routed(&[Point::new(0.0, 0.0), Point::new(100.0, 0.0)]);
		let (graph_before, selection_before, path_before) =
			(graph.clone(), selection.clone(), route.path().to_vec());

		let first = compose(&graph, &viewport, &selection, &route);
		let second = compose(&graph, &viewport, &selection, &route);

		assert_eq!(first, second);
		assert_eq!(graph, graph_before);
		assert_eq!(selection, selection_before);
		assert_eq!(route.path(), path_before.as_slice());
	}

	#[test]
	fn empty_graph_yields_only_background() {
		let list = compose(
			&MapGraph::default(),
			&viewport(),
			&Selection::default(),
			&RouteOverlay::default(),
		);
		assert_eq!(list.layers, [Layer::Background {
			rect: ViewBox::UNIT,
			fill: BACKGROUND_FILL,
		}]);
	}
}
