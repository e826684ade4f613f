//! Pan/zoom state and the mapping between canvas pixels and map coordinates.
//!
//! The scene is first fitted into the canvas (uniform scale, centred, like an
//! SVG `viewBox`), then `translate(pan) scale(zoom)` is applied about the
//! canvas centre so zooming keeps the middle of the view fixed.

use log::warn;

use super::types::{MapNode, Point};
use crate::config::ViewportConfig;

/// Logical rectangle covering the scene.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewBox {
	pub x: f64,
	pub y: f64,
	pub width: f64,
	pub height: f64,
}

impl ViewBox {
	/// Fallback for an empty graph.
	pub const UNIT: ViewBox = ViewBox {
		x: 0.0,
		y: 0.0,
		width: 1.0,
		height: 1.0,
	};

	pub fn center(&self) -> Point {
		Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
	}
}

/// Node bounds expanded by `margin` on every side.
pub fn compute_view_box<'a>(nodes: impl IntoIterator<Item = &'a MapNode>, margin: f64) -> ViewBox {
	let mut bounds: Option<(Point, Point)> = None;
	for node in nodes {
		let p = node.position;
		bounds = Some(match bounds {
			None => (p, p),
			Some((lo, hi)) => (
				Point::new(lo.x.min(p.x), lo.y.min(p.y)),
				Point::new(hi.x.max(p.x), hi.y.max(p.y)),
			),
		});
	}
	let Some((lo, hi)) = bounds else {
		return ViewBox::UNIT;
	};
	let width = hi.x - lo.x + 2.0 * margin;
	let height = hi.y - lo.y + 2.0 * margin;
	if !(width.is_finite() && height.is_finite()) {
		warn!("node bounds overflow, using the unit view box");
		return ViewBox::UNIT;
	}
	if width <= 0.0 || height <= 0.0 {
		return ViewBox { x: lo.x, y: lo.y, ..ViewBox::UNIT };
	}
	ViewBox {
		x: lo.x - margin,
		y: lo.y - margin,
		width,
		height,
	}
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewportState {
	pub zoom: f64,
	/// Screen-space offset.
	pub pan: Point,
	pub is_panning: bool,
}

impl Default for ViewportState {
	fn default() -> Self {
		Self {
			zoom: 1.0,
			pan: Point::ORIGIN,
			is_panning: false,
		}
	}
}

/// `screen = logical * scale + offset`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewTransform {
	pub scale: f64,
	pub offset: Point,
}

impl ViewTransform {
	pub fn apply(&self, p: Point) -> Point {
		Point::new(p.x * self.scale + self.offset.x, p.y * self.scale + self.offset.y)
	}

	pub fn invert(&self, s: Point) -> Point {
		Point::new((s.x - self.offset.x) / self.scale, (s.y - self.offset.y) / self.scale)
	}
}

#[derive(Clone, Debug)]
pub struct Viewport {
	config: ViewportConfig,
	state: ViewportState,
	grab: Point,
	width: f64,
	height: f64,
}

impl Viewport {
	/// An out-of-range config is replaced by the defaults.
	pub fn new(config: ViewportConfig, width: f64, height: f64) -> Self {
		let config = match config.validate() {
			Ok(()) => config,
			Err(err) => {
				warn!("{err}; using default viewport settings");
				ViewportConfig::default()
			}
		};
		Self {
			config,
			state: ViewportState::default(),
			grab: Point::ORIGIN,
			width,
			height,
		}
	}

	pub fn state(&self) -> ViewportState {
		self.state
	}

	pub fn zoom(&self) -> f64 {
		self.state.zoom
	}

	pub fn is_panning(&self) -> bool {
		self.state.is_panning
	}

	pub fn config(&self) -> &ViewportConfig {
		&self.config
	}

	pub fn size(&self) -> (f64, f64) {
		(self.width, self.height)
	}

	pub fn resize(&mut self, width: f64, height: f64) {
		if width.is_finite() && height.is_finite() {
			self.width = width;
			self.height = height;
		}
	}

	pub fn on_wheel(&mut self, delta_y: f64) {
		if !delta_y.is_finite() {
			return;
		}
		let zoom = self.state.zoom - delta_y * self.config.wheel_sensitivity;
		self.state.zoom = zoom.clamp(self.config.min_zoom, self.config.max_zoom);
	}

	pub fn on_pointer_down(&mut self, screen: Point) {
		if self.state.is_panning || !screen.is_finite() {
			return;
		}
		self.state.is_panning = true;
		self.grab = screen - self.state.pan;
	}

	pub fn on_pointer_move(&mut self, screen: Point) {
		if self.state.is_panning && screen.is_finite() {
			self.state.pan = screen - self.grab;
		}
	}

	pub fn on_pointer_up(&mut self) {
		self.state.is_panning = false;
	}

	/// Leaving the canvas mid-drag must end the pan.
	pub fn on_pointer_leave(&mut self) {
		self.state.is_panning = false;
	}

	pub fn compute_view_box<'a>(&self, nodes: impl IntoIterator<Item = &'a MapNode>) -> ViewBox {
		compute_view_box(nodes, self.config.view_margin)
	}

	/// Fit-to-canvas, then pan, then zoom about the canvas centre.
	pub fn current_transform(&self, view_box: &ViewBox) -> ViewTransform {
		let fit = (self.width / view_box.width).min(self.height / view_box.height);
		let fit = if fit.is_finite() && fit > 0.0 { fit } else { 1.0 };
		let scale = fit * self.state.zoom;
		let canvas_center = Point::new(self.width / 2.0, self.height / 2.0);
		let box_center = view_box.center();
		ViewTransform {
			scale,
			offset: Point::new(
				canvas_center.x + self.state.pan.x - scale * box_center.x,
				canvas_center.y + self.state.pan.y - scale * box_center.y,
			),
		}
	}

	pub fn screen_to_map(&self, view_box: &ViewBox, screen: Point) -> Point {
		self.current_transform(view_box).invert(screen)
	}
}

#[cfg(test)]
mod tests {
	use proptest::prelude::*;
	use rstest::rstest;

	use super::*;

	fn node(id: &str, x: f64, y: f64) -> MapNode {
		MapNode {
			id: id.into(),
			name: String::new(),
			position: Point::new(x, y),
		}
	}

	fn viewport() -> Viewport {
		Viewport::new(ViewportConfig::default(), 800.0, 600.0)
	}

	#[rstest]
	#[case::pair(vec![node("a", 0.0, 0.0), node("b", 100.0, 100.0)], ViewBox { x: -50.0, y: -50.0, width: 200.0, height: 200.0 })]
	#[case::single(vec![node("a", 10.0, 20.0)], ViewBox { x: -40.0, y: -30.0, width: 100.0, height: 100.0 })]
	#[case::empty(vec![], ViewBox::UNIT)]
	fn view_box_covers_nodes_with_margin(#[case] nodes: Vec<MapNode>, #[case] expected: ViewBox) {
		assert_eq!(viewport().compute_view_box(&nodes), expected);
	}

	#[test]
	fn zero_margin_single_node_falls_back_to_unit_size() {
		let nodes = [node("a", 5.0, 5.0)];
		let vb = compute_view_box(&nodes, 0.0);
		assert_eq!((vb.width, vb.height), (1.0, 1.0));
		let t = Viewport::new(ViewportConfig::default(), 800.0, 600.0).current_transform(&vb);
		assert!(t.scale.is_finite() && t.offset.is_finite());
	}

	#[test]
	fn overflowing_bounds_keep_the_transform_finite() {
		let nodes = [node("w", -1e308, 0.0), node("e", 1e308, 0.0)];
		let vb = compute_view_box(&nodes, 50.0);
		assert_eq!(vb, ViewBox::UNIT);
		let t = viewport().current_transform(&vb);
		assert!(t.scale.is_finite() && t.scale > 0.0);
		assert!(t.offset.is_finite());
	}

	#[rstest]
	#[case::inverted(3.0, 0.5)]
	#[case::too_wide(0.01, 50.0)]
	fn invalid_zoom_bounds_fall_back_to_defaults(#[case] min_zoom: f64, #[case] max_zoom: f64) {
		let config = ViewportConfig {
			min_zoom,
			max_zoom,
			..ViewportConfig::default()
		};
		let mut vp = Viewport::new(config, 800.0, 600.0);
		vp.on_wheel(-20_000.0);
		assert_eq!(vp.zoom(), 3.0);
		vp.on_wheel(20_000.0);
		assert_eq!(vp.zoom(), 0.5);
	}

	#[test]
	fn wheel_zooms_in_and_out() {
		let mut vp = viewport();
		vp.on_wheel(-100.0);
		assert!((vp.zoom() - 1.1).abs() < 1e-9);
		vp.on_wheel(200.0);
		assert!((vp.zoom() - 0.9).abs() < 1e-9);
		vp.on_wheel(f64::NAN);
		assert!((vp.zoom() - 0.9).abs() < 1e-9);
	}

	#[test]
	fn pointer_leave_ends_panning() {
		let mut vp = viewport();
		vp.on_pointer_down(Point::new(10.0, 10.0));
		vp.on_pointer_move(Point::new(30.0, 15.0));
		vp.on_pointer_leave();
		assert!(!vp.is_panning());
		vp.on_pointer_move(Point::new(300.0, 300.0));
		assert_eq!(vp.state().pan, Point::new(20.0, 5.0));
	}

	#[test]
	fn invalid_pointer_coordinates_are_ignored() {
		let mut vp = viewport();
		vp.on_pointer_down(Point::new(f64::NAN, 1.0));
		assert!(!vp.is_panning());
		vp.on_pointer_down(Point::new(0.0, 0.0));
		vp.on_pointer_move(Point::new(5.0, f64::INFINITY));
		assert_eq!(vp.state().pan, Point::ORIGIN);
	}

	#[test]
	fn zoom_is_centred_on_the_canvas() {
		let mut vp = viewport();
		let vb = ViewBox { x: -50.0, y: -50.0, width: 200.0, height: 200.0 };
		let center = Point::new(400.0, 300.0);
		assert_eq!(vp.current_transform(&vb).apply(vb.center()), center);

		vp.on_wheel(-1500.0);
		let t = vp.current_transform(&vb);
		assert!(t.apply(vb.center()).distance(center) < 1e-9);
		// fit is min(800 / 200, 600 / 200) = 3, zoom 2.5
		assert!((t.scale - 7.5).abs() < 1e-9);
	}

	#[test]
	fn pan_translates_in_screen_space() {
		let mut vp = viewport();
		let vb = ViewBox { x: 0.0, y: 0.0, width: 100.0, height: 100.0 };
		let before = vp.current_transform(&vb).apply(Point::new(25.0, 75.0));
		vp.on_wheel(-500.0);
		vp.on_pointer_down(Point::new(100.0, 100.0));
		vp.on_pointer_move(Point::new(140.0, 70.0));
		vp.on_pointer_up();

		let t = vp.current_transform(&vb);
		let zoomed_only = {
			let mut reference = viewport();
			reference.on_wheel(-500.0);
			reference.current_transform(&vb).apply(Point::new(25.0, 75.0))
		};
		let shifted = t.apply(Point::new(25.0, 75.0));
		assert!(shifted.distance(zoomed_only + Point::new(40.0, -30.0)) < 1e-9);
		assert_ne!(before, zoomed_only);
		let logical = vp.screen_to_map(&vb, t.apply(Point::new(25.0, 75.0)));
		assert!(logical.distance(Point::new(25.0, 75.0)) < 1e-9);
	}

	proptest! {
		#[test]
		fn zoom_stays_clamped(deltas in proptest::collection::vec(-5_000.0f64..5_000.0, 1..64)) {
			let mut vp = viewport();
			for delta in deltas {
				vp.on_wheel(delta);
				prop_assert!((0.5..=3.0).contains(&vp.zoom()));
			}
		}

		#[test]
		fn pan_depends_only_on_press_and_last_move(
			prior in (-500.0f64..500.0, -500.0f64..500.0),
			press in (-500.0f64..500.0, -500.0f64..500.0),
			path in proptest::collection::vec((-1_000.0f64..1_000.0, -1_000.0f64..1_000.0), 0..16),
			last in (-1_000.0f64..1_000.0, -1_000.0f64..1_000.0),
		) {
			let mut vp = viewport();
			vp.on_pointer_down(Point::ORIGIN);
			vp.on_pointer_move(Point::new(prior.0, prior.1));
			vp.on_pointer_up();
			let prior_pan = vp.state().pan;

			let (p, q) = (Point::new(press.0, press.1), Point::new(last.0, last.1));
			vp.on_pointer_down(p);
			for (x, y) in path {
				vp.on_pointer_move(Point::new(x, y));
			}
			vp.on_pointer_move(q);

			let expected = prior_pan + (q - p);
			prop_assert!(vp.state().pan.distance(expected) < 1e-6);
		}
	}
}
