use std::cell::RefCell;

use log::{debug, error, info, warn};

use super::compose::{LayerList, compose};
use super::route::{Generation, GenerationCounter, RouteOverlay};
use super::session::SessionPhase;
use super::types::{MapGraph, Point, Selection, load_map_json};
use super::viewport::{ViewBox, ViewTransform, Viewport, ViewportState};
use crate::api::{CampusApi, StudentSchedule};
use crate::config::ViewportConfig;
use crate::error::{ServiceError, ViewerError};

/// Logical distance within which a click lands on a node.
pub const HIT_RADIUS: f64 = 14.0;

/// What the host can observe about a viewer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ViewerSnapshot {
	pub viewport: ViewportState,
	pub selection: Selection,
	pub route: Vec<Point>,
	/// Node the displayed route leads to.
	pub route_destination: Option<String>,
	pub phase: SessionPhase,
}

#[derive(Debug)]
pub enum MapOutcome {
	Loaded {
		nodes: usize,
		edges: usize,
		selection_retained: bool,
	},
	/// Superseded by a newer load or by teardown.
	Stale,
	Failed(ViewerError),
}

#[derive(Clone, Copy, Debug)]
struct Press {
	at: Point,
	travelled: f64,
}

pub struct ViewerState {
	pub viewport: Viewport,
	pub selection: Selection,
	graph: Option<MapGraph>,
	view_box: ViewBox,
	map_generation: GenerationCounter,
	press: Option<Press>,
	dirty: bool,
}

impl ViewerState {
	pub fn new(config: ViewportConfig, width: f64, height: f64) -> Self {
		Self {
			viewport: Viewport::new(config, width, height),
			selection: Selection::default(),
			graph: None,
			view_box: ViewBox::UNIT,
			map_generation: GenerationCounter::default(),
			press: None,
			dirty: true,
		}
	}

	pub fn graph(&self) -> Option<&MapGraph> {
		self.graph.as_ref()
	}

	pub fn transform(&self) -> ViewTransform {
		self.viewport.current_transform(&self.view_box)
	}

	pub fn mark_dirty(&mut self) {
		self.dirty = true;
	}

	/// Whether a repaint is due; clears the flag.
	pub fn take_dirty(&mut self) -> bool {
		std::mem::take(&mut self.dirty)
	}

	pub fn resize(&mut self, width: f64, height: f64) {
		self.viewport.resize(width, height);
		self.dirty = true;
	}

	pub fn begin_map_load(&mut self) -> Generation {
		self.map_generation.issue()
	}

	pub fn finish_map_load(
		&mut self,
		generation: Generation,
		body: Result<String, ServiceError>,
	) -> MapOutcome {
		if !self.map_generation.is_current(generation) {
			debug!("discarding map data response {}", generation.get());
			return MapOutcome::Stale;
		}
		let loaded = body
			.map_err(ViewerError::MapFetchFailed)
			.and_then(|body| load_map_json(&body).map_err(ViewerError::from));
		self.dirty = true;
		match loaded {
			Ok(graph) => {
				let selection_retained = self.selection.retain_in(&graph);
				if !selection_retained {
					info!("selected node vanished from refreshed map");
				}
				let outcome = MapOutcome::Loaded {
					nodes: graph.node_count(),
					edges: graph.edges().len(),
					selection_retained,
				};
				self.view_box = self.viewport.compute_view_box(graph.nodes());
				self.graph = Some(graph);
				info!("map loaded: {outcome:?}");
				outcome
			}
			Err(err) => {
				error!("map load failed: {err}");
				self.graph = None;
				self.view_box = ViewBox::UNIT;
				self.selection = Selection::default();
				MapOutcome::Failed(err)
			}
		}
	}

	/// Ignore every response still in flight.
	pub fn invalidate(&mut self) {
		self.map_generation.invalidate();
		self.press = None;
		self.viewport.on_pointer_leave();
	}

	pub fn screen_to_map(&self, screen: Point) -> Point {
		self.viewport.screen_to_map(&self.view_box, screen)
	}

	/// Closest node within [`HIT_RADIUS`] of a canvas point.
	pub fn node_at_position(&self, screen: Point) -> Option<&str> {
		let graph = self.graph.as_ref()?;
		let target = self.screen_to_map(screen);
		graph
			.nodes()
			.map(|node| (node, node.position.distance(target)))
			.filter(|(_, distance)| *distance <= HIT_RADIUS)
			.min_by(|a, b| a.1.total_cmp(&b.1))
			.map(|(node, _)| node.id.as_str())
	}

	pub fn set_hover(&mut self, id: Option<String>) {
		if self.selection.hovered_node_id != id {
			self.selection.hovered_node_id = id;
			self.dirty = true;
		}
	}

	/// Select a node of the current graph. Unknown ids leave the selection alone.
	pub fn select(&mut self, id: &str) -> bool {
		if !self.graph.as_ref().is_some_and(|graph| graph.contains(id)) {
			warn!("cannot select unknown node `{id}`");
			return false;
		}
		self.selection.selected_node_id = Some(id.to_owned());
		self.dirty = true;
		true
	}

	pub fn pointer_down(&mut self, screen: Point) {
		if !screen.is_finite() {
			return;
		}
		self.press = Some(Press {
			at: screen,
			travelled: 0.0,
		});
		self.viewport.on_pointer_down(screen);
	}

	pub fn pointer_move(&mut self, screen: Point) {
		if !screen.is_finite() {
			return;
		}
		if let Some(press) = &mut self.press {
			press.travelled = press.travelled.max(press.at.distance(screen));
		}
		if self.viewport.is_panning() {
			self.viewport.on_pointer_move(screen);
			self.dirty = true;
		} else {
			let hovered = self.node_at_position(screen).map(str::to_owned);
			self.set_hover(hovered);
		}
	}

	/// Ends a pan. A press that stayed within the click slop selects the node
	/// under the pointer, whose id is returned.
	pub fn pointer_up(&mut self, screen: Point) -> Option<String> {
		self.viewport.on_pointer_up();
		let press = self.press.take()?;
		if !screen.is_finite() || press.travelled > self.viewport.config().click_slop {
			return None;
		}
		let id = self.node_at_position(screen)?.to_owned();
		self.select(&id).then_some(id)
	}

	pub fn pointer_leave(&mut self) {
		self.press = None;
		self.viewport.on_pointer_leave();
		self.set_hover(None);
	}

	pub fn wheel(&mut self, delta_y: f64) {
		let before = self.viewport.zoom();
		self.viewport.on_wheel(delta_y);
		if self.viewport.zoom() != before {
			self.dirty = true;
		}
	}

	pub fn layers(&self, route: &RouteOverlay) -> Option<LayerList> {
		let graph = self.graph.as_ref()?;
		Some(compose(graph, &self.viewport, &self.selection, route))
	}

	pub fn snapshot(&self, route: &RouteOverlay, phase: SessionPhase) -> ViewerSnapshot {
		ViewerSnapshot {
			viewport: self.viewport.state(),
			selection: self.selection.clone(),
			route: route.path().to_vec(),
			route_destination: route.destination().map(str::to_owned),
			phase,
		}
	}
}

/// Fetch and install map data, unless a newer load starts meanwhile.
pub async fn load_map_data<A: CampusApi>(state: &RefCell<ViewerState>, api: &A) -> MapOutcome {
	let generation = state.borrow_mut().begin_map_load();
	let body = api.fetch_map_data().await;
	state.borrow_mut().finish_map_load(generation, body)
}

/// A student's classes; failures degrade to an unnamed, empty schedule.
pub async fn load_schedule<A: CampusApi>(api: &A, student_id: &str) -> StudentSchedule {
	match api.fetch_schedule(student_id).await {
		Ok(schedule) => {
			if schedule.entries.is_empty() {
				warn!("no classes found for {student_id}");
			}
			schedule
		}
		Err(err) => {
			warn!("{}", ViewerError::ScheduleFetchFailed(err));
			StudentSchedule {
				student_id: student_id.to_owned(),
				..StudentSchedule::default()
			}
		}
	}
}
