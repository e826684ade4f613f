use std::cell::{Cell, RefCell};
use std::rc::Rc;

use leptos::prelude::*;
use log::{debug, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, MouseEvent, WheelEvent, Window};

use super::render;
use super::route::{GenerationCounter, RouteOutcome, RouteOverlay, request_route};
use super::session::{SessionPhase, SessionSignal};
use super::state::{MapOutcome, ViewerSnapshot, ViewerState, load_map_data, load_schedule};
use super::timers::{ActivitySubscription, BrowserSession, BrowserTimers, SignalSink};
use super::types::Point;
use crate::api::{HttpCampusApi, ScheduleEntry};
use crate::config::ViewerConfig;
use crate::error::ViewerError;

#[derive(Clone, Debug, PartialEq)]
struct SelectedNode {
	id: String,
	name: String,
}

#[derive(Clone, Copy)]
struct ViewerSignals {
	loading: RwSignal<bool>,
	map_error: RwSignal<Option<String>>,
	selected: RwSignal<Option<SelectedNode>>,
	route_notice: RwSignal<Option<String>>,
	schedule: RwSignal<Vec<ScheduleEntry>>,
	greeting: RwSignal<Option<String>>,
	prompt_visible: RwSignal<bool>,
	snapshot: Option<RwSignal<ViewerSnapshot>>,
}

/// Canvas resources that must be released with the viewer.
struct CanvasSurface {
	window: Window,
	resize_cb: Option<Closure<dyn FnMut()>>,
	frame_cb: Rc<RefCell<Option<Closure<dyn FnMut()>>>>,
	frame_id: Rc<Cell<Option<i32>>>,
}

impl Drop for CanvasSurface {
	fn drop(&mut self) {
		if let Some(id) = self.frame_id.take() {
			let _ = self.window.cancel_animation_frame(id);
		}
		self.frame_cb.borrow_mut().take();
		if let Some(cb) = &self.resize_cb {
			let _ = self
				.window
				.remove_event_listener_with_callback("resize", cb.as_ref().unchecked_ref());
		}
	}
}

/// Everything one mounted viewer owns. Dropping it tears the viewer down.
struct ViewerController {
	origin: String,
	api: Rc<HttpCampusApi>,
	state: Rc<RefCell<ViewerState>>,
	route: Rc<RefCell<RouteOverlay>>,
	schedule_requests: Rc<RefCell<GenerationCounter>>,
	session: Rc<RefCell<BrowserSession>>,
	sink: SignalSink,
	signals: ViewerSignals,
	_activity: Option<ActivitySubscription>,
	surface: RefCell<Option<CanvasSurface>>,
}

impl ViewerController {
	fn new(config: &ViewerConfig, signals: ViewerSignals, on_logout: Callback<()>) -> Self {
		let state = Rc::new(RefCell::new(ViewerState::new(
			config.viewport.clone(),
			800.0,
			600.0,
		)));

		let sink: SignalSink = {
			let state = state.clone();
			Rc::new(move |signal: SessionSignal| {
				signals
					.prompt_visible
					.set(signal == SessionSignal::PromptShown);
				if let Ok(mut state) = state.try_borrow_mut() {
					state.mark_dirty();
				}
			})
		};

		let session_config = config.session.clone();
		let session = Rc::new_cyclic(|weak| {
			RefCell::new(BrowserSession::new(
				session_config,
				BrowserTimers::new(weak.clone(), sink.clone()),
				move || on_logout.run(()),
			))
		});
		let activity = ActivitySubscription::attach(Rc::downgrade(&session), sink.clone());
		if activity.is_none() {
			warn!("no window to observe activity on; idle detection disabled");
		}

		Self {
			origin: config.origin_node_id.clone(),
			api: Rc::new(HttpCampusApi::new(&config.api_base_url)),
			state,
			route: Rc::new(RefCell::new(RouteOverlay::new())),
			schedule_requests: Rc::new(RefCell::new(GenerationCounter::default())),
			session,
			sink,
			signals,
			_activity: activity,
			surface: RefCell::new(None),
		}
	}

	fn mount(&self, canvas: HtmlCanvasElement, fullscreen: bool) {
		let Some(window) = web_sys::window() else {
			return;
		};
		let (w, h) = canvas_size(&window, &canvas, fullscreen);
		canvas.set_width(w as u32);
		canvas.set_height(h as u32);

		let ctx: CanvasRenderingContext2d = match canvas
			.get_context("2d")
			.ok()
			.flatten()
			.and_then(|ctx| ctx.dyn_into().ok())
		{
			Some(ctx) => ctx,
			None => {
				warn!("2d canvas context unavailable");
				return;
			}
		};
		self.state.borrow_mut().resize(w, h);

		let resize_cb = fullscreen.then(|| {
			let (state, canvas) = (self.state.clone(), canvas.clone());
			let cb = Closure::<dyn FnMut()>::new(move || {
				let Some(win) = web_sys::window() else {
					return;
				};
				let (nw, nh) = window_size(&win);
				canvas.set_width(nw as u32);
				canvas.set_height(nh as u32);
				state.borrow_mut().resize(nw, nh);
			});
			let _ = window.add_event_listener_with_callback("resize", cb.as_ref().unchecked_ref());
			cb
		});

		let frame_cb: Rc<RefCell<Option<Closure<dyn FnMut()>>>> = Rc::new(RefCell::new(None));
		let frame_id: Rc<Cell<Option<i32>>> = Rc::new(Cell::new(None));
		let (state, route, session, snapshot) = (
			self.state.clone(),
			self.route.clone(),
			self.session.clone(),
			self.signals.snapshot,
		);
		let (frame_inner, id_inner) = (frame_cb.clone(), frame_id.clone());
		*frame_cb.borrow_mut() = Some(Closure::new(move || {
			draw_frame(&state, &route, &session, snapshot, &ctx);
			if let Some(cb) = frame_inner.borrow().as_ref() {
				if let Some(win) = web_sys::window() {
					id_inner.set(win.request_animation_frame(cb.as_ref().unchecked_ref()).ok());
				}
			}
		}));
		if let Some(cb) = frame_cb.borrow().as_ref() {
			frame_id.set(window.request_animation_frame(cb.as_ref().unchecked_ref()).ok());
		}

		*self.surface.borrow_mut() = Some(CanvasSurface {
			window,
			resize_cb,
			frame_cb,
			frame_id,
		});
	}

	fn pointer_down(&self, p: Point) {
		self.state.borrow_mut().pointer_down(p);
	}

	fn pointer_move(&self, p: Point) {
		self.state.borrow_mut().pointer_move(p);
	}

	fn pointer_up(&self, p: Point) {
		let clicked = self.state.borrow_mut().pointer_up(p);
		if let Some(id) = clicked {
			sync_selected(&self.state, self.signals);
			self.route_to(id);
		}
	}

	fn pointer_leave(&self) {
		self.state.borrow_mut().pointer_leave();
	}

	fn wheel(&self, delta_y: f64) {
		self.state.borrow_mut().wheel(delta_y);
	}

	fn route_to(&self, destination: String) {
		let (route, state, api, origin, signals) = (
			self.route.clone(),
			self.state.clone(),
			self.api.clone(),
			self.origin.clone(),
			self.signals,
		);
		signals.route_notice.set(None);
		spawn_local(async move {
			match request_route(&route, api.as_ref(), &origin, &destination).await {
				RouteOutcome::Applied { points } => {
					state.borrow_mut().mark_dirty();
					if points == 0 {
						signals
							.route_notice
							.set(Some(format!("No route found to {destination}")));
					}
				}
				RouteOutcome::Stale => {}
				RouteOutcome::Failed(err) => {
					signals
						.route_notice
						.set(Some(ViewerError::RouteRequestFailed(err).to_string()));
				}
			}
		});
	}

	fn reload_map(&self, epoch: u32) {
		debug!("loading map data (reload {epoch})");
		let (state, api, signals) = (self.state.clone(), self.api.clone(), self.signals);
		signals.loading.set(true);
		spawn_local(async move {
			match load_map_data(&state, api.as_ref()).await {
				MapOutcome::Stale => return,
				MapOutcome::Loaded { .. } => signals.map_error.set(None),
				MapOutcome::Failed(err) => signals.map_error.set(Some(err.to_string())),
			}
			signals.loading.set(false);
			sync_selected(&state, signals);
		});
	}

	fn load_schedule_for(&self, student_id: Option<String>) {
		let generation = self.schedule_requests.borrow_mut().issue();
		let Some(student_id) = student_id else {
			self.signals.schedule.set(Vec::new());
			self.signals.greeting.set(None);
			return;
		};
		let (api, requests, signals) = (
			self.api.clone(),
			self.schedule_requests.clone(),
			self.signals,
		);
		spawn_local(async move {
			let loaded = load_schedule(api.as_ref(), &student_id).await;
			if requests.borrow().is_current(generation) {
				signals.greeting.set(loaded.greeting());
				signals.schedule.set(loaded.entries);
			}
		});
	}

	fn select_from_schedule(&self, entry: &ScheduleEntry) {
		if self.state.borrow_mut().select(&entry.room_id) {
			sync_selected(&self.state, self.signals);
		}
		self.route_to(entry.room_id.clone());
	}

	fn acknowledge(&self) {
		let signal = self.session.borrow_mut().acknowledge();
		if let Some(signal) = signal {
			(self.sink)(signal);
		}
	}

	fn exit_now(&self) {
		let signal = self.session.borrow_mut().exit_now();
		if let Some(signal) = signal {
			(self.sink)(signal);
		}
	}
}

impl Drop for ViewerController {
	fn drop(&mut self) {
		if let Ok(mut state) = self.state.try_borrow_mut() {
			state.invalidate();
		}
		if let Ok(mut route) = self.route.try_borrow_mut() {
			route.invalidate();
		}
		self.schedule_requests.borrow_mut().invalidate();
		if let Ok(mut session) = self.session.try_borrow_mut() {
			session.shutdown();
		}
		debug!("campus map viewer torn down");
	}
}

fn draw_frame(
	state: &RefCell<ViewerState>,
	route: &RefCell<RouteOverlay>,
	session: &RefCell<BrowserSession>,
	snapshot: Option<RwSignal<ViewerSnapshot>>,
	ctx: &CanvasRenderingContext2d,
) {
	let (Ok(mut state), Ok(route)) = (state.try_borrow_mut(), route.try_borrow()) else {
		return;
	};
	if !state.take_dirty() {
		return;
	}
	let (width, height) = state.viewport.size();
	match state.layers(&route) {
		Some(layers) => render::paint(&layers, &state.transform(), width, height, ctx),
		None => render::clear(ctx, width, height),
	}
	if let Some(snapshot) = snapshot {
		let phase = session
			.try_borrow()
			.map(|session| session.phase())
			.unwrap_or(SessionPhase::Active);
		snapshot.set(state.snapshot(&route, phase));
	}
}

fn sync_selected(state: &RefCell<ViewerState>, signals: ViewerSignals) {
	let selected = state.try_borrow().ok().and_then(|state| {
		let id = state.selection.selected_node_id.as_deref()?;
		let node = state.graph()?.node(id)?;
		Some(SelectedNode {
			id: node.id.clone(),
			name: node.label().to_owned(),
		})
	});
	signals.selected.set(selected);
}

fn window_size(window: &Window) -> (f64, f64) {
	let dim = |value: Result<JsValue, JsValue>, fallback: f64| {
		value.ok().and_then(|v| v.as_f64()).unwrap_or(fallback)
	};
	(dim(window.inner_width(), 800.0), dim(window.inner_height(), 600.0))
}

fn canvas_size(window: &Window, canvas: &HtmlCanvasElement, fullscreen: bool) -> (f64, f64) {
	if fullscreen {
		return window_size(window);
	}
	canvas
		.parent_element()
		.map(|p| (p.client_width() as f64, p.client_height() as f64))
		.unwrap_or((800.0, 600.0))
}

fn event_point(canvas_ref: NodeRef<leptos::html::Canvas>, ev: &MouseEvent) -> Option<Point> {
	let canvas: HtmlCanvasElement = canvas_ref.get_untracked()?.into();
	let rect = canvas.get_bounding_client_rect();
	Some(Point::new(
		ev.client_x() as f64 - rect.left(),
		ev.client_y() as f64 - rect.top(),
	))
}

/// Interactive campus map with route overlay and idle-session handling.
#[component]
pub fn CampusMap(
	#[prop(optional)] config: ViewerConfig,
	/// Runs once when the session ends, by timeout or on request.
	#[prop(into)]
	on_logout: Callback<()>,
	/// Changing this value re-fetches the map data.
	#[prop(into, default = Signal::stored(0))]
	reload: Signal<u32>,
	/// Student whose classes are listed for quick routing.
	#[prop(into, default = Signal::stored(None))]
	student_id: Signal<Option<String>>,
	/// Receives viewport, selection, route and session phase after each repaint.
	#[prop(optional)]
	snapshot: Option<RwSignal<ViewerSnapshot>>,
	#[prop(default = true)] fullscreen: bool,
) -> impl IntoView {
	let canvas_ref = NodeRef::<leptos::html::Canvas>::new();
	let signals = ViewerSignals {
		loading: RwSignal::new(true),
		map_error: RwSignal::new(None),
		selected: RwSignal::new(None),
		route_notice: RwSignal::new(None),
		schedule: RwSignal::new(Vec::new()),
		greeting: RwSignal::new(None),
		prompt_visible: RwSignal::new(false),
		snapshot,
	};
	let confirm_secs = config.session.confirm_timeout().as_secs();
	let controller = StoredValue::new_local(ViewerController::new(&config, signals, on_logout));

	Effect::new(move |_| {
		let Some(canvas) = canvas_ref.get() else {
			return;
		};
		let canvas: HtmlCanvasElement = canvas.into();
		controller.with_value(|c| c.mount(canvas, fullscreen));
	});

	Effect::new(move |_| {
		let epoch = reload.get();
		controller.with_value(|c| c.reload_map(epoch));
	});

	Effect::new(move |_| {
		let student = student_id.get();
		controller.with_value(|c| c.load_schedule_for(student));
	});

	let on_mousedown = move |ev: MouseEvent| {
		if let Some(p) = event_point(canvas_ref, &ev) {
			controller.with_value(|c| c.pointer_down(p));
		}
	};
	let on_mousemove = move |ev: MouseEvent| {
		if let Some(p) = event_point(canvas_ref, &ev) {
			controller.with_value(|c| c.pointer_move(p));
		}
	};
	let on_mouseup = move |ev: MouseEvent| {
		if let Some(p) = event_point(canvas_ref, &ev) {
			controller.with_value(|c| c.pointer_up(p));
		}
	};
	let on_mouseleave = move |_: MouseEvent| {
		controller.with_value(|c| c.pointer_leave());
	};
	let on_wheel = move |ev: WheelEvent| {
		ev.prevent_default();
		controller.with_value(|c| c.wheel(ev.delta_y()));
	};

	view! {
		<div class="map-container">
			<canvas
				node_ref=canvas_ref
				class="campus-map-canvas"
				on:mousedown=on_mousedown
				on:mousemove=on_mousemove
				on:mouseup=on_mouseup
				on:mouseleave=on_mouseleave
				on:wheel=on_wheel
				style="display: block; cursor: grab;"
			/>

			{move || signals.loading.get().then(|| view! { <div class="loading">"Loading map..."</div> })}

			{move || {
				signals
					.map_error
					.get()
					.map(|err| {
						view! {
							<div class="map-error" role="alert">
								<h3>"The map could not be loaded"</h3>
								<p>{err}</p>
							</div>
						}
					})
			}}

			<header class="topbar">
				{move || signals.greeting.get().map(|greeting| view! { <span class="greeting">{greeting}</span> })}
				<button class="logout-btn" on:click=move |_| controller.with_value(|c| c.exit_now())>
					"Log out"
				</button>
			</header>

			<aside class="info-panel">
				<h3>"Information"</h3>
				{move || match signals.selected.get() {
					Some(node) => {
						let id = node.id.clone();
						view! {
							<div>
								<b>{node.name}</b>
							</div>
							<div>"ID: " {node.id}</div>
							<button
								class="btn primary"
								on:click=move |_| controller.with_value(|c| c.route_to(id.clone()))
							>
								"Route here"
							</button>
						}
							.into_any()
					}
					None => view! { <div>"Click a point on the map"</div> }.into_any(),
				}}
				{move || {
					signals
						.route_notice
						.get()
						.map(|notice| view! { <div class="route-notice">{notice}</div> })
				}}
			</aside>

			{move || {
				let entries = signals.schedule.get();
				(!entries.is_empty())
					.then(|| {
						view! {
							<section class="schedule-panel">
								<h3>"This week's classes"</h3>
								<ul>
									{entries
										.into_iter()
										.map(|entry| schedule_item(entry, controller))
										.collect_view()}
								</ul>
							</section>
						}
					})
			}}

			{move || {
				signals
					.prompt_visible
					.get()
					.then(|| {
						view! {
							<div class="presence-popup">
								<div class="presence-box">
									<h3>"Are you still there?"</h3>
									<p>
										{format!(
											"Returning to the start screen in {confirm_secs} seconds unless someone answers.",
										)}
									</p>
									<div class="presence-buttons">
										<button
											class="btn stay"
											on:click=move |_| controller.with_value(|c| c.acknowledge())
										>
											"I'm here"
										</button>
										<button
											class="btn exit"
											on:click=move |_| controller.with_value(|c| c.exit_now())
										>
											"Exit now"
										</button>
									</div>
								</div>
							</div>
						}
					})
			}}
		</div>
	}
}

fn schedule_item(
	entry: ScheduleEntry,
	controller: StoredValue<ViewerController, LocalStorage>,
) -> impl IntoView {
	let title = format!("Show the way to {}", entry.room);
	let (subject, weekday, time, room) = (
		entry.subject.clone(),
		entry.weekday.clone().or_else(|| entry.date.clone()).unwrap_or_default(),
		entry.time.clone(),
		entry.room.clone(),
	);
	view! {
		<li
			class="schedule-item"
			title=title
			on:click=move |_| controller.with_value(|c| c.select_from_schedule(&entry))
		>
			<div class="aula-header">
				<strong>{subject}</strong>
				<span class="dia">{weekday}</span>
			</div>
			<div class="aula-body">
				<span>{time}</span>
				" - "
				<b>{room}</b>
			</div>
		</li>
	}
}
