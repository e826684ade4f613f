//! Browser glue for the session machine: `setTimeout`-backed timers and the
//! window-level activity listeners.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::time::Duration;

use log::warn;
use wasm_bindgen::prelude::*;
use web_sys::{Event, Window};

use super::session::{InputKind, SessionMachine, SessionSignal, TimerHost, TimerId, TimerKind};

pub type BrowserSession = SessionMachine<BrowserTimers>;
pub type SignalSink = Rc<dyn Fn(SessionSignal)>;

/// One persistent callback per timer kind; the timer id travels as the
/// `setTimeout` argument so no closure is created or freed per arming.
pub struct BrowserTimers {
	window: Option<Window>,
	idle_cb: Closure<dyn FnMut(JsValue)>,
	confirm_cb: Closure<dyn FnMut(JsValue)>,
	handles: HashMap<TimerKind, (TimerId, i32)>,
}

impl BrowserTimers {
	pub fn new(session: Weak<RefCell<BrowserSession>>, sink: SignalSink) -> Self {
		Self {
			window: web_sys::window(),
			idle_cb: fire_callback(TimerKind::Idle, session.clone(), sink.clone()),
			confirm_cb: fire_callback(TimerKind::Confirm, session, sink),
			handles: HashMap::new(),
		}
	}
}

fn fire_callback(
	kind: TimerKind,
	session: Weak<RefCell<BrowserSession>>,
	sink: SignalSink,
) -> Closure<dyn FnMut(JsValue)> {
	Closure::new(move |raw: JsValue| {
		let (Some(session), Some(raw)) = (session.upgrade(), raw.as_f64()) else {
			return;
		};
		let signal = match session.try_borrow_mut() {
			Ok(mut machine) => machine.on_timer_fired(kind, TimerId::from_raw(raw as u64)),
			Err(_) => {
				warn!("{kind:?} timer fired while the session was busy");
				None
			}
		};
		if let Some(signal) = signal {
			sink(signal);
		}
	})
}

impl TimerHost for BrowserTimers {
	fn arm(&mut self, kind: TimerKind, id: TimerId, delay: Duration) {
		let Some(window) = &self.window else {
			return;
		};
		let callback = match kind {
			TimerKind::Idle => &self.idle_cb,
			TimerKind::Confirm => &self.confirm_cb,
		};
		let delay = i32::try_from(delay.as_millis()).unwrap_or(i32::MAX);
		match window.set_timeout_with_callback_and_timeout_and_arguments_1(
			callback.as_ref().unchecked_ref(),
			delay,
			&JsValue::from_f64(id.get() as f64),
		) {
			Ok(handle) => {
				self.handles.insert(kind, (id, handle));
			}
			Err(err) => warn!("failed to arm {kind:?} timer: {err:?}"),
		}
	}

	fn cancel(&mut self, kind: TimerKind, id: TimerId) {
		if self.handles.get(&kind).is_some_and(|&(armed, _)| armed == id) {
			if let (Some(window), Some((_, handle))) = (&self.window, self.handles.remove(&kind)) {
				window.clear_timeout_with_handle(handle);
			}
		}
	}
}

impl Drop for BrowserTimers {
	fn drop(&mut self) {
		if let Some(window) = &self.window {
			for (_, handle) in self.handles.values() {
				window.clear_timeout_with_handle(*handle);
			}
		}
	}
}

const ACTIVITY_EVENTS: [(&str, InputKind); 4] = [
	("mousemove", InputKind::PointerMove),
	("keydown", InputKind::KeyPress),
	("click", InputKind::Click),
	("wheel", InputKind::Wheel),
];

/// Window listeners feeding the session machine. Removed on drop.
pub struct ActivitySubscription {
	window: Window,
	listeners: Vec<(&'static str, Closure<dyn FnMut(Event)>)>,
}

impl ActivitySubscription {
	pub fn attach(session: Weak<RefCell<BrowserSession>>, sink: SignalSink) -> Option<Self> {
		let window = web_sys::window()?;
		let mut listeners = Vec::with_capacity(ACTIVITY_EVENTS.len());
		for (event, input) in ACTIVITY_EVENTS {
			let (session, sink) = (session.clone(), sink.clone());
			let listener = Closure::<dyn FnMut(Event)>::new(move |_: Event| {
				let Some(session) = session.upgrade() else {
					return;
				};
				let signal = match session.try_borrow_mut() {
					Ok(mut machine) => machine.on_input(input),
					Err(_) => None,
				};
				if let Some(signal) = signal {
					sink(signal);
				}
			});
			if let Err(err) =
				window.add_event_listener_with_callback(event, listener.as_ref().unchecked_ref())
			{
				warn!("failed to listen for {event}: {err:?}");
				continue;
			}
			listeners.push((event, listener));
		}
		Some(Self { window, listeners })
	}
}

impl Drop for ActivitySubscription {
	fn drop(&mut self) {
		for (event, listener) in &self.listeners {
			let _ = self
				.window
				.remove_event_listener_with_callback(event, listener.as_ref().unchecked_ref());
		}
	}
}
