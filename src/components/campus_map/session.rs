//! Inactivity detection: `Active -> AwaitingConfirmation -> Exited`.
//!
//! The machine owns one slot per timer kind. Arming always cancels the slot's
//! previous timer first, and a fired timer is only honoured if its id still
//! occupies the slot, so at most one deadline per kind can ever act.

use std::time::Duration;

use log::{debug, info, trace, warn};

use crate::config::{AcknowledgePolicy, SessionConfig};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SessionPhase {
	#[default]
	Active,
	AwaitingConfirmation,
	Exited,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimerKind {
	Idle,
	Confirm,
}

/// Identifies one arming of a timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

impl TimerId {
	pub fn get(self) -> u64 {
		self.0
	}

	pub fn from_raw(raw: u64) -> Self {
		Self(raw)
	}
}

/// Deferred-execution backend. When an armed timer elapses the host calls
/// [`SessionMachine::on_timer_fired`] with the same kind and id.
pub trait TimerHost {
	fn arm(&mut self, kind: TimerKind, id: TimerId, delay: Duration);

	/// Must tolerate ids that already fired.
	fn cancel(&mut self, kind: TimerKind, id: TimerId);
}

/// Raw input that counts as user activity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputKind {
	PointerMove,
	KeyPress,
	Click,
	Wheel,
}

/// What the host must reflect after a transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionSignal {
	PromptShown,
	PromptDismissed,
	Exited,
}

pub struct SessionMachine<T: TimerHost> {
	config: SessionConfig,
	phase: SessionPhase,
	timers: T,
	idle: Option<TimerId>,
	confirm: Option<TimerId>,
	next_id: u64,
	on_exit: Option<Box<dyn FnOnce()>>,
}

impl<T: TimerHost> SessionMachine<T> {
	/// Start `Active` with the idle timer armed. `on_exit` runs at most once.
	pub fn new(config: SessionConfig, timers: T, on_exit: impl FnOnce() + 'static) -> Self {
		let mut machine = Self {
			config,
			phase: SessionPhase::Active,
			timers,
			idle: None,
			confirm: None,
			next_id: 0,
			on_exit: Some(Box::new(on_exit)),
		};
		machine.arm(TimerKind::Idle);
		debug!("session started");
		machine
	}

	pub fn phase(&self) -> SessionPhase {
		self.phase
	}

	pub fn timers(&self) -> &T {
		&self.timers
	}

	pub fn timers_mut(&mut self) -> &mut T {
		&mut self.timers
	}

	pub fn on_input(&mut self, input: InputKind) -> Option<SessionSignal> {
		match self.phase {
			SessionPhase::Active => {
				trace!("activity {input:?}, idle timer rearmed");
				self.arm(TimerKind::Idle);
				None
			}
			SessionPhase::AwaitingConfirmation => match self.config.acknowledge {
				AcknowledgePolicy::AnyInput => self.acknowledge(),
				AcknowledgePolicy::Explicit => {
					trace!("ignoring {input:?} while awaiting confirmation");
					None
				}
			},
			SessionPhase::Exited => None,
		}
	}

	/// The user answered the presence prompt.
	pub fn acknowledge(&mut self) -> Option<SessionSignal> {
		if self.phase != SessionPhase::AwaitingConfirmation {
			return None;
		}
		self.cancel(TimerKind::Confirm);
		self.arm(TimerKind::Idle);
		self.phase = SessionPhase::Active;
		info!("presence confirmed");
		Some(SessionSignal::PromptDismissed)
	}

	/// Leave immediately, from the prompt or a logout button.
	pub fn exit_now(&mut self) -> Option<SessionSignal> {
		if self.phase == SessionPhase::Exited {
			return None;
		}
		info!("session exit requested");
		Some(self.exit())
	}

	pub fn on_timer_fired(&mut self, kind: TimerKind, id: TimerId) -> Option<SessionSignal> {
		if self.phase == SessionPhase::Exited {
			warn!("timer {kind:?}#{} fired after session exit", id.get());
			return None;
		}
		if *self.slot(kind) != Some(id) {
			return self.recover_from_race(kind, id);
		}
		*self.slot(kind) = None;
		match (self.phase, kind) {
			(SessionPhase::Active, TimerKind::Idle) => {
				self.arm(TimerKind::Confirm);
				self.phase = SessionPhase::AwaitingConfirmation;
				info!("idle threshold reached, awaiting confirmation");
				Some(SessionSignal::PromptShown)
			}
			(SessionPhase::AwaitingConfirmation, TimerKind::Confirm) => {
				info!("no confirmation received");
				Some(self.exit())
			}
			_ => self.recover_from_race(kind, id),
		}
	}

	/// Cancel everything without running the exit callback. Used on teardown.
	pub fn shutdown(&mut self) {
		self.cancel_all();
		if self.phase != SessionPhase::Exited {
			debug!("session torn down");
		}
		self.phase = SessionPhase::Exited;
		self.on_exit = None;
	}

	fn exit(&mut self) -> SessionSignal {
		self.cancel_all();
		self.phase = SessionPhase::Exited;
		if let Some(on_exit) = self.on_exit.take() {
			on_exit();
		}
		SessionSignal::Exited
	}

	fn recover_from_race(&mut self, kind: TimerKind, id: TimerId) -> Option<SessionSignal> {
		warn!(
			"timer race detected: {kind:?}#{} fired in {:?}, resetting to active",
			id.get(),
			self.phase
		);
		let was_prompting = self.phase == SessionPhase::AwaitingConfirmation;
		self.cancel_all();
		self.phase = SessionPhase::Active;
		self.arm(TimerKind::Idle);
		was_prompting.then_some(SessionSignal::PromptDismissed)
	}

	fn slot(&mut self, kind: TimerKind) -> &mut Option<TimerId> {
		match kind {
			TimerKind::Idle => &mut self.idle,
			TimerKind::Confirm => &mut self.confirm,
		}
	}

	fn delay(&self, kind: TimerKind) -> Duration {
		match kind {
			TimerKind::Idle => self.config.idle_timeout(),
			TimerKind::Confirm => self.config.confirm_timeout(),
		}
	}

	fn arm(&mut self, kind: TimerKind) {
		self.cancel(kind);
		self.next_id += 1;
		let id = TimerId(self.next_id);
		let delay = self.delay(kind);
		*self.slot(kind) = Some(id);
		self.timers.arm(kind, id, delay);
	}

	fn cancel(&mut self, kind: TimerKind) {
		if let Some(id) = self.slot(kind).take() {
			self.timers.cancel(kind, id);
		}
	}

	fn cancel_all(&mut self) {
		self.cancel(TimerKind::Idle);
		self.cancel(TimerKind::Confirm);
	}
}

impl<T: TimerHost> Drop for SessionMachine<T> {
	fn drop(&mut self) {
		self.cancel_all();
	}
}
