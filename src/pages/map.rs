use leptos::prelude::*;
use leptos_router::hooks::use_query_map;
use log::{info, warn};

use crate::components::campus_map::{CampusMap, SessionPhase, ViewerSnapshot};
use crate::config::ViewerConfig;

/// Host settings embedded as `<script id="viewer-config" type="application/json">`.
fn page_config() -> ViewerConfig {
	let embedded = web_sys::window()
		.and_then(|w| w.document())
		.and_then(|d| d.get_element_by_id("viewer-config"))
		.and_then(|el| el.text_content());
	match embedded {
		None => ViewerConfig::default(),
		Some(json) => ViewerConfig::from_json(&json).unwrap_or_else(|err| {
			warn!("ignoring invalid viewer config: {err}");
			ViewerConfig::default()
		}),
	}
}

fn phase_label(phase: SessionPhase) -> &'static str {
	match phase {
		SessionPhase::Active => "active",
		SessionPhase::AwaitingConfirmation => "waiting for someone",
		SessionPhase::Exited => "ended",
	}
}

/// Kiosk host: a start screen, and the map while a session is running.
///
/// `?student=<id>` lists that student's classes next to the map.
#[component]
pub fn MapPage() -> impl IntoView {
	let query = use_query_map();
	let student_id = Signal::derive(move || {
		query
			.read()
			.get("student")
			.filter(|id| !id.trim().is_empty())
	});

	let config = page_config();
	let session_active = RwSignal::new(false);
	let reload = RwSignal::new(0u32);
	let snapshot = RwSignal::new(ViewerSnapshot::default());

	let on_logout = move |_: ()| {
		info!("session ended, back to the start screen");
		session_active.set(false);
	};
	let start = move |_| {
		snapshot.set(ViewerSnapshot::default());
		session_active.set(true);
	};

	view! {
		<Show
			when=move || session_active.get()
			fallback=move || {
				view! {
					<div class="start-screen">
						<h1>"Campus Map"</h1>
						<p>"Find your way to any room on campus."</p>
						<button class="btn primary" on:click=start>
							"Start"
						</button>
					</div>
				}
			}
		>
			<CampusMap
				config=config.clone()
				on_logout=on_logout
				reload=reload
				student_id=student_id
				snapshot=snapshot
			/>
			<footer class="status-bar">
				<span>
					{move || snapshot.with(|s| format!("Zoom {:.0}%", s.viewport.zoom * 100.0))}
				</span>
				<span>{move || snapshot.with(|s| format!("Session {}", phase_label(s.phase)))}</span>
				<span>
					{move || {
						snapshot.with(|s| s.route_destination.as_ref().map(|d| format!("Route to {d}")))
					}}
				</span>
				<button class="btn" on:click=move |_| reload.update(|n| *n += 1)>
					"Reload map"
				</button>
			</footer>
		</Show>
	}
}
