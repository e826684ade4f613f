use std::cell::RefCell;

use log::{debug, info, warn};

use super::types::Point;
use crate::api::CampusApi;
use crate::error::ServiceError;

/// Stamp carried by an asynchronous request. Only the newest one is honoured.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
	pub fn get(self) -> u64 {
		self.0
	}
}

#[derive(Clone, Debug, Default)]
pub struct GenerationCounter {
	current: u64,
}

impl GenerationCounter {
	pub fn issue(&mut self) -> Generation {
		self.current += 1;
		Generation(self.current)
	}

	pub fn current(&self) -> Generation {
		Generation(self.current)
	}

	pub fn is_current(&self, generation: Generation) -> bool {
		generation.0 == self.current
	}

	/// Make every stamp issued so far stale.
	pub fn invalidate(&mut self) {
		self.current += 1;
	}
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteRequest {
	pub token: Generation,
	pub origin: String,
	pub destination: String,
}

#[derive(Debug)]
pub enum RouteOutcome {
	/// The path was replaced; zero points means the backend found no route.
	Applied { points: usize },
	/// A newer request superseded this one.
	Stale,
	/// The previous path is kept.
	Failed(ServiceError),
}

#[derive(Clone, Debug, Default)]
pub struct RouteOverlay {
	tokens: GenerationCounter,
	path: Vec<Point>,
	destination: Option<String>,
	/// Destination of the newest request, adopted when its answer lands.
	pending: Option<String>,
}

impl RouteOverlay {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn path(&self) -> &[Point] {
		&self.path
	}

	/// Destination of the path currently displayed.
	pub fn destination(&self) -> Option<&str> {
		self.destination.as_deref()
	}

	pub fn begin(&mut self, origin: &str, destination: &str) -> RouteRequest {
		let token = self.tokens.issue();
		self.pending = Some(destination.to_owned());
		debug!("route request {} {origin} -> {destination}", token.get());
		RouteRequest {
			token,
			origin: origin.to_owned(),
			destination: destination.to_owned(),
		}
	}

	pub fn resolve(
		&mut self,
		token: Generation,
		result: Result<Vec<Point>, ServiceError>,
	) -> RouteOutcome {
		if !self.tokens.is_current(token) {
			debug!(
				"discarding route response {} (current {})",
				token.get(),
				self.tokens.current().get()
			);
			return RouteOutcome::Stale;
		}
		match result {
			Ok(path) => {
				let points = path.len();
				if points == 0 {
					info!("no route found");
				}
				self.path = path;
				self.destination = self.pending.clone();
				RouteOutcome::Applied { points }
			}
			Err(err) => {
				warn!("route request {} failed: {err}", token.get());
				RouteOutcome::Failed(err)
			}
		}
	}

	/// Drop interest in every outstanding request.
	pub fn invalidate(&mut self) {
		self.tokens.invalidate();
	}
}

/// Issue a route query and apply the answer if no newer request overtook it.
pub async fn request_route<A: CampusApi>(
	overlay: &RefCell<RouteOverlay>,
	api: &A,
	origin: &str,
	destination: &str,
) -> RouteOutcome {
	let request = overlay.borrow_mut().begin(origin, destination);
	let result = api.fetch_route(&request.origin, &request.destination).await;
	overlay.borrow_mut().resolve(request.token, result)
}
