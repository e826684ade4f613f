//! Requests to the campus backend: map data, routes and student schedules.

use gloo_net::http::Request;
use serde::Deserialize;

use crate::components::campus_map::Point;
use crate::error::ServiceError;

/// Everything the viewer needs from the outside world.
///
/// The viewer runs on a single thread, so the returned futures are not `Send`.
#[allow(async_fn_in_trait)]
pub trait CampusApi {
	/// Raw `/map-data` body; validation happens in the graph loader.
	async fn fetch_map_data(&self) -> Result<String, ServiceError>;

	/// Points from `origin` to `destination`; empty when no route exists.
	async fn fetch_route(&self, origin: &str, destination: &str) -> Result<Vec<Point>, ServiceError>;

	async fn fetch_schedule(&self, student_id: &str) -> Result<StudentSchedule, ServiceError>;
}

#[derive(Clone, Debug, Default, Deserialize)]
struct RouteResponse {
	#[serde(default)]
	path: Option<Vec<RoutePoint>>,
}

#[derive(Clone, Debug, Deserialize)]
struct RoutePoint {
	x: f64,
	y: f64,
}

pub fn parse_route_response(body: &str) -> Result<Vec<Point>, ServiceError> {
	let response: RouteResponse = serde_json::from_str(body)?;
	Ok(response
		.path
		.unwrap_or_default()
		.into_iter()
		.map(|p| Point::new(p.x, p.y))
		.collect())
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct ScheduleEntry {
	#[serde(default, rename = "disciplina")]
	pub subject: String,
	#[serde(default, rename = "dia_semana")]
	pub weekday: Option<String>,
	#[serde(default, rename = "data")]
	pub date: Option<String>,
	#[serde(default, rename = "horário")]
	pub time: String,
	#[serde(default, rename = "sala")]
	pub room: String,
	/// Map node of the room.
	#[serde(default, rename = "sala_id")]
	pub room_id: String,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct StudentSchedule {
	#[serde(default, rename = "matrícula")]
	pub student_id: String,
	#[serde(default, rename = "nome")]
	pub name: String,
	#[serde(default, rename = "aulas_da_semana")]
	pub entries: Vec<ScheduleEntry>,
}

impl StudentSchedule {
	/// Topbar greeting; `None` until the backend has named the student.
	pub fn greeting(&self) -> Option<String> {
		let name = self.name.trim();
		if name.is_empty() {
			return None;
		}
		Some(match self.student_id.trim() {
			"" => format!("Hello, {name}"),
			id => format!("Hello, {name} ({id})"),
		})
	}
}

pub fn parse_schedule(body: &str) -> Result<StudentSchedule, ServiceError> {
	Ok(serde_json::from_str(body)?)
}

/// [`CampusApi`] over the browser `fetch` API.
#[derive(Clone, Debug)]
pub struct HttpCampusApi {
	base_url: String,
}

impl HttpCampusApi {
	pub fn new(base_url: &str) -> Self {
		Self {
			base_url: base_url.trim_end_matches('/').to_owned(),
		}
	}

	pub fn url(&self, path: &str) -> String {
		format!("{}{path}", self.base_url)
	}

	async fn get_text(&self, path: &str) -> Result<String, ServiceError> {
		let response = Request::get(&self.url(path)).send().await?;
		if !response.ok() {
			return Err(ServiceError::Status(response.status()));
		}
		Ok(response.text().await?)
	}
}

impl CampusApi for HttpCampusApi {
	async fn fetch_map_data(&self) -> Result<String, ServiceError> {
		self.get_text("/map-data").await
	}

	async fn fetch_route(&self, origin: &str, destination: &str) -> Result<Vec<Point>, ServiceError> {
		let path = format!(
			"/route?origin={}&dest={}",
			encode(origin),
			encode(destination)
		);
		parse_route_response(&self.get_text(&path).await?)
	}

	async fn fetch_schedule(&self, student_id: &str) -> Result<StudentSchedule, ServiceError> {
		parse_schedule(&self.get_text(&format!("/classes/{}", encode(student_id))).await?)
	}
}

fn encode(component: &str) -> String {
	js_sys::encode_uri_component(component).into()
}


#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn route_response_yields_points_in_order() {
		let body = r#"{ "path": [
			{ "id": "n1", "x": 0, "y": 0, "name": "Gate" },
			{ "id": "n4", "x": 120.5, "y": -3, "name": "Lab" }
		] }"#;
		assert_eq!(parse_route_response(body).unwrap(), [
			Point::new(0.0, 0.0),
			Point::new(120.5, -3.0),
		]);
	}

	#[test]
	fn missing_or_empty_path_means_no_route() {
		assert!(parse_route_response(r#"{ "path": [] }"#).unwrap().is_empty());
		assert!(parse_route_response(r#"{}"#).unwrap().is_empty());
		assert!(parse_route_response(r#"{ "path": null }"#).unwrap().is_empty());
	}

	#[test]
	fn garbage_route_body_is_a_decode_error() {
		assert!(matches!(
			parse_route_response("<html>"),
			Err(ServiceError::Decode(_))
		));
	}

	#[test]
	fn greeting_needs_a_name() {
		let mut schedule = StudentSchedule::default();
		assert_eq!(schedule.greeting(), None);
		schedule.name = "Ana".into();
		assert_eq!(schedule.greeting().as_deref(), Some("Hello, Ana"));
		schedule.student_id = "2024001".into();
		assert_eq!(schedule.greeting().as_deref(), Some("Hello, Ana (2024001)"));
	}

	#[test]
	fn schedule_uses_backend_field_names() {
		let body = r#"{
			"matrícula": "2024001",
			"nome": "Ana",
			"aulas_da_semana": [
				{ "disciplina": "Cálculo I", "dia_semana": "Segunda", "horário": "08:00",
				  "sala": "Bloco A - 101", "sala_id": "n5" }
			]
		}"#;
		let schedule = parse_schedule(body).unwrap();
		assert_eq!(schedule.student_id, "2024001");
		assert_eq!(schedule.name, "Ana");
		assert_eq!(schedule.entries, [ScheduleEntry {
			subject: "Cálculo I".into(),
			weekday: Some("Segunda".into()),
			date: None,
			time: "08:00".into(),
			room: "Bloco A - 101".into(),
			room_id: "n5".into(),
		}]);
	}

	#[test]
	fn base_url_trailing_slash_is_ignored() {
		let api = HttpCampusApi::new("http://campus.local:5000/");
		assert_eq!(api.url("/map-data"), "http://campus.local:5000/map-data");
	}
}
