//! Campus map viewer: graph model, viewport math, scene composition, route
//! overlay and the idle-session lifecycle, plus the Leptos component tying
//! them to a canvas.

mod component;
pub mod compose;
mod render;
pub mod route;
pub mod session;
pub mod state;
mod timers;
pub mod types;
pub mod viewport;

pub use component::CampusMap;
pub use route::{Generation, RouteOverlay};
pub use session::{SessionMachine, SessionPhase};
pub use state::{ViewerSnapshot, ViewerState};
pub use types::{Axis, MapEdge, MapGraph, MapNode, Point, Selection, load_map_json};
pub use viewport::{ViewBox, Viewport, ViewportState};
