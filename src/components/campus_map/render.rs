use std::f64::consts::PI;

use web_sys::CanvasRenderingContext2d;

use super::compose::{Label, Layer, LayerList, Line, NodeMarker, Polyline};
use super::viewport::{ViewBox, ViewTransform};

const CANVAS_FILL: &str = "#dcdcdc";
const LABEL_FILL: &str = "#1e293b";
const LABEL_HALO: &str = "rgba(255, 255, 255, 0.85)";
const LABEL_PX: f64 = 13.0;

/// Paint a composed scene. Line widths are logical, so they scale with zoom.
pub fn paint(
	layers: &LayerList,
	transform: &ViewTransform,
	width: f64,
	height: f64,
	ctx: &CanvasRenderingContext2d,
) {
	clear(ctx, width, height);
	ctx.save();
	let _ = ctx.set_transform(
		transform.scale,
		0.0,
		0.0,
		transform.scale,
		transform.offset.x,
		transform.offset.y,
	);
	for layer in layers.iter() {
		match layer {
			Layer::Background { rect, fill } => draw_background(ctx, rect, fill),
			Layer::Edge(line) => draw_line(ctx, line),
			Layer::Route(route) => draw_route(ctx, route),
			Layer::Node(marker) => draw_node(ctx, marker),
			Layer::Label(label) => draw_label(ctx, label, transform.scale),
		}
	}
	ctx.restore();
}

pub fn clear(ctx: &CanvasRenderingContext2d, width: f64, height: f64) {
	ctx.set_fill_style_str(CANVAS_FILL);
	ctx.fill_rect(0.0, 0.0, width, height);
}

fn draw_background(ctx: &CanvasRenderingContext2d, rect: &ViewBox, fill: &str) {
	ctx.set_fill_style_str(fill);
	ctx.fill_rect(rect.x, rect.y, rect.width, rect.height);
}

fn draw_line(ctx: &CanvasRenderingContext2d, line: &Line) {
	ctx.set_stroke_style_str(line.stroke);
	ctx.set_line_width(line.width);
	ctx.set_line_cap("round");
	ctx.begin_path();
	ctx.move_to(line.from.x, line.from.y);
	ctx.line_to(line.to.x, line.to.y);
	ctx.stroke();
}

fn draw_route(ctx: &CanvasRenderingContext2d, route: &Polyline) {
	let Some((first, rest)) = route.points.split_first() else {
		return;
	};
	ctx.set_global_alpha(route.opacity);
	ctx.set_stroke_style_str(route.stroke);
	ctx.set_line_width(route.width);
	ctx.set_line_cap("round");
	ctx.set_line_join("round");
	ctx.begin_path();
	ctx.move_to(first.x, first.y);
	for p in rest {
		ctx.line_to(p.x, p.y);
	}
	ctx.stroke();
	ctx.set_global_alpha(1.0);
}

fn draw_node(ctx: &CanvasRenderingContext2d, marker: &NodeMarker) {
	ctx.begin_path();
	let _ = ctx.arc(marker.center.x, marker.center.y, marker.radius, 0.0, 2.0 * PI);
	ctx.set_fill_style_str(marker.fill);
	ctx.fill();
	ctx.set_stroke_style_str(marker.stroke);
	ctx.set_line_width(marker.stroke_width);
	ctx.stroke();
}

// Labels keep a constant on-screen size regardless of zoom.
fn draw_label(ctx: &CanvasRenderingContext2d, label: &Label, scale: f64) {
	let px = LABEL_PX / scale.max(f64::EPSILON);
	ctx.set_font(&format!("600 {px}px sans-serif"));
	ctx.set_line_width(3.0 / scale.max(f64::EPSILON));
	ctx.set_line_join("round");
	ctx.set_stroke_style_str(LABEL_HALO);
	let _ = ctx.stroke_text(&label.text, label.anchor.x, label.anchor.y);
	ctx.set_fill_style_str(LABEL_FILL);
	let _ = ctx.fill_text(&label.text, label.anchor.x, label.anchor.y);
}
