//! Boundary summarizer: reduces the input shapes to the metrics the prompt
//! needs, and to the root rectangle the layout engine fills.

use serde::{Deserialize, Serialize};

use crate::partition::Rectangle;

fn default_shape_type() -> String {
    "rectangle".to_string()
}

/// One rectangle of the overall boundary, as sent by the drawing client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundaryShape {
    #[serde(rename = "type", default = "default_shape_type")]
    pub shape_type: String,
    #[serde(default, alias = "widthInUnits")]
    pub width: f64,
    #[serde(default, alias = "heightInUnits")]
    pub height: f64,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShapePosition {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShapeSummary {
    #[serde(rename = "type")]
    pub shape_type: String,
    pub width: f64,
    pub height: f64,
    pub area: f64,
    pub position: ShapePosition,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundarySummary {
    pub total_area: f64,
    pub shapes_count: usize,
    pub shapes: Vec<ShapeSummary>,
}

pub fn summarize_boundary(shapes: &[BoundaryShape]) -> BoundarySummary {
    let shapes: Vec<ShapeSummary> = shapes
        .iter()
        .map(|s| ShapeSummary {
            shape_type: s.shape_type.clone(),
            width: s.width,
            height: s.height,
            area: s.width * s.height,
            position: ShapePosition { x: s.x, y: s.y },
        })
        .collect();

    BoundarySummary {
        total_area: shapes.iter().map(|s| s.area).sum(),
        shapes_count: shapes.len(),
        shapes,
    }
}

/// Axis-aligned bounding box of every shape with positive width and height.
/// `None` when there is no such shape.
pub fn bounding_rectangle(shapes: &[BoundaryShape]) -> Option<Rectangle> {
    shapes
        .iter()
        .filter(|s| Rectangle::new(s.x, s.y, s.width, s.height).is_drawable())
        .map(|s| (s.x, s.y, s.x + s.width, s.y + s.height))
        .reduce(|(ax0, ay0, ax1, ay1), (bx0, by0, bx1, by1)| {
            (ax0.min(bx0), ay0.min(by0), ax1.max(bx1), ay1.max(by1))
        })
        .map(|(x0, y0, x1, y1)| Rectangle::new(x0, y0, x1 - x0, y1 - y0))
}
