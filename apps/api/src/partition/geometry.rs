//! Axis-aligned geometry shared by the boundary summarizer and the layout engine.

use serde::Serialize;

/// An axis-aligned rectangle in the boundary's coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rectangle {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rectangle {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// True when every coordinate is finite and both sides are strictly positive.
    pub fn is_drawable(&self) -> bool {
        [self.x, self.y, self.width, self.height]
            .iter()
            .all(|v| v.is_finite())
            && self.width > 0.0
            && self.height > 0.0
    }
}

/// One concrete room produced by the layout engine, one per leaf of the tree.
///
/// `area` is the declared (weight) area from the tree, not the area of
/// `rectangle`. The two only agree when the model's numbers were consistent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub room_type: String,
    pub area: f64,
    pub rectangle: Rectangle,
    pub angle: f64,
}
