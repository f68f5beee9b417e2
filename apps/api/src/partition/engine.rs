//! Recursive partition layout: converts a validated tree into room rectangles.
//!
//! # Algorithm
//! - A leaf (final, or without children) becomes one `RoomRecord` covering its
//!   whole rectangle.
//! - A branch splits its rectangle among its children in list order, each child
//!   getting `child.area / sum(children.area)` of the width (vertical split) or
//!   height (horizontal split). Offsets are cumulative, so the children tile the
//!   parent exactly; areas are weights, never absolute dimensions.
//!
//! Traversal uses an explicit stack instead of call recursion, so tree depth
//! is bounded by `max_depth` rather than by the thread's stack size. Children
//! are pushed in reverse so rooms are emitted in the same order a depth-first
//! recursive walk would produce.

use thiserror::Error;
use tracing::debug;

use crate::partition::geometry::{Rectangle, RoomRecord};
use crate::partition::tree::{PartitionNode, SplitOrientation};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LayoutError {
    #[error("node '{path}' (depth {depth}) has children with total area {total}; cannot split")]
    ZeroTotalArea {
        path: String,
        depth: usize,
        total: f64,
    },

    #[error("node '{path}' (depth {depth}) has children whose areas do not sum to a finite number")]
    NonFiniteTotalArea { path: String, depth: usize },

    #[error("node '{path}' is deeper than the maximum layout depth of {max_depth}")]
    DepthExceeded { path: String, max_depth: usize },

    #[error("boundary rectangle {width}x{height} at ({x}, {y}) cannot be laid out")]
    InvalidBoundary {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
}

struct Frame<'a> {
    node: &'a PartitionNode,
    rect: Rectangle,
    depth: usize,
    path: String,
}

/// Lays out `root` inside `rect`, returning one room per leaf in traversal order.
pub fn layout(
    root: &PartitionNode,
    rect: Rectangle,
    max_depth: usize,
) -> Result<Vec<RoomRecord>, LayoutError> {
    if !rect.is_drawable() {
        return Err(LayoutError::InvalidBoundary {
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
        });
    }

    let mut rooms = Vec::new();
    let mut stack = vec![Frame {
        node: root,
        rect,
        depth: 0,
        path: root.name.clone(),
    }];

    while let Some(frame) = stack.pop() {
        if frame.depth > max_depth {
            return Err(LayoutError::DepthExceeded {
                path: frame.path,
                max_depth,
            });
        }

        let node = frame.node;
        if node.is_leaf() {
            rooms.push(RoomRecord {
                name: node.name.clone(),
                room_type: node.effective_type().to_string(),
                area: node.area,
                rectangle: frame.rect,
                angle: node.angle,
            });
            continue;
        }

        let child_rects = split_rectangle(node, frame.rect, &frame.path, frame.depth)?;
        for (child, child_rect) in node.children.iter().zip(child_rects).rev() {
            stack.push(Frame {
                node: child,
                rect: child_rect,
                depth: frame.depth + 1,
                path: format!("{}/{}", frame.path, child.name),
            });
        }
    }

    debug!(rooms = rooms.len(), root = %root.name, "Partition layout complete");
    Ok(rooms)
}

/// Divides `rect` among `node.children` in list order, proportionally to area.
fn split_rectangle(
    node: &PartitionNode,
    rect: Rectangle,
    path: &str,
    depth: usize,
) -> Result<Vec<Rectangle>, LayoutError> {
    let total: f64 = node.children.iter().map(|c| c.area).sum();
    if !total.is_finite() {
        return Err(LayoutError::NonFiniteTotalArea {
            path: path.to_string(),
            depth,
        });
    }
    if total <= 0.0 {
        return Err(LayoutError::ZeroTotalArea {
            path: path.to_string(),
            depth,
            total,
        });
    }

    let orientation = node.orientation();
    let mut offset = 0.0;

    Ok(node
        .children
        .iter()
        .map(|child| {
            let ratio = child.area / total;
            match orientation {
                SplitOrientation::Vertical => {
                    let width = rect.width * ratio;
                    let sub = Rectangle::new(rect.x + offset, rect.y, width, rect.height);
                    offset += width;
                    sub
                }
                SplitOrientation::Horizontal => {
                    let height = rect.height * ratio;
                    let sub = Rectangle::new(rect.x, rect.y + offset, rect.width, height);
                    offset += height;
                    sub
                }
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::{normalize_tree, PlanSettings, DEFAULT_MAX_DEPTH};
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use serde_json::json;
    use std::f64::consts::FRAC_PI_2;

    const EPS: f64 = 1e-9;

    fn leaf(name: &str, area: f64) -> PartitionNode {
        PartitionNode {
            name: name.to_string(),
            room_type: None,
            area,
            angle: 0.0,
            is_final: true,
            children: vec![],
        }
    }

    fn split(name: &str, angle: f64, children: Vec<PartitionNode>) -> PartitionNode {
        PartitionNode {
            name: name.to_string(),
            room_type: None,
            area: children.iter().map(|c| c.area).sum(),
            angle,
            is_final: false,
            children,
        }
    }

    fn assert_rect(actual: &Rectangle, x: f64, y: f64, width: f64, height: f64) {
        assert!(
            (actual.x - x).abs() < EPS
                && (actual.y - y).abs() < EPS
                && (actual.width - width).abs() < EPS
                && (actual.height - height).abs() < EPS,
            "expected ({x}, {y}, {width}, {height}), got {actual:?}"
        );
    }

    // ── basic splits ────────────────────────────────────────────────────────

    #[test]
    fn test_horizontal_split_stacks_children_by_height() {
        let tree = split("root", 0.0, vec![leaf("a", 12.0), leaf("b", 8.0)]);
        let rooms = layout(&tree, Rectangle::new(0.0, 0.0, 20.0, 10.0), DEFAULT_MAX_DEPTH).unwrap();

        assert_eq!(rooms.len(), 2);
        assert_rect(&rooms[0].rectangle, 0.0, 0.0, 20.0, 6.0);
        assert_rect(&rooms[1].rectangle, 0.0, 6.0, 20.0, 4.0);
        assert_eq!(rooms[0].name, "a");
        assert_eq!(rooms[0].area, 12.0);
    }

    #[test]
    fn test_vertical_split_places_children_left_to_right() {
        let tree = split("root", FRAC_PI_2, vec![leaf("a", 1.0), leaf("b", 3.0)]);
        let rooms = layout(&tree, Rectangle::new(10.0, 5.0, 8.0, 2.0), DEFAULT_MAX_DEPTH).unwrap();

        assert_rect(&rooms[0].rectangle, 10.0, 5.0, 2.0, 2.0);
        assert_rect(&rooms[1].rectangle, 12.0, 5.0, 6.0, 2.0);
    }

    #[test]
    fn test_nested_tree_emits_rooms_in_traversal_order() {
        let tree = split(
            "root",
            FRAC_PI_2,
            vec![
                split("left", 0.0, vec![leaf("living", 30.0), leaf("kitchen", 10.0)]),
                leaf("bedroom", 40.0),
            ],
        );
        let rooms = layout(&tree, Rectangle::new(0.0, 0.0, 10.0, 8.0), DEFAULT_MAX_DEPTH).unwrap();

        let names: Vec<&str> = rooms.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["living", "kitchen", "bedroom"]);
        assert_rect(&rooms[0].rectangle, 0.0, 0.0, 5.0, 6.0);
        assert_rect(&rooms[1].rectangle, 0.0, 6.0, 5.0, 2.0);
        assert_rect(&rooms[2].rectangle, 5.0, 0.0, 5.0, 8.0);
    }

    #[test]
    fn test_leaf_root_covers_whole_boundary() {
        let rect = Rectangle::new(1.0, 2.0, 3.0, 4.0);
        let rooms = layout(&leaf("studio", 12.0), rect, DEFAULT_MAX_DEPTH).unwrap();
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0].rectangle, rect);
    }

    #[test]
    fn test_empty_non_final_node_is_laid_out_as_leaf() {
        let mut node = leaf("den", 5.0);
        node.is_final = false;
        let tree = split("root", 0.0, vec![node, leaf("hall", 5.0)]);
        let rooms = layout(&tree, Rectangle::new(0.0, 0.0, 4.0, 4.0), DEFAULT_MAX_DEPTH).unwrap();
        assert_eq!(rooms.len(), 2);
        assert_eq!(rooms[0].name, "den");
    }

    #[test]
    fn test_final_node_children_are_ignored() {
        let mut node = split("suite", 0.0, vec![leaf("x", 1.0), leaf("y", 1.0)]);
        node.is_final = true;
        let rooms = layout(&node, Rectangle::new(0.0, 0.0, 2.0, 2.0), DEFAULT_MAX_DEPTH).unwrap();
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0].name, "suite");
    }

    #[test]
    fn test_room_type_and_angle_carried_from_leaf() {
        let mut bed = leaf("bed1", 1.0);
        bed.room_type = Some("bedroom".to_string());
        bed.angle = FRAC_PI_2;
        let rooms = layout(&bed, Rectangle::new(0.0, 0.0, 1.0, 1.0), DEFAULT_MAX_DEPTH).unwrap();
        assert_eq!(rooms[0].room_type, "bedroom");
        assert_eq!(rooms[0].angle, FRAC_PI_2);
    }

    // ── defaults flow through ───────────────────────────────────────────────

    #[test]
    fn test_default_area_drives_ratio() {
        let tree = normalize_tree(
            &json!({"split": {"name": "root", "angle": 0, "children": [
                {"name": "a", "final": true},
                {"name": "b", "area": 300, "final": true}
            ]}}),
            &PlanSettings::default(),
        )
        .unwrap();
        let rooms = layout(&tree, Rectangle::new(0.0, 0.0, 10.0, 8.0), DEFAULT_MAX_DEPTH).unwrap();
        assert_rect(&rooms[0].rectangle, 0.0, 0.0, 10.0, 2.0);
        assert_rect(&rooms[1].rectangle, 0.0, 2.0, 10.0, 6.0);
    }

    // ── tiling invariant ────────────────────────────────────────────────────

    fn random_tree(rng: &mut StdRng, depth: usize) -> PartitionNode {
        if depth == 0 || rng.gen_bool(0.25) {
            return leaf(&format!("r{}", rng.gen_range(0..1000)), rng.gen_range(0.5..50.5));
        }
        let count = rng.gen_range(1..=4);
        let children = (0..count).map(|_| random_tree(rng, depth - 1)).collect();
        let angle = if rng.gen_bool(0.5) { FRAC_PI_2 } else { 0.0 };
        let mut node = split("n", angle, children);
        // Declared parent area is unrelated to the children.
        node.area = rng.gen_range(0.0..1000.0);
        node
    }

    #[test]
    fn test_leaf_areas_sum_to_boundary_area() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let tree = random_tree(&mut rng, 5);
            let rect = Rectangle::new(
                rng.gen_range(-50.0..50.0),
                rng.gen_range(-50.0..50.0),
                rng.gen_range(1.0..81.0),
                rng.gen_range(1.0..81.0),
            );
            let rooms = layout(&tree, rect, DEFAULT_MAX_DEPTH).unwrap();
            let sum: f64 = rooms.iter().map(|r| r.rectangle.area()).sum();
            assert!(
                (sum - rect.area()).abs() < 1e-6 * rect.area(),
                "sum {sum} != {}",
                rect.area()
            );
            for room in &rooms {
                let r = room.rectangle;
                assert!(r.x >= rect.x - EPS && r.y >= rect.y - EPS);
                assert!(r.x + r.width <= rect.x + rect.width + 1e-6);
                assert!(r.y + r.height <= rect.y + rect.height + 1e-6);
            }
        }
    }

    #[test]
    fn test_layout_is_deterministic() {
        let mut rng = StdRng::seed_from_u64(7);
        let tree = random_tree(&mut rng, 4);
        let rect = Rectangle::new(0.0, 0.0, 30.0, 20.0);
        assert_eq!(
            layout(&tree, rect, DEFAULT_MAX_DEPTH).unwrap(),
            layout(&tree, rect, DEFAULT_MAX_DEPTH).unwrap()
        );
    }

    // ── failures ────────────────────────────────────────────────────────────

    #[test]
    fn test_zero_total_area_is_layout_error() {
        let mut wing = split("wing", 0.0, vec![leaf("a", 0.0), leaf("b", 0.0)]);
        wing.area = 5.0;
        let tree = split("root", 0.0, vec![wing, leaf("c", 5.0)]);
        let err = layout(&tree, Rectangle::new(0.0, 0.0, 1.0, 1.0), DEFAULT_MAX_DEPTH).unwrap_err();
        assert_eq!(
            err,
            LayoutError::ZeroTotalArea {
                path: "root/wing".to_string(),
                depth: 1,
                total: 0.0
            }
        );
    }

    #[test]
    fn test_overflowing_total_area_is_not_reported_as_zero() {
        let tree = split("root", 0.0, vec![leaf("a", 1e308), leaf("b", 1e308)]);
        let err = layout(&tree, Rectangle::new(0.0, 0.0, 1.0, 1.0), DEFAULT_MAX_DEPTH).unwrap_err();
        assert_eq!(
            err,
            LayoutError::NonFiniteTotalArea {
                path: "root".to_string(),
                depth: 0
            }
        );
        assert!(!err.to_string().contains("inf"));
    }

    #[test]
    fn test_depth_past_limit_fails_closed() {
        let mut node = leaf("deep", 1.0);
        for i in 0..10 {
            node = split(&format!("n{i}"), 0.0, vec![node]);
        }
        let err = layout(&node, Rectangle::new(0.0, 0.0, 1.0, 1.0), 4).unwrap_err();
        assert!(matches!(err, LayoutError::DepthExceeded { max_depth: 4, .. }));
        assert!(layout(&node, Rectangle::new(0.0, 0.0, 1.0, 1.0), 10).is_ok());
    }

    #[test]
    fn test_degenerate_boundary_is_rejected() {
        let err = layout(&leaf("a", 1.0), Rectangle::new(0.0, 0.0, 0.0, 5.0), DEFAULT_MAX_DEPTH)
            .unwrap_err();
        assert!(matches!(err, LayoutError::InvalidBoundary { .. }));
    }
}
