//! Partition tree validation: turns the model's JSON into an immutable, fully
//! defaulted `PartitionNode` tree.
//!
//! The incoming `serde_json::Value` is only read. Defaults (missing child area,
//! missing angle, missing `final`) are applied to the copy, never to the input.
//!
//! Area consistency between a parent and its children is NOT checked or
//! rebalanced: areas are relative weights for the layout engine, and a parent
//! whose declared area differs from the sum of its children is accepted as-is.

use serde::Serialize;
use serde_json::{Map, Value};
use std::f64::consts::FRAC_PI_2;
use thiserror::Error;

use crate::partition::{PlanSettings, VERTICAL_ANGLE_TOLERANCE};

/// Name given to nodes that omit `name`.
const UNNAMED: &str = "Unnamed";

/// Which axis a node's children are laid out along.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitOrientation {
    /// Children sit side by side, splitting the width.
    Vertical,
    /// Children are stacked, splitting the height.
    Horizontal,
}

impl SplitOrientation {
    pub fn from_angle(angle: f64) -> Self {
        if (angle - FRAC_PI_2).abs() < VERTICAL_ANGLE_TOLERANCE {
            SplitOrientation::Vertical
        } else {
            SplitOrientation::Horizontal
        }
    }
}

/// One node of a validated partition tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartitionNode {
    pub name: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub room_type: Option<String>,
    pub area: f64,
    pub angle: f64,
    #[serde(rename = "final")]
    pub is_final: bool,
    pub children: Vec<PartitionNode>,
}

impl PartitionNode {
    /// A node is laid out as a single room when it is final or has no children.
    /// `final: false` with no children is a leaf unless `strict_leaves` rejected
    /// it during validation.
    pub fn is_leaf(&self) -> bool {
        self.is_final || self.children.is_empty()
    }

    pub fn orientation(&self) -> SplitOrientation {
        SplitOrientation::from_angle(self.angle)
    }

    /// Room type reported for a leaf: the explicit `type`, else the name.
    pub fn effective_type(&self) -> &str {
        self.room_type.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StructureError {
    #[error("node '{path}' (depth {depth}) is not a JSON object")]
    NotAnObject { path: String, depth: usize },

    #[error("node '{path}' (depth {depth}) has a 'children' field that is not a list")]
    ChildrenNotList { path: String, depth: usize },

    #[error("node '{path}' (depth {depth}): field '{field}' must be a {expected}")]
    WrongType {
        path: String,
        depth: usize,
        field: &'static str,
        expected: &'static str,
    },

    #[error("node '{path}' (depth {depth}) has a negative area ({area})")]
    NegativeArea {
        path: String,
        depth: usize,
        area: f64,
    },

    #[error("node '{path}' (depth {depth}) is not final but has no children")]
    EmptyBranch { path: String, depth: usize },

    #[error("node '{path}' is deeper than the maximum tree depth of {max_depth}")]
    TooDeep { path: String, max_depth: usize },
}

/// Validates `json` as a partition tree and returns a defaulted copy.
///
/// The root is taken from `json["split"]`, falling back to `json["root"]`, and
/// finally to `json` itself.
pub fn normalize_tree(json: &Value, settings: &PlanSettings) -> Result<PartitionNode, StructureError> {
    let root = json
        .get("split")
        .or_else(|| json.get("root"))
        .unwrap_or(json);
    normalize_node(root, None, 0, 0, settings)
}

fn normalize_node(
    value: &Value,
    parent_path: Option<&str>,
    index: usize,
    depth: usize,
    settings: &PlanSettings,
) -> Result<PartitionNode, StructureError> {
    let label = value
        .get("name")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("#{index}"));
    let path = match parent_path {
        Some(parent) => format!("{parent}/{label}"),
        None => label,
    };

    if depth > settings.max_depth {
        return Err(StructureError::TooDeep {
            path,
            max_depth: settings.max_depth,
        });
    }

    let obj = value.as_object().ok_or_else(|| StructureError::NotAnObject {
        path: path.clone(),
        depth,
    })?;
    let fields = FieldReader {
        obj,
        path: &path,
        depth,
    };

    let name = fields.string("name")?.unwrap_or_else(|| UNNAMED.to_string());
    let room_type = fields.string("type")?;

    // Only children get the default; the root's area is never used as a weight.
    let default_area = if parent_path.is_some() {
        settings.default_area
    } else {
        0.0
    };
    let area = fields.number("area")?.unwrap_or(default_area);
    if area < 0.0 {
        return Err(StructureError::NegativeArea { path, depth, area });
    }

    let angle = fields.number("angle")?.unwrap_or(0.0);
    let is_final = fields.boolean("final")?.unwrap_or(false);

    let children = match obj.get("children") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, child)| normalize_node(child, Some(&path), i, depth + 1, settings))
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => return Err(StructureError::ChildrenNotList { path, depth }),
    };

    if settings.strict_leaves && !is_final && children.is_empty() {
        return Err(StructureError::EmptyBranch { path, depth });
    }

    Ok(PartitionNode {
        name,
        room_type,
        area,
        angle,
        is_final,
        children,
    })
}

/// Typed access to optional node fields. `null` counts as absent.
struct FieldReader<'a> {
    obj: &'a Map<String, Value>,
    path: &'a str,
    depth: usize,
}

impl FieldReader<'_> {
    fn present(&self, field: &str) -> Option<&Value> {
        self.obj.get(field).filter(|v| !v.is_null())
    }

    fn wrong_type(&self, field: &'static str, expected: &'static str) -> StructureError {
        StructureError::WrongType {
            path: self.path.to_string(),
            depth: self.depth,
            field,
            expected,
        }
    }

    fn string(&self, field: &'static str) -> Result<Option<String>, StructureError> {
        self.present(field)
            .map(|v| {
                v.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| self.wrong_type(field, "string"))
            })
            .transpose()
    }

    fn number(&self, field: &'static str) -> Result<Option<f64>, StructureError> {
        self.present(field)
            .map(|v| v.as_f64().ok_or_else(|| self.wrong_type(field, "number")))
            .transpose()
    }

    fn boolean(&self, field: &'static str) -> Result<Option<bool>, StructureError> {
        self.present(field)
            .map(|v| v.as_bool().ok_or_else(|| self.wrong_type(field, "boolean")))
            .transpose()
    }
}
