//! LLM prompt constants for floor-plan generation.
//!
//! The model is asked for reasoning first and the partition tree last. The
//! extractor copes with whatever fencing the model actually uses.

use serde_json::Value;

use crate::generation::boundary::BoundarySummary;

pub const FLOOR_PLAN_SYSTEM: &str = "\
You are a floor plan design assistant. Your task is to create a recursive space \
partitioning tree based on the room requirements provided by the user.\n\
\n\
First, analyze the description to identify room types and their relative sizes. \
Then, create a tree where each node represents a rectangular area, with the root \
node being the entire boundary.\n\
\n\
IMPORTANT: Output your response in TWO clearly separated parts:\n\
1. Thinking steps: Detailed explanation of your reasoning process\n\
2. Final JSON output: ONLY the partition tree structure, in a ```json fenced block\n\
\n\
For the thinking steps, walk through:\n\
0. Analysis of the description to list all room types and sizes you've identified\n\
1. Calculate the total area of the given boundary\n\
2. Validate if the sum of room areas matches the total area (adjust if needed)\n\
3. For each node, choose a split direction (horizontal/vertical) and create child nodes\n\
4. Repeat recursively until each leaf node corresponds to a specific room\n\
\n\
For the JSON output, follow this structure:\n\
{\n\
  \"split\": {\n\
    \"name\": \"root\",\n\
    \"area\": total_area,\n\
    \"angle\": 0 or 1.5708 (0 for horizontal split, π/2 for vertical),\n\
    \"final\": false,\n\
    \"children\": [\n\
      {\"name\": \"rootL\", \"area\": area_left, \"angle\": angle, \"final\": false, \"children\": [...]},\n\
      {\"name\": \"kitchen\", \"type\": \"kitchen\", \"area\": area_right, \"angle\": 0, \"final\": true, \"children\": []}\n\
    ]\n\
  }\n\
}\n\
\n\
Children are placed in list order: left to right for a vertical split, bottom to \
top for a horizontal split. Keep your thinking steps clear and logical, and ensure \
the final JSON is valid and follows the specified format.";

pub const FLOOR_PLAN_PROMPT_TEMPLATE: &str = "\
Please create a space partitioning tree for a floor plan based on the following \
description and boundary constraints:\n\
\n\
Description: {description}\n\
\n\
Boundary Information:\n\
- Total area: {total_area} units\n\
- Number of shapes: {shapes_count}\n\
- Shape details: {shape_details}\n\
\n\
Additional preferences: {preferences}\n\
\n\
Remember to:\n\
1. First output your THINKING STEPS in detail, showing how you analyze the room \
requirements and decide on partitioning\n\
2. Then output ONLY the final JSON with the partition tree structure\n\
3. Make sure each split divides the space efficiently according to the described \
room requirements\n\
4. Ensure leaf nodes correspond to specific rooms from the description\n\
5. Use meaningful names for nodes (e.g., \"livingRoom\", \"kitchen\", etc.)";

/// Fills the user prompt template from the request and boundary metrics.
pub fn build_floor_plan_prompt(
    description: &str,
    summary: &BoundarySummary,
    preferences: Option<&Value>,
) -> String {
    let shape_details =
        serde_json::to_string_pretty(&summary.shapes).unwrap_or_else(|_| "[]".to_string());
    let preferences = match preferences {
        Some(p) if !is_empty_preferences(p) => {
            serde_json::to_string_pretty(p).unwrap_or_else(|_| "None".to_string())
        }
        _ => "None".to_string(),
    };

    FLOOR_PLAN_PROMPT_TEMPLATE
        .replace("{description}", description)
        .replace("{total_area}", &summary.total_area.to_string())
        .replace("{shapes_count}", &summary.shapes_count.to_string())
        .replace("{shape_details}", &shape_details)
        .replace("{preferences}", &preferences)
}

fn is_empty_preferences(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}
