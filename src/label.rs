//! Display-name fallback for blocks without a custom label. One table-driven
//! function so per-type heuristics don't leak into callers.

use crate::{block::BlockState, schema::SchemaRegistry};

/// Candidate fields per block type, tried in order; the first non-blank value
/// wins (text directly, tag lists contribute their first entry).
const LABEL_SOURCES: &[(&str, &[(&str, &str)])] = &[
    ("Subject", &[("identity", "role"), ("identity", "category")]),
    (
        "Background",
        &[("setting", "environment"), ("setting", "type")],
    ),
    ("Camera", &[("framing", "shot_size")]),
    ("Lighting", &[("light", "style")]),
    ("Style", &[("style", "medium")]),
    ("Effects", &[("effects", "elements")]),
    ("Mood", &[("mood", "atmosphere")]),
    ("PostProcessing", &[("finish", "grade")]),
];

/// Derive the display label for a block: the custom label when set, otherwise
/// a per-type field heuristic, otherwise the schema label for the type.
pub fn smart_label(block: &BlockState, registry: &SchemaRegistry) -> String {
    if let Some(custom) = &block.custom_label
        && !custom.trim().is_empty()
    {
        return custom.trim().to_string();
    }

    if let Some((_, sources)) = LABEL_SOURCES
        .iter()
        .find(|(block_type, _)| *block_type == block.block_type)
    {
        for (section_id, field_id) in *sources {
            let Some(value) = block.field(section_id, field_id) else {
                continue;
            };
            if value.is_blank() {
                continue;
            }
            if let Some(text) = value.as_text() {
                return text.trim().to_string();
            }
            if let crate::schema::FieldValue::Tags(tags) = value
                && let Some(first) = tags.first()
            {
                return first.clone();
            }
        }
    }

    registry
        .get(&block.block_type)
        .map(|def| def.label.clone())
        .unwrap_or_else(|| block.block_type.clone())
}
