//! Deterministic compilation of effective block state into the generation
//! prompt. Total over valid block state: malformed references render nothing
//! rather than failing.

use crate::{
    block::{BlockState, CustomPropertyKind},
    core::AspectRatio,
    label::smart_label,
    resolve::{first_active, is_section_visible},
    schema::{FieldDefinition, FieldValue, SchemaRegistry},
};

/// Fixed isolation directive emitted when the active Background requests
/// background removal. Always the first content segment after the style
/// prefix.
pub const ISOLATION_DIRECTIVE: &str =
    "Isolate the subject on a clean solid neutral background with no scenery or environment details";

/// Fixed render priority per block type. Stable sort: unknown types keep
/// their relative order after the known ones.
const TYPE_PRIORITY: &[&str] = &[
    "Subject",
    "Camera",
    "Lighting",
    "Background",
    "Effects",
    "Style",
    "PostProcessing",
    "Mood",
];

#[derive(Clone, Copy, Debug)]
pub struct CompileOpts<'a> {
    pub base_style: &'a str,
    pub use_base_style: bool,
    pub aspect_ratio: AspectRatio,
}

/// Compile the effective, visible block state into one prompt string.
/// Deterministic: identical input yields byte-identical output.
#[tracing::instrument(skip(effective, registry, opts))]
pub fn compile(
    effective: &[&BlockState],
    registry: &SchemaRegistry,
    opts: &CompileOpts<'_>,
) -> String {
    let mut segments: Vec<String> = Vec::new();

    if opts.use_base_style && !opts.base_style.trim().is_empty() {
        segments.push(format!("Overall style: {}", opts.base_style.trim()));
    }

    if background_requests_isolation(effective) {
        segments.push(ISOLATION_DIRECTIVE.to_string());
    }

    let mut active: Vec<&BlockState> = effective.iter().copied().filter(|b| b.is_active).collect();
    active.sort_by_key(|b| type_priority(&b.block_type));

    for block in active {
        if let Some(clause) = compile_block(block, effective, registry, opts) {
            segments.push(clause);
        }
    }

    segments.join(". ")
}

fn type_priority(block_type: &str) -> usize {
    TYPE_PRIORITY
        .iter()
        .position(|t| *t == block_type)
        .unwrap_or(TYPE_PRIORITY.len())
}

fn background_requests_isolation(effective: &[&BlockState]) -> bool {
    let Some(bg) = first_active(effective, "Background") else {
        return false;
    };
    let Some(section) = bg.section("transparency") else {
        return false;
    };
    section.enabled.unwrap_or(false)
        && section.field("remove_bg").and_then(|v| v.as_bool()) == Some(true)
}

fn compile_block(
    block: &BlockState,
    effective: &[&BlockState],
    registry: &SchemaRegistry,
    opts: &CompileOpts<'_>,
) -> Option<String> {
    let def = registry.get(&block.block_type)?;

    let mut fragments: Vec<String> = Vec::new();
    for section_def in &def.sections {
        // The transparency section is consumed by the isolation directive and
        // interactions get a bracketed suffix; neither renders as fields.
        if section_def.id == "transparency" || section_def.id == "interactions" {
            continue;
        }
        if !is_section_visible(block, section_def, effective) {
            continue;
        }
        let Some(section) = block.section(&section_def.id) else {
            continue;
        };
        if !section.is_enabled() {
            continue;
        }

        let mut parts: Vec<String> = Vec::new();
        for field_def in &section_def.fields {
            let Some(value) = section.field(&field_def.id) else {
                continue;
            };
            if value.is_blank() {
                continue;
            }
            if let Some(rendered) = render_field(field_def, value, opts) {
                parts.push(rendered);
            }
        }
        if !parts.is_empty() {
            fragments.push(parts.join(", "));
        }
    }

    if let Some(custom) = render_custom_values(block) {
        fragments.push(custom);
    }

    let interaction = render_interaction(block, registry);
    if fragments.is_empty() && interaction.is_none() {
        return None;
    }

    let mut clause = format!(
        "[{} - {}]: {}",
        def.label,
        smart_label(block, registry),
        fragments.join(" | ")
    );
    if let Some(suffix) = interaction {
        clause.push(' ');
        clause.push_str(&suffix);
    }
    Some(clause)
}

fn render_field(
    def: &FieldDefinition,
    value: &FieldValue,
    opts: &CompileOpts<'_>,
) -> Option<String> {
    match value {
        FieldValue::Text(s) => {
            let s = s.trim();
            if def.id == "shot_size" {
                Some(render_shot_size(s, opts.aspect_ratio))
            } else {
                Some(format!("{}: {}", def.label, s))
            }
        }
        FieldValue::Number(n) => Some(render_number(def, *n)),
        FieldValue::Bool(true) => Some(def.label.clone()),
        FieldValue::Bool(false) => None,
        FieldValue::Tags(tags) => Some(format!("{}: {}", def.label, tags.join(", "))),
        FieldValue::Items(items) => {
            let rendered: Vec<String> = items
                .iter()
                .map(|item| {
                    if item.adjectives.is_empty() {
                        item.name.clone()
                    } else {
                        format!("{} {}", item.adjectives.join(" "), item.name)
                    }
                })
                .collect();
            Some(format!("{}: {}", def.label, rendered.join(", ")))
        }
        FieldValue::Position(pos) => Some(format!("{}: {}", def.label, pos.label())),
    }
}

/// Distance sliders map to 5 qualitative bands; size sliders render as a
/// percentage-of-frame phrase; other numbers render as rounded integers.
fn render_number(def: &FieldDefinition, n: f64) -> String {
    if def.id.contains("distance") {
        let band = if n < 20.0 {
            "very close"
        } else if n < 40.0 {
            "close"
        } else if n < 60.0 {
            "mid-distance"
        } else if n < 80.0 {
            "far"
        } else {
            "very far"
        };
        format!("{}: {}", def.label, band)
    } else if def.id.contains("size") {
        format!("{}: about {:.0}% of the frame", def.label, n)
    } else {
        format!("{}: {:.0}", def.label, n)
    }
}

/// Close shots on wide canvases get bespoke phrasing: the model otherwise
/// tends to pull back and letterbox the subject on 4:3 and 16:9.
fn render_shot_size(shot: &str, aspect: AspectRatio) -> String {
    let close = matches!(shot, "Close-up" | "Extreme Close-up");
    if close && aspect.is_wide() {
        format!("Shot size: {shot}, framed tightly so the subject fills the frame height despite the wide canvas")
    } else {
        format!("Shot size: {shot}")
    }
}

fn render_custom_values(block: &BlockState) -> Option<String> {
    let parts: Vec<String> = block
        .custom_values
        .iter()
        .filter_map(|prop| match (&prop.kind, &prop.value) {
            // A false custom toggle is suppressed entirely.
            (CustomPropertyKind::Checkbox, FieldValue::Bool(false)) => None,
            (CustomPropertyKind::Checkbox, FieldValue::Bool(true)) => Some(prop.label.clone()),
            (CustomPropertyKind::Slider, FieldValue::Number(n)) => {
                Some(format!("{}: {:.0}", prop.label, n))
            }
            (_, value) => value
                .as_text()
                .filter(|s| !s.trim().is_empty())
                .map(|s| format!("{}: {}", prop.label, s.trim())),
        })
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(format!("Custom Details: {}", parts.join(", ")))
    }
}

fn render_interaction(block: &BlockState, registry: &SchemaRegistry) -> Option<String> {
    let section = block.section("interactions")?;
    if !section.enabled.unwrap_or(false) {
        return None;
    }
    let target = section.field("target")?.as_text()?.trim();
    let verb = section.field("verb")?.as_text()?.trim();
    if target.is_empty() || verb.is_empty() {
        return None;
    }
    Some(format!(
        "[INTERACTION: {} is {} {}]",
        smart_label(block, registry),
        verb,
        target
    ))
}
