use std::collections::BTreeMap;

use crate::{
    core::BlockId,
    error::{MuralError, MuralResult},
    schema::{
        BlockDefinition, DetailedItem, FieldDefinition, FieldType, FieldValue, PositionValue,
        SchemaRegistry,
    },
};

/// Live state of one block instance.
///
/// Invariant: `sections` holds an entry for every section in the owning
/// definition, even when the section is hidden or toggled off. Visibility
/// masks state, it never drops it.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockState {
    pub id: BlockId,
    #[serde(rename = "type")]
    pub block_type: String,
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_label: Option<String>,
    pub sections: BTreeMap<String, SectionState>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_values: Vec<CustomProperty>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_image: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SectionState {
    /// `Some` only for toggleable sections; non-toggleable sections are
    /// implicitly enabled whenever visible.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    pub fields: BTreeMap<String, FieldValue>,
}

impl SectionState {
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    pub fn field(&self, field_id: &str) -> Option<&FieldValue> {
        self.fields.get(field_id)
    }

    pub fn set_field(&mut self, field_id: impl Into<String>, value: FieldValue) {
        self.fields.insert(field_id.into(), value);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomPropertyKind {
    Text,
    Slider,
    Checkbox,
    Color,
}

/// Free-form user-defined field attached to a block.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CustomProperty {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: CustomPropertyKind,
    pub value: FieldValue,
}

impl BlockState {
    /// Instantiate a block with schema defaults. Toggleable sections start
    /// disabled.
    pub fn from_schema(id: BlockId, def: &BlockDefinition) -> Self {
        let mut block = Self {
            id,
            block_type: def.block_type.clone(),
            is_active: true,
            custom_label: None,
            sections: BTreeMap::new(),
            custom_values: Vec::new(),
            reference_image: None,
        };
        block.ensure_sections(def);
        block
    }

    /// Default-populate any section or field missing from `sections`, without
    /// touching values that are already present.
    pub fn ensure_sections(&mut self, def: &BlockDefinition) {
        for section_def in &def.sections {
            let section = self.sections.entry(section_def.id.clone()).or_default();
            if section_def.toggleable {
                section.enabled.get_or_insert(false);
            } else {
                section.enabled = None;
            }
            for field in &section_def.fields {
                section
                    .fields
                    .entry(field.id.clone())
                    .or_insert_with(|| field.default_value.clone());
            }
        }
    }

    pub fn section(&self, section_id: &str) -> Option<&SectionState> {
        self.sections.get(section_id)
    }

    pub fn section_mut(&mut self, section_id: &str) -> Option<&mut SectionState> {
        self.sections.get_mut(section_id)
    }

    pub fn field(&self, section_id: &str, field_id: &str) -> Option<&FieldValue> {
        self.sections.get(section_id)?.field(field_id)
    }

    /// Structural equality over everything the change-summary diff considers
    /// a modification.
    pub fn same_content(&self, other: &Self) -> bool {
        self.sections == other.sections
            && self.is_active == other.is_active
            && self.custom_label == other.custom_label
            && self.custom_values == other.custom_values
    }
}

/// Normalize a block-shaped value from an untrusted source (another document,
/// a library, or model output): re-derive every section and field from the
/// current schema, keep recognized well-typed values, substitute defaults for
/// everything else. Blocks of unrecognized type are rejected; per-field
/// problems never are.
pub fn normalize_import(
    raw: &serde_json::Value,
    registry: &SchemaRegistry,
    id: BlockId,
) -> MuralResult<BlockState> {
    let block_type = raw
        .get("type")
        .and_then(|v| v.as_str())
        .ok_or_else(|| MuralError::validation("imported block has no type"))?;
    let def = registry.get(block_type).ok_or_else(|| {
        MuralError::validation(format!("imported block type '{block_type}' is not in the schema"))
    })?;

    let mut block = BlockState::from_schema(id, def);
    block.is_active = raw
        .get("isActive")
        .and_then(|v| v.as_bool())
        .unwrap_or(true);
    block.custom_label = raw
        .get("customLabel")
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string);
    block.reference_image = raw
        .get("referenceImage")
        .and_then(|v| v.as_str())
        .map(str::to_string);

    if let Some(sections) = raw.get("sections").and_then(|v| v.as_object()) {
        for section_def in &def.sections {
            let Some(raw_section) = sections.get(&section_def.id) else {
                continue;
            };
            let Some(section) = block.sections.get_mut(&section_def.id) else {
                continue;
            };

            if section_def.toggleable
                && let Some(enabled) = raw_section.get("enabled").and_then(|v| v.as_bool())
            {
                section.enabled = Some(enabled);
            }

            let Some(raw_fields) = raw_section.get("fields").and_then(|v| v.as_object()) else {
                continue;
            };
            for field_def in &section_def.fields {
                let Some(raw_value) = raw_fields.get(&field_def.id) else {
                    continue;
                };
                if let Some(value) = coerce_field_value(field_def, raw_value) {
                    section.fields.insert(field_def.id.clone(), value);
                } else {
                    tracing::debug!(
                        block_type,
                        section = %section_def.id,
                        field = %field_def.id,
                        "imported field value has wrong shape, keeping default"
                    );
                }
            }
        }
    }

    if let Some(raw_customs) = raw.get("customValues").and_then(|v| v.as_array()) {
        for raw_custom in raw_customs {
            if let Some(prop) = coerce_custom_property(raw_custom) {
                block.custom_values.push(prop);
            }
        }
    }

    Ok(block)
}

/// Mistyped values yield `None` and fall back to the schema default.
fn coerce_field_value(def: &FieldDefinition, raw: &serde_json::Value) -> Option<FieldValue> {
    match def.field_type {
        FieldType::Text
        | FieldType::Select
        | FieldType::Color
        | FieldType::Radio
        | FieldType::Segmented
        | FieldType::VisualSelect => raw.as_str().map(FieldValue::text),
        FieldType::Slider => {
            let n = raw.as_f64().filter(|n| n.is_finite())?;
            let n = match (def.min, def.max) {
                (Some(lo), Some(hi)) => n.clamp(lo, hi),
                (Some(lo), None) => n.max(lo),
                (None, Some(hi)) => n.min(hi),
                (None, None) => n,
            };
            Some(FieldValue::Number(n))
        }
        FieldType::Toggle | FieldType::Checkbox => raw.as_bool().map(FieldValue::Bool),
        FieldType::Tags => {
            let arr = raw.as_array()?;
            let mut tags: Vec<String> = arr
                .iter()
                .filter_map(|v| v.as_str())
                .filter(|s| !s.trim().is_empty())
                .map(str::to_string)
                .collect();
            if let Some(cap) = def.max_items {
                tags.truncate(cap);
            }
            Some(FieldValue::Tags(tags))
        }
        FieldType::DetailedList => {
            let arr = raw.as_array()?;
            let mut items = Vec::new();
            for entry in arr {
                let Some(name) = entry.get("name").and_then(|v| v.as_str()) else {
                    continue;
                };
                let adjectives = entry
                    .get("adjectives")
                    .and_then(|v| v.as_array())
                    .map(|a| {
                        a.iter()
                            .filter_map(|v| v.as_str())
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default();
                items.push(DetailedItem {
                    name: name.to_string(),
                    adjectives,
                });
            }
            if let Some(cap) = def.max_items {
                items.truncate(cap);
            }
            Some(FieldValue::Items(items))
        }
        FieldType::PositionPicker => {
            let x = raw.get("x")?.as_f64()?.clamp(0.0, 100.0);
            let y = raw.get("y")?.as_f64()?.clamp(0.0, 100.0);
            Some(FieldValue::Position(PositionValue { x, y }))
        }
    }
}

fn coerce_custom_property(raw: &serde_json::Value) -> Option<CustomProperty> {
    let id = raw.get("id")?.as_str()?.to_string();
    let label = raw.get("label")?.as_str()?.to_string();
    let kind = match raw.get("type")?.as_str()? {
        "text" => CustomPropertyKind::Text,
        "slider" => CustomPropertyKind::Slider,
        "checkbox" => CustomPropertyKind::Checkbox,
        "color" => CustomPropertyKind::Color,
        _ => return None,
    };
    let value = match kind {
        CustomPropertyKind::Text | CustomPropertyKind::Color => {
            FieldValue::text(raw.get("value")?.as_str()?)
        }
        CustomPropertyKind::Slider => FieldValue::Number(raw.get("value")?.as_f64()?),
        CustomPropertyKind::Checkbox => FieldValue::Bool(raw.get("value")?.as_bool()?),
    };
    Some(CustomProperty {
        id,
        label,
        kind,
        value,
    })
}
