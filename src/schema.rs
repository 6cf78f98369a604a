use std::collections::BTreeMap;

use crate::error::{MuralError, MuralResult};

/// A field value. The same vocabulary is used for schema defaults, live block
/// state, and condition operands.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Bool(bool),
    Tags(Vec<String>),
    Items(Vec<DetailedItem>),
    Position(PositionValue),
}

impl FieldValue {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// Values the prompt compiler skips: empty/"None" text, false toggles,
    /// empty lists. Numbers and positions always carry information.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Text(s) => {
                let t = s.trim();
                t.is_empty() || t.eq_ignore_ascii_case("none")
            }
            Self::Number(_) | Self::Position(_) => false,
            Self::Bool(b) => !b,
            Self::Tags(v) => v.is_empty(),
            Self::Items(v) => v.is_empty(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

/// One entry of a detailed-list field, e.g. a prop with qualifiers.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DetailedItem {
    pub name: String,
    #[serde(default)]
    pub adjectives: Vec<String>,
}

/// A position-picker value. `x`/`y` are percent of canvas; the textual label
/// is derived from canvas thirds, with "Center" collapsing compound labels.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PositionValue {
    pub x: f64,
    pub y: f64,
}

impl PositionValue {
    pub fn label(self) -> &'static str {
        let col = if self.x < 100.0 / 3.0 {
            Col::Left
        } else if self.x <= 200.0 / 3.0 {
            Col::Center
        } else {
            Col::Right
        };
        let row = if self.y < 100.0 / 3.0 {
            Row::Top
        } else if self.y <= 200.0 / 3.0 {
            Row::Center
        } else {
            Row::Bottom
        };
        match (row, col) {
            (Row::Top, Col::Left) => "Top Left",
            (Row::Top, Col::Center) => "Top",
            (Row::Top, Col::Right) => "Top Right",
            (Row::Center, Col::Left) => "Left",
            (Row::Center, Col::Center) => "Center",
            (Row::Center, Col::Right) => "Right",
            (Row::Bottom, Col::Left) => "Bottom Left",
            (Row::Bottom, Col::Center) => "Bottom",
            (Row::Bottom, Col::Right) => "Bottom Right",
        }
    }
}

#[derive(Clone, Copy)]
enum Col {
    Left,
    Center,
    Right,
}

#[derive(Clone, Copy)]
enum Row {
    Top,
    Center,
    Bottom,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldType {
    Text,
    Select,
    Slider,
    Color,
    Toggle,
    Checkbox,
    Radio,
    Segmented,
    Tags,
    DetailedList,
    VisualSelect,
    PositionPicker,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct FieldDefinition {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub default_value: FieldValue,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_items: Option<usize>,
}

/// Operand of a visibility condition: a single scalar or a membership set.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum ConditionValue {
    Scalar(FieldValue),
    AnyOf(Vec<FieldValue>),
}

impl ConditionValue {
    pub fn matches(&self, value: &FieldValue) -> bool {
        match self {
            Self::Scalar(v) => v == value,
            Self::AnyOf(vs) => vs.contains(value),
        }
    }
}

/// "This section is visible only if `section_id.field_id` on the controlling
/// block matches `value`." The controlling block is the section's own block
/// unless `block_type` names a different type, in which case the first active
/// block of that type controls. Resolution fails closed (hidden) when no
/// such block exists.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Condition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_type: Option<String>,
    pub section_id: String,
    pub field_id: String,
    pub value: ConditionValue,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct SectionDefinition {
    pub id: String,
    pub label: String,
    pub toggleable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
    pub fields: Vec<FieldDefinition>,
}

impl SectionDefinition {
    pub fn field(&self, field_id: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.id == field_id)
    }
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct BlockDefinition {
    #[serde(rename = "type")]
    pub block_type: String,
    pub label: String,
    pub single_active_instance: bool,
    pub sections: Vec<SectionDefinition>,
}

impl BlockDefinition {
    pub fn section(&self, section_id: &str) -> Option<&SectionDefinition> {
        self.sections.iter().find(|s| s.id == section_id)
    }
}

/// Immutable catalog of block definitions, loaded once at startup.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct SchemaRegistry {
    defs: BTreeMap<String, BlockDefinition>,
}

impl SchemaRegistry {
    pub fn from_definitions(defs: Vec<BlockDefinition>) -> MuralResult<Self> {
        let mut registry = Self::default();
        for def in defs {
            registry.insert(def)?;
        }
        registry.validate_conditions()?;
        Ok(registry)
    }

    fn insert(&mut self, def: BlockDefinition) -> MuralResult<()> {
        if def.block_type.trim().is_empty() {
            return Err(MuralError::validation("block type must be non-empty"));
        }
        if self.defs.contains_key(&def.block_type) {
            return Err(MuralError::validation(format!(
                "duplicate block type '{}'",
                def.block_type
            )));
        }

        let mut seen = std::collections::BTreeSet::new();
        for section in &def.sections {
            if !seen.insert(section.id.as_str()) {
                return Err(MuralError::validation(format!(
                    "block '{}' has duplicate section id '{}'",
                    def.block_type, section.id
                )));
            }
            let mut field_seen = std::collections::BTreeSet::new();
            for field in &section.fields {
                if !field_seen.insert(field.id.as_str()) {
                    return Err(MuralError::validation(format!(
                        "section '{}.{}' has duplicate field id '{}'",
                        def.block_type, section.id, field.id
                    )));
                }
            }
        }

        self.defs.insert(def.block_type.clone(), def);
        Ok(())
    }

    /// Conditions must point at fields that exist on their controlling block
    /// type. Schema data is trusted, so this runs once at load and hard-fails.
    fn validate_conditions(&self) -> MuralResult<()> {
        for def in self.defs.values() {
            for section in &def.sections {
                let Some(cond) = &section.condition else {
                    continue;
                };
                let controlling_type = cond.block_type.as_deref().unwrap_or(&def.block_type);
                let controlling = self.get(controlling_type).ok_or_else(|| {
                    MuralError::validation(format!(
                        "condition on '{}.{}' references unknown block type '{}'",
                        def.block_type, section.id, controlling_type
                    ))
                })?;
                let target_section = controlling.section(&cond.section_id).ok_or_else(|| {
                    MuralError::validation(format!(
                        "condition on '{}.{}' references missing section '{}.{}'",
                        def.block_type, section.id, controlling_type, cond.section_id
                    ))
                })?;
                if target_section.field(&cond.field_id).is_none() {
                    return Err(MuralError::validation(format!(
                        "condition on '{}.{}' references missing field '{}.{}.{}'",
                        def.block_type, section.id, controlling_type, cond.section_id, cond.field_id
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn get(&self, block_type: &str) -> Option<&BlockDefinition> {
        self.defs.get(block_type)
    }

    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.defs.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_def(block_type: &str) -> BlockDefinition {
        BlockDefinition {
            block_type: block_type.to_string(),
            label: block_type.to_string(),
            single_active_instance: false,
            sections: vec![SectionDefinition {
                id: "main".to_string(),
                label: "Main".to_string(),
                toggleable: false,
                condition: None,
                fields: vec![FieldDefinition {
                    id: "kind".to_string(),
                    label: "Kind".to_string(),
                    field_type: FieldType::Select,
                    default_value: FieldValue::text("A"),
                    options: vec!["A".to_string(), "B".to_string()],
                    min: None,
                    max: None,
                    suggestions: vec![],
                    max_items: None,
                }],
            }],
        }
    }

    #[test]
    fn duplicate_type_is_rejected() {
        let err = SchemaRegistry::from_definitions(vec![tiny_def("X"), tiny_def("X")]);
        assert!(err.is_err());
    }

    #[test]
    fn dangling_condition_is_rejected() {
        let mut def = tiny_def("X");
        def.sections[0].condition = Some(Condition {
            block_type: Some("Ghost".to_string()),
            section_id: "main".to_string(),
            field_id: "kind".to_string(),
            value: ConditionValue::Scalar(FieldValue::text("A")),
        });
        assert!(SchemaRegistry::from_definitions(vec![def]).is_err());
    }

    #[test]
    fn condition_value_set_membership() {
        let cv = ConditionValue::AnyOf(vec![FieldValue::text("A"), FieldValue::text("B")]);
        assert!(cv.matches(&FieldValue::text("B")));
        assert!(!cv.matches(&FieldValue::text("C")));
    }

    #[test]
    fn position_label_collapses_center() {
        assert_eq!(PositionValue { x: 50.0, y: 50.0 }.label(), "Center");
        assert_eq!(PositionValue { x: 10.0, y: 50.0 }.label(), "Left");
        assert_eq!(PositionValue { x: 50.0, y: 10.0 }.label(), "Top");
        assert_eq!(PositionValue { x: 90.0, y: 90.0 }.label(), "Bottom Right");
    }

    #[test]
    fn blank_values() {
        assert!(FieldValue::text("  ").is_blank());
        assert!(FieldValue::text("None").is_blank());
        assert!(FieldValue::Bool(false).is_blank());
        assert!(FieldValue::Tags(vec![]).is_blank());
        assert!(!FieldValue::Number(0.0).is_blank());
        assert!(!FieldValue::text("Detective").is_blank());
    }
}
