//! Persisted document and project shapes, load-time normalization, and
//! history restore.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    block::BlockState,
    core::AspectRatio,
    error::{MuralError, MuralResult},
    history::{History, HistoryEntry},
    labs::LabsState,
    schema::SchemaRegistry,
};

/// One editable unit. Serialized camelCase for compatibility with
/// previously persisted documents.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Document {
    pub blocks: Vec<BlockState>,
    pub seed: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_image: Option<String>,
    pub aspect_ratio: AspectRatio,
    pub base_style: String,
    pub use_base_style: bool,
    pub rough_idea: String,
    pub dynamic_suggestions: BTreeMap<String, Vec<String>>,
    pub history: History,
    pub labs_state: LabsState,
}

impl Default for Document {
    fn default() -> Self {
        Self {
            blocks: Vec::new(),
            seed: 0,
            preview_image: None,
            aspect_ratio: AspectRatio::default(),
            base_style: String::new(),
            use_base_style: true,
            rough_idea: String::new(),
            dynamic_suggestions: BTreeMap::new(),
            history: History::new(),
            labs_state: LabsState::default(),
        }
    }
}

impl Document {
    /// Load a persisted document, normalizing everything that may have
    /// drifted: unknown aspect ratios fall back to 1:1, the legacy
    /// single-overlay labs shape is migrated, blocks of unrecognized types
    /// are dropped, and recognized blocks are re-defaulted against the
    /// current schema so missing sections reappear.
    #[tracing::instrument(skip_all)]
    pub fn from_value(mut raw: serde_json::Value, registry: &SchemaRegistry) -> MuralResult<Self> {
        if let Some(obj) = raw.as_object_mut() {
            if let Some(ratio) = obj.get("aspectRatio").and_then(|v| v.as_str()) {
                let normalized = AspectRatio::normalize(ratio).as_str().to_string();
                obj.insert("aspectRatio".to_string(), serde_json::Value::String(normalized));
            }
            if let Some(labs_raw) = obj.remove("labsState")
                && !labs_raw.is_null()
            {
                let labs = LabsState::from_value(labs_raw)?;
                obj.insert(
                    "labsState".to_string(),
                    serde_json::to_value(&labs).map_err(|e| MuralError::serde(e.to_string()))?,
                );
            }
        }

        let mut doc: Document =
            serde_json::from_value(raw).map_err(|e| MuralError::serde(e.to_string()))?;

        doc.blocks.retain(|b| registry.get(&b.block_type).is_some());
        for block in &mut doc.blocks {
            if let Some(def) = registry.get(&block.block_type) {
                block.ensure_sections(def);
            }
        }
        Ok(doc)
    }

    pub fn from_json(json: &str, registry: &SchemaRegistry) -> MuralResult<Self> {
        let raw: serde_json::Value =
            serde_json::from_str(json).map_err(|e| MuralError::serde(e.to_string()))?;
        Self::from_value(raw, registry)
    }

    pub fn to_json(&self) -> MuralResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| MuralError::serde(e.to_string()))
    }

    /// Record the current state in history with the given action label.
    pub fn snapshot(&mut self, action: impl Into<String> + std::fmt::Display) {
        // Split borrow: history is written, the rest is read.
        let Self { blocks, seed, preview_image, aspect_ratio, labs_state, history, .. } = self;
        history.snapshot(
            blocks,
            *seed,
            preview_image.clone(),
            *aspect_ratio,
            labs_state,
            action,
        );
    }

    /// Replace live state wholesale from a history entry. Restoring is
    /// itself not recorded, so stepping through history does not grow it.
    pub fn restore(&mut self, entry: &HistoryEntry) {
        self.blocks = entry.blocks.clone();
        self.seed = entry.seed;
        self.preview_image = entry.image.clone();
        self.aspect_ratio = entry.aspect_ratio;
        self.labs_state = entry.labs_state.clone();
    }
}

/// A project: shared global blocks plus its documents.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Project {
    pub global_blocks: Vec<BlockState>,
    pub files: Vec<Document>,
}

impl Project {
    pub fn from_value(raw: serde_json::Value, registry: &SchemaRegistry) -> MuralResult<Self> {
        let mut obj = match raw {
            serde_json::Value::Object(obj) => obj,
            _ => return Err(MuralError::serde("project must be a JSON object")),
        };

        let mut global_blocks: Vec<BlockState> = match obj.remove("globalBlocks") {
            Some(v) if !v.is_null() => {
                serde_json::from_value(v).map_err(|e| MuralError::serde(e.to_string()))?
            }
            _ => Vec::new(),
        };
        global_blocks.retain(|b| registry.get(&b.block_type).is_some());
        for block in &mut global_blocks {
            if let Some(def) = registry.get(&block.block_type) {
                block.ensure_sections(def);
            }
        }

        let files = match obj.remove("files") {
            Some(serde_json::Value::Array(list)) => list
                .into_iter()
                .map(|v| Document::from_value(v, registry))
                .collect::<MuralResult<Vec<_>>>()?,
            _ => Vec::new(),
        };

        Ok(Self { global_blocks, files })
    }

    pub fn to_json(&self) -> MuralResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| MuralError::serde(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{catalog::default_registry, core::BlockId, schema::FieldValue};
    use serde_json::json;

    #[test]
    fn round_trip_uses_camel_case_keys() {
        let registry = default_registry().unwrap();
        let mut doc = Document::default();
        doc.base_style = "Film noir".to_string();
        doc.blocks.push(BlockState::from_schema(
            BlockId(1),
            registry.get("Subject").unwrap(),
        ));

        let json = doc.to_json().unwrap();
        assert!(json.contains("\"baseStyle\""));
        assert!(json.contains("\"useBaseStyle\""));
        assert!(json.contains("\"labsState\""));
        assert!(json.contains("\"aspectRatio\""));

        let back = Document::from_json(&json, &registry).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn unknown_aspect_ratio_normalizes_to_square() {
        let registry = default_registry().unwrap();
        let doc =
            Document::from_value(json!({ "aspectRatio": "21:9" }), &registry).unwrap();
        assert_eq!(doc.aspect_ratio, AspectRatio::Square);
    }

    #[test]
    fn legacy_labs_overlay_migrates_through_document_load() {
        let registry = default_registry().unwrap();
        let raw = json!({
            "labsState": {
                "overlay": { "id": "t1", "text": "Hello", "padding": 10.0 }
            }
        });
        let doc = Document::from_value(raw, &registry).unwrap();
        assert_eq!(doc.labs_state.overlays.len(), 1);
        assert_eq!(doc.labs_state.overlays[0].letter_spacing, 5.0);
    }

    #[test]
    fn unrecognized_block_types_are_dropped_on_load() {
        let registry = default_registry().unwrap();
        let mut doc = Document::default();
        doc.blocks.push(BlockState::from_schema(
            BlockId(1),
            registry.get("Subject").unwrap(),
        ));
        let mut raw = serde_json::to_value(&doc).unwrap();
        raw["blocks"][0]["type"] = json!("Hologram");

        let loaded = Document::from_value(raw, &registry).unwrap();
        assert!(loaded.blocks.is_empty());
    }

    #[test]
    fn restore_replaces_state_without_growing_history() {
        let registry = default_registry().unwrap();
        let mut doc = Document::default();
        let mut block = BlockState::from_schema(BlockId(1), registry.get("Subject").unwrap());
        if let Some(section) = block.section_mut("identity") {
            section.set_field("role", FieldValue::text("Knight"));
        }
        doc.blocks.push(block);
        doc.seed = 7;
        doc.snapshot("Generated");

        if let Some(section) = doc.blocks[0].section_mut("identity") {
            section.set_field("role", FieldValue::text("Wizard"));
        }
        doc.seed = 8;

        let entry = doc.history.entries()[0].clone();
        doc.restore(&entry);
        assert_eq!(doc.seed, 7);
        assert_eq!(
            doc.blocks[0].field("identity", "role"),
            Some(&FieldValue::text("Knight"))
        );
        assert_eq!(doc.history.len(), 1);
    }
}
