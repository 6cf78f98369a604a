//! Append-only history of document snapshots, newest first, plus the
//! diff-based change summary that labels each snapshot.

use serde::{Deserialize, Serialize};

use crate::{
    block::BlockState,
    core::AspectRatio,
    label::smart_label,
    labs::LabsState,
    schema::SchemaRegistry,
};

/// Immutable snapshot of everything needed to restore a document to a
/// prior point. Entries are never mutated after creation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub action: String,
    pub timestamp_ms: u64,
    pub blocks: Vec<BlockState>,
    pub seed: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub aspect_ratio: AspectRatio,
    pub labs_state: LabsState,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History {
    entries: Vec<HistoryEntry>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Newest first.
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&HistoryEntry> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record a snapshot. Blocks and labs state are cloned so the entry
    /// shares nothing mutable with live document state. Restoring an entry
    /// deliberately does not snapshot again.
    #[tracing::instrument(skip_all, fields(action = %action))]
    pub fn snapshot(
        &mut self,
        blocks: &[BlockState],
        seed: u64,
        image: Option<String>,
        aspect_ratio: AspectRatio,
        labs_state: &LabsState,
        action: impl Into<String> + std::fmt::Display,
    ) -> &HistoryEntry {
        self.entries.insert(
            0,
            HistoryEntry {
                action: action.into(),
                timestamp_ms: now_ms(),
                blocks: blocks.to_vec(),
                seed,
                image,
                aspect_ratio,
                labs_state: labs_state.clone(),
            },
        );
        &self.entries[0]
    }
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Set-based diff over block ids: additions, removals, and content changes
/// (sections, activity, label, or custom values). Returns a short human
/// label: "Regenerated" when nothing changed, the single description for
/// one change, a comma join for two, and a count with an example beyond
/// that.
pub fn change_summary(
    old_blocks: &[BlockState],
    new_blocks: &[BlockState],
    registry: &SchemaRegistry,
) -> String {
    let mut changes: Vec<String> = Vec::new();

    for block in new_blocks {
        if !old_blocks.iter().any(|b| b.id == block.id) {
            changes.push(format!("Added {}", smart_label(block, registry)));
        }
    }
    for block in old_blocks {
        if !new_blocks.iter().any(|b| b.id == block.id) {
            changes.push(format!("Removed {}", smart_label(block, registry)));
        }
    }
    for block in new_blocks {
        if let Some(old) = old_blocks.iter().find(|b| b.id == block.id)
            && !old.same_content(block)
        {
            changes.push(format!("Updated {}", smart_label(block, registry)));
        }
    }

    match changes.len() {
        0 => "Regenerated".to_string(),
        1 => changes.remove(0),
        2 => changes.join(", "),
        n => format!("{n} Changes (e.g. {})", changes[0]),
    }
}
