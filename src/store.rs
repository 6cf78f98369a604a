use std::sync::Arc;

use crate::{
    block::{BlockState, normalize_import},
    core::{BlockId, IdGen},
    error::{MuralError, MuralResult},
    label::smart_label,
    schema::{FieldValue, SchemaRegistry},
};

/// Which composition scope an operation targets. Locals belong to one
/// document; globals belong to the project template and are shared.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Scope {
    Local,
    Global,
}

/// Current editing selection. `GeneralSettings` is the sentinel pseudo-block
/// selection falls back to when the selected block disappears.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Selection {
    #[default]
    GeneralSettings,
    Block(BlockId),
}

/// Side information surfaced to the caller after a mutation, e.g. so the UI
/// can show a "switched active block" notice.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreNotice {
    SwitchedActive { deactivated: String },
}

/// In-memory block collection for one document plus its project globals.
///
/// All mutations are synchronous and copy-then-swap: a rejected operation
/// leaves the store unchanged. The only rejected operations are deleting or
/// duplicating a global block from document context.
#[derive(Clone, Debug)]
pub struct BlockStore {
    registry: Arc<SchemaRegistry>,
    ids: IdGen,
    locals: Vec<BlockState>,
    globals: Vec<BlockState>,
    selection: Selection,
}

impl BlockStore {
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self {
            registry,
            ids: IdGen::default(),
            locals: Vec::new(),
            globals: Vec::new(),
            selection: Selection::GeneralSettings,
        }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn locals(&self) -> &[BlockState] {
        &self.locals
    }

    pub fn globals(&self) -> &[BlockState] {
        &self.globals
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn select(&mut self, selection: Selection) {
        self.selection = selection;
    }

    pub fn get(&self, id: BlockId) -> Option<&BlockState> {
        self.locals
            .iter()
            .chain(self.globals.iter())
            .find(|b| b.id == id)
    }

    pub fn scope_of(&self, id: BlockId) -> Option<Scope> {
        if self.locals.iter().any(|b| b.id == id) {
            Some(Scope::Local)
        } else if self.globals.iter().any(|b| b.id == id) {
            Some(Scope::Global)
        } else {
            None
        }
    }

    /// Replace the local block list wholesale (history restore path). Ids are
    /// reserved so the generator never re-issues one.
    pub fn replace_locals(&mut self, blocks: Vec<BlockState>) {
        for b in &blocks {
            self.ids.reserve(b.id);
        }
        self.locals = blocks;
        if let Selection::Block(id) = self.selection
            && self.scope_of(id).is_none()
        {
            self.selection = Selection::GeneralSettings;
        }
    }

    pub fn replace_globals(&mut self, blocks: Vec<BlockState>) {
        for b in &blocks {
            self.ids.reserve(b.id);
        }
        self.globals = blocks;
    }

    /// Instantiate a new block with schema defaults and append it to `scope`.
    /// Single-active-instance types deactivate the previous active sibling;
    /// the notice carries its label.
    #[tracing::instrument(skip(self))]
    pub fn add_block(
        &mut self,
        scope: Scope,
        block_type: &str,
    ) -> MuralResult<(BlockId, Option<StoreNotice>)> {
        let registry = self.registry.clone();
        let def = registry.get(block_type).ok_or_else(|| {
            MuralError::validation(format!("unknown block type '{block_type}'"))
        })?;
        let single = def.single_active_instance;
        let block = BlockState::from_schema(self.ids.fresh(), def);
        let id = block.id;

        let blocks = self.scope_mut(scope);
        let notice = if single {
            deactivate_active_sibling(blocks, block_type, id, &registry)
        } else {
            None
        };
        blocks.push(block);
        self.selection = Selection::Block(id);
        Ok((id, notice))
    }

    /// Deep-copy a local block, renumbering its label. Single-instance types
    /// duplicate inactive so the copy never conflicts with its source. The
    /// copy is inserted immediately after the source.
    #[tracing::instrument(skip(self))]
    pub fn duplicate_block(&mut self, id: BlockId) -> MuralResult<BlockId> {
        match self.scope_of(id) {
            Some(Scope::Local) => {}
            Some(Scope::Global) => {
                return Err(MuralError::rejected(
                    "global blocks can't be duplicated here; edit the project template instead",
                ));
            }
            None => {
                return Err(MuralError::validation(format!("no block with id {}", id.0)));
            }
        }

        let index = self
            .locals
            .iter()
            .position(|b| b.id == id)
            .ok_or_else(|| MuralError::validation(format!("no block with id {}", id.0)))?;
        let source = &self.locals[index];

        let mut copy = source.clone();
        copy.id = self.ids.fresh();
        let same_type_count = self
            .locals
            .iter()
            .filter(|b| b.block_type == source.block_type)
            .count();
        copy.custom_label = Some(format!(
            "{} {}",
            smart_label(source, &self.registry),
            same_type_count + 1
        ));
        if self
            .registry
            .get(&source.block_type)
            .is_some_and(|def| def.single_active_instance)
        {
            copy.is_active = false;
        }

        let new_id = copy.id;
        self.locals.insert(index + 1, copy);
        self.selection = Selection::Block(new_id);
        Ok(new_id)
    }

    /// Delete a local block. Global blocks may only be viewed or edited from
    /// a document, never deleted; that case is rejected with the store
    /// unchanged.
    #[tracing::instrument(skip(self))]
    pub fn remove_block(&mut self, id: BlockId) -> MuralResult<()> {
        match self.scope_of(id) {
            Some(Scope::Local) => {}
            Some(Scope::Global) => {
                return Err(MuralError::rejected(
                    "global blocks can't be deleted from a document",
                ));
            }
            None => {
                return Err(MuralError::validation(format!("no block with id {}", id.0)));
            }
        }

        self.locals.retain(|b| b.id != id);
        if self.selection == Selection::Block(id) {
            self.selection = Selection::GeneralSettings;
        }
        Ok(())
    }

    /// Flip a block's active flag. Activating a single-instance type
    /// deactivates the previous active sibling in the same scope first.
    #[tracing::instrument(skip(self))]
    pub fn toggle_active(&mut self, id: BlockId) -> MuralResult<Option<StoreNotice>> {
        let scope = self
            .scope_of(id)
            .ok_or_else(|| MuralError::validation(format!("no block with id {}", id.0)))?;

        let registry = self.registry.clone();
        let blocks = self.scope_mut(scope);
        let (block_type, turning_on) = {
            let block = blocks
                .iter()
                .find(|b| b.id == id)
                .ok_or_else(|| MuralError::validation(format!("no block with id {}", id.0)))?;
            (block.block_type.clone(), !block.is_active)
        };

        let single = registry
            .get(&block_type)
            .is_some_and(|def| def.single_active_instance);
        let notice = if turning_on && single {
            deactivate_active_sibling(blocks, &block_type, id, &registry)
        } else {
            None
        };

        if let Some(block) = blocks.iter_mut().find(|b| b.id == id) {
            block.is_active = turning_on;
        }
        Ok(notice)
    }

    /// Replace a block's state. The incoming state is re-normalized against
    /// the schema (the state-is-never-dropped invariant) and, for Subject
    /// blocks with an enabled interaction, the named target is updated to
    /// reciprocate. One forward hop only: the target's own targets are never
    /// chased.
    #[tracing::instrument(skip(self, new_state))]
    pub fn update_block(&mut self, new_state: BlockState) -> MuralResult<()> {
        let id = new_state.id;
        let scope = self
            .scope_of(id)
            .ok_or_else(|| MuralError::validation(format!("no block with id {}", id.0)))?;

        let mut incoming = new_state;
        let def = self
            .registry
            .get(&incoming.block_type)
            .ok_or_else(|| {
                MuralError::validation(format!(
                    "unknown block type '{}'",
                    incoming.block_type
                ))
            })?;
        incoming.ensure_sections(def);

        let registry = self.registry.clone();
        let blocks = self.scope_mut(scope);
        let Some(slot) = blocks.iter_mut().find(|b| b.id == id) else {
            return Err(MuralError::validation(format!("no block with id {}", id.0)));
        };
        *slot = incoming;

        propagate_interaction(blocks, id, &registry);
        Ok(())
    }

    /// Copy a block-shaped value from another document, a library, or model
    /// output into `scope`. The value is re-derived from the schema
    /// ("parse, don't trust"); its semantic label is preserved via the
    /// smart-label rule; an optional reference image rides along for visual
    /// consistency.
    #[tracing::instrument(skip(self, raw, reference_image))]
    pub fn import_block(
        &mut self,
        scope: Scope,
        raw: &serde_json::Value,
        reference_image: Option<String>,
    ) -> MuralResult<(BlockId, Option<StoreNotice>)> {
        let fresh_id = self.ids.fresh();
        let mut block = normalize_import(raw, &self.registry, fresh_id)?;
        if block.custom_label.is_none() {
            let derived = smart_label(&block, &self.registry);
            block.custom_label = Some(derived);
        }
        if reference_image.is_some() {
            block.reference_image = reference_image;
        }

        let id = block.id;
        let single = self
            .registry
            .get(&block.block_type)
            .is_some_and(|def| def.single_active_instance);

        let registry = self.registry.clone();
        let block_type = block.block_type.clone();
        let active = block.is_active;
        let blocks = self.scope_mut(scope);
        let notice = if single && active {
            deactivate_active_sibling(blocks, &block_type, id, &registry)
        } else {
            None
        };
        blocks.push(block);
        Ok((id, notice))
    }

    fn scope_mut(&mut self, scope: Scope) -> &mut Vec<BlockState> {
        match scope {
            Scope::Local => &mut self.locals,
            Scope::Global => &mut self.globals,
        }
    }
}

fn deactivate_active_sibling(
    blocks: &mut [BlockState],
    block_type: &str,
    except: BlockId,
    registry: &SchemaRegistry,
) -> Option<StoreNotice> {
    let sibling = blocks
        .iter_mut()
        .find(|b| b.is_active && b.block_type == block_type && b.id != except)?;
    sibling.is_active = false;
    let deactivated = smart_label(sibling, registry);
    tracing::debug!(%deactivated, block_type, "deactivated active sibling");
    Some(StoreNotice::SwitchedActive { deactivated })
}

/// One-hop reciprocal interaction update, Subject blocks only: when the
/// source names a target subject by label, the target's interaction section is
/// pointed back at the source with the same verb, unless it already
/// reciprocates. Not a fixed-point pass; only the direct target changes.
fn propagate_interaction(blocks: &mut [BlockState], source_id: BlockId, registry: &SchemaRegistry) {
    let Some(source) = blocks.iter().find(|b| b.id == source_id) else {
        return;
    };
    if source.block_type != "Subject" {
        return;
    }
    let Some(section) = source.section("interactions") else {
        return;
    };
    if !section.enabled.unwrap_or(false) {
        return;
    }
    let (Some(target_label), Some(verb)) = (
        section.field("target").and_then(|v| v.as_text()),
        section.field("verb").and_then(|v| v.as_text()),
    ) else {
        return;
    };
    if target_label.trim().is_empty() {
        return;
    }
    let target_label = target_label.to_string();
    let verb = verb.to_string();
    let source_label = smart_label(source, registry);

    let target_id = blocks
        .iter()
        .filter(|b| b.block_type == "Subject" && b.id != source_id)
        .find(|b| smart_label(b, registry) == target_label)
        .map(|b| b.id);
    let Some(target_id) = target_id else {
        return;
    };

    let Some(target) = blocks.iter_mut().find(|b| b.id == target_id) else {
        return;
    };
    let Some(target_section) = target.section_mut("interactions") else {
        return;
    };
    let reciprocates = target_section.enabled.unwrap_or(false)
        && target_section.field("target").and_then(|v| v.as_text()) == Some(&source_label)
        && target_section.field("verb").and_then(|v| v.as_text()) == Some(&verb);
    if reciprocates {
        return;
    }

    target_section.enabled = Some(true);
    target_section.set_field("target", FieldValue::text(source_label));
    target_section.set_field("verb", FieldValue::text(verb));
    tracing::debug!(source = source_id.0, target = target_id.0, "reciprocal interaction applied");
}
