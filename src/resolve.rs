//! Effective-block composition and section visibility. Everything in this
//! module is pure: the same computation drives which controls are shown and
//! which fields the prompt compiler may read, so prompt output can never
//! reflect a hidden field.

use crate::{
    block::BlockState,
    schema::{SchemaRegistry, SectionDefinition},
};

/// Merge project globals and document locals into the effective block list.
///
/// With `use_base_style` set, the list is `[filtered globals] ++ locals`,
/// where a global is excluded entirely when its type is single-active-instance
/// and any local of the same type exists. Locals shadow globals type-for-type,
/// not instance-for-instance. With the flag off, globals don't participate.
pub fn compute_effective_blocks<'a>(
    locals: &'a [BlockState],
    globals: &'a [BlockState],
    use_base_style: bool,
    registry: &SchemaRegistry,
) -> Vec<&'a BlockState> {
    if !use_base_style {
        return locals.iter().collect();
    }

    let mut out: Vec<&BlockState> = Vec::with_capacity(globals.len() + locals.len());
    for global in globals {
        let shadowed = registry
            .get(&global.block_type)
            .is_some_and(|def| def.single_active_instance)
            && locals.iter().any(|l| l.block_type == global.block_type);
        if !shadowed {
            out.push(global);
        }
    }
    out.extend(locals.iter());
    out
}

/// First active block of `block_type` in effective order. Lookup rule shared
/// by the resolver and the prompt compiler.
pub fn first_active<'a>(
    effective: &[&'a BlockState],
    block_type: &str,
) -> Option<&'a BlockState> {
    effective
        .iter()
        .copied()
        .find(|b| b.is_active && b.block_type == block_type)
}

/// Evaluate a section's visibility condition against its controlling block.
///
/// The controlling block is `block` itself unless the condition names another
/// type, in which case the first active block of that type controls.
/// Resolution fails closed: no qualifying controlling block, or a missing
/// field on it, means hidden.
pub fn is_section_visible(
    block: &BlockState,
    section: &SectionDefinition,
    effective: &[&BlockState],
) -> bool {
    let Some(cond) = &section.condition else {
        return true;
    };

    let controlling: &BlockState = match &cond.block_type {
        Some(other_type) if *other_type != block.block_type => {
            match first_active(effective, other_type) {
                Some(b) => b,
                None => return false,
            }
        }
        _ => block,
    };

    match controlling.field(&cond.section_id, &cond.field_id) {
        Some(value) => cond.value.matches(value),
        None => false,
    }
}
