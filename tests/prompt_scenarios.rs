use mural::{
    AspectRatio, BlockId, BlockState, CompileOpts, FieldValue, SchemaRegistry, compile,
    compute_effective_blocks, default_registry,
};

fn block(registry: &SchemaRegistry, id: u64, block_type: &str) -> BlockState {
    BlockState::from_schema(BlockId(id), registry.get(block_type).unwrap())
}

fn set(block: &mut BlockState, section: &str, field: &str, value: FieldValue) {
    block
        .sections
        .get_mut(section)
        .unwrap()
        .set_field(field, value);
}

fn opts(base_style: &str, use_base_style: bool) -> CompileOpts<'_> {
    CompileOpts {
        base_style,
        use_base_style,
        aspect_ratio: AspectRatio::Square,
    }
}

fn detective_blocks(registry: &SchemaRegistry) -> Vec<BlockState> {
    let mut subject = block(registry, 1, "Subject");
    set(&mut subject, "identity", "category", FieldValue::text("Human"));
    set(&mut subject, "identity", "role", FieldValue::text("Detective"));

    let mut background = block(registry, 2, "Background");
    set(&mut background, "setting", "type", FieldValue::text("Outdoor"));
    set(
        &mut background,
        "setting",
        "environment",
        FieldValue::text("Rain-soaked alley"),
    );
    vec![subject, background]
}

#[test]
fn detective_scenario_orders_subject_before_background() {
    let registry = default_registry().unwrap();
    let locals = detective_blocks(&registry);
    let effective = compute_effective_blocks(&locals, &[], false, &registry);
    let prompt = compile(&effective, &registry, &opts("", false));

    let subject_at = prompt
        .find("[Subject - Detective]")
        .expect("subject clause present");
    let background_at = prompt
        .find("[Background & Atmosphere")
        .expect("background clause present");
    assert!(subject_at < background_at);
    assert!(prompt.contains("Rain-soaked alley"));
    assert!(!prompt.contains("Isolate the subject"));
}

#[test]
fn remove_bg_puts_isolation_directive_first() {
    let registry = default_registry().unwrap();
    let mut locals = detective_blocks(&registry);
    {
        let transparency = locals[1].sections.get_mut("transparency").unwrap();
        transparency.enabled = Some(true);
        transparency.set_field("remove_bg", FieldValue::Bool(true));
    }
    let effective = compute_effective_blocks(&locals, &[], false, &registry);

    let prompt = compile(&effective, &registry, &opts("", false));
    assert!(prompt.starts_with("Isolate the subject"));

    // With a style prefix, the directive is the first content segment
    // after it.
    let styled = compile(&effective, &registry, &opts("Watercolor", true));
    assert!(styled.starts_with("Overall style: Watercolor"));
    let after_style = &styled[styled.find(". ").unwrap() + 2..];
    assert!(after_style.starts_with("Isolate the subject"));
}

#[test]
fn compile_twice_is_byte_identical() {
    let registry = default_registry().unwrap();
    let mut locals = detective_blocks(&registry);
    locals.push(block(&registry, 3, "Lighting"));
    locals.push(block(&registry, 4, "Mood"));
    let effective = compute_effective_blocks(&locals, &[], false, &registry);

    let a = compile(&effective, &registry, &opts("Noir", true));
    let b = compile(&effective, &registry, &opts("Noir", true));
    assert_eq!(a, b);
}

#[test]
fn shadowed_global_background_never_leaks_into_prompt() {
    let registry = default_registry().unwrap();
    let mut global_bg = block(&registry, 10, "Background");
    set(
        &mut global_bg,
        "setting",
        "environment",
        FieldValue::text("Shared studio"),
    );
    let locals = detective_blocks(&registry);

    let effective =
        compute_effective_blocks(&locals, std::slice::from_ref(&global_bg), true, &registry);
    let prompt = compile(&effective, &registry, &opts("", false));
    assert!(prompt.contains("Rain-soaked alley"));
    assert!(!prompt.contains("Shared studio"));
}

#[test]
fn global_lighting_merges_when_not_shadowed() {
    let registry = default_registry().unwrap();
    let mut global_light = block(&registry, 10, "Lighting");
    set(
        &mut global_light,
        "light",
        "style",
        FieldValue::text("Neon glow"),
    );
    let locals = detective_blocks(&registry);

    let effective =
        compute_effective_blocks(&locals, std::slice::from_ref(&global_light), true, &registry);
    let prompt = compile(&effective, &registry, &opts("", false));
    assert!(prompt.contains("Neon glow"));

    // Disabling global style drops the shared block entirely.
    let local_only = compute_effective_blocks(
        &locals,
        std::slice::from_ref(&global_light),
        false,
        &registry,
    );
    let prompt = compile(&local_only, &registry, &opts("", false));
    assert!(!prompt.contains("Neon glow"));
}
