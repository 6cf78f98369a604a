//! Stage orchestration for the non-destructive render pipeline.
//!
//! Strict stage order: canvas transform, color filters, grain, vignette,
//! text overlays. Each stage feeds the next; the source frame is never
//! mutated. Grain is the only stage keyed by seed material, so a fixed
//! `(seed, grain_nonce)` pair makes the whole pipeline reproducible.

use crate::{
    core::Frame,
    error::MuralResult,
    filter_cpu,
    labs::LabsState,
    text_cpu::{FontLibrary, TextRenderer},
    transform_cpu,
};

#[derive(Clone, Debug, Default)]
pub struct RenderOpts {
    /// Document seed; grain noise is derived from it.
    pub seed: u64,
    /// Distinguishes successive previews when live grain is wanted; keep 0
    /// for reproducible output.
    pub grain_nonce: u64,
    /// Overlay id to decorate with selection chrome. Only honored for
    /// interactive previews; baked exports must leave it unset.
    pub selected_overlay: Option<String>,
    pub interactive: bool,
}

impl RenderOpts {
    pub fn baked(seed: u64) -> Self {
        Self { seed, ..Default::default() }
    }
}

/// Owns the text renderer so font registration survives across renders.
#[derive(Default)]
pub struct Compositor {
    text: TextRenderer,
}

impl Compositor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Metrics access for hit-testing; shares layout state with rendering
    /// so both see identical overlay footprints.
    pub fn metrics(&mut self) -> &mut TextRenderer {
        &mut self.text
    }

    #[tracing::instrument(skip_all, fields(w = source.width, h = source.height))]
    pub fn render(
        &mut self,
        source: &Frame,
        labs: &LabsState,
        library: &FontLibrary,
        opts: &RenderOpts,
    ) -> MuralResult<Frame> {
        let mut frame = transform_cpu::apply_transform(source, &labs.transform);

        filter_cpu::apply_color_filters(&mut frame, &labs.filters)?;
        filter_cpu::apply_grain(&mut frame, labs.filters.grain, opts.seed, opts.grain_nonce);
        filter_cpu::apply_vignette(&mut frame, labs.filters.vignette);

        let selected = if opts.interactive {
            opts.selected_overlay.as_deref()
        } else {
            None
        };
        self.text
            .render_overlays(&mut frame, &labs.overlays, selected, library)?;
        Ok(frame)
    }
}
