//! Text overlay rendering on the CPU raster path. Layout is done with
//! Parley, glyph rasterization with `vello_cpu`, and the result is
//! composited over the working frame.
//!
//! Overlay geometry is resolution independent: `size` and spacing are
//! defined at a 1000px-wide reference canvas and rescaled by
//! `canvas_width / 1000 * 1.5` at render time. Hit-testing uses the exact
//! same metrics through [`OverlayMetrics`].

use std::{collections::HashMap, sync::Arc};

use kurbo::Shape;

use crate::{
    core::{Canvas, Frame, Rect},
    error::{MuralError, MuralResult},
    labs::TextOverlay,
    transform_cpu,
};

const REFERENCE_CANVAS_WIDTH: f32 = 1000.0;
const FONT_SCALE: f32 = 1.5;
/// Background box padding in reference pixels.
const BOX_PADDING: f32 = 12.0;
/// Shadow pass offset in reference pixels.
const SHADOW_OFFSET: f32 = 2.0;
const SELECTION_DASH: f64 = 6.0;
const SELECTION_GAP: f64 = 4.0;
const SELECTION_THICKNESS: f64 = 1.5;
pub const HANDLE_RADIUS: f64 = 8.0;
const SELECTION_COLOR: [u8; 4] = [79, 140, 255, 255];

/// Scale factor from reference-canvas units to device pixels.
pub fn overlay_scale(canvas: Canvas) -> f32 {
    canvas.width as f32 / REFERENCE_CANVAS_WIDTH * FONT_SCALE
}

/// RGBA8 brush color carried through Parley layout styles.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TextBrush {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

/// Named font faces plus a default face used when an overlay asks for a
/// font that was never registered.
#[derive(Clone, Default)]
pub struct FontLibrary {
    faces: std::collections::BTreeMap<String, Arc<Vec<u8>>>,
    default_face: Option<Arc<Vec<u8>>>,
}

impl FontLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default(bytes: Vec<u8>) -> Self {
        Self { faces: Default::default(), default_face: Some(Arc::new(bytes)) }
    }

    pub fn register(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        let name = name.into();
        let face = Arc::new(bytes);
        if self.default_face.is_none() {
            self.default_face = Some(face.clone());
        }
        self.faces.insert(name.to_ascii_lowercase(), face);
    }

    pub fn set_default(&mut self, bytes: Vec<u8>) {
        self.default_face = Some(Arc::new(bytes));
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty() && self.default_face.is_none()
    }

    /// Exact (case-insensitive) face, else the default face. The returned
    /// key identifies the resolved face for caching.
    fn resolve(&self, name: &str) -> Option<(String, Arc<Vec<u8>>)> {
        let key = name.trim().to_ascii_lowercase();
        if let Some(face) = self.faces.get(&key) {
            return Some((key, face.clone()));
        }
        self.default_face
            .as_ref()
            .map(|face| ("\u{0}default".to_string(), face.clone()))
    }
}

/// Sizing seam between rendering and hit-testing: both must agree on an
/// overlay's footprint, including box padding.
pub trait OverlayMetrics {
    fn overlay_bounds(
        &mut self,
        overlay: &TextOverlay,
        canvas: Canvas,
        library: &FontLibrary,
    ) -> MuralResult<Rect>;
}

struct ResolvedFace {
    family: String,
    font: vello_cpu::peniko::FontData,
}

/// Stateful overlay renderer. Holds Parley contexts and a per-face cache
/// so repeated renders do not re-register fonts.
pub struct TextRenderer {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<TextBrush>,
    face_cache: HashMap<String, ResolvedFace>,
}

impl Default for TextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TextRenderer {
    pub fn new() -> Self {
        Self {
            font_ctx: parley::FontContext::default(),
            layout_ctx: parley::LayoutContext::new(),
            face_cache: HashMap::new(),
        }
    }

    fn prepare_face(&mut self, name: &str, library: &FontLibrary) -> MuralResult<ResolvedFace> {
        let (key, bytes) = library.resolve(name).ok_or_else(|| {
            MuralError::configuration("no font face registered for text overlays")
        })?;
        if let Some(face) = self.face_cache.get(&key) {
            return Ok(ResolvedFace { family: face.family.clone(), font: face.font.clone() });
        }

        let families = self
            .font_ctx
            .collection
            .register_fonts(parley::fontique::Blob::from(bytes.as_ref().clone()), None);
        let family_id = families
            .first()
            .map(|(id, _)| *id)
            .ok_or_else(|| MuralError::validation("no font families in registered face"))?;
        let family = self
            .font_ctx
            .collection
            .family_name(family_id)
            .ok_or_else(|| MuralError::validation("registered font family has no name"))?
            .to_string();

        let font = vello_cpu::peniko::FontData::new(
            vello_cpu::peniko::Blob::from(bytes.as_ref().clone()),
            0,
        );
        self.face_cache
            .insert(key, ResolvedFace { family: family.clone(), font: font.clone() });
        Ok(ResolvedFace { family, font })
    }

    fn layout_overlay(
        &mut self,
        overlay: &TextOverlay,
        canvas: Canvas,
        library: &FontLibrary,
    ) -> MuralResult<(parley::Layout<TextBrush>, vello_cpu::peniko::FontData)> {
        let scale = overlay_scale(canvas);
        let font_px = overlay.size * scale;
        if !font_px.is_finite() || font_px <= 0.0 {
            return Err(MuralError::validation("overlay size must be finite and > 0"));
        }
        let face = self.prepare_face(&overlay.font, library)?;
        let brush = parse_color(&overlay.color)
            .map(|[r, g, b, a]| TextBrush { r, g, b, a })
            .unwrap_or(TextBrush { r: 255, g: 255, b: 255, a: 255 });

        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, &overlay.text, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(std::borrow::Cow::Owned(face.family)),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(font_px));
        builder.push_default(parley::style::StyleProperty::LetterSpacing(
            overlay.letter_spacing * scale,
        ));
        builder.push_default(parley::style::StyleProperty::Brush(brush));

        let mut layout: parley::Layout<TextBrush> = builder.build(&overlay.text);
        layout.break_all_lines(None);
        Ok((layout, face.font))
    }

    /// Draw overlays in list order onto `frame`. When `selected` names an
    /// overlay, a dashed selection rectangle and a resize handle are drawn
    /// over it; callers baking an export pass `None`.
    #[tracing::instrument(skip_all, fields(overlays = overlays.len()))]
    pub fn render_overlays(
        &mut self,
        frame: &mut Frame,
        overlays: &[TextOverlay],
        selected: Option<&str>,
        library: &FontLibrary,
    ) -> MuralResult<()> {
        if overlays.iter().all(|o| o.text.trim().is_empty()) && selected.is_none() {
            return Ok(());
        }
        let canvas = frame.canvas();
        let width = u16::try_from(frame.width)
            .map_err(|_| MuralError::evaluation("canvas too wide for the text renderer"))?;
        let height = u16::try_from(frame.height)
            .map_err(|_| MuralError::evaluation("canvas too tall for the text renderer"))?;

        let mut ctx = vello_cpu::RenderContext::new(width, height);
        let scale = overlay_scale(canvas);

        for overlay in overlays {
            if overlay.text.trim().is_empty() {
                continue;
            }
            let (layout, font) = self.layout_overlay(overlay, canvas, library)?;
            let (origin_x, origin_y) = overlay_origin(overlay, canvas, &layout);

            if overlay.has_background()
                && let Some([r, g, b, a]) = parse_color(&overlay.bg)
            {
                let pad = f64::from(BOX_PADDING * scale);
                let text_rect = Rect::new(
                    origin_x,
                    origin_y,
                    origin_x + f64::from(layout.width()),
                    origin_y + f64::from(layout.height()),
                );
                let boxed = text_rect.inflate(pad, pad);
                let rounded = kurbo::RoundedRect::from_rect(boxed, pad * 0.5);
                ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
                ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(r, g, b, a));
                ctx.fill_path(&bezpath_to_cpu(&rounded.to_path(0.1)));
            }

            if overlay.shadow {
                let offset = f64::from(SHADOW_OFFSET * scale);
                draw_glyph_runs(
                    &mut ctx,
                    &layout,
                    &font,
                    origin_x + offset,
                    origin_y + offset,
                    Some([0, 0, 0, 160]),
                );
            }
            draw_glyph_runs(&mut ctx, &layout, &font, origin_x, origin_y, None);
        }

        if let Some(id) = selected
            && let Some(overlay) = overlays.iter().find(|o| o.id == id)
        {
            let bounds = self.overlay_bounds(overlay, canvas, library)?;
            draw_selection_decorations(&mut ctx, bounds);
        }

        ctx.flush();
        let mut pixmap = vello_cpu::Pixmap::new(width, height);
        ctx.render_to_pixmap(&mut pixmap);

        let layer = Frame::from_premul(frame.width, frame.height, pixmap.data_as_u8_slice().to_vec())?;
        transform_cpu::over_in_place(frame, &layer, 1.0)
    }
}

impl OverlayMetrics for TextRenderer {
    /// Overlay footprint in canvas pixels, padding included, centered on
    /// the percent anchor.
    fn overlay_bounds(
        &mut self,
        overlay: &TextOverlay,
        canvas: Canvas,
        library: &FontLibrary,
    ) -> MuralResult<Rect> {
        let (layout, _) = self.layout_overlay(overlay, canvas, library)?;
        let (origin_x, origin_y) = overlay_origin(overlay, canvas, &layout);
        let pad = f64::from(BOX_PADDING * overlay_scale(canvas));
        Ok(Rect::new(
            origin_x,
            origin_y,
            origin_x + f64::from(layout.width()),
            origin_y + f64::from(layout.height()),
        )
        .inflate(pad, pad))
    }
}

fn overlay_origin(
    overlay: &TextOverlay,
    canvas: Canvas,
    layout: &parley::Layout<TextBrush>,
) -> (f64, f64) {
    let anchor_x = f64::from(overlay.x) / 100.0 * f64::from(canvas.width);
    let anchor_y = f64::from(overlay.y) / 100.0 * f64::from(canvas.height);
    (
        anchor_x - f64::from(layout.width()) / 2.0,
        anchor_y - f64::from(layout.height()) / 2.0,
    )
}

fn draw_glyph_runs(
    ctx: &mut vello_cpu::RenderContext,
    layout: &parley::Layout<TextBrush>,
    font: &vello_cpu::peniko::FontData,
    origin_x: f64,
    origin_y: f64,
    override_color: Option<[u8; 4]>,
) {
    ctx.set_transform(vello_cpu::kurbo::Affine::translate((origin_x, origin_y)));
    for line in layout.lines() {
        for item in line.items() {
            let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                continue;
            };
            let [r, g, b, a] = match override_color {
                Some(c) => c,
                None => {
                    let brush = run.style().brush;
                    [brush.r, brush.g, brush.b, brush.a]
                }
            };
            ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(r, g, b, a));
            let glyphs = run.glyphs().map(|g| vello_cpu::Glyph { id: g.id, x: g.x, y: g.y });
            ctx.glyph_run(font)
                .font_size(run.run().font_size())
                .fill_glyphs(glyphs);
        }
    }
}

fn draw_selection_decorations(ctx: &mut vello_cpu::RenderContext, bounds: Rect) {
    ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
    let [r, g, b, a] = SELECTION_COLOR;
    ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(r, g, b, a));

    for seg in dashed_border_segments(bounds) {
        ctx.fill_rect(&rect_to_cpu(seg));
    }

    let handle = kurbo::Circle::new((bounds.x1, bounds.y1), HANDLE_RADIUS);
    ctx.fill_path(&bezpath_to_cpu(&handle.to_path(0.1)));
}

/// Dash pattern along all four edges, each dash a thin filled rect
/// centered on the border line.
fn dashed_border_segments(rect: Rect) -> Vec<Rect> {
    let mut segments = Vec::new();
    let t = SELECTION_THICKNESS / 2.0;
    let step = SELECTION_DASH + SELECTION_GAP;

    let mut x = rect.x0;
    while x < rect.x1 {
        let end = (x + SELECTION_DASH).min(rect.x1);
        segments.push(Rect::new(x, rect.y0 - t, end, rect.y0 + t));
        segments.push(Rect::new(x, rect.y1 - t, end, rect.y1 + t));
        x += step;
    }
    let mut y = rect.y0;
    while y < rect.y1 {
        let end = (y + SELECTION_DASH).min(rect.y1);
        segments.push(Rect::new(rect.x0 - t, y, rect.x0 + t, end));
        segments.push(Rect::new(rect.x1 - t, y, rect.x1 + t, end));
        y += step;
    }
    segments
}

fn rect_to_cpu(r: Rect) -> vello_cpu::kurbo::Rect {
    vello_cpu::kurbo::Rect::new(r.x0, r.y0, r.x1, r.y1)
}

fn bezpath_to_cpu(path: &kurbo::BezPath) -> vello_cpu::kurbo::BezPath {
    use kurbo::PathEl;

    let to_cpu = |p: kurbo::Point| vello_cpu::kurbo::Point::new(p.x, p.y);
    let mut out = vello_cpu::kurbo::BezPath::new();
    for &el in path.elements() {
        match el {
            PathEl::MoveTo(p) => out.move_to(to_cpu(p)),
            PathEl::LineTo(p) => out.line_to(to_cpu(p)),
            PathEl::QuadTo(p1, p2) => out.quad_to(to_cpu(p1), to_cpu(p2)),
            PathEl::CurveTo(p1, p2, p3) => out.curve_to(to_cpu(p1), to_cpu(p2), to_cpu(p3)),
            PathEl::ClosePath => out.close_path(),
        }
    }
    out
}

/// Parse `#rgb`, `#rrggbb`, `#rrggbbaa`, or a handful of CSS names.
/// "transparent" and unknown values return None.
pub fn parse_color(raw: &str) -> Option<[u8; 4]> {
    let s = raw.trim();
    match s.to_ascii_lowercase().as_str() {
        "" | "transparent" | "none" => return None,
        "white" => return Some([255, 255, 255, 255]),
        "black" => return Some([0, 0, 0, 255]),
        "red" => return Some([255, 0, 0, 255]),
        "green" => return Some([0, 128, 0, 255]),
        "blue" => return Some([0, 0, 255, 255]),
        _ => {}
    }

    let hex = s.strip_prefix('#')?;
    let nibble = |c: u8| -> Option<u8> {
        match c {
            b'0'..=b'9' => Some(c - b'0'),
            b'a'..=b'f' => Some(c - b'a' + 10),
            b'A'..=b'F' => Some(c - b'A' + 10),
            _ => None,
        }
    };
    let bytes = hex.as_bytes();
    match bytes.len() {
        3 => {
            let mut out = [0u8; 4];
            for (i, &c) in bytes.iter().enumerate() {
                let v = nibble(c)?;
                out[i] = v << 4 | v;
            }
            out[3] = 255;
            Some(out)
        }
        6 | 8 => {
            let mut out = [0, 0, 0, 255];
            for i in 0..bytes.len() / 2 {
                out[i] = nibble(bytes[2 * i])? << 4 | nibble(bytes[2 * i + 1])?;
            }
            Some(out)
        }
        _ => None,
    }
}
