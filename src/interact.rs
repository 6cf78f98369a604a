//! Pointer interaction over the rendered canvas: overlay hit-testing,
//! selection, and the move/resize drag state machine.

use crate::{
    core::{Canvas, Point},
    error::MuralResult,
    labs::TextOverlay,
    text_cpu::{FontLibrary, HANDLE_RADIUS, OverlayMetrics},
};

/// Slop added to the visual handle radius so the hotspot is easy to grab.
const HANDLE_HIT_RADIUS: f64 = HANDLE_RADIUS * 1.5;
const MIN_OVERLAY_SIZE: f32 = 10.0;
const MAX_OVERLAY_SIZE: f32 = 300.0;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DragState {
    #[default]
    Idle,
    DraggingMove,
    DraggingResize,
}

/// What a pointer-up amounted to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DragOutcome {
    /// Down and up with no movement: selection only, nothing to commit.
    Click,
    /// At least one move happened while dragging; the overlay list changed.
    Committed,
}

/// One pointer gesture over the overlay layer. Pointer coordinates are
/// canvas pixels; overlay mutations stay in percent space.
#[derive(Clone, Debug, Default)]
pub struct DragSession {
    state: DragState,
    selected: Option<String>,
    last: Point,
    moved: bool,
}

impl DragSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> DragState {
        self.state
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Hit-test a pointer-down. The resize handle is checked first, and
    /// only for the currently selected overlay; unselected overlays never
    /// expose a resize hotspot. Overlay bodies are tested topmost first
    /// (highest index wins). Empty space deselects.
    pub fn pointer_down(
        &mut self,
        point: Point,
        overlays: &[TextOverlay],
        metrics: &mut dyn OverlayMetrics,
        canvas: Canvas,
        library: &FontLibrary,
    ) -> MuralResult<()> {
        self.moved = false;
        self.last = point;

        if let Some(id) = &self.selected
            && let Some(overlay) = overlays.iter().find(|o| &o.id == id)
        {
            let bounds = metrics.overlay_bounds(overlay, canvas, library)?;
            let handle = Point::new(bounds.x1, bounds.y1);
            if point.distance(handle) <= HANDLE_HIT_RADIUS {
                self.state = DragState::DraggingResize;
                return Ok(());
            }
        }

        for overlay in overlays.iter().rev() {
            let bounds = metrics.overlay_bounds(overlay, canvas, library)?;
            if bounds.contains(point) {
                self.selected = Some(overlay.id.clone());
                self.state = DragState::DraggingMove;
                return Ok(());
            }
        }

        self.selected = None;
        self.state = DragState::Idle;
        Ok(())
    }

    /// Apply a pointer move. Moves translate the selected overlay by the
    /// delta in percent of canvas, clamped to [0, 100] per axis; resizes
    /// adjust `size` by `(dx + dy) / 2 * 0.5`, clamped to [10, 300].
    pub fn pointer_move(&mut self, point: Point, overlays: &mut [TextOverlay], canvas: Canvas) {
        let dx = point.x - self.last.x;
        let dy = point.y - self.last.y;
        self.last = point;
        if self.state == DragState::Idle || (dx == 0.0 && dy == 0.0) {
            return;
        }

        let Some(overlay) = self
            .selected
            .as_ref()
            .and_then(|id| overlays.iter_mut().find(|o| &o.id == id))
        else {
            return;
        };
        self.moved = true;

        match self.state {
            DragState::DraggingMove => {
                let dx_pct = (dx / f64::from(canvas.width.max(1)) * 100.0) as f32;
                let dy_pct = (dy / f64::from(canvas.height.max(1)) * 100.0) as f32;
                overlay.x = (overlay.x + dx_pct).clamp(0.0, 100.0);
                overlay.y = (overlay.y + dy_pct).clamp(0.0, 100.0);
            }
            DragState::DraggingResize => {
                let delta = ((dx + dy) / 2.0 * 0.5) as f32;
                overlay.size = (overlay.size + delta).clamp(MIN_OVERLAY_SIZE, MAX_OVERLAY_SIZE);
            }
            DragState::Idle => {}
        }
    }

    /// End the gesture. A down+up with no intervening movement is a pure
    /// selection click.
    pub fn pointer_up(&mut self) -> DragOutcome {
        self.state = DragState::Idle;
        if std::mem::take(&mut self.moved) {
            DragOutcome::Committed
        } else {
            DragOutcome::Click
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Rect;

    /// Fixed-size metrics so tests need no fonts: every overlay measures
    /// 100x40 canvas pixels centered on its anchor.
    struct FixedMetrics;

    impl OverlayMetrics for FixedMetrics {
        fn overlay_bounds(
            &mut self,
            overlay: &TextOverlay,
            canvas: Canvas,
            _library: &FontLibrary,
        ) -> MuralResult<Rect> {
            let cx = f64::from(overlay.x) / 100.0 * f64::from(canvas.width);
            let cy = f64::from(overlay.y) / 100.0 * f64::from(canvas.height);
            Ok(Rect::new(cx - 50.0, cy - 20.0, cx + 50.0, cy + 20.0))
        }
    }

    fn canvas() -> Canvas {
        Canvas { width: 1000, height: 1000 }
    }

    fn overlay(id: &str, x: f32, y: f32) -> TextOverlay {
        TextOverlay { id: id.to_string(), x, y, ..Default::default() }
    }

    fn lib() -> FontLibrary {
        FontLibrary::new()
    }

    #[test]
    fn three_step_drag_lands_on_target_percent() {
        let mut overlays = vec![overlay("t1", 50.0, 50.0)];
        let mut session = DragSession::new();
        session
            .pointer_down(Point::new(500.0, 500.0), &overlays, &mut FixedMetrics, canvas(), &lib())
            .unwrap();
        assert_eq!(session.state(), DragState::DraggingMove);

        session.pointer_move(Point::new(540.0, 520.0), &mut overlays, canvas());
        session.pointer_move(Point::new(570.0, 540.0), &mut overlays, canvas());
        session.pointer_move(Point::new(600.0, 550.0), &mut overlays, canvas());
        assert_eq!(session.pointer_up(), DragOutcome::Committed);

        assert!((overlays[0].x - 60.0).abs() < 1e-4);
        assert!((overlays[0].y - 55.0).abs() < 1e-4);
    }

    #[test]
    fn move_clamps_to_canvas_bounds() {
        let mut overlays = vec![overlay("t1", 95.0, 5.0)];
        let mut session = DragSession::new();
        session
            .pointer_down(Point::new(950.0, 50.0), &overlays, &mut FixedMetrics, canvas(), &lib())
            .unwrap();
        session.pointer_move(Point::new(1500.0, -400.0), &mut overlays, canvas());
        assert_eq!(overlays[0].x, 100.0);
        assert_eq!(overlays[0].y, 0.0);
    }

    #[test]
    fn click_without_move_selects_only() {
        let mut overlays = vec![overlay("t1", 50.0, 50.0)];
        let mut session = DragSession::new();
        session
            .pointer_down(Point::new(500.0, 500.0), &overlays, &mut FixedMetrics, canvas(), &lib())
            .unwrap();
        assert_eq!(session.pointer_up(), DragOutcome::Click);
        assert_eq!(session.selected(), Some("t1"));
        assert_eq!(overlays[0].x, 50.0);
    }

    #[test]
    fn empty_space_deselects() {
        let overlays = vec![overlay("t1", 50.0, 50.0)];
        let mut session = DragSession::new();
        session
            .pointer_down(Point::new(500.0, 500.0), &overlays, &mut FixedMetrics, canvas(), &lib())
            .unwrap();
        session.pointer_up();
        session
            .pointer_down(Point::new(10.0, 10.0), &overlays, &mut FixedMetrics, canvas(), &lib())
            .unwrap();
        assert_eq!(session.selected(), None);
        assert_eq!(session.state(), DragState::Idle);
    }

    #[test]
    fn topmost_overlay_wins_on_overlap() {
        let overlays = vec![overlay("below", 50.0, 50.0), overlay("above", 51.0, 50.0)];
        let mut session = DragSession::new();
        session
            .pointer_down(Point::new(505.0, 500.0), &overlays, &mut FixedMetrics, canvas(), &lib())
            .unwrap();
        assert_eq!(session.selected(), Some("above"));
    }

    #[test]
    fn resize_handle_only_for_selected_overlay() {
        let mut overlays = vec![overlay("t1", 50.0, 50.0)];
        let mut session = DragSession::new();
        // Handle corner sits at (550, 520) for FixedMetrics bounds.
        let handle = Point::new(550.0, 520.0);

        // Nothing selected yet: the corner point is outside the body, so
        // it lands in empty space instead of grabbing a handle.
        session
            .pointer_down(handle, &overlays, &mut FixedMetrics, canvas(), &lib())
            .unwrap();
        assert_eq!(session.state(), DragState::Idle);
        assert_eq!(session.selected(), None);

        // Select the overlay, then the same corner point grabs the handle.
        session
            .pointer_down(Point::new(500.0, 500.0), &overlays, &mut FixedMetrics, canvas(), &lib())
            .unwrap();
        session.pointer_up();
        session
            .pointer_down(handle, &overlays, &mut FixedMetrics, canvas(), &lib())
            .unwrap();
        assert_eq!(session.state(), DragState::DraggingResize);

        session.pointer_move(Point::new(590.0, 560.0), &mut overlays, canvas());
        assert_eq!(overlays[0].size, 48.0 + (40.0 + 40.0) / 2.0 * 0.5);
        assert_eq!(session.pointer_up(), DragOutcome::Committed);
    }

    #[test]
    fn resize_clamps_to_size_limits() {
        let mut overlays = vec![overlay("t1", 50.0, 50.0)];
        overlays[0].size = 15.0;
        let mut session = DragSession::new();
        session
            .pointer_down(Point::new(500.0, 500.0), &overlays, &mut FixedMetrics, canvas(), &lib())
            .unwrap();
        session.pointer_up();
        session
            .pointer_down(Point::new(550.0, 520.0), &overlays, &mut FixedMetrics, canvas(), &lib())
            .unwrap();
        assert_eq!(session.state(), DragState::DraggingResize);
        session.pointer_move(Point::new(100.0, 100.0), &mut overlays, canvas());
        assert_eq!(overlays[0].size, MIN_OVERLAY_SIZE);
    }
}
