//! Non-destructive post-processing state: filter knobs, canvas transform,
//! and text overlays. Everything here is plain data; the raster work lives
//! in the `*_cpu` modules behind [`crate::compositor`].

use serde::{Deserialize, Serialize};

use crate::error::{MuralError, MuralResult};

/// Nine named filter knobs. Percent-style scales where 100 is neutral for
/// brightness/contrast/saturation and 0 is neutral for the rest.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterSettings {
    pub brightness: f32,
    pub contrast: f32,
    pub saturation: f32,
    pub sepia: f32,
    pub grayscale: f32,
    pub blur: f32,
    pub hue: f32,
    pub vignette: f32,
    pub grain: f32,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            brightness: 100.0,
            contrast: 100.0,
            saturation: 100.0,
            sepia: 0.0,
            grayscale: 0.0,
            blur: 0.0,
            hue: 0.0,
            vignette: 0.0,
            grain: 0.0,
        }
    }
}

impl FilterSettings {
    /// True when the color stage (everything except grain and vignette)
    /// would be a no-op.
    pub fn color_is_neutral(&self) -> bool {
        self.brightness == 100.0
            && self.contrast == 100.0
            && self.saturation == 100.0
            && self.sepia == 0.0
            && self.grayscale == 0.0
            && self.blur == 0.0
            && self.hue == 0.0
    }

    pub fn is_neutral(&self) -> bool {
        self.color_is_neutral() && self.vignette == 0.0 && self.grain == 0.0
    }
}

/// Canvas transform applied about the center: rotate, then zoom, then pan.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransformSettings {
    /// Scale factor, clamped to at least 1 so the source always covers the
    /// canvas.
    pub zoom: f32,
    /// Horizontal pan as percent of canvas width.
    pub x: f32,
    /// Vertical pan as percent of canvas height.
    pub y: f32,
    /// Rotation in degrees, clockwise.
    pub rotation: f32,
}

impl Default for TransformSettings {
    fn default() -> Self {
        Self { zoom: 1.0, x: 0.0, y: 0.0, rotation: 0.0 }
    }
}

impl TransformSettings {
    pub fn is_identity(&self) -> bool {
        self.zoom <= 1.0 && self.x == 0.0 && self.y == 0.0 && self.rotation == 0.0
    }

    pub fn effective_zoom(&self) -> f32 {
        self.zoom.max(1.0)
    }
}

/// One text overlay, center-anchored at a percent position. `size` is the
/// height in pixels at a 1000px-wide reference canvas; rendering rescales
/// it so proportions are resolution independent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TextOverlay {
    pub id: String,
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub color: String,
    pub font: String,
    pub shadow: bool,
    /// Background box color, or "transparent" for none.
    pub bg: String,
    pub letter_spacing: f32,
}

impl Default for TextOverlay {
    fn default() -> Self {
        Self {
            id: String::new(),
            text: "Text".to_string(),
            x: 50.0,
            y: 50.0,
            size: 48.0,
            color: "#ffffff".to_string(),
            font: "sans-serif".to_string(),
            shadow: false,
            bg: "transparent".to_string(),
            letter_spacing: 0.0,
        }
    }
}

impl TextOverlay {
    pub fn has_background(&self) -> bool {
        !self.bg.is_empty() && !self.bg.eq_ignore_ascii_case("transparent")
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LabsState {
    pub filters: FilterSettings,
    pub overlays: Vec<TextOverlay>,
    pub transform: TransformSettings,
}

impl LabsState {
    pub fn is_neutral(&self) -> bool {
        self.filters.is_neutral() && self.overlays.is_empty() && self.transform.is_identity()
    }

    /// Deserialize a persisted labs value, upgrading the legacy shape where
    /// a single `overlay` object stood in for the `overlays` list. The
    /// legacy `padding` field becomes `letterSpacing` at half value when no
    /// explicit spacing was stored.
    pub fn from_value(mut raw: serde_json::Value) -> MuralResult<Self> {
        if let Some(obj) = raw.as_object_mut() {
            let have_overlays = obj
                .get("overlays")
                .and_then(|v| v.as_array())
                .is_some_and(|list| !list.is_empty());
            match obj.remove("overlay") {
                Some(mut legacy) if !have_overlays => {
                    if let Some(fields) = legacy.as_object_mut() {
                        if !fields.contains_key("letterSpacing") {
                            let padding =
                                fields.get("padding").and_then(|v| v.as_f64()).unwrap_or(0.0);
                            fields.insert(
                                "letterSpacing".to_string(),
                                serde_json::json!(padding / 2.0),
                            );
                        }
                        fields.remove("padding");
                    }
                    obj.insert("overlays".to_string(), serde_json::Value::Array(vec![legacy]));
                }
                _ => {}
            }
        }
        serde_json::from_value(raw).map_err(|e| MuralError::serde(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_are_neutral() {
        assert!(LabsState::default().is_neutral());
        assert!(FilterSettings::default().color_is_neutral());
        assert!(TransformSettings::default().is_identity());
    }

    #[test]
    fn zoom_below_one_is_clamped() {
        let t = TransformSettings { zoom: 0.4, ..Default::default() };
        assert_eq!(t.effective_zoom(), 1.0);
    }

    #[test]
    fn legacy_single_overlay_migrates_with_half_padding() {
        let raw = json!({
            "filters": { "brightness": 110.0 },
            "transform": {},
            "overlay": { "id": "t1", "text": "Hello", "x": 40.0, "y": 60.0, "padding": 16.0 }
        });
        let labs = LabsState::from_value(raw).unwrap();
        assert_eq!(labs.filters.brightness, 110.0);
        assert_eq!(labs.overlays.len(), 1);
        assert_eq!(labs.overlays[0].text, "Hello");
        assert_eq!(labs.overlays[0].letter_spacing, 8.0);
    }

    #[test]
    fn legacy_overlay_yields_to_populated_list() {
        let raw = json!({
            "overlays": [{ "id": "kept", "text": "Kept" }],
            "overlay": { "id": "ignored", "text": "Ignored" }
        });
        let labs = LabsState::from_value(raw).unwrap();
        assert_eq!(labs.overlays.len(), 1);
        assert_eq!(labs.overlays[0].id, "kept");
    }

    #[test]
    fn legacy_overlay_keeps_explicit_letter_spacing() {
        let raw = json!({
            "overlay": { "id": "t1", "text": "Hi", "letterSpacing": 3.0, "padding": 20.0 }
        });
        let labs = LabsState::from_value(raw).unwrap();
        assert_eq!(labs.overlays[0].letter_spacing, 3.0);
    }

    #[test]
    fn camel_case_round_trip() {
        let mut labs = LabsState::default();
        labs.overlays.push(TextOverlay { id: "t1".to_string(), ..Default::default() });
        labs.overlays[0].letter_spacing = 2.0;
        let value = serde_json::to_value(&labs).unwrap();
        assert!(value["overlays"][0].get("letterSpacing").is_some());
        assert_eq!(LabsState::from_value(value).unwrap(), labs);
    }
}
