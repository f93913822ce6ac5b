use serde::Serialize;

use crate::state::ActiveLayerState;

/// Fill opacity at full intensity.
pub const FILL_OPACITY_SCALE: f64 = 0.4;
/// Border opacity at full intensity.
pub const BORDER_OPACITY_SCALE: f64 = 0.6;

/// Paint of one overlay: shared color, per-sub-layer opacity.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayPaint {
    pub color: String,
    pub fill_opacity: f64,
    pub border_opacity: f64,
}

impl OverlayPaint {
    pub fn for_layer(layer: &ActiveLayerState) -> Self {
        let intensity = layer.intensity.clamp(0.0, 1.0);
        Self {
            color: layer.color.clone(),
            fill_opacity: intensity * FILL_OPACITY_SCALE,
            border_opacity: intensity * BORDER_OPACITY_SCALE,
        }
    }
}
