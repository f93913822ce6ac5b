//! The map operations the synchronizer and the search presenter rely on.
//!
//! A real map widget implements [`RenderSurface`]; [`crate::HeadlessSurface`]
//! keeps the same bookkeeping in memory.

use std::time::Duration;

use catalog::FeatureCollection;
use foundation::bounds::LngLat;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SurfaceError {
    #[error("source `{0}` already exists")]
    DuplicateSource(String),
    #[error("source `{0}` does not exist")]
    MissingSource(String),
    #[error("layer `{0}` already exists")]
    DuplicateLayer(String),
    #[error("layer `{0}` does not exist")]
    MissingLayer(String),
    #[error("source `{source_id}` is still used by layer `{layer}`")]
    SourceInUse { source_id: String, layer: String },
    #[error("no `{0}` handler registered")]
    MissingHandler(String),
    #[error("popup or marker `{0}` does not exist")]
    MissingAnnotation(String),
    #[error("surface rejected `{0}`")]
    Rejected(String),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubLayerKind {
    Fill,
    Border,
}

/// One styled layer drawing a source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubLayerSpec {
    pub id: String,
    pub source: String,
    pub kind: SubLayerKind,
    pub color: String,
    pub opacity: f64,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HoverPhase {
    Enter,
    Leave,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Popup {
    pub id: String,
    pub coordinates: LngLat,
    pub html: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub id: String,
    pub coordinates: LngLat,
    pub color: String,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Easing {
    Linear,
    Smooth,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CameraMotion {
    /// Rotate in place to `bearing` (degrees).
    Rotate {
        bearing: f64,
        duration: Duration,
        easing: Easing,
    },
    FlyTo {
        center: LngLat,
        zoom: f64,
        duration: Duration,
    },
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct Camera {
    pub center: LngLat,
    pub zoom: f64,
    pub bearing: f64,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            center: LngLat::new(0.0, 20.0),
            zoom: 1.5,
            bearing: 0.0,
        }
    }
}

pub trait RenderSurface {
    fn has_source(&self, id: &str) -> bool;
    fn has_layer(&self, id: &str) -> bool;

    fn add_source(&mut self, id: &str, data: FeatureCollection) -> Result<(), SurfaceError>;
    fn remove_source(&mut self, id: &str) -> Result<(), SurfaceError>;
    /// Replace the features of an existing source; layers using it stay.
    fn set_source_data(&mut self, id: &str, data: FeatureCollection) -> Result<(), SurfaceError>;

    fn add_layer(&mut self, layer: SubLayerSpec) -> Result<(), SurfaceError>;
    fn remove_layer(&mut self, id: &str) -> Result<(), SurfaceError>;
    fn set_paint(&mut self, layer_id: &str, color: &str, opacity: f64) -> Result<(), SurfaceError>;

    /// Register the hover handler of `phase` on `layer_id`.
    fn on_hover(&mut self, layer_id: &str, phase: HoverPhase) -> Result<(), SurfaceError>;
    fn off_hover(&mut self, layer_id: &str, phase: HoverPhase) -> Result<(), SurfaceError>;

    fn show_popup(&mut self, popup: Popup) -> Result<(), SurfaceError>;
    fn remove_popup(&mut self, id: &str) -> Result<(), SurfaceError>;
    fn add_marker(&mut self, marker: Marker) -> Result<(), SurfaceError>;
    fn remove_marker(&mut self, id: &str) -> Result<(), SurfaceError>;

    fn camera(&self) -> Camera;
    /// Start a camera animation; returns without waiting for it to finish.
    fn animate(&mut self, motion: CameraMotion) -> Result<(), SurfaceError>;
}
