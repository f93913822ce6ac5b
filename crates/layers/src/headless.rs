use std::collections::{BTreeMap, BTreeSet};

use catalog::FeatureCollection;
use serde::Serialize;

use crate::surface::{
    Camera, CameraMotion, HoverPhase, Marker, Popup, RenderSurface, SubLayerSpec, SurfaceError,
};

/// Number of calls per mutating operation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SurfaceCalls {
    pub add_source: usize,
    pub remove_source: usize,
    pub set_source_data: usize,
    pub add_layer: usize,
    pub remove_layer: usize,
    pub set_paint: usize,
    pub on_hover: usize,
    pub off_hover: usize,
    pub show_popup: usize,
    pub remove_popup: usize,
    pub add_marker: usize,
    pub remove_marker: usize,
    pub animate: usize,
}

impl SurfaceCalls {
    pub fn total(&self) -> usize {
        self.add_source
            + self.remove_source
            + self.set_source_data
            + self.add_layer
            + self.remove_layer
            + self.set_paint
            + self.on_hover
            + self.off_hover
            + self.show_popup
            + self.remove_popup
            + self.add_marker
            + self.remove_marker
            + self.animate
    }
}

/// Observable content of a surface, without call history.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct SurfaceSnapshot {
    pub sources: BTreeMap<String, FeatureCollection>,
    pub layers: Vec<SubLayerSpec>,
    pub hover_handlers: BTreeSet<(String, HoverPhase)>,
    pub popups: BTreeMap<String, Popup>,
    pub markers: BTreeMap<String, Marker>,
}

/// In-memory surface with the same consistency rules as a map widget:
/// ids are unique, a layer needs its source, a source in use cannot be
/// removed.
#[derive(Debug, Default)]
pub struct HeadlessSurface {
    state: SurfaceSnapshot,
    camera: Camera,
    motions: Vec<CameraMotion>,
    calls: SurfaceCalls,
    reject: BTreeSet<String>,
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation on `id` fail with [`SurfaceError::Rejected`].
    pub fn reject(mut self, id: impl Into<String>) -> Self {
        self.reject.insert(id.into());
        self
    }

    pub fn allow(&mut self, id: &str) {
        self.reject.remove(id);
    }

    pub fn calls(&self) -> SurfaceCalls {
        self.calls
    }

    pub fn snapshot(&self) -> &SurfaceSnapshot {
        &self.state
    }

    pub fn source(&self, id: &str) -> Option<&FeatureCollection> {
        self.state.sources.get(id)
    }

    pub fn layer(&self, id: &str) -> Option<&SubLayerSpec> {
        self.state.layers.iter().find(|l| l.id == id)
    }

    pub fn popup(&self, id: &str) -> Option<&Popup> {
        self.state.popups.get(id)
    }

    pub fn marker(&self, id: &str) -> Option<&Marker> {
        self.state.markers.get(id)
    }

    pub fn has_hover(&self, layer_id: &str, phase: HoverPhase) -> bool {
        self.state
            .hover_handlers
            .contains(&(layer_id.to_string(), phase))
    }

    pub fn motions(&self) -> &[CameraMotion] {
        &self.motions
    }

    fn check(&self, id: &str) -> Result<(), SurfaceError> {
        if self.reject.contains(id) {
            return Err(SurfaceError::Rejected(id.to_string()));
        }
        Ok(())
    }
}

impl RenderSurface for HeadlessSurface {
    fn has_source(&self, id: &str) -> bool {
        self.state.sources.contains_key(id)
    }

    fn has_layer(&self, id: &str) -> bool {
        self.layer(id).is_some()
    }

    fn add_source(&mut self, id: &str, data: FeatureCollection) -> Result<(), SurfaceError> {
        self.calls.add_source += 1;
        self.check(id)?;
        if self.has_source(id) {
            return Err(SurfaceError::DuplicateSource(id.to_string()));
        }
        self.state.sources.insert(id.to_string(), data);
        Ok(())
    }

    fn remove_source(&mut self, id: &str) -> Result<(), SurfaceError> {
        self.calls.remove_source += 1;
        self.check(id)?;
        if let Some(l) = self.state.layers.iter().find(|l| l.source == id) {
            return Err(SurfaceError::SourceInUse {
                source_id: id.to_string(),
                layer: l.id.clone(),
            });
        }
        self.state
            .sources
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| SurfaceError::MissingSource(id.to_string()))
    }

    fn set_source_data(&mut self, id: &str, data: FeatureCollection) -> Result<(), SurfaceError> {
        self.calls.set_source_data += 1;
        self.check(id)?;
        let source = self
            .state
            .sources
            .get_mut(id)
            .ok_or_else(|| SurfaceError::MissingSource(id.to_string()))?;
        *source = data;
        Ok(())
    }

    fn add_layer(&mut self, layer: SubLayerSpec) -> Result<(), SurfaceError> {
        self.calls.add_layer += 1;
        self.check(&layer.id)?;
        if self.has_layer(&layer.id) {
            return Err(SurfaceError::DuplicateLayer(layer.id));
        }
        if !self.has_source(&layer.source) {
            return Err(SurfaceError::MissingSource(layer.source));
        }
        self.state.layers.push(layer);
        Ok(())
    }

    fn remove_layer(&mut self, id: &str) -> Result<(), SurfaceError> {
        self.calls.remove_layer += 1;
        self.check(id)?;
        let before = self.state.layers.len();
        self.state.layers.retain(|l| l.id != id);
        if self.state.layers.len() == before {
            return Err(SurfaceError::MissingLayer(id.to_string()));
        }
        Ok(())
    }

    fn set_paint(&mut self, layer_id: &str, color: &str, opacity: f64) -> Result<(), SurfaceError> {
        self.calls.set_paint += 1;
        self.check(layer_id)?;
        let layer = self
            .state
            .layers
            .iter_mut()
            .find(|l| l.id == layer_id)
            .ok_or_else(|| SurfaceError::MissingLayer(layer_id.to_string()))?;
        layer.color = color.to_string();
        layer.opacity = opacity;
        Ok(())
    }

    fn on_hover(&mut self, layer_id: &str, phase: HoverPhase) -> Result<(), SurfaceError> {
        self.calls.on_hover += 1;
        self.check(layer_id)?;
        if !self.has_layer(layer_id) {
            return Err(SurfaceError::MissingLayer(layer_id.to_string()));
        }
        self.state
            .hover_handlers
            .insert((layer_id.to_string(), phase));
        Ok(())
    }

    fn off_hover(&mut self, layer_id: &str, phase: HoverPhase) -> Result<(), SurfaceError> {
        self.calls.off_hover += 1;
        self.check(layer_id)?;
        if !self
            .state
            .hover_handlers
            .remove(&(layer_id.to_string(), phase))
        {
            return Err(SurfaceError::MissingHandler(format!("{layer_id}:{phase:?}")));
        }
        Ok(())
    }

    fn show_popup(&mut self, popup: Popup) -> Result<(), SurfaceError> {
        self.calls.show_popup += 1;
        self.check(&popup.id)?;
        self.state.popups.insert(popup.id.clone(), popup);
        Ok(())
    }

    fn remove_popup(&mut self, id: &str) -> Result<(), SurfaceError> {
        self.calls.remove_popup += 1;
        self.state
            .popups
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| SurfaceError::MissingAnnotation(id.to_string()))
    }

    fn add_marker(&mut self, marker: Marker) -> Result<(), SurfaceError> {
        self.calls.add_marker += 1;
        self.check(&marker.id)?;
        self.state.markers.insert(marker.id.clone(), marker);
        Ok(())
    }

    fn remove_marker(&mut self, id: &str) -> Result<(), SurfaceError> {
        self.calls.remove_marker += 1;
        self.state
            .markers
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| SurfaceError::MissingAnnotation(id.to_string()))
    }

    fn camera(&self) -> Camera {
        self.camera
    }

    // Animations complete instantly.
    fn animate(&mut self, motion: CameraMotion) -> Result<(), SurfaceError> {
        self.calls.animate += 1;
        match &motion {
            CameraMotion::Rotate { bearing, .. } => self.camera.bearing = *bearing,
            CameraMotion::FlyTo { center, zoom, .. } => {
                self.camera.center = *center;
                self.camera.zoom = *zoom;
            }
        }
        self.motions.push(motion);
        Ok(())
    }
}
