use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use catalog::{Catalog, Feature, FeatureCollection, LayerTheme};
use compute::LayerDataMap;
use foundation::bounds::LngLat;
use foundation::ids::LayerId;
use foundation::time::Year;
use serde::Serialize;
use tracing::{debug, warn};

use crate::popup;
use crate::state::{ActiveLayerState, ViewState};
use crate::surface::{HoverPhase, Popup, RenderSurface, SubLayerKind, SubLayerSpec, SurfaceError};
use crate::symbology::OverlayPaint;

/// What one synchronization pass changed.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct SyncReport {
    pub added: Vec<LayerId>,
    pub repainted: Vec<LayerId>,
    /// Layers whose `realData` annotation changed; source data replaced in place.
    pub refreshed: Vec<LayerId>,
    pub removed: Vec<LayerId>,
    /// Active layers that could not be created this pass.
    pub skipped: Vec<LayerId>,
    pub errors: usize,
}

impl SyncReport {
    pub fn is_noop(&self) -> bool {
        self.added.is_empty()
            && self.repainted.is_empty()
            && self.refreshed.is_empty()
            && self.removed.is_empty()
            && self.errors == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Overlay {
    paint: OverlayPaint,
    real_data: bool,
    name: String,
}

/// Keeps the overlays on a [`RenderSurface`] equal to the active layers.
///
/// Each active layer owns a GeoJSON source, a fill layer and a border layer
/// (ids from [`LayerId`]) plus enter/leave hover handlers on the fill layer.
pub struct OverlaySynchronizer {
    catalog: Arc<Catalog>,
    present: BTreeMap<LayerId, Overlay>,
    hover_popups: BTreeMap<LayerId, String>,
    /// Removed layers whose teardown failed part-way; retried every pass.
    leftovers: BTreeSet<LayerId>,
}

impl OverlaySynchronizer {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog,
            present: BTreeMap::new(),
            hover_popups: BTreeMap::new(),
            leftovers: BTreeSet::new(),
        }
    }

    pub fn is_present(&self, id: &LayerId) -> bool {
        self.present.contains_key(id)
    }

    pub fn present_ids(&self) -> impl Iterator<Item = &LayerId> {
        self.present.keys()
    }

    /// Bring the surface in line with `view`.
    ///
    /// `data` only annotates features (`realData`); overlays are drawn from the
    /// static region weights whether or not it is available.
    pub fn sync<S>(&mut self, surface: &mut S, view: &ViewState, data: Option<&LayerDataMap>) -> SyncReport
    where
        S: RenderSurface + ?Sized,
    {
        let mut report = SyncReport::default();
        let desired: BTreeMap<&LayerId, &ActiveLayerState> =
            view.active_layers().map(|l| (&l.id, l)).collect();

        let stale: Vec<LayerId> = self
            .present
            .keys()
            .filter(|id| !desired.contains_key(id))
            .cloned()
            .collect();
        for id in stale {
            report.errors += self.remove(surface, &id);
            report.removed.push(id);
        }

        let retry: Vec<LayerId> = self
            .leftovers
            .iter()
            .filter(|id| !desired.contains_key(id) && !self.present.contains_key(id))
            .cloned()
            .collect();
        for id in retry {
            let errors = remove_leftovers(surface, &id);
            if errors == 0 {
                debug!(layer = %id, "overlay teardown completed");
                self.leftovers.remove(&id);
            }
            report.errors += errors;
        }

        for (id, layer) in desired {
            let paint = OverlayPaint::for_layer(layer);
            let real_data = data.is_some_and(|d| d.contains_key(id));
            let current = self
                .present
                .get(id)
                .map(|o| (o.paint == paint, o.real_data == real_data));
            let Some((same_paint, same_data)) = current else {
                match self.create(surface, layer, paint, real_data) {
                    Ok(()) => report.added.push(id.clone()),
                    Err(errors) => {
                        report.errors += errors;
                        report.skipped.push(id.clone());
                    }
                }
                continue;
            };
            if !same_paint {
                report.errors += repaint(surface, id, &paint);
                if let Some(o) = self.present.get_mut(id) {
                    o.paint = paint;
                }
                report.repainted.push(id.clone());
            }
            if !same_data {
                match self.refresh_data(surface, id, real_data) {
                    Ok(()) => report.refreshed.push(id.clone()),
                    Err(errors) => report.errors += errors,
                }
            }
        }

        if !report.is_noop() {
            debug!(
                added = report.added.len(),
                repainted = report.repainted.len(),
                refreshed = report.refreshed.len(),
                removed = report.removed.len(),
                skipped = report.skipped.len(),
                errors = report.errors,
                "overlay sync"
            );
        }
        report
    }

    /// Tear down every overlay this synchronizer created.
    pub fn clear<S>(&mut self, surface: &mut S) -> usize
    where
        S: RenderSurface + ?Sized,
    {
        let ids: Vec<LayerId> = self.present.keys().cloned().collect();
        ids.iter().map(|id| self.remove(surface, id)).sum()
    }

    /// Hover entered `region` of `layer`: show its most relevant events.
    ///
    /// Any other hover popup is closed first. Returns `false` when the layer
    /// has no overlay.
    pub fn on_hover_enter<S>(
        &mut self,
        surface: &mut S,
        layer: &LayerId,
        region: &str,
        at: LngLat,
        year: Year,
    ) -> bool
    where
        S: RenderSurface + ?Sized,
    {
        let Some(overlay) = self.present.get(layer) else {
            return false;
        };
        let events = self.catalog.events_for(region, year);
        let html = popup::hover_html(&overlay.name, region, year, &events);

        let owners: Vec<LayerId> = self.hover_popups.keys().cloned().collect();
        for owner in owners {
            self.close_hover_popup(surface, &owner);
        }

        let id = format!("{layer}-hover");
        let popup = Popup {
            id: id.clone(),
            coordinates: at,
            html,
        };
        match surface.show_popup(popup) {
            Ok(()) => {
                self.hover_popups.insert(layer.clone(), id);
                true
            }
            Err(e) => {
                warn!(layer = %layer, error = %e, "failed to show hover popup");
                false
            }
        }
    }

    pub fn on_hover_leave<S>(&mut self, surface: &mut S, layer: &LayerId)
    where
        S: RenderSurface + ?Sized,
    {
        self.close_hover_popup(surface, layer);
    }

    fn close_hover_popup<S>(&mut self, surface: &mut S, layer: &LayerId) -> usize
    where
        S: RenderSurface + ?Sized,
    {
        let Some(id) = self.hover_popups.remove(layer) else {
            return 0;
        };
        logged(surface.remove_popup(&id), layer, "remove hover popup")
    }

    /// Replace the source features so `realData` matches; the flag is kept
    /// unchanged on failure so the next pass tries again.
    fn refresh_data<S>(&mut self, surface: &mut S, id: &LayerId, real_data: bool) -> Result<(), usize>
    where
        S: RenderSurface + ?Sized,
    {
        let Some(theme) = self.catalog.theme(id) else {
            return Err(0);
        };
        let features = region_features(&self.catalog, theme, real_data);
        if let Err(e) = surface.set_source_data(&id.source_id(), features) {
            warn!(layer = %id, error = %e, "failed to update overlay source data");
            return Err(1);
        }
        if let Some(o) = self.present.get_mut(id) {
            o.real_data = real_data;
        }
        Ok(())
    }

    fn create<S>(
        &mut self,
        surface: &mut S,
        layer: &ActiveLayerState,
        paint: OverlayPaint,
        real_data: bool,
    ) -> Result<(), usize>
    where
        S: RenderSurface + ?Sized,
    {
        let id = &layer.id;
        let Some(theme) = self.catalog.theme(id) else {
            warn!(layer = %id, "no region table for layer, overlay skipped");
            return Err(0);
        };
        let features = region_features(&self.catalog, theme, real_data);
        if features.is_empty() {
            warn!(layer = %id, "no boundary geometry resolved, overlay skipped");
            return Err(0);
        }

        self.leftovers.remove(id);
        let mut errors = remove_leftovers(surface, id);

        let source_id = id.source_id();
        if let Err(e) = surface.add_source(&source_id, features) {
            warn!(layer = %id, error = %e, "failed to add overlay source");
            return Err(errors + 1);
        }

        let subs = [
            (id.fill_layer_id(), SubLayerKind::Fill, paint.fill_opacity),
            (id.border_layer_id(), SubLayerKind::Border, paint.border_opacity),
        ];
        let mut added: Vec<String> = Vec::new();
        for (sub_id, kind, opacity) in subs {
            let spec = SubLayerSpec {
                id: sub_id.clone(),
                source: source_id.clone(),
                kind,
                color: paint.color.clone(),
                opacity,
            };
            if let Err(e) = surface.add_layer(spec) {
                warn!(layer = %id, sub_layer = %sub_id, error = %e, "failed to add overlay layer");
                errors += 1;
                for sub in added.iter().rev() {
                    errors += logged(surface.remove_layer(sub), id, "roll back layer");
                }
                errors += logged(surface.remove_source(&source_id), id, "roll back source");
                return Err(errors);
            }
            added.push(sub_id);
        }

        let fill = id.fill_layer_id();
        for phase in [HoverPhase::Enter, HoverPhase::Leave] {
            errors += logged(surface.on_hover(&fill, phase), id, "register hover handler");
        }
        if errors > 0 {
            debug!(layer = %id, errors, "overlay created with errors");
        }

        self.present.insert(
            id.clone(),
            Overlay {
                paint,
                real_data,
                name: theme.name.clone(),
            },
        );
        Ok(())
    }

    /// Handlers, then popup, then layers, then source.
    fn remove<S>(&mut self, surface: &mut S, id: &LayerId) -> usize
    where
        S: RenderSurface + ?Sized,
    {
        self.present.remove(id);
        let fill = id.fill_layer_id();
        let mut errors = 0;
        for phase in [HoverPhase::Enter, HoverPhase::Leave] {
            errors += logged(surface.off_hover(&fill, phase), id, "unregister hover handler");
        }
        errors += self.close_hover_popup(surface, id);
        errors += logged(surface.remove_layer(&fill), id, "remove fill layer");
        errors += logged(surface.remove_layer(&id.border_layer_id()), id, "remove border layer");
        errors += logged(surface.remove_source(&id.source_id()), id, "remove source");
        if errors > 0 {
            self.leftovers.insert(id.clone());
        }
        errors
    }
}

fn repaint<S>(surface: &mut S, id: &LayerId, paint: &OverlayPaint) -> usize
where
    S: RenderSurface + ?Sized,
{
    logged(
        surface.set_paint(&id.fill_layer_id(), &paint.color, paint.fill_opacity),
        id,
        "repaint fill layer",
    ) + logged(
        surface.set_paint(&id.border_layer_id(), &paint.color, paint.border_opacity),
        id,
        "repaint border layer",
    )
}

/// Overlay entities still on the surface: orphans from someone else, or
/// what a failed teardown left behind.
fn remove_leftovers<S>(surface: &mut S, id: &LayerId) -> usize
where
    S: RenderSurface + ?Sized,
{
    let mut errors = 0;
    for sub in [id.fill_layer_id(), id.border_layer_id()] {
        if surface.has_layer(&sub) {
            warn!(layer = %id, sub_layer = %sub, "removing leftover overlay layer");
            errors += logged(surface.remove_layer(&sub), id, "remove leftover layer");
        }
    }
    let source = id.source_id();
    if surface.has_source(&source) {
        warn!(layer = %id, "removing leftover overlay source");
        errors += logged(surface.remove_source(&source), id, "remove leftover source");
    }
    errors
}

fn region_features(catalog: &Catalog, theme: &LayerTheme, real_data: bool) -> FeatureCollection {
    let features: Vec<Feature> = theme
        .regions
        .iter()
        .filter_map(|r| {
            let Some(boundary) = catalog.boundary(&r.region) else {
                warn!(layer = %theme.id, region = %r.region, "no boundary geometry for region");
                return None;
            };
            Some(
                boundary
                    .clone()
                    .with_property("region", r.region.as_str())
                    .with_property("weight", r.weight)
                    .with_property("layer", theme.id.as_str())
                    .with_property("realData", real_data),
            )
        })
        .collect();
    FeatureCollection::new(features)
}

fn logged(result: Result<(), SurfaceError>, layer: &LayerId, op: &str) -> usize {
    match result {
        Ok(()) => 0,
        Err(e) => {
            warn!(layer = %layer, error = %e, "{op} failed");
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use catalog::{Catalog, FeatureCollection, Geometry};
    use compute::LayerDataMap;
    use foundation::bounds::LngLat;
    use foundation::ids::LayerId;
    use foundation::time::Year;
    use pretty_assertions::assert_eq;

    use super::OverlaySynchronizer;
    use crate::headless::HeadlessSurface;
    use crate::state::ViewState;
    use crate::surface::{HoverPhase, RenderSurface, SubLayerKind, SubLayerSpec};

    fn setup() -> (OverlaySynchronizer, HeadlessSurface, ViewState) {
        let catalog = Arc::new(Catalog::builtin().unwrap());
        let view = ViewState::from_catalog(&catalog, Year(2010));
        (OverlaySynchronizer::new(catalog), HeadlessSurface::new(), view)
    }

    fn id(s: &str) -> LayerId {
        LayerId::from(s)
    }

    #[test]
    fn activation_creates_source_layers_and_handlers() {
        let (mut sync, mut surface, view) = setup();
        let view = view.toggle_layer(&id("housing")).set_intensity(&id("housing"), 0.5);
        let report = sync.sync(&mut surface, &view, None);
        assert_eq!(report.added, vec![id("housing")]);
        assert_eq!(report.errors, 0);

        let source = surface.source("housing-source").unwrap();
        assert_eq!(source.len(), 4);
        let first = &source.features[0];
        assert_eq!(first.properties["layer"], "housing");
        assert_eq!(first.properties["realData"], false);
        assert!(first.properties.contains_key("weight"));

        let fill = surface.layer("housing-fill").unwrap();
        assert_eq!(fill.kind, SubLayerKind::Fill);
        assert!((fill.opacity - 0.2).abs() < 1e-12);
        let border = surface.layer("housing-border").unwrap();
        assert!((border.opacity - 0.3).abs() < 1e-12);
        assert!(surface.has_hover("housing-fill", HoverPhase::Enter));
        assert!(surface.has_hover("housing-fill", HoverPhase::Leave));
    }

    #[test]
    fn second_pass_is_a_noop() {
        let (mut sync, mut surface, view) = setup();
        let view = view.toggle_layer(&id("housing")).toggle_layer(&id("economy"));
        sync.sync(&mut surface, &view, None);
        let calls = surface.calls();

        let report = sync.sync(&mut surface, &view, None);
        assert!(report.is_noop());
        assert_eq!(surface.calls(), calls);
    }

    #[test]
    fn activate_then_deactivate_restores_surface() {
        let (mut sync, mut surface, view) = setup();
        let before = surface.snapshot().clone();

        let on = view.toggle_layer(&id("disease"));
        sync.sync(&mut surface, &on, None);
        assert!(surface.has_source("disease-source"));

        let off = on.toggle_layer(&id("disease"));
        let report = sync.sync(&mut surface, &off, None);
        assert_eq!(report.removed, vec![id("disease")]);
        assert_eq!(report.errors, 0);
        assert_eq!(surface.snapshot(), &before);
    }

    #[test]
    fn deactivating_never_active_layer_touches_nothing() {
        let (mut sync, mut surface, view) = setup();
        let report = sync.sync(&mut surface, &view.set_active(&id("seismic"), false), None);
        assert!(report.is_noop());
        assert_eq!(surface.calls().total(), 0);
    }

    #[test]
    fn intensity_change_only_repaints() {
        let (mut sync, mut surface, view) = setup();
        let view = view.toggle_layer(&id("economy"));
        sync.sync(&mut surface, &view, None);
        let before = surface.calls();

        let view = view.set_intensity(&id("economy"), 1.0).set_color(&id("economy"), "#ffffff");
        let report = sync.sync(&mut surface, &view, None);
        assert_eq!(report.repainted, vec![id("economy")]);

        let after = surface.calls();
        assert_eq!(after.add_source, before.add_source);
        assert_eq!(after.add_layer, before.add_layer);
        assert_eq!(after.set_paint, before.set_paint + 2);
        let fill = surface.layer("economy-fill").unwrap();
        assert_eq!(fill.color, "#ffffff");
        assert!((fill.opacity - 0.4).abs() < 1e-12);
        assert!((surface.layer("economy-border").unwrap().opacity - 0.6).abs() < 1e-12);
    }

    #[test]
    fn missing_geometry_is_dropped_not_fatal() {
        let (mut sync, mut surface, view) = setup();
        // Kenya has no boundary in the builtin table.
        let view = view.toggle_layer(&id("disease"));
        let report = sync.sync(&mut surface, &view, None);
        assert_eq!(report.added, vec![id("disease")]);
        let source = surface.source("disease-source").unwrap();
        assert!(source.features.iter().all(|f| f.properties["region"] != "Kenya"));
    }

    #[test]
    fn layer_without_geometry_is_retried_each_pass() {
        let catalog = Arc::new(Catalog::builtin().unwrap().with_theme(catalog::LayerTheme {
            id: id("ghost"),
            name: "Ghost".to_string(),
            color: "#000000".to_string(),
            regions: vec![catalog::RegionWeight {
                region: "Atlantis".to_string(),
                weight: 1.0,
            }],
            subcategories: Vec::new(),
        }));
        let view = ViewState::from_catalog(&catalog, Year(2000)).toggle_layer(&id("ghost"));
        let mut sync = OverlaySynchronizer::new(catalog);
        let mut surface = HeadlessSurface::new();

        for _ in 0..2 {
            let report = sync.sync(&mut surface, &view, None);
            assert_eq!(report.skipped, vec![id("ghost")]);
        }
        assert!(!sync.is_present(&id("ghost")));
        assert_eq!(surface.calls().total(), 0);
    }

    #[test]
    fn orphaned_source_is_replaced() {
        let (mut sync, mut surface, view) = setup();
        surface
            .add_source("economy-source", FeatureCollection::new(Vec::new()))
            .unwrap();
        surface
            .add_layer(SubLayerSpec {
                id: "economy-fill".to_string(),
                source: "economy-source".to_string(),
                kind: SubLayerKind::Fill,
                color: "#123456".to_string(),
                opacity: 1.0,
            })
            .unwrap();

        let report = sync.sync(&mut surface, &view.toggle_layer(&id("economy")), None);
        assert_eq!(report.added, vec![id("economy")]);
        assert_eq!(report.errors, 0);
        assert!(!surface.source("economy-source").unwrap().is_empty());
        assert_ne!(surface.layer("economy-fill").unwrap().color, "#123456");
    }

    #[test]
    fn surface_failure_on_one_layer_does_not_block_others() {
        let catalog = Arc::new(Catalog::builtin().unwrap());
        let view = ViewState::from_catalog(&catalog, Year(2000))
            .toggle_layer(&id("housing"))
            .toggle_layer(&id("economy"));
        let mut sync = OverlaySynchronizer::new(catalog);
        let mut surface = HeadlessSurface::new().reject("housing-border");

        let report = sync.sync(&mut surface, &view, None);
        assert_eq!(report.added, vec![id("economy")]);
        assert_eq!(report.skipped, vec![id("housing")]);
        assert!(report.errors > 0);
        // Partial creation was rolled back.
        assert!(!surface.has_source("housing-source"));
        assert!(!surface.has_layer("housing-fill"));
        assert!(surface.has_source("economy-source"));
    }

    #[test]
    fn real_data_flag_follows_aggregation() {
        let (mut sync, mut surface, view) = setup();
        let mut data = LayerDataMap::new();
        data.insert(id("economy"), Vec::new());
        sync.sync(&mut surface, &view.toggle_layer(&id("economy")), Some(&data));
        let source = surface.source("economy-source").unwrap();
        assert!(source.features.iter().all(|f| f.properties["realData"] == true));
    }

    #[test]
    fn real_data_flag_is_updated_in_place_when_data_goes_away() {
        let (mut sync, mut surface, view) = setup();
        let housing = id("housing");
        let mut data = LayerDataMap::new();
        data.insert(housing.clone(), Vec::new());

        let view = view.toggle_layer(&housing).set_year(Year(2020));
        sync.sync(&mut surface, &view, Some(&data));
        let before = surface.calls();

        let report = sync.sync(&mut surface, &view.set_year(Year(1990)), Some(&LayerDataMap::new()));
        assert_eq!(report.refreshed, vec![housing.clone()]);
        assert!(report.repainted.is_empty());
        assert_eq!(report.errors, 0);

        let source = surface.source("housing-source").unwrap();
        assert_eq!(source.len(), 4);
        assert!(source.features.iter().all(|f| f.properties["realData"] == false));
        let after = surface.calls();
        assert_eq!(after.add_source, before.add_source);
        assert_eq!(after.add_layer, before.add_layer);
        assert_eq!(after.set_source_data, before.set_source_data + 1);
        assert!(surface.has_layer("housing-fill"));

        // Same flag again: nothing to do.
        let report = sync.sync(&mut surface, &view.set_year(Year(1991)), Some(&LayerDataMap::new()));
        assert!(report.is_noop());
    }

    #[test]
    fn failed_teardown_is_retried_next_pass() {
        let (mut sync, mut surface, view) = setup();
        let on = view.toggle_layer(&id("housing"));
        sync.sync(&mut surface, &on, None);

        let mut surface = surface.reject("housing-border");
        let off = on.toggle_layer(&id("housing"));
        let report = sync.sync(&mut surface, &off, None);
        assert_eq!(report.removed, vec![id("housing")]);
        assert!(report.errors > 0);
        assert!(surface.has_layer("housing-border"));
        assert!(surface.has_source("housing-source"));

        surface.allow("housing-border");
        let report = sync.sync(&mut surface, &off, None);
        assert_eq!(report.errors, 0);
        assert!(!surface.has_layer("housing-border"));
        assert!(!surface.has_source("housing-source"));

        let calls = surface.calls();
        assert!(sync.sync(&mut surface, &off, None).is_noop());
        assert_eq!(surface.calls(), calls);
    }

    #[test]
    fn hover_shows_relevant_event_and_teardown_removes_it() {
        let (mut sync, mut surface, view) = setup();
        let on = view.toggle_layer(&id("seismic"));
        sync.sync(&mut surface, &on, None);

        let shown = sync.on_hover_enter(
            &mut surface,
            &id("seismic"),
            "Japan",
            LngLat::new(140.0, 38.0),
            Year(2010),
        );
        assert!(shown);
        let popup = surface.popup("seismic-hover").unwrap();
        assert!(popup.html.contains("Tohoku"));

        sync.sync(&mut surface, &on.toggle_layer(&id("seismic")), None);
        assert!(surface.popup("seismic-hover").is_none());
        assert!(surface.snapshot().hover_handlers.is_empty());
    }

    #[test]
    fn hover_leave_removes_popup() {
        let (mut sync, mut surface, view) = setup();
        sync.sync(&mut surface, &view.toggle_layer(&id("housing")), None);
        sync.on_hover_enter(&mut surface, &id("housing"), "Texas", LngLat::new(-99.0, 31.0), Year(1900));
        assert!(surface.popup("housing-hover").is_some());
        sync.on_hover_leave(&mut surface, &id("housing"));
        assert!(surface.snapshot().popups.is_empty());
    }

    #[test]
    fn hover_on_absent_layer_is_ignored() {
        let (mut sync, mut surface, _) = setup();
        assert!(!sync.on_hover_enter(
            &mut surface,
            &id("housing"),
            "Texas",
            LngLat::new(0.0, 0.0),
            Year(2000)
        ));
        assert_eq!(surface.calls().total(), 0);
    }

    #[test]
    fn multipolygon_boundaries_are_kept() {
        let (mut sync, mut surface, view) = setup();
        sync.sync(&mut surface, &view.toggle_layer(&id("seismic")), None);
        let source = surface.source("seismic-source").unwrap();
        assert!(
            source
                .features
                .iter()
                .any(|f| matches!(f.geometry, Geometry::MultiPolygon { .. }))
        );
    }
}
