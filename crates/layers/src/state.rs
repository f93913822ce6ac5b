use catalog::{Catalog, LayerTheme};
use foundation::ids::LayerId;
use foundation::time::Year;
use serde::{Deserialize, Serialize};

pub const DEFAULT_INTENSITY: f64 = 0.7;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subcategory {
    pub id: String,
    pub is_active: bool,
}

/// User-controlled state of one thematic layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveLayerState {
    pub id: LayerId,
    pub is_active: bool,
    /// Always within `[0, 1]`.
    pub intensity: f64,
    pub color: String,
    #[serde(default)]
    pub subcategories: Vec<Subcategory>,
}

impl ActiveLayerState {
    pub fn new(id: impl Into<LayerId>, color: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_active: false,
            intensity: DEFAULT_INTENSITY,
            color: color.into(),
            subcategories: Vec::new(),
        }
    }

    pub fn from_theme(theme: &LayerTheme) -> Self {
        Self {
            subcategories: theme
                .subcategories
                .iter()
                .map(|id| Subcategory {
                    id: id.clone(),
                    is_active: true,
                })
                .collect(),
            ..Self::new(theme.id.clone(), theme.color.clone())
        }
    }

    pub fn active(mut self) -> Self {
        self.is_active = true;
        self
    }
}

/// Everything the aggregator and the synchronizer read.
///
/// Never mutated in place: every operation returns a new value, so an
/// `Arc<ViewState>` snapshot held by a consumer stays valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    pub layers: Vec<ActiveLayerState>,
    pub year: Year,
}

impl ViewState {
    pub fn new(layers: Vec<ActiveLayerState>, year: Year) -> Self {
        Self { layers, year }
    }

    /// One inactive layer per catalog theme, in table order.
    pub fn from_catalog(catalog: &Catalog, year: Year) -> Self {
        Self::new(
            catalog.themes().iter().map(ActiveLayerState::from_theme).collect(),
            year,
        )
    }

    pub fn layer(&self, id: &LayerId) -> Option<&ActiveLayerState> {
        self.layers.iter().find(|l| &l.id == id)
    }

    /// Active layer ids in layer order.
    pub fn active_ids(&self) -> Vec<LayerId> {
        self.layers
            .iter()
            .filter(|l| l.is_active)
            .map(|l| l.id.clone())
            .collect()
    }

    pub fn active_layers(&self) -> impl Iterator<Item = &ActiveLayerState> {
        self.layers.iter().filter(|l| l.is_active)
    }

    pub fn toggle_layer(&self, id: &LayerId) -> Self {
        self.map_layer(id, |l| l.is_active = !l.is_active)
    }

    pub fn set_active(&self, id: &LayerId, active: bool) -> Self {
        self.map_layer(id, |l| l.is_active = active)
    }

    /// Non-finite intensities are ignored; others are clamped to `[0, 1]`.
    pub fn set_intensity(&self, id: &LayerId, intensity: f64) -> Self {
        if !intensity.is_finite() {
            return self.clone();
        }
        self.map_layer(id, |l| l.intensity = intensity.clamp(0.0, 1.0))
    }

    pub fn set_color(&self, id: &LayerId, color: &str) -> Self {
        self.map_layer(id, |l| l.color = color.to_string())
    }

    pub fn toggle_subcategory(&self, id: &LayerId, subcategory: &str) -> Self {
        self.map_layer(id, |l| {
            if let Some(s) = l.subcategories.iter_mut().find(|s| s.id == subcategory) {
                s.is_active = !s.is_active;
            }
        })
    }

    pub fn set_year(&self, year: Year) -> Self {
        Self {
            layers: self.layers.clone(),
            year,
        }
    }

    fn map_layer<F>(&self, id: &LayerId, f: F) -> Self
    where
        F: FnOnce(&mut ActiveLayerState),
    {
        let mut next = self.clone();
        if let Some(l) = next.layers.iter_mut().find(|l| &l.id == id) {
            f(l);
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use catalog::Catalog;
    use foundation::ids::LayerId;
    use foundation::time::Year;

    use super::{ActiveLayerState, DEFAULT_INTENSITY, ViewState};

    fn view() -> ViewState {
        ViewState::new(
            vec![
                ActiveLayerState::new("disease", "#e74c3c"),
                ActiveLayerState::new("housing", "#3498db"),
            ],
            Year(2020),
        )
    }

    #[test]
    fn toggle_returns_new_state() {
        let before = view();
        let after = before.toggle_layer(&LayerId::from("housing"));
        assert!(before.active_ids().is_empty());
        assert_eq!(after.active_ids(), vec![LayerId::from("housing")]);
        assert_ne!(before, after);
    }

    #[test]
    fn intensity_is_clamped() {
        let id = LayerId::from("disease");
        let v = view().set_intensity(&id, 1.7);
        assert_eq!(v.layer(&id).unwrap().intensity, 1.0);
        let v = v.set_intensity(&id, -0.2);
        assert_eq!(v.layer(&id).unwrap().intensity, 0.0);
        let v = view().set_intensity(&id, f64::NAN);
        assert_eq!(v.layer(&id).unwrap().intensity, DEFAULT_INTENSITY);
    }

    #[test]
    fn unknown_layer_leaves_state_equal() {
        let v = view();
        assert_eq!(v.toggle_layer(&LayerId::from("nope")), v);
    }

    #[test]
    fn active_ids_follow_layer_order() {
        let v = view()
            .toggle_layer(&LayerId::from("housing"))
            .toggle_layer(&LayerId::from("disease"));
        assert_eq!(
            v.active_ids(),
            vec![LayerId::from("disease"), LayerId::from("housing")]
        );
    }

    #[test]
    fn catalog_themes_seed_subcategories() {
        let c = Catalog::builtin().unwrap();
        let v = ViewState::from_catalog(&c, Year(2000));
        let id = LayerId::from("disease");
        let disease = v.layer(&id).unwrap();
        assert!(!disease.is_active);
        assert!(disease.subcategories.iter().all(|s| s.is_active));

        let first = disease.subcategories[0].id.clone();
        let v2 = v.toggle_subcategory(&id, &first);
        assert!(!v2.layer(&id).unwrap().subcategories[0].is_active);
        assert!(v.layer(&id).unwrap().subcategories[0].is_active);
    }
}
