//! Static content tables: layer source configuration, layer themes and their
//! region weights, region boundaries, and the searchable historical content.
//!
//! Tables are embedded JSON parsed once at startup; after that the catalog is
//! read-only and can be shared freely.

pub mod events;
pub mod geometry;
pub mod search;
pub mod sources;
pub mod themes;

use std::collections::BTreeMap;

use foundation::ids::LayerId;
use foundation::time::Year;
use serde::Deserialize;

pub use events::*;
pub use geometry::*;
pub use search::*;
pub use sources::*;
pub use themes::*;

const LAYERS_JSON: &str = include_str!("../data/layers.json");
const THEMES_JSON: &str = include_str!("../data/themes.json");
const BOUNDARIES_JSON: &str = include_str!("../data/boundaries.json");
const CONTENT_JSON: &str = include_str!("../data/content.json");

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog table `{table}` is corrupt: {source}")]
    Corrupt {
        table: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("duplicate entry `{id}` in catalog table `{table}`")]
    Duplicate { table: &'static str, id: String },
    #[error("boundary feature without a name in catalog table `{table}`")]
    UnnamedBoundary { table: &'static str },
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub events: Vec<HistoricalEvent>,
    #[serde(default)]
    pub people: Vec<Person>,
    #[serde(default)]
    pub inventions: Vec<Invention>,
    #[serde(default)]
    pub locations: Vec<Location>,
}

#[derive(Debug, Default, Clone)]
pub struct Catalog {
    layers: BTreeMap<LayerId, LayerConfig>,
    themes: Vec<LayerTheme>,
    boundaries: BTreeMap<String, Feature>,
    content: Content,
}

fn parse<'a, T: Deserialize<'a>>(table: &'static str, text: &'a str) -> Result<T, CatalogError> {
    serde_json::from_str(text).map_err(|source| CatalogError::Corrupt { table, source })
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog built from the tables embedded in this crate.
    pub fn builtin() -> Result<Self, CatalogError> {
        let layers: Vec<LayerConfig> = parse("layers", LAYERS_JSON)?;
        let themes: Vec<LayerTheme> = parse("themes", THEMES_JSON)?;
        let boundaries: FeatureCollection = parse("boundaries", BOUNDARIES_JSON)?;
        let content: Content = parse("content", CONTENT_JSON)?;

        let mut catalog = Catalog::new();
        for layer in layers {
            if catalog.layers.contains_key(&layer.id) {
                return Err(CatalogError::Duplicate {
                    table: "layers",
                    id: layer.id.to_string(),
                });
            }
            catalog = catalog.with_layer(layer);
        }
        for theme in themes {
            if catalog.theme(&theme.id).is_some() {
                return Err(CatalogError::Duplicate {
                    table: "themes",
                    id: theme.id.to_string(),
                });
            }
            catalog = catalog.with_theme(theme);
        }
        for feature in boundaries.features {
            let Some(name) = feature.name().map(str::to_string) else {
                return Err(CatalogError::UnnamedBoundary {
                    table: "boundaries",
                });
            };
            catalog.boundaries.insert(name, feature);
        }
        catalog.content = content;

        tracing::debug!(
            layers = catalog.layers.len(),
            themes = catalog.themes.len(),
            boundaries = catalog.boundaries.len(),
            events = catalog.content.events.len(),
            "catalog loaded"
        );
        Ok(catalog)
    }

    pub fn with_layer(mut self, layer: LayerConfig) -> Self {
        self.layers.insert(layer.id.clone(), layer);
        self
    }

    pub fn with_theme(mut self, theme: LayerTheme) -> Self {
        self.themes.retain(|t| t.id != theme.id);
        self.themes.push(theme);
        self
    }

    /// Insert a boundary under the feature's `name` property.
    pub fn with_boundary(mut self, feature: Feature) -> Self {
        if let Some(name) = feature.name().map(str::to_string) {
            self.boundaries.insert(name, feature);
        }
        self
    }

    pub fn with_content(mut self, content: Content) -> Self {
        self.content = content;
        self
    }

    pub fn layer(&self, id: &LayerId) -> Option<&LayerConfig> {
        self.layers.get(id)
    }

    pub fn layers(&self) -> impl Iterator<Item = &LayerConfig> {
        self.layers.values()
    }

    pub fn theme(&self, id: &LayerId) -> Option<&LayerTheme> {
        self.themes.iter().find(|t| &t.id == id)
    }

    /// Themes in table order.
    pub fn themes(&self) -> &[LayerTheme] {
        &self.themes
    }

    pub fn boundary(&self, region: &str) -> Option<&Feature> {
        self.boundaries.get(region)
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    /// Hover lookup: see [`events::most_relevant`].
    pub fn events_for(&self, region: &str, year: Year) -> Vec<&HistoricalEvent> {
        most_relevant(&self.content.events, region, year, MAX_HOVER_EVENTS)
    }

    /// Search locations, events, people and inventions, in that order.
    pub fn search(&self, query: &str, limit: usize) -> Vec<SearchResult> {
        let c = &self.content;
        let candidates = c
            .locations
            .iter()
            .map(SearchResult::from)
            .chain(c.events.iter().map(SearchResult::from))
            .chain(c.people.iter().map(SearchResult::from))
            .chain(c.inventions.iter().map(SearchResult::from));
        search::search(candidates, query, limit)
    }
}
