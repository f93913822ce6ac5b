use foundation::ids::LayerId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionWeight {
    pub region: String,
    /// Static fallback intensity in `[0, 1]`.
    pub weight: f64,
}

/// Presentation defaults for a thematic layer and the regions it covers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerTheme {
    pub id: LayerId,
    pub name: String,
    pub color: String,
    pub regions: Vec<RegionWeight>,
    #[serde(default)]
    pub subcategories: Vec<String>,
}
