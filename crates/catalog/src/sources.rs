use foundation::ids::LayerId;
use serde::{Deserialize, Serialize};

/// Entities starting with this prefix are served by the regional statistics
/// proxy rather than the generic series provider.
///
/// Layout: `region/<endpoint-prefix>/<region-code>`, e.g. `region/census/06`.
pub const REGIONAL_PREFIX: &str = "region/";

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SourceKind {
    Series,
    Regional,
}

/// One fetchable `(entity, variable)` pair configured under a layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub entity: String,
    pub variable: String,
    pub display_name: String,
}

impl SourceRef {
    pub fn new(
        entity: impl Into<String>,
        variable: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            entity: entity.into(),
            variable: variable.into(),
            display_name: display_name.into(),
        }
    }

    pub fn kind(&self) -> SourceKind {
        if self.entity.starts_with(REGIONAL_PREFIX) {
            SourceKind::Regional
        } else {
            SourceKind::Series
        }
    }

    /// `(endpoint prefix, region code)` for regional sources.
    ///
    /// `region/census/06` yields `("census", "06")`. A missing region code
    /// yields an empty string.
    pub fn regional_route(&self) -> Option<(&str, &str)> {
        let rest = self.entity.strip_prefix(REGIONAL_PREFIX)?;
        let (prefix, code) = rest.split_once('/').unwrap_or((rest, ""));
        if prefix.is_empty() {
            return None;
        }
        Some((prefix, code))
    }

    /// Cache / point identifier: `entity:variable`.
    pub fn key(&self) -> String {
        format!("{}:{}", self.entity, self.variable)
    }
}

/// Static per-layer source configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerConfig {
    pub id: LayerId,
    pub name: String,
    pub sources: Vec<SourceRef>,
}
