use serde::{Deserialize, Serialize};

/// Thematic layer identifier (`"disease"`, `"housing"`, ...).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerId(String);

impl LayerId {
    pub fn new(id: impl Into<String>) -> Self {
        LayerId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn source_id(&self) -> String {
        format!("{}-source", self.0)
    }

    pub fn fill_layer_id(&self) -> String {
        format!("{}-fill", self.0)
    }

    pub fn border_layer_id(&self) -> String {
        format!("{}-border", self.0)
    }
}

impl std::fmt::Display for LayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LayerId {
    fn from(s: &str) -> Self {
        LayerId(s.to_string())
    }
}

impl From<String> for LayerId {
    fn from(s: String) -> Self {
        LayerId(s)
    }
}
