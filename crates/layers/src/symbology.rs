use std::collections::BTreeMap;

use serde_json::Value;

pub const DEFAULT_FILL_KEY: &str = "defaultFill";
pub const DEFAULT_FILL: &str = "#ABDDA4";

/// How a region's fill is chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FillSpec {
    Direct(String),
    ByKey(String),
    Default,
}

impl FillSpec {
    /// Reads a choropleth value: a bare color string, or an object with
    /// `color`, `fillColor` or `fillKey`, checked in that order.
    pub fn from_datum(datum: &Value) -> FillSpec {
        match datum {
            Value::String(s) => FillSpec::Direct(s.clone()),
            Value::Object(map) => {
                let text = |k: &str| map.get(k).and_then(|v| v.as_str()).map(str::to_string);
                if let Some(c) = text("color") {
                    FillSpec::Direct(c)
                } else if let Some(c) = text("fillColor") {
                    FillSpec::Direct(c)
                } else if let Some(k) = text("fillKey") {
                    FillSpec::ByKey(k)
                } else {
                    FillSpec::Default
                }
            }
            _ => FillSpec::Default,
        }
    }
}

/// Named fill palette. Always holds `defaultFill`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fills {
    colors: BTreeMap<String, String>,
}

impl Default for Fills {
    fn default() -> Self {
        let mut colors = BTreeMap::new();
        colors.insert(DEFAULT_FILL_KEY.to_string(), DEFAULT_FILL.to_string());
        Self { colors }
    }
}

impl Fills {
    /// Builds a palette; `None` when `defaultFill` is missing.
    pub fn new(colors: BTreeMap<String, String>) -> Option<Self> {
        colors.contains_key(DEFAULT_FILL_KEY).then_some(Self { colors })
    }

    pub fn default_fill(&self) -> &str {
        self.colors
            .get(DEFAULT_FILL_KEY)
            .map(|s| s.as_str())
            .unwrap_or(DEFAULT_FILL)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.colors.get(key).map(|s| s.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.colors.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Resolves a spec to a color; unknown keys fall back to the default.
    pub fn resolve(&self, spec: &FillSpec) -> String {
        match spec {
            FillSpec::Direct(c) => c.clone(),
            FillSpec::ByKey(k) => match self.get(k) {
                Some(c) => c.to_string(),
                None => {
                    tracing::warn!(fill_key = %k, "unknown fill key; using default fill");
                    self.default_fill().to_string()
                }
            },
            FillSpec::Default => self.default_fill().to_string(),
        }
    }
}
