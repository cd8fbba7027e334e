//! Per-instance overlay registry.
//!
//! Each map owns its table; registering a plugin on one map never affects
//! another. Built-ins are `bubbles`, `arc`, `labels`, `legend` and
//! `graticule`.

use std::collections::BTreeMap;
use std::sync::Arc;

use layers::arcs::{self, ArcConfig};
use layers::bubbles::{self, BubblesConfig};
use layers::context::{OverlayError, OverlayOutcome, RenderContext, expect_array};
use layers::graticule::{self, Graticule};
use layers::labels::{self, LabelsConfig};
use layers::layer::Layer;
use layers::legend::{self, LegendData};
use serde_json::Value;

use crate::options::{ArcOptions, BubblesOptions, LabelsOptions};

/// Instance-level overlay settings that caller options merge over.
#[derive(Debug, Clone, Default)]
pub struct OverlayDefaults {
    pub bubbles: BubblesConfig,
    pub arcs: ArcConfig,
    pub labels: LabelsConfig,
    pub graticule: Graticule,
}

/// Caller options for one overlay invocation.
#[derive(Debug, Clone)]
pub enum OverlayOptions {
    Bubbles(BubblesOptions),
    Arcs(ArcOptions),
    Labels(LabelsOptions),
    /// Free-form options for registered plugins.
    Custom(Value),
}

/// Options after merging over the instance defaults.
#[derive(Debug, Clone)]
pub enum OverlayConfig {
    Bubbles(BubblesConfig),
    Arcs(ArcConfig),
    Labels(LabelsConfig),
    Graticule(Graticule),
    Legend,
    Custom(Value),
}

/// A named overlay. Renderers are stateless; everything they draw lives in
/// the layer they are handed.
pub trait OverlayRenderer: Send + Sync {
    /// Rejects unusable input before anything is drawn.
    fn validate(&self, _data: &Value) -> Result<(), OverlayError> {
        Ok(())
    }

    /// Merges caller options over the instance defaults.
    fn resolve(&self, _defaults: &OverlayDefaults, options: Option<&OverlayOptions>) -> OverlayConfig {
        match options {
            Some(OverlayOptions::Custom(v)) => OverlayConfig::Custom(v.clone()),
            _ => OverlayConfig::Custom(Value::Null),
        }
    }

    /// Placed directly below the region layer rather than on top.
    fn below_regions(&self) -> bool {
        false
    }

    fn render(
        &self,
        ctx: &RenderContext<'_>,
        layer: &mut Layer,
        data: &Value,
        config: &OverlayConfig,
    ) -> Result<OverlayOutcome, OverlayError>;
}

fn mismatched(overlay: &str) -> OverlayError {
    OverlayError {
        overlay: overlay.to_string(),
        reason: "options resolved for a different overlay".to_string(),
    }
}

fn warn_ignored(overlay: &str, options: Option<&OverlayOptions>) {
    if options.is_some() {
        tracing::warn!(overlay, "options of another overlay kind ignored; using defaults");
    }
}

pub struct BubblesOverlay;

impl OverlayRenderer for BubblesOverlay {
    fn validate(&self, data: &Value) -> Result<(), OverlayError> {
        expect_array("bubbles", data).map(|_| ())
    }

    fn resolve(&self, defaults: &OverlayDefaults, options: Option<&OverlayOptions>) -> OverlayConfig {
        match options {
            Some(OverlayOptions::Bubbles(o)) => OverlayConfig::Bubbles(o.merged_over(&defaults.bubbles)),
            other => {
                warn_ignored("bubbles", other);
                OverlayConfig::Bubbles(defaults.bubbles.clone())
            }
        }
    }

    fn render(
        &self,
        ctx: &RenderContext<'_>,
        layer: &mut Layer,
        data: &Value,
        config: &OverlayConfig,
    ) -> Result<OverlayOutcome, OverlayError> {
        let OverlayConfig::Bubbles(config) = config else {
            return Err(mismatched("bubbles"));
        };
        let items = expect_array("bubbles", data)?;
        Ok(bubbles::render(ctx, layer, items, config))
    }
}

pub struct ArcOverlay;

impl OverlayRenderer for ArcOverlay {
    fn validate(&self, data: &Value) -> Result<(), OverlayError> {
        expect_array("arcs", data).map(|_| ())
    }

    fn resolve(&self, defaults: &OverlayDefaults, options: Option<&OverlayOptions>) -> OverlayConfig {
        match options {
            Some(OverlayOptions::Arcs(o)) => OverlayConfig::Arcs(o.merged_over(&defaults.arcs)),
            other => {
                warn_ignored("arc", other);
                OverlayConfig::Arcs(defaults.arcs.clone())
            }
        }
    }

    fn render(
        &self,
        ctx: &RenderContext<'_>,
        layer: &mut Layer,
        data: &Value,
        config: &OverlayConfig,
    ) -> Result<OverlayOutcome, OverlayError> {
        let OverlayConfig::Arcs(config) = config else {
            return Err(mismatched("arc"));
        };
        let items = expect_array("arcs", data)?;
        Ok(arcs::render(ctx, layer, items, config))
    }
}

pub struct LabelsOverlay;

impl OverlayRenderer for LabelsOverlay {
    fn resolve(&self, defaults: &OverlayDefaults, options: Option<&OverlayOptions>) -> OverlayConfig {
        match options {
            Some(OverlayOptions::Labels(o)) => OverlayConfig::Labels(o.merged_over(&defaults.labels)),
            other => {
                warn_ignored("labels", other);
                OverlayConfig::Labels(defaults.labels.clone())
            }
        }
    }

    fn render(
        &self,
        ctx: &RenderContext<'_>,
        layer: &mut Layer,
        _data: &Value,
        config: &OverlayConfig,
    ) -> Result<OverlayOutcome, OverlayError> {
        let OverlayConfig::Labels(config) = config else {
            return Err(mismatched("labels"));
        };
        Ok(labels::render(ctx, layer, config))
    }
}

pub struct LegendOverlay;

impl OverlayRenderer for LegendOverlay {
    fn validate(&self, data: &Value) -> Result<(), OverlayError> {
        LegendData::from_value(data).map(|_| ())
    }

    fn resolve(&self, _defaults: &OverlayDefaults, _options: Option<&OverlayOptions>) -> OverlayConfig {
        OverlayConfig::Legend
    }

    fn render(
        &self,
        ctx: &RenderContext<'_>,
        layer: &mut Layer,
        data: &Value,
        _config: &OverlayConfig,
    ) -> Result<OverlayOutcome, OverlayError> {
        let data = LegendData::from_value(data)?;
        Ok(legend::render(ctx, layer, &data))
    }
}

pub struct GraticuleOverlay;

impl OverlayRenderer for GraticuleOverlay {
    fn resolve(&self, defaults: &OverlayDefaults, _options: Option<&OverlayOptions>) -> OverlayConfig {
        OverlayConfig::Graticule(defaults.graticule)
    }

    fn below_regions(&self) -> bool {
        true
    }

    fn render(
        &self,
        ctx: &RenderContext<'_>,
        layer: &mut Layer,
        _data: &Value,
        config: &OverlayConfig,
    ) -> Result<OverlayOutcome, OverlayError> {
        let grid = match config {
            OverlayConfig::Graticule(g) => *g,
            _ => Graticule::default(),
        };
        Ok(graticule::render(&ctx.path, layer, &grid, ctx.now).into())
    }
}

/// Name to renderer table owned by one map.
#[derive(Clone)]
pub struct PluginRegistry {
    plugins: BTreeMap<String, Arc<dyn OverlayRenderer>>,
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.plugins.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl PluginRegistry {
    pub fn empty() -> Self {
        Self {
            plugins: BTreeMap::new(),
        }
    }

    pub fn with_builtins() -> Self {
        let mut r = Self::empty();
        r.register("bubbles", Arc::new(BubblesOverlay));
        r.register("arc", Arc::new(ArcOverlay));
        r.register("labels", Arc::new(LabelsOverlay));
        r.register("legend", Arc::new(LegendOverlay));
        r.register("graticule", Arc::new(GraticuleOverlay));
        r
    }

    /// Adds `renderer` under `name`. Returns `false` and keeps the existing
    /// renderer when the name is taken.
    pub fn register(&mut self, name: impl Into<String>, renderer: Arc<dyn OverlayRenderer>) -> bool {
        let name = name.into();
        if self.plugins.contains_key(&name) {
            tracing::debug!(plugin = %name, "plugin already registered");
            return false;
        }
        self.plugins.insert(name, renderer);
        true
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn OverlayRenderer>> {
        self.plugins.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.plugins.keys().map(|k| k.as_str())
    }
}
