//! The map instance: projection state, region layer, choropleth store,
//! overlays and hover handling.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use formats::dataset::{DataType, parse_payload};
use formats::region::RegionFilter;
use formats::topology::{Topology, TopologyError};
use foundation::math::{GeoPoint, Projection, ProjectionKind, SphereOutline, Vec2, Viewport};
use foundation::time::Time;
use layers::context::{OverlayOutcome, RegionIndex, RenderContext};
use layers::layer::{Layer, LayerId, LayerPosition, LayerStack};
use layers::path::PathGenerator;
use layers::popup::{HoverSubject, Popup, PopupTemplate};
use layers::subunits::{self, GeographyConfig, SUBUNITS_CLASS};
use layers::symbology::{FillSpec, Fills};
use runtime::frame::Frame;
use runtime::metrics::{ARCS_OMITTED, BUBBLES_OMITTED, Metrics, RECONCILE_DUPLICATE};
use scene::element::{Shape, VisualState, merge_datum};
use scene::hover::{Highlight, HoverTracker};
use scene::picking::pick_point;
use scene::reconcile::{Binding, ReconcileTiming};
use scene::style::Style;
use scene::transition::TransitionSpec;
use serde_json::{Map, Value};

use crate::error::MapError;
use crate::options::{ArcOptions, BubblesOptions, LabelsOptions, MapOptions, UpdateOptions};
use crate::plugins::{OverlayConfig, OverlayDefaults, OverlayOptions, OverlayRenderer, PluginRegistry};

pub const SPHERE_CLASS: &str = "datamaps-sphere";

/// Duration of choropleth recolor transitions.
pub const CHOROPLETH_TRANSITION_MS: f64 = 250.0;

/// Replaces projection derivation; receives the options and viewport.
pub type ProjectionHook = Arc<dyn Fn(&MapOptions, Viewport) -> Projection + Send + Sync>;

/// Called once at the end of every `draw`.
pub type DoneHook = Arc<dyn Fn(&Datamap) + Send + Sync>;

/// Projection snapshot shared by every coordinate transform of a pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionState {
    pub projection: Projection,
    pub sphere: Option<SphereOutline>,
}

/// An element addressed by layer and key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementRef {
    pub layer: LayerId,
    pub key: String,
}

impl ElementRef {
    pub fn new(layer: LayerId, key: impl Into<String>) -> Self {
        Self {
            layer,
            key: key.into(),
        }
    }
}

/// Per-call overlay settings.
#[derive(Default)]
pub struct OverlayRequest<'a> {
    pub options: Option<OverlayOptions>,
    /// Draw into a fresh layer instead of reusing the overlay's last one.
    pub create_new_layer: bool,
    /// Invoked with the overlay's layer once it has been rendered.
    pub callback: Option<&'a mut dyn FnMut(&Layer)>,
}

impl<'a> OverlayRequest<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(mut self, options: OverlayOptions) -> Self {
        self.options = Some(options);
        self
    }

    pub fn in_new_layer(mut self) -> Self {
        self.create_new_layer = true;
        self
    }

    pub fn on_layer(mut self, callback: &'a mut dyn FnMut(&Layer)) -> Self {
        self.callback = Some(callback);
        self
    }
}

#[derive(Debug, Clone)]
struct OverlayState {
    name: String,
    layer: LayerId,
    config: OverlayConfig,
    data: Value,
}

#[derive(Clone, Copy)]
enum HoverTarget {
    Geography,
    Bubble,
    Arc,
}

pub struct Datamap {
    options: MapOptions,
    topology: Topology,
    viewport: Viewport,
    projection_kind: ProjectionKind,
    fills: Fills,
    geography: GeographyConfig,
    defaults: OverlayDefaults,
    filter: RegionFilter,
    state: ProjectionState,
    regions: RegionIndex,
    layers: LayerStack,
    subunits: LayerId,
    data: Map<String, Value>,
    /// Fills set by bare color strings; they carry no datum.
    colors: BTreeMap<String, String>,
    plugins: PluginRegistry,
    overlays: Vec<OverlayState>,
    hover: HoverTracker<ElementRef>,
    hovered: Option<ElementRef>,
    popup: Popup,
    metrics: Metrics,
    frame: Frame,
    drawn: bool,
    projection_hook: Option<ProjectionHook>,
    done: Option<DoneHook>,
}

impl fmt::Debug for Datamap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Datamap")
            .field("scope", &self.options.scope)
            .field("projection", &self.projection_kind)
            .field("viewport", &self.viewport)
            .field("regions", &self.regions.len())
            .field("layers", &self.layers.len())
            .field("drawn", &self.drawn)
            .finish()
    }
}

fn derive_projection(
    options: &MapOptions,
    topology: &Topology,
    filter: &RegionFilter,
    kind: ProjectionKind,
    viewport: Viewport,
    hook: Option<&ProjectionHook>,
) -> Result<ProjectionState, MapError> {
    let projection = match hook {
        Some(hook) => hook(options, viewport),
        None => {
            let scope = options.scope.as_str();
            let needs_bbox = match scope {
                "usa" => false,
                "world" => kind == ProjectionKind::ConicEqualArea,
                _ => true,
            };
            let bbox = if needs_bbox {
                Some(topology.bbox(scope, filter)?)
            } else {
                None
            };
            Projection::for_scope(scope, kind, viewport, options.projection_config.rotation3(), bbox)
        }
    };
    let sphere = projection.sphere_outline();
    Ok(ProjectionState { projection, sphere })
}

fn require_collection(topology: &Topology, scope: &str) -> Result<(), MapError> {
    if topology.collections().contains(&scope) {
        Ok(())
    } else {
        Err(TopologyError::MissingCollection(scope.to_string()).into())
    }
}

/// Sets a region's fill. A hovered region keeps its highlight; the new
/// fill lands in its snapshot and shows on pointer-leave.
fn recolor(
    layer: &mut Layer,
    hover: &mut HoverTracker<ElementRef>,
    key: &str,
    fill: String,
    now: Time,
    spec: TransitionSpec,
) -> bool {
    let Some(element) = layer.elements.get(key).filter(|e| e.is_live()) else {
        return false;
    };
    if let Some(saved) = hover.saved_mut(&ElementRef::new(layer.id, key)) {
        saved.fill = Some(fill);
        return true;
    }
    let mut target = element.target().clone();
    target.style.fill = Some(fill);
    layer.elements.retarget(key, target, now, spec)
}

/// Object values become stored datums; string values become plain fills.
fn split_initial_data(initial: &Map<String, Value>) -> (Map<String, Value>, BTreeMap<String, String>) {
    let mut data = Map::new();
    let mut colors = BTreeMap::new();
    for (id, value) in initial {
        match value {
            Value::String(color) => {
                colors.insert(id.clone(), color.clone());
            }
            other => {
                data.insert(id.clone(), other.clone());
            }
        }
    }
    (data, colors)
}

fn omitted_counter(overlay: &str) -> String {
    match overlay {
        "arc" => ARCS_OMITTED.to_string(),
        "bubbles" => BUBBLES_OMITTED.to_string(),
        other => format!("{other}.omitted"),
    }
}

impl Datamap {
    /// Validates options and prepares layers. Nothing is drawn until
    /// [`Datamap::draw`].
    pub fn new(options: MapOptions, topology: Topology) -> Result<Self, MapError> {
        let fills = Fills::new(options.fills.clone())
            .ok_or_else(|| MapError::Config("fills must contain defaultFill".to_string()))?;
        let projection_kind: ProjectionKind = options.projection.parse()?;
        if !options.aspect_ratio.is_finite() || options.aspect_ratio <= 0.0 {
            return Err(MapError::Config(format!(
                "aspectRatio must be positive, got {}",
                options.aspect_ratio
            )));
        }
        require_collection(&topology, &options.scope)?;

        let viewport = Viewport::new(options.resolved_width(), options.resolved_height());
        let geography = options.geography_config.merged_over(&GeographyConfig::default());
        let defaults = OverlayDefaults {
            bubbles: options.bubbles_config.merged_over(&Default::default()),
            arcs: options.arc_config.merged_over(&Default::default()),
            labels: options.labels_config.merged_over(&Default::default()),
            ..OverlayDefaults::default()
        };
        let filter = RegionFilter::from_flags(
            geography.hide_antarctica,
            geography.hide_hawaii_and_alaska,
            geography.exclude.iter().cloned(),
        );
        let state = derive_projection(&options, &topology, &filter, projection_kind, viewport, None)?;
        let mut layers = LayerStack::new();
        let subunits = layers.add(SUBUNITS_CLASS, LayerPosition::Bottom);
        let (data, colors) = split_initial_data(&options.data);

        tracing::debug!(
            scope = %options.scope,
            projection = %projection_kind,
            width = viewport.width,
            height = viewport.height,
            "map created"
        );
        Ok(Self {
            options,
            topology,
            viewport,
            projection_kind,
            fills,
            geography,
            defaults,
            filter,
            state,
            regions: RegionIndex::default(),
            layers,
            subunits,
            data,
            colors,
            plugins: PluginRegistry::with_builtins(),
            overlays: Vec::new(),
            hover: HoverTracker::new(),
            hovered: None,
            popup: Popup::default(),
            metrics: Metrics::new(),
            frame: Frame::at(Time::ZERO),
            drawn: false,
            projection_hook: None,
            done: None,
        })
    }

    /// Builds a map from options alone, reading the topology from
    /// `geographyConfig.dataJson`.
    pub fn from_options(options: MapOptions) -> Result<Self, MapError> {
        let Some(json) = options.geography_config.data_json.clone() else {
            return Err(MapError::Config(
                "geographyConfig.dataJson is required when no topology is supplied".to_string(),
            ));
        };
        let topology = Topology::from_json_value(json)?;
        Self::new(options, topology)
    }

    pub fn with_projection_hook(mut self, hook: ProjectionHook) -> Result<Self, MapError> {
        self.set_projection_hook(hook)?;
        Ok(self)
    }

    pub fn set_projection_hook(&mut self, hook: ProjectionHook) -> Result<(), MapError> {
        self.projection_hook = Some(hook);
        self.refresh()
    }

    pub fn on_done(mut self, hook: DoneHook) -> Self {
        self.done = Some(hook);
        self
    }

    pub fn set_popup_template(&mut self, template: PopupTemplate) {
        self.geography.popup_template = template;
    }

    /// Decodes regions, paints them and renders every remembered overlay.
    pub fn draw(&mut self) -> Result<(), MapError> {
        self.drawn = true;
        if let Err(e) = self.refresh() {
            self.drawn = false;
            return Err(e);
        }
        tracing::info!(
            scope = %self.options.scope,
            regions = self.regions.len(),
            overlays = self.overlays.len(),
            "map drawn"
        );
        if let Some(done) = self.done.clone() {
            done(&*self);
        }
        Ok(())
    }

    /// Rebuilds the projection state and, once drawn, every layer from it.
    fn refresh(&mut self) -> Result<(), MapError> {
        self.state = derive_projection(
            &self.options,
            &self.topology,
            &self.filter,
            self.projection_kind,
            self.viewport,
            self.projection_hook.as_ref(),
        )?;
        if !self.drawn {
            return Ok(());
        }

        let regions = self.topology.regions(&self.options.scope, &self.filter)?;
        self.regions = RegionIndex::build(regions, &PathGenerator::new(&self.state.projection));
        self.hover.forget_where(|_| true);
        self.hovered = None;
        self.popup.hide();

        self.render_sphere();
        self.render_subunits();
        let overlays = self.overlays.clone();
        for state in &overlays {
            self.render_overlay(state)?;
        }
        Ok(())
    }

    fn render_sphere(&mut self) {
        let existing = self.layers.find_by_class(SPHERE_CLASS);
        let outline = PathGenerator::new(&self.state.projection).sphere_outline();
        let layer_id = match (existing, &outline) {
            (Some(id), _) => id,
            (None, Some(_)) => self.layers.add(SPHERE_CLASS, LayerPosition::Below(self.subunits)),
            (None, None) => return,
        };
        let bindings = outline
            .map(|d| {
                let style = Style {
                    fill: Some("#ffffff".to_string()),
                    stroke: Some("#777".to_string()),
                    stroke_width: Some(1.0),
                    ..Style::default()
                };
                vec![Binding::new(
                    "sphere",
                    SPHERE_CLASS,
                    Value::Null,
                    VisualState::new(Shape::Path { d }, style),
                )]
            })
            .unwrap_or_default();
        let now = self.frame.time;
        if let Some(layer) = self.layers.get_mut(layer_id) {
            layer.elements.reconcile(bindings, now, &ReconcileTiming::INSTANT);
        }
    }

    fn render_subunits(&mut self) {
        let ctx = RenderContext {
            projection: &self.state.projection,
            path: PathGenerator::new(&self.state.projection),
            regions: &self.regions,
            fills: &self.fills,
            filters: &self.options.filters,
            viewport: self.viewport,
            now: self.frame.time,
        };
        let Some(layer) = self.layers.get_mut(self.subunits) else {
            return;
        };
        let report = subunits::render(&ctx, layer, &self.data, &self.colors, &self.geography);
        let live = layer.elements.live_keys().len();
        self.metrics.record_reconcile(
            SUBUNITS_CLASS,
            report.entered.len(),
            report.updated.len(),
            report.exited.len(),
            live,
        );
    }

    fn render_overlay(&mut self, state: &OverlayState) -> Result<OverlayOutcome, MapError> {
        let renderer = self
            .plugins
            .get(&state.name)
            .ok_or_else(|| MapError::UnknownOverlay(state.name.clone()))?;
        let ctx = RenderContext {
            projection: &self.state.projection,
            path: PathGenerator::new(&self.state.projection),
            regions: &self.regions,
            fills: &self.fills,
            filters: &self.options.filters,
            viewport: self.viewport,
            now: self.frame.time,
        };
        let Some(layer) = self.layers.get_mut(state.layer) else {
            tracing::warn!(overlay = %state.name, "overlay layer missing; skipping render");
            return Ok(OverlayOutcome::default());
        };
        let outcome = renderer.render(&ctx, layer, &state.data, &state.config)?;
        let live = layer.elements.live_keys().len();
        // A hovered element restores to its updated style, not the pre-update one.
        if let Some(hovered) = self.hovered.as_ref().filter(|h| h.layer == state.layer)
            && let Some(element) = layer.elements.get(&hovered.key).filter(|e| e.is_live())
        {
            self.hover.recapture(hovered, &element.target().style);
        }

        let report = &outcome.report;
        self.metrics.record_reconcile(
            &state.name,
            report.entered.len(),
            report.updated.len(),
            report.exited.len(),
            live,
        );
        self.metrics
            .inc_counter(RECONCILE_DUPLICATE, report.duplicates.len() as u64);
        self.metrics
            .inc_counter(omitted_counter(&state.name), outcome.omitted.len() as u64);
        Ok(outcome)
    }

    /// Recolors regions from `data`. Values are a color string or an object
    /// with `color`, `fillColor` or `fillKey`. Objects merge into the stored
    /// datum for their region; strings set a fill without a datum. Both
    /// survive later redraws.
    pub fn update_choropleth(&mut self, data: &Map<String, Value>, opts: UpdateOptions) -> Result<(), MapError> {
        if !self.drawn {
            return Err(MapError::NotDrawn);
        }
        let now = self.frame.time;
        let spec = TransitionSpec::from_ms(0.0, CHOROPLETH_TRANSITION_MS);
        let Some(layer) = self.layers.get_mut(self.subunits) else {
            return Err(MapError::NotDrawn);
        };

        if opts.reset {
            self.data.clear();
            self.colors.clear();
            let default_fill = self.fills.default_fill().to_string();
            let keys: Vec<String> = layer.elements.live_keys().into_iter().map(str::to_string).collect();
            for key in keys {
                layer.elements.set_datum(&key, Value::Object(Map::new()));
                recolor(layer, &mut self.hover, &key, default_fill.clone(), now, spec);
            }
        }

        for (id, value) in data {
            if id.is_empty() {
                continue;
            }
            let fill = match value {
                Value::Object(_) => {
                    let stored = self
                        .data
                        .entry(id.clone())
                        .or_insert_with(|| Value::Object(Map::new()));
                    merge_datum(stored, value.clone());
                    layer.elements.set_datum(id, stored.clone());
                    self.colors.remove(id);
                    self.fills.resolve(&FillSpec::from_datum(stored))
                }
                Value::String(color) => {
                    self.colors.insert(id.clone(), color.clone());
                    color.clone()
                }
                other => self.fills.resolve(&FillSpec::from_datum(other)),
            };
            if !recolor(layer, &mut self.hover, id, fill, now, spec) {
                tracing::warn!(region = %id, "no rendered region for choropleth key");
            }
        }
        Ok(())
    }

    /// Parses a fetched JSON or CSV payload and applies it as a choropleth
    /// update.
    pub fn load_data_payload(&mut self, text: &str, data_type: DataType) -> Result<(), MapError> {
        let data = parse_payload(text, data_type)?;
        self.update_choropleth(&data, UpdateOptions::default())
    }

    /// Runs the overlay registered as `name`.
    ///
    /// Before the first draw the call is validated and remembered, and the
    /// overlay renders during `draw`.
    pub fn overlay(&mut self, name: &str, data: Value, request: OverlayRequest<'_>) -> Result<OverlayOutcome, MapError> {
        let renderer: Arc<dyn OverlayRenderer> = self
            .plugins
            .get(name)
            .ok_or_else(|| MapError::UnknownOverlay(name.to_string()))?;
        renderer.validate(&data)?;

        let existing = if request.create_new_layer {
            None
        } else {
            self.overlays.iter().rposition(|s| s.name == name)
        };
        let config = match (&request.options, existing) {
            (None, Some(i)) => self.overlays[i].config.clone(),
            (options, _) => renderer.resolve(&self.defaults, options.as_ref()),
        };
        let layer = match existing {
            Some(i) => self.overlays[i].layer,
            None => {
                let position = if renderer.below_regions() {
                    LayerPosition::Below(self.subunits)
                } else {
                    LayerPosition::Top
                };
                self.layers.add(name, position)
            }
        };

        let state = OverlayState {
            name: name.to_string(),
            layer,
            config,
            data,
        };
        let outcome = if self.drawn {
            match self.render_overlay(&state) {
                Ok(outcome) => outcome,
                Err(e) => {
                    if existing.is_none() {
                        self.layers.remove(layer);
                    }
                    tracing::warn!(overlay = name, error = %e, "overlay render failed; keeping previous state");
                    return Err(e);
                }
            }
        } else {
            tracing::debug!(overlay = name, "map not drawn; overlay deferred");
            OverlayOutcome::default()
        };
        match existing {
            Some(i) => self.overlays[i] = state,
            None => self.overlays.push(state),
        }
        if let Some(callback) = request.callback
            && let Some(layer) = self.layers.get(layer)
        {
            callback(layer);
        }
        Ok(outcome)
    }

    pub fn bubbles(&mut self, data: Value, options: Option<BubblesOptions>) -> Result<OverlayOutcome, MapError> {
        let request = OverlayRequest {
            options: options.map(OverlayOptions::Bubbles),
            ..OverlayRequest::default()
        };
        self.overlay("bubbles", data, request)
    }

    pub fn arc(&mut self, data: Value, options: Option<ArcOptions>) -> Result<OverlayOutcome, MapError> {
        let request = OverlayRequest {
            options: options.map(OverlayOptions::Arcs),
            ..OverlayRequest::default()
        };
        self.overlay("arc", data, request)
    }

    pub fn labels(&mut self, options: Option<LabelsOptions>) -> Result<OverlayOutcome, MapError> {
        let request = OverlayRequest {
            options: options.map(OverlayOptions::Labels),
            ..OverlayRequest::default()
        };
        self.overlay("labels", Value::Null, request)
    }

    pub fn legend(&mut self, data: Value) -> Result<OverlayOutcome, MapError> {
        self.overlay("legend", data, OverlayRequest::default())
    }

    pub fn graticule(&mut self) -> Result<OverlayOutcome, MapError> {
        self.overlay("graticule", Value::Null, OverlayRequest::default())
    }

    /// Adds an overlay to this map only. Returns `false` if the name is
    /// already taken.
    pub fn register_plugin(&mut self, name: &str, renderer: Arc<dyn OverlayRenderer>) -> bool {
        self.plugins.register(name, renderer)
    }

    pub fn set_scope(&mut self, scope: &str) -> Result<(), MapError> {
        require_collection(&self.topology, scope)?;
        let previous = std::mem::replace(&mut self.options.scope, scope.to_string());
        if let Err(e) = self.refresh() {
            self.options.scope = previous;
            self.restore_after_failed_refresh();
            return Err(e);
        }
        Ok(())
    }

    pub fn set_projection(&mut self, kind: ProjectionKind) -> Result<(), MapError> {
        let previous = std::mem::replace(&mut self.projection_kind, kind);
        let previous_name = std::mem::replace(&mut self.options.projection, kind.name().to_string());
        if let Err(e) = self.refresh() {
            self.projection_kind = previous;
            self.options.projection = previous_name;
            self.restore_after_failed_refresh();
            return Err(e);
        }
        Ok(())
    }

    /// Rebuilds projection, regions and layers from the restored options.
    fn restore_after_failed_refresh(&mut self) {
        if let Err(e) = self.refresh() {
            tracing::warn!(error = %e, "could not redraw previous map state");
        }
    }

    /// Scales every layer to a new container width. `None` unless the map
    /// is responsive.
    pub fn resize(&mut self, container_width: f64) -> Option<f64> {
        if !self.options.responsive || !container_width.is_finite() || container_width <= 0.0 {
            return None;
        }
        let scale = container_width / self.viewport.width;
        self.layers.set_scale(scale);
        tracing::debug!(container_width, scale, "map resized");
        Some(scale)
    }

    pub fn lat_lng_to_xy(&self, lat: f64, lng: f64) -> Option<Vec2> {
        self.state.projection.project(GeoPoint::from_lat_lng(lat, lng))
    }

    /// Adds an empty layer; `first` puts it below everything else.
    pub fn add_layer(&mut self, class: &str, first: bool) -> LayerId {
        let position = if first {
            LayerPosition::Bottom
        } else {
            LayerPosition::Top
        };
        self.layers.add(class, position)
    }

    /// Steps every transition to the frame time. Returns the number still
    /// running.
    pub fn tick(&mut self, frame: Frame) -> usize {
        self.frame = frame;
        self.layers
            .iter_mut()
            .map(|layer| layer.elements.advance(frame.time))
            .sum()
    }

    /// Completes every running transition.
    pub fn settle(&mut self) {
        for layer in self.layers.iter_mut() {
            layer.elements.finish_all();
        }
    }

    fn overlay_for_layer(&self, layer: LayerId) -> Option<&OverlayState> {
        self.overlays.iter().find(|s| s.layer == layer)
    }

    fn hover_target(&self, layer: LayerId) -> Option<HoverTarget> {
        if layer == self.subunits {
            return Some(HoverTarget::Geography);
        }
        match &self.overlay_for_layer(layer)?.config {
            OverlayConfig::Bubbles(_) => Some(HoverTarget::Bubble),
            OverlayConfig::Arcs(_) => Some(HoverTarget::Arc),
            _ => None,
        }
    }

    /// Highlight, popup template and datum for a hover over `target`.
    fn hover_behavior(
        &self,
        kind: HoverTarget,
        target: &ElementRef,
    ) -> Option<(Option<Highlight>, Option<PopupTemplate>, Value)> {
        if let HoverTarget::Geography = kind {
            let datum = self.data.get(&target.key).cloned().unwrap_or(Value::Null);
            let cfg = &self.geography;
            let highlight = cfg.highlight_on_hover.then(|| cfg.highlight(&datum));
            let template = cfg.popup_on_hover.then(|| cfg.popup_template.clone());
            return Some((highlight, template, datum));
        }
        let datum = self
            .layers
            .get(target.layer)
            .and_then(|l| l.elements.get(&target.key))
            .filter(|e| e.is_live())
            .map(|e| e.datum.clone())
            .unwrap_or(Value::Null);
        match &self.overlay_for_layer(target.layer)?.config {
            OverlayConfig::Bubbles(c) => Some((
                c.highlight_on_hover.then(|| c.highlight(&datum)),
                c.popup_on_hover.then(|| c.popup_template.clone()),
                datum,
            )),
            OverlayConfig::Arcs(c) => Some((None, c.popup_on_hover.then(|| c.popup_template.clone()), datum)),
            _ => None,
        }
    }

    /// Topmost hoverable element under a point in map coordinates.
    pub fn hit_test(&self, x: f64, y: f64) -> Option<ElementRef> {
        let p = Vec2::new(x, y);
        let stack: Vec<&Layer> = self.layers.iter().collect();
        for layer in stack.into_iter().rev() {
            if self.hover_target(layer.id).is_none() {
                continue;
            }
            if layer.id == self.subunits {
                let Some(geo) = self.state.projection.invert(p) else {
                    continue;
                };
                let hit = layer
                    .elements
                    .iter()
                    .rev()
                    .filter(|e| e.is_live())
                    .find(|e| self.regions.get(&e.key).is_some_and(|r| r.contains(geo)));
                if let Some(e) = hit {
                    return Some(ElementRef::new(layer.id, e.key.clone()));
                }
            } else if let Some(e) = pick_point(&layer.elements, p) {
                return Some(ElementRef::new(layer.id, e.key.clone()));
            }
        }
        None
    }

    /// Highlights `target` and shows its popup at the pointer. Returns
    /// `false` when the element is not hoverable or already hovered.
    pub fn pointer_enter(&mut self, target: ElementRef, x: f64, y: f64) -> bool {
        if self.hovered.as_ref() == Some(&target) {
            self.pointer_move(x, y);
            return false;
        }
        self.pointer_leave();
        let Some(kind) = self.hover_target(target.layer) else {
            return false;
        };

        let Some((highlight, template, datum)) = self.hover_behavior(kind, &target) else {
            return false;
        };
        if highlight.is_none() && template.is_none() {
            return false;
        }

        let Some(layer) = self.layers.get_mut(target.layer) else {
            return false;
        };
        if layer.elements.get(&target.key).is_none_or(|e| !e.is_live()) {
            return false;
        }
        layer.elements.finish(&target.key);
        if let Some(highlight) = &highlight
            && let Some(element) = layer.elements.get_mut(&target.key)
        {
            self.hover
                .enter(target.clone(), &mut element.state.style, highlight);
            if matches!(kind, HoverTarget::Geography) {
                layer.elements.raise_to_front(&target.key);
            }
        }

        if let Some(template) = template {
            let html = match kind {
                HoverTarget::Geography => match self.regions.get(&target.key) {
                    Some(region) => template.render(&HoverSubject::Geography(region), &datum),
                    None => String::new(),
                },
                HoverTarget::Bubble => template.render(&HoverSubject::Bubble(&datum), &datum),
                HoverTarget::Arc => template.render(&HoverSubject::Arc(&datum), &datum),
            };
            self.popup.show(html);
            self.popup.move_to(x, y);
        }
        self.hovered = Some(target);
        true
    }

    pub fn pointer_move(&mut self, x: f64, y: f64) {
        if self.hovered.is_some() && self.popup.visible {
            self.popup.move_to(x, y);
        }
    }

    /// Restores the hovered element's pre-hover style and hides the popup.
    pub fn pointer_leave(&mut self) {
        let Some(target) = self.hovered.take() else {
            return;
        };
        if let Some(element) = self
            .layers
            .get_mut(target.layer)
            .and_then(|l| l.elements.get_mut(&target.key))
        {
            self.hover.leave(&target, &mut element.state.style);
        } else {
            self.hover.forget_where(|k| *k == target);
        }
        self.popup.hide();
    }

    pub fn options(&self) -> &MapOptions {
        &self.options
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn projection(&self) -> &Projection {
        &self.state.projection
    }

    pub fn projection_state(&self) -> &ProjectionState {
        &self.state
    }

    pub fn regions(&self) -> &RegionIndex {
        &self.regions
    }

    /// Stored choropleth data keyed by region id.
    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    pub fn fills(&self) -> &Fills {
        &self.fills
    }

    pub fn geography(&self) -> &GeographyConfig {
        &self.geography
    }

    pub fn layers(&self) -> &LayerStack {
        &self.layers
    }

    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.get(id)
    }

    pub fn subunits_layer(&self) -> LayerId {
        self.subunits
    }

    /// Layer last used by the named overlay.
    pub fn overlay_layer(&self, name: &str) -> Option<LayerId> {
        self.overlays.iter().rev().find(|s| s.name == name).map(|s| s.layer)
    }

    pub fn live_keys(&self, layer: LayerId) -> Vec<String> {
        self.layers
            .get(layer)
            .map(|l| l.elements.live_keys().into_iter().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn popup(&self) -> &Popup {
        &self.popup
    }

    pub fn hovered(&self) -> Option<&ElementRef> {
        self.hovered.as_ref()
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn now(&self) -> Time {
        self.frame.time
    }

    pub fn is_drawn(&self) -> bool {
        self.drawn
    }

    pub fn is_animating(&self) -> bool {
        self.layers.iter().any(|l| l.elements.has_running_transitions())
    }
}

#[cfg(test)]
mod tests {
    use super::{Datamap, ElementRef, OverlayRequest, SPHERE_CLASS};
    use crate::error::MapError;
    use crate::options::{BubblesOptions, MapOptions, UpdateOptions};
    use crate::plugins::{OverlayConfig, OverlayRenderer};
    use formats::dataset::DataType;
    use formats::topology::Topology;
    use foundation::math::{Projection, ProjectionKind, ProjectionParams, Viewport};
    use foundation::time::Time;
    use layers::context::{OverlayError, OverlayOutcome, RenderContext};
    use layers::layer::Layer;
    use layers::subunits::SUBUNITS_CLASS;
    use pretty_assertions::assert_eq;
    use runtime::frame::Frame;
    use runtime::metrics::ARCS_OMITTED;
    use scene::element::{Shape, VisualState};
    use scene::reconcile::{Binding, ReconcileTiming};
    use scene::style::Style;
    use serde_json::{Map, Value, json};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TOPOLOGY: &str = r#"{
        "type": "Topology",
        "objects": {
            "world": {
                "type": "GeometryCollection",
                "geometries": [
                    {"type": "Polygon", "id": "AAA", "properties": {"name": "Alpha"}, "arcs": [[0]]},
                    {"type": "Polygon", "id": "BBB", "properties": {"name": "Beta"}, "arcs": [[1]]},
                    {"type": "Polygon", "id": "ATA", "properties": {"name": "Antarctica"}, "arcs": [[2]]}
                ]
            },
            "islands": {
                "type": "GeometryCollection",
                "geometries": [
                    {"type": "Polygon", "id": "ISL", "arcs": [[3]]}
                ]
            }
        },
        "arcs": [
            [[0, 0], [10, 0], [10, 10], [0, 10], [0, 0]],
            [[20, 0], [30, 0], [30, 10], [20, 10], [20, 0]],
            [[-20, -80], [20, -80], [20, -70], [-20, -70], [-20, -80]],
            [[100, -10], [110, -10], [110, 0], [100, 0], [100, -10]]
        ]
    }"#;

    fn options(json: Value) -> MapOptions {
        let mut opts = MapOptions::from_json_value(json).unwrap();
        opts.fills.insert("HIGH".to_string(), "#ff0000".to_string());
        opts
    }

    fn drawn_map(json: Value) -> Datamap {
        let topology = Topology::from_json_str(TOPOLOGY).unwrap();
        let mut map = Datamap::new(options(json), topology).unwrap();
        map.draw().unwrap();
        map
    }

    fn fill_of(map: &Datamap, key: &str) -> Option<String> {
        map.layer(map.subunits_layer())?
            .elements
            .get(key)?
            .state
            .style
            .fill
            .clone()
    }

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(m) => m,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn antarctica_is_hidden_by_default() {
        let map = drawn_map(json!({}));
        assert_eq!(map.regions().len(), 2);
        assert_eq!(map.live_keys(map.subunits_layer()), vec!["AAA", "BBB"]);

        let all = drawn_map(json!({"geographyConfig": {"hideAntarctica": false}}));
        assert_eq!(all.regions().len(), 3);

        let excluded = drawn_map(json!({"geographyConfig": {"exclude": ["BBB"]}}));
        assert_eq!(excluded.live_keys(excluded.subunits_layer()), vec!["AAA"]);
    }

    #[test]
    fn construction_rejects_bad_options() {
        let topology = Topology::from_json_str(TOPOLOGY).unwrap();
        let mut opts = MapOptions::default();
        opts.fills.clear();
        assert!(matches!(Datamap::new(opts, topology.clone()), Err(MapError::Config(_))));

        let opts = MapOptions {
            projection: "peirce".to_string(),
            ..MapOptions::default()
        };
        assert!(matches!(Datamap::new(opts, topology.clone()), Err(MapError::Config(_))));

        let opts = MapOptions {
            scope: "mars".to_string(),
            ..MapOptions::default()
        };
        assert!(matches!(Datamap::new(opts, topology), Err(MapError::Topology(_))));

        assert!(matches!(
            Datamap::from_options(MapOptions::default()),
            Err(MapError::Config(_))
        ));
    }

    #[test]
    fn initial_data_colors_regions() {
        let map = drawn_map(json!({"data": {"AAA": {"fillKey": "HIGH"}}}));
        assert_eq!(fill_of(&map, "AAA").as_deref(), Some("#ff0000"));
        assert_eq!(fill_of(&map, "BBB").as_deref(), Some("#ABDDA4"));
        let aaa = map.layer(map.subunits_layer()).unwrap().elements.get("AAA").unwrap();
        assert_eq!(aaa.class, "datamaps-subunit AAA");
    }

    #[test]
    fn updates_before_draw_are_rejected() {
        let topology = Topology::from_json_str(TOPOLOGY).unwrap();
        let mut map = Datamap::new(MapOptions::default(), topology).unwrap();
        let err = map
            .update_choropleth(&object(json!({"AAA": "#000"})), UpdateOptions::default())
            .unwrap_err();
        assert_eq!(err, MapError::NotDrawn);
    }

    #[test]
    fn choropleth_updates_merge_and_are_idempotent() {
        let mut map = drawn_map(json!({}));
        let update = object(json!({"AAA": {"fillKey": "HIGH", "n": 1}}));
        map.update_choropleth(&update, UpdateOptions::default()).unwrap();
        map.settle();
        let once = (fill_of(&map, "AAA"), map.data().clone());
        map.update_choropleth(&update, UpdateOptions::default()).unwrap();
        map.settle();
        assert_eq!((fill_of(&map, "AAA"), map.data().clone()), once);
        assert_eq!(once.0.as_deref(), Some("#ff0000"));

        map.update_choropleth(&object(json!({"AAA": {"n": 2}})), UpdateOptions::default())
            .unwrap();
        map.settle();
        assert_eq!(map.data().get("AAA"), Some(&json!({"fillKey": "HIGH", "n": 2})));
        assert_eq!(fill_of(&map, "AAA").as_deref(), Some("#ff0000"));
    }

    #[test]
    fn recolor_transitions_over_time() {
        let mut map = drawn_map(json!({}));
        map.update_choropleth(&object(json!({"AAA": "#000000"})), UpdateOptions::default())
            .unwrap();
        assert_eq!(fill_of(&map, "AAA").as_deref(), Some("#ABDDA4"));
        assert!(map.is_animating());
        let running = map.tick(Frame::at(Time::from_ms(300.0)));
        assert_eq!(running, 0);
        assert_eq!(fill_of(&map, "AAA").as_deref(), Some("#000000"));
    }

    #[test]
    fn reset_clears_data_before_applying() {
        let mut map = drawn_map(json!({}));
        map.update_choropleth(&object(json!({"AAA": {"fillKey": "HIGH"}})), UpdateOptions::default())
            .unwrap();
        map.update_choropleth(&object(json!({"BBB": "#123456"})), UpdateOptions { reset: true })
            .unwrap();
        map.settle();
        assert_eq!(fill_of(&map, "AAA").as_deref(), Some("#ABDDA4"));
        assert_eq!(fill_of(&map, "BBB").as_deref(), Some("#123456"));
        assert!(map.data().is_empty());
        let aaa = map.layer(map.subunits_layer()).unwrap().elements.get("AAA").unwrap();
        assert_eq!(aaa.datum, json!({}));
    }

    #[test]
    fn csv_payload_feeds_choropleth() {
        let mut map = drawn_map(json!({}));
        map.load_data_payload("id,fillKey\nAAA,HIGH\n", DataType::Csv).unwrap();
        map.settle();
        assert_eq!(fill_of(&map, "AAA").as_deref(), Some("#ff0000"));
        assert!(matches!(
            map.load_data_payload("[1, 2]", DataType::Json),
            Err(MapError::Dataset(_))
        ));
    }

    #[test]
    fn bubbles_are_keyed_and_track_the_dataset() {
        let mut map = drawn_map(json!({"bubblesConfig": {"keyField": "id"}}));
        let first = json!([
            {"id": "a", "radius": 5, "latitude": 5, "longitude": 5},
            {"id": "b", "radius": 5, "centered": "BBB"}
        ]);
        map.bubbles(first, None).unwrap();
        let layer = map.overlay_layer("bubbles").unwrap();
        assert_eq!(map.live_keys(layer), vec!["a", "b"]);

        let second = json!([{"id": "a", "radius": 10, "latitude": 5, "longitude": 5}]);
        let out = map.bubbles(second, None).unwrap();
        assert_eq!(out.report.updated, vec!["a"]);
        assert_eq!(out.report.exited, vec!["b"]);
        assert_eq!(map.live_keys(layer), vec!["a"]);

        map.tick(Frame::at(Time(2.0)));
        let elements = &map.layer(layer).unwrap().elements;
        assert_eq!(elements.len(), 1);
        match &elements.get("a").unwrap().state.shape {
            Shape::Circle { r, .. } => assert_eq!(*r, 10.0),
            other => panic!("expected circle, got {other:?}"),
        }
    }

    #[test]
    fn overlay_input_is_validated() {
        let mut map = drawn_map(json!({}));
        let err = map.bubbles(json!({"a": 1}), None).unwrap_err();
        assert_eq!(
            err,
            MapError::InvalidOverlayData {
                overlay: "bubbles".into(),
                reason: "bubbles must be an array".into()
            }
        );
        assert_eq!(
            map.overlay("sparkles", json!([]), OverlayRequest::new()).unwrap_err(),
            MapError::UnknownOverlay("sparkles".into())
        );
    }

    #[test]
    fn unresolvable_arcs_are_counted_and_skipped() {
        let mut map = drawn_map(json!({}));
        let out = map
            .arc(
                json!([
                    {"origin": "AAA", "destination": "BBB"},
                    {"origin": "AAA", "destination": "ZZZ"}
                ]),
                None,
            )
            .unwrap();
        assert_eq!(out.omitted.len(), 1);
        assert_eq!(map.metrics().counter(ARCS_OMITTED), 1);
        assert_eq!(map.live_keys(map.overlay_layer("arc").unwrap()).len(), 1);
    }

    #[test]
    fn overlays_before_draw_render_at_draw() {
        let topology = Topology::from_json_str(TOPOLOGY).unwrap();
        let mut map = Datamap::new(MapOptions::default(), topology).unwrap();
        let out = map
            .bubbles(json!([{"radius": 3, "centered": "AAA"}]), None)
            .unwrap();
        assert!(out.report.entered.is_empty());
        let layer = map.overlay_layer("bubbles").unwrap();
        assert!(map.layer(layer).unwrap().elements.is_empty());

        map.draw().unwrap();
        assert_eq!(map.live_keys(layer).len(), 1);
    }

    #[test]
    fn hover_highlights_and_restores() {
        let mut map = drawn_map(json!({"data": {"AAA": {"fillKey": "HIGH"}}}));
        let target = ElementRef::new(map.subunits_layer(), "AAA");
        let before = map
            .layer(map.subunits_layer())
            .unwrap()
            .elements
            .get("AAA")
            .unwrap()
            .state
            .style
            .clone();

        assert!(map.pointer_enter(target.clone(), 100.0, 50.0));
        assert_eq!(fill_of(&map, "AAA").as_deref(), Some("#FC8D59"));
        assert!(map.popup().visible);
        assert!(map.popup().html.contains("Alpha"));
        assert_eq!(map.popup().top, 80.0);
        let keys = map.live_keys(map.subunits_layer());
        assert_eq!(keys.last().map(String::as_str), Some("AAA"));

        assert!(!map.pointer_enter(target, 110.0, 60.0));
        assert_eq!(map.popup().left, 110.0);

        map.pointer_leave();
        let after = &map
            .layer(map.subunits_layer())
            .unwrap()
            .elements
            .get("AAA")
            .unwrap()
            .state
            .style;
        assert_eq!(after, &before);
        assert!(!map.popup().visible);
        assert!(map.hovered().is_none());
    }

    #[test]
    fn updates_while_hovered_land_after_leave() {
        let mut map = drawn_map(json!({}));
        let target = ElementRef::new(map.subunits_layer(), "BBB");
        map.pointer_enter(target, 0.0, 0.0);
        map.update_choropleth(&object(json!({"BBB": "#010101"})), UpdateOptions::default())
            .unwrap();
        assert_eq!(fill_of(&map, "BBB").as_deref(), Some("#FC8D59"));
        map.pointer_leave();
        assert_eq!(fill_of(&map, "BBB").as_deref(), Some("#010101"));
    }

    #[test]
    fn bubble_updates_while_hovered_survive_leave() {
        let mut map = drawn_map(json!({"bubblesConfig": {"keyField": "id"}}));
        map.bubbles(json!([{"id": "a", "radius": 5, "latitude": 5, "longitude": 5}]), None)
            .unwrap();
        map.settle();
        let layer = map.overlay_layer("bubbles").unwrap();
        assert!(map.pointer_enter(ElementRef::new(layer, "a"), 0.0, 0.0));

        map.bubbles(
            json!([{"id": "a", "radius": 5, "latitude": 5, "longitude": 5, "fillKey": "HIGH"}]),
            None,
        )
        .unwrap();
        map.settle();
        map.pointer_leave();
        let fill = map.layer(layer).unwrap().elements.get("a").unwrap().state.style.fill.clone();
        assert_eq!(fill.as_deref(), Some("#ff0000"));
    }

    #[test]
    fn string_fills_survive_redraws() {
        let mut map = drawn_map(json!({"data": {"BBB": "#222222"}, "responsive": true}));
        assert_eq!(fill_of(&map, "BBB").as_deref(), Some("#222222"));
        map.update_choropleth(&object(json!({"AAA": "#000000"})), UpdateOptions::default())
            .unwrap();
        map.settle();

        map.set_projection(ProjectionKind::Mercator).unwrap();
        map.resize(480.0);
        assert_eq!(fill_of(&map, "AAA").as_deref(), Some("#000000"));
        assert_eq!(fill_of(&map, "BBB").as_deref(), Some("#222222"));
        assert!(map.data().get("AAA").is_none());

        // An object update takes over from the bare color.
        map.update_choropleth(&object(json!({"AAA": {"fillKey": "HIGH"}})), UpdateOptions::default())
            .unwrap();
        map.settle();
        map.set_scope("world").unwrap();
        assert_eq!(fill_of(&map, "AAA").as_deref(), Some("#ff0000"));
    }

    #[test]
    fn hit_test_finds_regions_and_bubbles() {
        let mut map = drawn_map(json!({}));
        let center = map.regions().centroid("AAA").unwrap();
        assert_eq!(
            map.hit_test(center.x, center.y),
            Some(ElementRef::new(map.subunits_layer(), "AAA"))
        );
        let out = map
            .bubbles(json!([{"name": "dot", "radius": 4, "latitude": 40, "longitude": -40}]), None)
            .unwrap();
        map.settle();
        let key = out.report.entered[0].clone();
        let p = map.lat_lng_to_xy(40.0, -40.0).unwrap();
        let hit = map.hit_test(p.x, p.y).unwrap();
        assert_eq!(hit.key, key);

        assert!(map.pointer_enter(hit, p.x, p.y));
        assert!(map.popup().html.contains("dot"));
    }

    #[test]
    fn graticule_sits_below_regions() {
        let mut map = drawn_map(json!({}));
        map.graticule().unwrap();
        let classes: Vec<&str> = map.layers().iter().map(|l| l.class.as_str()).collect();
        assert_eq!(classes, vec!["graticule", SUBUNITS_CLASS]);
    }

    #[test]
    fn orthographic_maps_get_a_sphere() {
        let map = drawn_map(json!({"projection": "orthographic"}));
        let classes: Vec<&str> = map.layers().iter().map(|l| l.class.as_str()).collect();
        assert_eq!(classes, vec![SPHERE_CLASS, SUBUNITS_CLASS]);
        assert!(map.projection_state().sphere.is_some());
    }

    #[test]
    fn scope_and_projection_changes_rebuild() {
        let mut map = drawn_map(json!({}));
        map.bubbles(json!([{"radius": 3, "latitude": 0, "longitude": 5}]), None)
            .unwrap();
        map.settle();
        let before = map.lat_lng_to_xy(30.0, 5.0).unwrap();

        map.set_projection(ProjectionKind::Mercator).unwrap();
        let after = map.lat_lng_to_xy(30.0, 5.0).unwrap();
        assert!((before.y - after.y).abs() > 1.0);

        map.set_scope("islands").unwrap();
        assert_eq!(map.live_keys(map.subunits_layer()), vec!["ISL"]);
        assert_eq!(map.projection().kind(), ProjectionKind::ConicEqualArea);

        assert!(matches!(map.set_scope("mars"), Err(MapError::Topology(_))));
        assert_eq!(map.options().scope, "islands");
    }

    #[test]
    fn projection_hook_replaces_derivation() {
        let topology = Topology::from_json_str(TOPOLOGY).unwrap();
        let hook = Arc::new(|_: &MapOptions, vp: Viewport| {
            Projection::new(
                ProjectionKind::Equirectangular,
                ProjectionParams {
                    scale: 1.0,
                    translate: [vp.width / 2.0, vp.height / 2.0],
                    ..ProjectionParams::default()
                },
            )
        });
        let map = Datamap::new(MapOptions::default(), topology)
            .unwrap()
            .with_projection_hook(hook)
            .unwrap();
        let p = map.lat_lng_to_xy(0.0, 0.0).unwrap();
        assert_eq!((p.x, p.y), (480.0, 270.0));
    }

    #[test]
    fn responsive_resize_scales_layers() {
        let mut map = drawn_map(json!({"responsive": true}));
        assert_eq!(map.resize(480.0), Some(0.5));
        assert!(map.layers().iter().all(|l| l.scale == 0.5));
        let extra = map.add_layer("custom", true);
        assert_eq!(map.layer(extra).unwrap().scale, 0.5);
        assert_eq!(map.layers().iter().next().unwrap().id, extra);

        let mut fixed = drawn_map(json!({}));
        assert_eq!(fixed.resize(480.0), None);
    }

    #[test]
    fn done_hook_runs_after_draw() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let topology = Topology::from_json_str(TOPOLOGY).unwrap();
        let mut map = Datamap::new(MapOptions::default(), topology)
            .unwrap()
            .on_done(Arc::new(move |m: &Datamap| {
                assert!(m.is_drawn());
                seen.fetch_add(1, Ordering::SeqCst);
            }));
        map.draw().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    struct Markers;

    impl OverlayRenderer for Markers {
        fn render(
            &self,
            ctx: &RenderContext<'_>,
            layer: &mut Layer,
            data: &Value,
            _config: &OverlayConfig,
        ) -> Result<OverlayOutcome, OverlayError> {
            let items = layers::context::expect_array("markers", data)?;
            let bindings = items
                .iter()
                .filter_map(|item| {
                    let id = item.as_str()?;
                    let c = ctx.regions.centroid(id)?;
                    Some(Binding::new(
                        id,
                        "marker",
                        item.clone(),
                        VisualState::new(Shape::Circle { cx: c.x, cy: c.y, r: 2.0 }, Style::default()),
                    ))
                })
                .collect();
            Ok(layer.elements.reconcile(bindings, ctx.now, &ReconcileTiming::INSTANT).into())
        }
    }

    #[test]
    fn registered_plugins_render_and_call_back() {
        let mut map = drawn_map(json!({}));
        assert!(map.register_plugin("markers", Arc::new(Markers)));
        assert!(!map.register_plugin("markers", Arc::new(Markers)));

        let mut seen = Vec::new();
        let mut callback = |layer: &Layer| seen.push(layer.class.clone());
        let out = map
            .overlay("markers", json!(["AAA", "BBB"]), OverlayRequest::new().on_layer(&mut callback))
            .unwrap();
        assert_eq!(out.report.entered, vec!["AAA", "BBB"]);
        assert_eq!(seen, vec!["markers".to_string()]);

        map.overlay("markers", json!(["AAA"]), OverlayRequest::new().in_new_layer())
            .unwrap();
        let marker_layers = map.layers().iter().filter(|l| l.class == "markers").count();
        assert_eq!(marker_layers, 2);
    }

    #[test]
    fn failed_plugin_render_keeps_previous_state() {
        let mut map = drawn_map(json!({}));
        map.register_plugin("markers", Arc::new(Markers));
        map.overlay("markers", json!(["AAA"]), OverlayRequest::new()).unwrap();
        let layers_before = map.layers().len();

        let err = map
            .overlay("markers", json!({"not": "array"}), OverlayRequest::new())
            .unwrap_err();
        assert_eq!(
            err,
            MapError::InvalidOverlayData {
                overlay: "markers".into(),
                reason: "markers must be an array".into()
            }
        );
        let err = map
            .overlay("markers", json!(7), OverlayRequest::new().in_new_layer())
            .unwrap_err();
        assert!(matches!(err, MapError::InvalidOverlayData { .. }));
        assert_eq!(map.layers().len(), layers_before);

        map.set_projection(ProjectionKind::Mercator).unwrap();
        map.set_scope("world").unwrap();
        assert_eq!(map.live_keys(map.overlay_layer("markers").unwrap()), vec!["AAA"]);
    }

    #[test]
    fn options_are_remembered_between_calls() {
        let mut map = drawn_map(json!({}));
        let opts = BubblesOptions {
            border_color: Some("#000000".into()),
            animate: Some(false),
            ..BubblesOptions::default()
        };
        map.bubbles(json!([{"radius": 3, "latitude": 1, "longitude": 1}]), Some(opts))
            .unwrap();
        map.bubbles(json!([{"radius": 4, "latitude": 1, "longitude": 1}]), None)
            .unwrap();
        let layer = map.layer(map.overlay_layer("bubbles").unwrap()).unwrap();
        assert!(layer
            .elements
            .iter()
            .filter(|e| e.is_live())
            .all(|e| e.state.style.stroke.as_deref() == Some("#000000")));
    }
}
