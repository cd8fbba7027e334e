use gloo_net::http::Request;
use serde::Serialize;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use wasm_bindgen::prelude::*;

use datamap::{
    ArcOptions, BubblesOptions, Datamap, ElementRef, LabelsOptions, MapError, MapOptions, UpdateOptions,
    render_document,
};
use formats::dataset::DataType;
use formats::topology::Topology;
use foundation::time::Time;
use runtime::frame::Frame;
use serde_json::{Map, Value};

static INITIALIZED: AtomicBool = AtomicBool::new(false);
static PANIC_HOOK_SET: OnceLock<()> = OnceLock::new();

thread_local! {
    // Topologies by URL; several maps on one page usually share one file.
    static TOPOLOGIES: RefCell<BTreeMap<String, Topology>> = RefCell::new(BTreeMap::new());
}

fn init_panic_hook() {
    PANIC_HOOK_SET.get_or_init(|| {
        std::panic::set_hook(Box::new(|info| {
            let msg = info.to_string();
            web_sys::console::error_1(&JsValue::from_str(&msg));
        }));
    });
}

#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    if INITIALIZED.swap(true, Ordering::SeqCst) {
        return Ok(());
    }
    init_panic_hook();
    Ok(())
}

fn js_err(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

async fn fetch_text(url: &str) -> Result<String, MapError> {
    let resp = Request::get(url)
        .send()
        .await
        .map_err(|e| MapError::Fetch(format!("{url}: {e}")))?;
    if !resp.ok() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        let body = body.trim();
        let msg = if body.is_empty() {
            format!("{url}: HTTP {status}")
        } else {
            format!("{url}: HTTP {status}: {body}")
        };
        return Err(MapError::Fetch(msg));
    }
    resp.text()
        .await
        .map_err(|e| MapError::Fetch(format!("{url}: {e}")))
}

async fn load_topology(url: &str) -> Result<Topology, MapError> {
    if let Some(cached) = TOPOLOGIES.with(|t| t.borrow().get(url).cloned()) {
        return Ok(cached);
    }
    let topology = Topology::from_json_str(&fetch_text(url).await?)?;
    TOPOLOGIES.with(|t| t.borrow_mut().insert(url.to_string(), topology.clone()));
    Ok(topology)
}

fn parse_json<T: serde::de::DeserializeOwned>(what: &str, text: &str) -> Result<T, MapError> {
    serde_json::from_str(text).map_err(|e| MapError::Config(format!("{what}: {e}")))
}

fn parse_optional<T: serde::de::DeserializeOwned>(what: &str, text: Option<String>) -> Result<Option<T>, MapError> {
    text.map(|t| parse_json(what, &t)).transpose()
}

/// Hover state after a pointer event, as handed back to the page.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PointerState {
    pub hovered: Option<String>,
    pub popup: Option<PopupView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PopupView {
    pub html: String,
    pub left: f64,
    pub top: f64,
}

/// Routes a pointer position to enter/move/leave on `map`.
pub fn pointer_at(map: &mut Datamap, x: f64, y: f64) -> PointerState {
    match map.hit_test(x, y) {
        Some(target) if map.hovered() == Some(&target) => map.pointer_move(x, y),
        Some(target) => {
            map.pointer_enter(target, x, y);
        }
        None => map.pointer_leave(),
    }
    pointer_state(map)
}

pub fn pointer_state(map: &Datamap) -> PointerState {
    let popup = map.popup();
    PointerState {
        hovered: map.hovered().map(|ElementRef { key, .. }| key.clone()),
        popup: popup.visible.then(|| PopupView {
            html: popup.html.clone(),
            left: popup.left,
            top: popup.top,
        }),
    }
}

/// A choropleth map bound to a page element.
#[wasm_bindgen]
pub struct WebDatamap {
    map: Datamap,
    element_id: Option<String>,
}

#[wasm_bindgen]
impl WebDatamap {
    /// Fetches the topology (`geographyConfig.dataUrl`) and any `dataUrl`
    /// payload, then draws. A failed fetch leaves nothing rendered.
    pub async fn create(options_json: String, element_id: Option<String>) -> Result<WebDatamap, JsValue> {
        init_panic_hook();
        let options: MapOptions = parse_json("options", &options_json).map_err(js_err)?;
        let topology = match (&options.geography_config.data_json, &options.geography_config.data_url) {
            (Some(json), _) => Topology::from_json_value(json.clone()).map_err(js_err)?,
            (None, Some(url)) => load_topology(url).await.map_err(js_err)?,
            (None, None) => {
                return Err(js_err(MapError::Config(
                    "geographyConfig needs dataUrl or dataJson".to_string(),
                )));
            }
        };
        let payload = match &options.data_url {
            Some(url) => Some((fetch_text(url).await.map_err(js_err)?, options.data_type)),
            None => None,
        };

        let mut map = Datamap::new(options, topology).map_err(js_err)?;
        map.draw().map_err(js_err)?;
        if let Some((text, data_type)) = payload {
            map.load_data_payload(&text, data_type).map_err(js_err)?;
        }
        let mut web = WebDatamap { map, element_id };
        web.mount()?;
        Ok(web)
    }

    /// Writes the current SVG into the bound element, if any.
    pub fn mount(&mut self) -> Result<(), JsValue> {
        let Some(id) = &self.element_id else {
            return Ok(());
        };
        let document = web_sys::window()
            .and_then(|w| w.document())
            .ok_or_else(|| JsValue::from_str("no document"))?;
        let element = document
            .get_element_by_id(id)
            .ok_or_else(|| JsValue::from_str(&format!("no element #{id}")))?;
        element.set_inner_html(&render_document(&self.map));
        Ok(())
    }

    pub fn svg(&self) -> String {
        render_document(&self.map)
    }

    #[wasm_bindgen(js_name = updateChoropleth)]
    pub fn update_choropleth(&mut self, data_json: String, reset: bool) -> Result<(), JsValue> {
        let data: Map<String, Value> = parse_json("choropleth data", &data_json).map_err(js_err)?;
        self.map
            .update_choropleth(&data, UpdateOptions { reset })
            .map_err(js_err)
    }

    /// Fetches a JSON or CSV payload and applies it as a choropleth update.
    /// Consumes and returns the map so the future owns it while in flight.
    #[wasm_bindgen(js_name = loadData)]
    pub async fn load_data(mut self, url: String, data_type: String) -> Result<WebDatamap, JsValue> {
        let data_type: DataType = data_type.parse().map_err(js_err)?;
        let text = fetch_text(&url).await.map_err(js_err)?;
        self.map.load_data_payload(&text, data_type).map_err(js_err)?;
        self.mount()?;
        Ok(self)
    }

    pub fn bubbles(&mut self, data_json: String, options_json: Option<String>) -> Result<(), JsValue> {
        let data: Value = parse_json("bubbles", &data_json).map_err(js_err)?;
        let options: Option<BubblesOptions> = parse_optional("bubbles options", options_json).map_err(js_err)?;
        self.map.bubbles(data, options).map(|_| ()).map_err(js_err)
    }

    pub fn arc(&mut self, data_json: String, options_json: Option<String>) -> Result<(), JsValue> {
        let data: Value = parse_json("arcs", &data_json).map_err(js_err)?;
        let options: Option<ArcOptions> = parse_optional("arc options", options_json).map_err(js_err)?;
        self.map.arc(data, options).map(|_| ()).map_err(js_err)
    }

    pub fn labels(&mut self, options_json: Option<String>) -> Result<(), JsValue> {
        let options: Option<LabelsOptions> = parse_optional("labels options", options_json).map_err(js_err)?;
        self.map.labels(options).map(|_| ()).map_err(js_err)
    }

    pub fn legend(&mut self, data_json: Option<String>) -> Result<(), JsValue> {
        let data: Value = parse_optional("legend", data_json).map_err(js_err)?.unwrap_or(Value::Null);
        self.map.legend(data).map(|_| ()).map_err(js_err)
    }

    pub fn graticule(&mut self) -> Result<(), JsValue> {
        self.map.graticule().map(|_| ()).map_err(js_err)
    }

    /// Scale applied for a new container width; `undefined` unless
    /// responsive.
    pub fn resize(&mut self, container_width: f64) -> Option<f64> {
        self.map.resize(container_width)
    }

    #[wasm_bindgen(js_name = latLngToXY)]
    pub fn lat_lng_to_xy(&self, lat: f64, lng: f64) -> Option<Vec<f64>> {
        self.map.lat_lng_to_xy(lat, lng).map(|p| vec![p.x, p.y])
    }

    /// Advances transitions to `time_ms` and remounts. Returns how many are
    /// still running.
    pub fn tick(&mut self, time_ms: f64) -> Result<u32, JsValue> {
        let running = self.map.tick(Frame::at(Time::from_ms(time_ms)));
        self.mount()?;
        Ok(running as u32)
    }

    #[wasm_bindgen(js_name = pointerMove)]
    pub fn pointer_move(&mut self, x: f64, y: f64) -> Result<JsValue, JsValue> {
        let state = pointer_at(&mut self.map, x, y);
        self.mount()?;
        serde_json::to_string(&state)
            .map(|s| JsValue::from_str(&s))
            .map_err(js_err)
    }

    #[wasm_bindgen(js_name = pointerLeave)]
    pub fn pointer_leave(&mut self) -> Result<(), JsValue> {
        self.map.pointer_leave();
        self.mount()
    }
}
