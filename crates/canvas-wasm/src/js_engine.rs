//! [`CanvasEngine`] over a JavaScript adapter object.
//!
//! The host wraps its canvas library in a plain object whose methods take
//! and return JSON strings:
//!
//! | method              | arguments                 | returns                  |
//! |---------------------|---------------------------|--------------------------|
//! | `addElements`       | elements JSON             | throws on conflict       |
//! | `removeElement`     | id                        | element JSON or `null`   |
//! | `clear`             |                           |                          |
//! | `setBackground`     | color or `null`           |                          |
//! | `serialize`         |                           | document JSON            |
//! | `loadDocument`      | document JSON             | emits `document:loaded` |
//! | `element`           | id                        | element JSON or `null`   |
//! | `boundingBox`       | id                        | box JSON or `null`       |
//! | `viewport`          |                           | viewport JSON            |
//! | `activeSelection`   |                           | id array JSON            |
//! | `select`            | id array JSON             |                          |
//! | `clearSelection`    |                           |                          |
//! | `enterTextEditing`  | id                        | bool                     |
//! | `exitTextEditing`   |                           |                          |
//! | `translateElements` | id array JSON, dx, dy     |                          |
//! | `reorder`           | id, order                 | bool                     |
//! | `dispose`           |                           |                          |
//!
//! Raw events travel the other way through `CanvasEditor::engine_event`.

use canvas_core::{
    CanvasEngine, Document, Element, ElementId, EngineError, EngineEvent, EventBus, Rect, Vec2,
    Viewport, ZOrder,
};
use js_sys::{Array, Function, Reflect};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use wasm_bindgen::{JsCast, JsValue};

pub struct JsEngine {
    adapter: JsValue,
    bus: EventBus<EngineEvent>,
    live: bool,
}

impl JsEngine {
    pub fn new(adapter: JsValue) -> Self {
        Self {
            adapter,
            bus: EventBus::new(),
            live: true,
        }
    }

    /// A handle to the event bus that stays usable while the session
    /// holds the engine.
    pub fn bus_handle(&self) -> EventBus<EngineEvent> {
        self.bus.clone()
    }

    fn call(&self, method: &str, args: &[JsValue]) -> Result<JsValue, EngineError> {
        if !self.live {
            return Err(EngineError::Disposed);
        }
        let function = Reflect::get(&self.adapter, &JsValue::from_str(method))
            .ok()
            .and_then(|f| f.dyn_into::<Function>().ok())
            .ok_or_else(|| EngineError::Rejected(format!("adapter has no `{method}` method")))?;
        let argv: Array = args.iter().collect();
        function
            .apply(&self.adapter, &argv)
            .map_err(|err| EngineError::Rejected(describe(&err)))
    }

    /// Call for side effects only; failures are logged.
    fn call_logged(&self, method: &str, args: &[JsValue]) -> Option<JsValue> {
        match self.call(method, args) {
            Ok(value) => Some(value),
            Err(err) => {
                log::warn!("js-engine: {method}: {err}");
                None
            }
        }
    }

    /// Call and decode a JSON string result. `null`/`undefined` is `None`.
    fn call_json<T: DeserializeOwned>(
        &self,
        method: &str,
        args: &[JsValue],
    ) -> Result<Option<T>, EngineError> {
        let value = self.call(method, args)?;
        if value.is_null() || value.is_undefined() {
            return Ok(None);
        }
        let text = value
            .as_string()
            .ok_or_else(|| EngineError::Rejected(format!("`{method}` did not return a string")))?;
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|err| EngineError::Rejected(format!("`{method}` returned bad JSON: {err}")))
    }
}

pub(crate) fn describe(err: &JsValue) -> String {
    err.as_string().unwrap_or_else(|| format!("{err:?}"))
}

fn id_arg(id: ElementId) -> JsValue {
    JsValue::from_str(id.as_str())
}

fn json_arg<T: serde::Serialize + ?Sized>(value: &T) -> Result<JsValue, EngineError> {
    serde_json::to_string(value)
        .map(|text| JsValue::from_str(&text))
        .map_err(|err| EngineError::Rejected(err.to_string()))
}

pub(crate) fn zorder_name(order: ZOrder) -> &'static str {
    match order {
        ZOrder::Backward => "backward",
        ZOrder::Forward => "forward",
        ZOrder::ToBack => "back",
        ZOrder::ToFront => "front",
    }
}

// ─── Wire shapes ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct WireBox {
    left: f64,
    top: f64,
    width: f64,
    height: f64,
}

impl WireBox {
    pub(crate) fn to_rect(&self) -> Rect {
        Rect::new(
            self.left,
            self.top,
            self.left + self.width,
            self.top + self.height,
        )
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireViewport {
    width: f64,
    height: f64,
    #[serde(default = "unit_zoom")]
    zoom: f64,
    #[serde(default)]
    pan_x: f64,
    #[serde(default)]
    pan_y: f64,
}

fn unit_zoom() -> f64 {
    1.0
}

impl WireViewport {
    pub(crate) fn into_viewport(self) -> Viewport {
        Viewport {
            width: self.width,
            height: self.height,
            zoom: self.zoom,
            pan: Vec2::new(self.pan_x, self.pan_y),
        }
    }
}

// ─── Facade ──────────────────────────────────────────────────────────────

impl CanvasEngine for JsEngine {
    fn events(&self) -> &EventBus<EngineEvent> {
        &self.bus
    }

    fn is_live(&self) -> bool {
        self.live && !self.adapter.is_null() && !self.adapter.is_undefined()
    }

    fn add_elements(&mut self, elements: Vec<Element>) -> Result<(), EngineError> {
        let arg = json_arg(&elements)?;
        self.call("addElements", &[arg]).map(drop)
    }

    fn remove_element(&mut self, id: ElementId) -> Result<Element, EngineError> {
        self.call_json("removeElement", &[id_arg(id)])?
            .ok_or(EngineError::UnknownElement(id))
    }

    fn clear(&mut self) {
        self.call_logged("clear", &[]);
    }

    fn set_background(&mut self, background: Option<String>) {
        let arg = background.map_or(JsValue::NULL, |color| JsValue::from_str(&color));
        self.call_logged("setBackground", &[arg]);
    }

    fn serialize(&self) -> Result<Document, EngineError> {
        self.call_json("serialize", &[])?
            .ok_or_else(|| EngineError::Rejected("`serialize` returned nothing".into()))
    }

    fn load_document(&mut self, document: Document) -> Result<(), EngineError> {
        let arg = json_arg(&document)?;
        self.call("loadDocument", &[arg]).map(drop)
    }

    fn element(&self, id: ElementId) -> Option<Element> {
        match self.call_json("element", &[id_arg(id)]) {
            Ok(element) => element,
            Err(err) => {
                log::warn!("js-engine: element {id}: {err}");
                None
            }
        }
    }

    fn bounding_box(&self, id: ElementId) -> Option<Rect> {
        self.call_json::<WireBox>("boundingBox", &[id_arg(id)])
            .ok()
            .flatten()
            .map(|b| b.to_rect())
    }

    fn viewport(&self) -> Viewport {
        match self.call_json::<WireViewport>("viewport", &[]) {
            Ok(Some(viewport)) => viewport.into_viewport(),
            Ok(None) => Viewport::default(),
            Err(err) => {
                log::warn!("js-engine: viewport: {err}");
                Viewport::default()
            }
        }
    }

    fn active_selection(&self) -> Vec<ElementId> {
        self.call_json::<Vec<ElementId>>("activeSelection", &[])
            .ok()
            .flatten()
            .unwrap_or_default()
    }

    fn select(&mut self, ids: &[ElementId]) {
        match json_arg(ids) {
            Ok(arg) => {
                self.call_logged("select", &[arg]);
            }
            Err(err) => log::warn!("js-engine: select: {err}"),
        }
    }

    fn clear_selection(&mut self) {
        self.call_logged("clearSelection", &[]);
    }

    fn enter_text_editing(&mut self, id: ElementId) -> Result<(), EngineError> {
        let accepted = self
            .call("enterTextEditing", &[id_arg(id)])?
            .as_bool()
            .unwrap_or(true);
        if accepted {
            Ok(())
        } else {
            Err(EngineError::NotText(id))
        }
    }

    fn exit_text_editing(&mut self) {
        self.call_logged("exitTextEditing", &[]);
    }

    fn translate_elements(&mut self, ids: &[ElementId], delta: Vec2) {
        match json_arg(ids) {
            Ok(arg) => {
                self.call_logged(
                    "translateElements",
                    &[arg, JsValue::from_f64(delta.x), JsValue::from_f64(delta.y)],
                );
            }
            Err(err) => log::warn!("js-engine: translate: {err}"),
        }
    }

    fn reorder(&mut self, id: ElementId, order: ZOrder) -> bool {
        self.call_logged(
            "reorder",
            &[id_arg(id), JsValue::from_str(zorder_name(order))],
        )
        .and_then(|moved| moved.as_bool())
        .unwrap_or(false)
    }

    fn dispose(&mut self) {
        if !self.live {
            return;
        }
        self.call_logged("dispose", &[]);
        self.live = false;
        self.bus.clear();
        log::debug!("js-engine: disposed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn box_becomes_scene_rect() {
        let b: WireBox =
            serde_json::from_str(r#"{"left": 10, "top": 20, "width": 30, "height": 5}"#).unwrap();
        assert_eq!(b.to_rect(), Rect::new(10.0, 20.0, 40.0, 25.0));
    }

    #[test]
    fn viewport_defaults_zoom_and_pan() {
        let v: WireViewport = serde_json::from_str(r#"{"width": 1024, "height": 768}"#).unwrap();
        assert_eq!(v.into_viewport(), Viewport::new(1024.0, 768.0));

        let v: WireViewport = serde_json::from_str(
            r#"{"width": 100, "height": 100, "zoom": 2, "panX": 5, "panY": -5}"#,
        )
        .unwrap();
        let v = v.into_viewport();
        assert_eq!(v.zoom, 2.0);
        assert_eq!(v.pan, Vec2::new(5.0, -5.0));
    }

    #[test]
    fn zorder_names() {
        assert_eq!(zorder_name(ZOrder::ToBack), "back");
        assert_eq!(zorder_name(ZOrder::Forward), "forward");
    }
}
