//! WASM bridge for the canvas session. Exposes history, input routing and
//! content loading to the browser host.
//!
//! Compiled via `wasm-pack build --target web`. The host owns the actual
//! canvas library; it hands over an adapter object (see [`js_engine`]) and
//! forwards the library's raw events through [`CanvasEditor::engine_event`].

mod console;
pub mod js_engine;

use canvas_core::{Disposer, EngineEvent, EventBus, Template};
use canvas_session::{
    CanvasSession, ContentLoader, DocumentFetcher, FetchError, LoadReport, SessionConfig,
    SessionNotice, ShortcutAction, TemplateId,
};
use js_engine::{JsEngine, describe};
use js_sys::{Function, Promise};
use serde_json::{Value, json};
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{JsFuture, future_to_promise};

/// Fetches template records through a host function returning a promise
/// of the record (object or JSON string).
struct JsFetcher {
    fetch: Function,
}

impl DocumentFetcher for JsFetcher {
    async fn fetch_document(&self, id: &TemplateId) -> Result<Value, FetchError> {
        let returned = self
            .fetch
            .call1(&JsValue::NULL, &JsValue::from_str(id.as_str()))
            .map_err(|err| FetchError::Transport(describe(&err)))?;
        let record = JsFuture::from(Promise::resolve(&returned))
            .await
            .map_err(|err| FetchError::Transport(describe(&err)))?;
        if record.is_null() || record.is_undefined() {
            return Err(FetchError::NotFound(id.clone()));
        }
        let text = match record.as_string() {
            Some(text) => text,
            None => js_sys::JSON::stringify(&record)
                .map(String::from)
                .map_err(|err| FetchError::Transport(describe(&err)))?,
        };
        serde_json::from_str(&text)
            .map_err(|err| FetchError::Transport(format!("record is not JSON: {err}")))
    }
}

/// The WASM-facing session controller.
///
/// All host interaction goes through this struct. Notices are delivered
/// as JSON strings `{"kind": ..., "payload": ...}` to callbacks registered
/// with [`CanvasEditor::on_notice`].
#[wasm_bindgen]
pub struct CanvasEditor {
    session: Rc<RefCell<CanvasSession<JsEngine>>>,
    loader: Rc<ContentLoader<JsFetcher>>,
    /// Where raw engine events are published; the session's handler
    /// queues them for the next pump.
    engine_bus: Option<EventBus<EngineEvent>>,
    listeners: Disposer,
}

#[wasm_bindgen]
impl CanvasEditor {
    /// Create a controller. `fetch` resolves template ids to records;
    /// `config_json` overrides the default session configuration.
    #[wasm_bindgen(constructor)]
    pub fn new(fetch: Function, config_json: Option<String>) -> Result<CanvasEditor, JsValue> {
        console::panic_hook_setup();
        console::init(log::LevelFilter::Info);

        let config = match config_json.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => SessionConfig::from_json(text).map_err(to_js)?,
            _ => SessionConfig::default(),
        };
        Ok(Self {
            session: Rc::new(RefCell::new(CanvasSession::new(config))),
            loader: Rc::new(ContentLoader::new(JsFetcher { fetch })),
            engine_bus: None,
            listeners: Disposer::new(),
        })
    }

    // ─── Lifecycle ───────────────────────────────────────────────────────

    /// Start engine acquisition.
    pub fn begin(&self) -> Result<(), JsValue> {
        self.with_session(|s| s.begin())?.map_err(to_js)
    }

    /// Hand over the engine adapter once the host's canvas is ready.
    pub fn attach_engine(&mut self, adapter: JsValue) -> Result<(), JsValue> {
        let engine = JsEngine::new(adapter);
        let bus = engine.bus_handle();
        self.with_session(|s| s.attach_engine(engine))?
            .map_err(to_js)?;
        self.engine_bus = Some(bus);
        Ok(())
    }

    /// The host could not create its canvas. The session stays
    /// initializing so the host may retry.
    pub fn engine_failed(&self, message: &str) -> Result<(), JsValue> {
        self.with_session(|s| s.engine_failed(message))
    }

    /// Fetch and install the starter template. Resolves with a JSON load
    /// report, rejects with the error message.
    pub fn load_template(&self, template_id: String) -> Promise {
        let session = Rc::clone(&self.session);
        let loader = Rc::clone(&self.loader);
        future_to_promise(async move {
            let report = loader
                .load(&*session, TemplateId::new(template_id))
                .await
                .map_err(to_js)?;
            Ok(JsValue::from_str(&report_json(&report).to_string()))
        })
    }

    /// Tear down the session, its engine and every notice listener.
    pub fn dispose(&mut self) -> Result<(), JsValue> {
        let detached = self.listeners.unsubscribe_all();
        log::debug!("editor: {detached} notice listeners detached");
        self.engine_bus = None;
        self.with_session(|s| s.dispose())
    }

    // ─── Engine events ───────────────────────────────────────────────────

    /// Forward a raw engine event (`element:modified`, `selection:created`,
    /// ...) with its JSON payload and the engine timestamp.
    ///
    /// Events raised while the session is busy (the host reacting to an
    /// engine call made by the session) are queued and handled before
    /// that call returns.
    pub fn engine_event(&self, name: &str, payload_json: &str, time_ms: f64) -> Result<(), JsValue> {
        let payload: Value = if payload_json.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(payload_json).map_err(to_js)?
        };
        let event = EngineEvent::from_wire(name, &payload, time_ms).map_err(to_js)?;
        let Some(bus) = &self.engine_bus else {
            return Err(JsValue::from_str("no engine attached"));
        };
        bus.emit(&event);
        if let Ok(mut session) = self.session.try_borrow_mut() {
            session.pump();
        }
        Ok(())
    }

    // ─── History ─────────────────────────────────────────────────────────

    pub fn undo(&self) -> Result<bool, JsValue> {
        self.with_session(|s| s.undo().is_started())
    }

    pub fn redo(&self) -> Result<bool, JsValue> {
        self.with_session(|s| s.redo().is_started())
    }

    /// Record a change the host made outside of engine gestures (property
    /// panel edits and the like).
    pub fn commit_user_change(&self) -> Result<bool, JsValue> {
        self.with_session(|s| s.commit_user_change().is_recorded())
    }

    /// JSON: `{"canUndo", "canRedo", "len", "cursor"}`.
    pub fn history_status(&self) -> Result<String, JsValue> {
        let status = self.with_session(|s| s.history_status())?;
        serde_json::to_string(&status).map_err(to_js)
    }

    // ─── Keyboard Shortcut API ───────────────────────────────────────────

    /// Handle a keyboard event. Returns a JSON string:
    /// `{"handled":bool, "action":"<action_name>"}`
    pub fn handle_key(
        &self,
        key: &str,
        ctrl: bool,
        shift: bool,
        alt: bool,
        meta: bool,
    ) -> Result<String, JsValue> {
        let action = self.with_session(|s| s.handle_key(key, ctrl, shift, alt, meta))?;
        let reply = match action {
            Some(action) => json!({"handled": true, "action": action_to_name(action)}),
            None => json!({"handled": false, "action": "none"}),
        };
        Ok(reply.to_string())
    }

    // ─── Queries ─────────────────────────────────────────────────────────

    pub fn state(&self) -> Result<String, JsValue> {
        self.with_session(|s| s.state().to_string())
    }

    /// Current toolbar placement as JSON: `{"x", "y", "side", "visible"}`.
    pub fn toolbar(&self) -> Result<String, JsValue> {
        let notice = self.with_session(|s| SessionNotice::Toolbar(s.toolbar()))?;
        Ok(notice.to_json()["payload"].to_string())
    }

    /// Id of the text element being edited, or an empty string.
    pub fn editing_id(&self) -> Result<String, JsValue> {
        self.with_session(|s| s.editing().map(|id| id.as_str().to_string()).unwrap_or_default())
    }

    /// Register a notice callback. It receives one JSON string per notice
    /// and stays attached until [`CanvasEditor::dispose`].
    pub fn on_notice(&mut self, callback: Function) -> Result<(), JsValue> {
        let subscription = self.with_session(|s| {
            s.notices().subscribe(move |notice: &SessionNotice| {
                let text = notice.to_json().to_string();
                if let Err(err) = callback.call1(&JsValue::NULL, &JsValue::from_str(&text)) {
                    log::warn!("editor: notice callback failed: {}", describe(&err));
                }
            })
        })?;
        self.listeners.add(subscription);
        Ok(())
    }
}

impl CanvasEditor {
    fn with_session<R>(
        &self,
        f: impl FnOnce(&mut CanvasSession<JsEngine>) -> R,
    ) -> Result<R, JsValue> {
        let mut session = self
            .session
            .try_borrow_mut()
            .map_err(|_| JsValue::from_str("session is busy"))?;
        Ok(f(&mut session))
    }
}

fn to_js(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}

fn report_json(report: &LoadReport) -> Value {
    json!({
        "template": report.template.as_str(),
        "source": report.source,
        "elements": report.elements,
        "recorded": report.snapshot.is_recorded(),
        "normalized": {
            "typesRenamed": report.normalized.types_renamed,
            "baselinesRewritten": report.normalized.baselines_rewritten,
            "stylesAdded": report.normalized.styles_added,
            "anglesReset": report.normalized.angles_reset,
            "idsAssigned": report.normalized.ids_assigned,
            "skipped": report.normalized.skipped,
        },
    })
}

fn action_to_name(action: ShortcutAction) -> &'static str {
    match action {
        ShortcutAction::Undo => "undo",
        ShortcutAction::Redo => "redo",
        ShortcutAction::Delete => "delete",
        ShortcutAction::SelectAll => "selectAll",
        ShortcutAction::Duplicate => "duplicate",
        ShortcutAction::Nudge { .. } => "nudge",
        ShortcutAction::SendBackward => "sendBackward",
        ShortcutAction::BringForward => "bringForward",
        ShortcutAction::SendToBack => "sendToBack",
        ShortcutAction::BringToFront => "bringToFront",
        ShortcutAction::Deselect => "deselect",
        ShortcutAction::ExitTextEditing => "exitTextEditing",
    }
}

// ─── Standalone functions (no session needed) ────────────────────────────

/// Change the console log level (`error`, `warn`, `info`, `debug`, `trace`).
#[wasm_bindgen]
pub fn set_log_level(level: &str) {
    console::init(console::parse_level(level));
}

/// Normalize a template record without loading it. Returns JSON
/// `{"ok":true,"source":...,"elements":[...],"skipped":[...]}` or
/// `{"ok":false,"error":"..."}`.
#[wasm_bindgen]
pub fn normalize_template(record_json: &str) -> String {
    normalize_record(record_json).to_string()
}

fn normalize_record(record_json: &str) -> Value {
    let tree: Value = match serde_json::from_str(record_json) {
        Ok(tree) => tree,
        Err(err) => return json!({"ok": false, "error": err.to_string()}),
    };
    match Template::from_tree(&tree) {
        Ok(template) => json!({
            "ok": true,
            "source": template.source,
            "background": template.background,
            "elements": template.elements,
            "skipped": template.report.skipped,
        }),
        Err(err) => json!({"ok": false, "error": err.to_string()}),
    }
}
