use wasm_bindgen::prelude::*;
use dropduel_core::{
    encode, share_link, ArenaWorld, Game, GameConfig, GameEvent, Message, PlayerInput, Session,
    SessionError, SessionEvent, Snapshot,
};
use serde::Serialize;

/// Install panic hook and route `log` to the browser console.
#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
    if console_log::init_with_level(log::Level::Info).is_err() {
        web_sys::console::warn_1(&"dropduel: logger already initialised".into());
    }
}

fn now() -> u64 {
    js_sys::Date::now() as u64
}

fn js_err(e: impl std::fmt::Display) -> JsError {
    JsError::new(&e.to_string())
}

/// Session backed by the page's peer library. Outbound traffic goes through
/// JS callbacks; inbound lifecycle and data events are fed in by `WasmGame`.
struct JsSession {
    local_id: Option<String>,
    open: bool,
    send_fn: js_sys::Function,
    connect_fn: js_sys::Function,
}

impl Session for JsSession {
    fn host(&mut self) -> Result<String, SessionError> {
        self.local_id.clone().ok_or(SessionError::NotReady)
    }

    fn connect(&mut self, remote_id: &str) -> Result<(), SessionError> {
        if self.open {
            return Err(SessionError::AlreadyConnected);
        }
        self.connect_fn
            .call1(&JsValue::NULL, &JsValue::from_str(remote_id))
            .map_err(|e| SessionError::Transport(format!("{:?}", e)))?;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn send(&mut self, msg: &Message) -> Result<(), SessionError> {
        if !self.open {
            return Err(SessionError::NotOpen);
        }
        let json = encode(msg)?;
        self.send_fn
            .call1(&JsValue::NULL, &JsValue::from_str(&json))
            .map_err(|e| SessionError::Transport(format!("{:?}", e)))?;
        Ok(())
    }
}

/// One rendered frame: world snapshot plus events raised since the last frame.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsFrame {
    snapshot: Snapshot,
    events: Vec<GameEvent>,
}

#[wasm_bindgen]
pub struct WasmGame {
    inner: Game<ArenaWorld, JsSession>,
}

#[wasm_bindgen]
impl WasmGame {
    /// `send_fn(json)` delivers one message to the peer; `connect_fn(id)` dials a host.
    /// `config_json` may be empty for defaults or a partial camelCase config object.
    #[wasm_bindgen(constructor)]
    pub fn new(
        config_json: &str,
        send_fn: js_sys::Function,
        connect_fn: js_sys::Function,
    ) -> Result<WasmGame, JsError> {
        let config = if config_json.trim().is_empty() {
            GameConfig::default()
        } else {
            GameConfig::from_json(config_json).map_err(js_err)?
        };
        let world = ArenaWorld::new(config.arena_width, config.arena_height);
        let session = JsSession { local_id: None, open: false, send_fn, connect_fn };
        Ok(WasmGame { inner: Game::new(config, world, session) })
    }

    // ── Peer library callbacks ──

    pub fn on_peer_ready(&mut self, local_id: &str) {
        self.inner.session_mut().local_id = Some(local_id.to_string());
        self.inner
            .handle_event(SessionEvent::Ready { local_id: local_id.to_string() }, now());
    }

    pub fn on_incoming(&mut self, remote_id: &str) {
        self.inner
            .handle_event(SessionEvent::Incoming { remote_id: remote_id.to_string() }, now());
    }

    pub fn on_open(&mut self) {
        self.inner.session_mut().open = true;
        self.inner.handle_event(SessionEvent::Open, now());
    }

    pub fn on_data(&mut self, json: &str) {
        self.inner.handle_raw(json, now());
    }

    pub fn on_close(&mut self) {
        self.inner.session_mut().open = false;
        self.inner.handle_event(SessionEvent::Close, now());
    }

    pub fn on_error(&mut self, message: &str) {
        self.inner.handle_event(SessionEvent::Error(message.to_string()), now());
    }

    // ── Player actions ──

    pub fn connect(&mut self, remote_id: &str) -> Result<(), JsError> {
        self.inner.connect(remote_id).map_err(js_err)
    }

    pub fn request_rematch(&mut self) -> bool {
        self.inner.request_rematch()
    }

    pub fn accept_rematch(&mut self) -> bool {
        self.inner.accept_rematch(now())
    }

    /// Advance one frame. `buttons` is a bitmask of LEFT=1, RIGHT=2, JUMP=4.
    pub fn tick(&mut self, buttons: u8) {
        self.inner.tick(PlayerInput::new(buttons), now());
    }

    /// Tick and return `{ snapshot, events }` in one call.
    pub fn frame(&mut self, buttons: u8) -> Result<JsValue, JsValue> {
        self.tick(buttons);
        let frame = JsFrame {
            snapshot: self.inner.snapshot(),
            events: self.inner.drain_events(),
        };
        Ok(serde_wasm_bindgen::to_value(&frame)?)
    }

    // ── Views ──

    pub fn export_state(&self) -> Result<JsValue, JsValue> {
        Ok(serde_wasm_bindgen::to_value(&self.inner.snapshot())?)
    }

    pub fn take_events(&mut self) -> Result<JsValue, JsValue> {
        Ok(serde_wasm_bindgen::to_value(&self.inner.drain_events())?)
    }

    /// Link to hand to the opponent, or `undefined` before the peer library is ready.
    pub fn share_link(&self, base_url: &str) -> Option<String> {
        let id = self.inner.session().local_id.as_deref()?;
        Some(share_link(base_url, id))
    }

    pub fn is_host(&self) -> bool {
        self.inner.state().is_host()
    }

    pub fn is_connected(&self) -> bool {
        self.inner.state().is_connected
    }

    pub fn game_over(&self) -> bool {
        self.inner.state().game_over
    }

    pub fn local_score(&self) -> u32 {
        self.inner.state().local.score
    }

    pub fn remote_score(&self) -> u32 {
        self.inner.state().remote.score
    }

    pub fn phase(&self) -> String {
        self.inner.phase().name().to_string()
    }
}

/// Peer id from a page query string such as `?id=abc`, if present.
#[wasm_bindgen]
pub fn peer_id_from_query(query: &str) -> Option<String> {
    dropduel_core::peer_id_from_query(query)
}
