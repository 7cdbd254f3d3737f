//! Document engine interface boundary.
//!
//! The embedded engine that parses documents, computes layout, and executes
//! commands is an external capability; the driver only ever talks to it
//! through the [`DocumentEngine`] and [`DocumentRoot`] traits defined here.
//! Layout math, style resolution, and command semantics are opaque on this
//! side of the boundary.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use slateview_core::scaling::{ScalingResult, ViewportMetrics};
use slateview_core::Result;

pub mod capsule;

pub use capsule::DocumentCapsule;

/// Opaque handle to an in-flight asynchronous effect inside the engine.
///
/// The engine attaches one of these to events whose effect can later be
/// resolved (with a value) or terminated; the driver correlates them with
/// outbound event tokens in its pending-action registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActionHandle(pub u64);

/// How a pending action is resolved back into the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionResolution {
    /// Resolved with no value.
    Unit,
    /// Resolved with an integer argument.
    Arg(i64),
    /// Resolved with a rectangle (e.g. the first-line bounds of a component).
    Rect(Rect),
    /// The peer could not handle the action.
    Failed,
}

/// A rectangle in viewport dp coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// An event popped from the engine's internal queue during the frame loop.
#[derive(Debug)]
pub enum EngineEvent {
    /// The document finished; the session is over.
    Finish { payload: Value },
    /// A `SendEvent` command fired; forwarded to the host as a directive.
    SendEvent { payload: Value },
    /// A lazy data source wants more items; forwarded as a directive.
    DataSourceFetch { payload: Value },
    /// A log command fired inside the document; forwarded to the host's sink.
    Log { source: String, message: String },
    /// An extension command or handler was invoked from the document.
    Extension {
        uri: String,
        name: String,
        source: Value,
        params: Value,
        action: Option<ActionHandle>,
    },
    /// Anything else is relayed to the view host verbatim.
    Other {
        kind: String,
        payload: Value,
        action: Option<ActionHandle>,
    },
}

/// Extension surface registered into the engine at inflation time.
#[derive(Debug, Clone, Default)]
pub struct ExtensionRegistration {
    pub uri: String,
    pub environment: Value,
    pub commands: Vec<Value>,
    pub event_handlers: Vec<Value>,
    pub live_data: Vec<Value>,
}

/// Synchronous text measurement contract the engine calls during layout.
pub trait TextMeasurement: Send + Sync {
    fn measure(&self, request: &MeasureRequest) -> MeasuredSize;
}

/// One measurement request from the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasureRequest {
    pub text: String,
    pub style: Value,
    pub max_width: f64,
    pub max_height: f64,
}

/// Measured size in dp. [`MeasuredSize::zero`] is the unmeasured fallback.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MeasuredSize {
    pub width: f64,
    pub height: f64,
}

impl MeasuredSize {
    pub fn zero() -> Self {
        Self::default()
    }
}

/// Synchronous locale-aware casing contract the engine calls during layout.
pub trait LocaleTransform: Send + Sync {
    fn to_upper(&self, value: &str, locale: &str) -> String;
    fn to_lower(&self, value: &str, locale: &str) -> String;
}

/// Everything the engine needs at inflation time beyond the document itself.
#[derive(Clone, Default)]
pub struct EngineConfig {
    pub utc_offset_ms: i64,
    pub environment: Value,
    pub extensions: Vec<ExtensionRegistration>,
    pub text_measurement: Option<Arc<dyn TextMeasurement>>,
    pub locale: Option<Arc<dyn LocaleTransform>>,
}

impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConfig")
            .field("utc_offset_ms", &self.utc_offset_ms)
            .field("extensions", &self.extensions.len())
            .field("text_measurement", &self.text_measurement.is_some())
            .field("locale", &self.locale.is_some())
            .finish()
    }
}

/// The embedded document engine. Inflation is the only entry point; all
/// per-document operations live on the returned [`DocumentRoot`].
pub trait DocumentEngine: Send + Sync {
    fn inflate(
        &self,
        content: &str,
        metrics: &ViewportMetrics,
        scaling: &ScalingResult,
        config: &EngineConfig,
    ) -> Result<Box<dyn DocumentRoot>>;
}

/// A live inflated document.
///
/// Mutating operations take `&mut self`; the driver owns exactly one root at
/// a time behind its session lock.
pub trait DocumentRoot: Send {
    // --- frame loop ---

    /// Advance the engine clock.
    fn update_tick(&mut self, utc_millis: i64, utc_offset_ms: i64);

    /// Let the engine flush internally pending actions.
    fn run_pending(&mut self);

    /// Drain actions the engine terminated since the last call. Each id is
    /// reported at most once.
    fn take_terminated(&mut self) -> Vec<ActionHandle>;

    /// Drain runtime errors the engine reported since the last call.
    fn take_runtime_errors(&mut self) -> Vec<Value>;

    /// Pop the next queued event, if any.
    fn pop_event(&mut self) -> Option<EngineEvent>;

    fn is_dirty(&self) -> bool;

    /// Serialize the changed-component set since the last clear.
    fn serialize_dirty(&mut self) -> Value;

    fn clear_dirty(&mut self);

    // --- document surface ---

    fn hierarchy(&self) -> Value;
    fn rendering_options(&self) -> Value;
    fn doc_theme(&self) -> Value;
    fn background(&self) -> Value;
    fn supports_resizing(&self) -> bool;
    fn visual_context(&self) -> Value;
    fn screen_locked(&self) -> bool;

    // --- commands and data ---

    /// Execute a command batch; returns a handle when the batch is resolvable.
    fn execute_commands(&mut self, commands: Value) -> Option<ActionHandle>;

    /// Interrupt the running command sequence.
    fn cancel_execution(&mut self);

    fn update_data_source(&mut self, kind: &str, payload: Value) -> bool;

    /// Surface any data-source errors accumulated since the last call.
    fn data_source_errors(&mut self) -> Option<Value>;

    fn resolve_action(&mut self, action: ActionHandle, resolution: ActionResolution);

    // --- component updates ---

    fn update_component(&mut self, id: &str, kind: &str, value: &Value) -> bool;
    fn update_media(&mut self, id: &str, state: &Value) -> bool;
    fn update_graphic(&mut self, id: &str, avg: &str) -> bool;
    fn ensure_layout(&mut self, id: &str) -> bool;
    fn scroll_to_rect(&mut self, id: &str, rect: Rect) -> bool;

    // --- input round trips ---

    fn handle_keyboard(&mut self, event_type: &str, keyboard: &Value) -> bool;
    fn focusable_areas(&self) -> Value;
    fn focused_id(&self) -> Option<String>;
    fn set_focus(&mut self, direction: &str, origin: Rect, target: &str) -> bool;
    fn update_cursor_position(&mut self, x: f64, y: f64);
    fn handle_pointer_event(&mut self, pointer: &Value) -> bool;
    fn is_character_valid(&self, character: char, id: &str) -> bool;
    fn displayed_child_count(&self, id: &str) -> Option<u64>;
    fn displayed_child_id(&self, id: &str, index: u64) -> Option<String>;

    // --- lifecycle ---

    /// Apply a configuration change; returns true when the change affects
    /// sizing and the document must be re-inflated.
    fn configuration_change(&mut self, change: &Value) -> bool;

    /// An extension pushed an event or live-data update into the document.
    fn handle_extension_event(&mut self, uri: &str, name: &str, data: Value);

    /// The view host finished drawing the current frame.
    fn render_complete(&mut self);
}
