//! The session driver.
//!
//! One [`SessionDriver`] owns one document session at a time: it drives the
//! frame loop, stamps every outbound frame from the per-session sequence
//! counter, correlates pending actions, and dispatches inbound protocol
//! messages. The outbound side is an unbounded channel of serialized JSON
//! frames; the host's transport drains it in order.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use slateview_core::config::DriverConfig;
use slateview_core::protocol::{Envelope, OutboundKind};
use slateview_core::scaling::{ScalingResult, ViewportMetrics, ViewportSpec};
use slateview_engine::{DocumentCapsule, DocumentEngine, DocumentRoot};
use slateview_extensions::{
    Extension, ExtensionEventBridge, ExtensionEventCallback, ExtensionRegistry,
};

use crate::host::ViewHost;
use crate::pending::PendingActionRegistry;
use crate::roundtrip::BlockingLink;

/// Content waiting to be inflated by the next `build` message.
#[derive(Debug, Clone)]
pub(crate) struct PendingContent {
    pub content: String,
    pub token: String,
}

/// One extension the current document requests, with its settings.
///
/// Requested uris and settings come from the host's directive decoder; the
/// driver never parses document content itself.
#[derive(Debug, Clone)]
pub struct ExtensionRequest {
    pub uri: String,
    pub settings: Value,
}

/// The live session owned by the driver.
pub(crate) struct SessionState {
    pub token: String,
    pub root: Box<dyn DocumentRoot>,
    pub metrics: ViewportMetrics,
    pub scaling: ScalingResult,
    pub screen_locked: bool,
}

/// Extension event resolution waiting to be applied on the next frame pass.
pub(crate) struct ExtensionResult {
    pub token: u64,
    pub succeeded: bool,
    pub result: Value,
}

/// Extension-originated event waiting to be pushed into the document.
pub(crate) struct ExtensionPush {
    pub uri: String,
    pub name: String,
    pub data: Value,
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

pub(crate) struct DriverInner {
    pub instance_id: Uuid,
    pub config: DriverConfig,
    pub engine: Arc<dyn DocumentEngine>,
    pub host: Arc<dyn ViewHost>,
    pub extensions: ExtensionRegistry,
    pub outbound: mpsc::UnboundedSender<String>,
    pub seqno: AtomicU64,
    pub pending: Mutex<PendingActionRegistry>,
    pub link: BlockingLink,
    pub session: tokio::sync::Mutex<Option<SessionState>>,
    pub content: Mutex<Option<PendingContent>>,
    pub requested_extensions: Mutex<Vec<ExtensionRequest>>,
    pub specs: Mutex<Vec<ViewportSpec>>,
    pub pending_config_change: Mutex<Option<Value>>,
    pub extension_results: Mutex<Vec<ExtensionResult>>,
    pub extension_pushes: Mutex<Vec<ExtensionPush>>,
}

impl DriverInner {
    pub fn next_seqno(&self) -> u64 {
        self.seqno.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Serialize and send a frame with a freshly allocated sequence number.
    pub fn send(&self, kind: OutboundKind, payload: Value) -> u64 {
        let seqno = self.next_seqno();
        self.send_with_seqno(kind, seqno, payload);
        seqno
    }

    pub fn send_with_seqno(&self, kind: OutboundKind, seqno: u64, payload: Value) {
        let envelope = Envelope::outbound(kind, seqno, payload);
        match serde_json::to_string(&envelope) {
            Ok(text) => {
                if self.outbound.send(text).is_err() {
                    debug!(kind = kind.as_str(), seqno, "Outbound channel closed");
                }
            }
            Err(e) => warn!(kind = kind.as_str(), %e, "Failed to serialize outbound frame"),
        }
    }

    pub fn send_error(&self, message: &str) {
        self.send(
            OutboundKind::Error,
            serde_json::json!({ "message": message }),
        );
    }

    /// Log and report an operation attempted with no active session.
    pub fn no_session(&self, operation: &str) {
        tracing::error!(driver_id = %self.instance_id, operation, "No active session");
        self.send_error(&format!("No active session for {operation}"));
    }

    /// One blocking round trip to the view host.
    ///
    /// Safe to invoke from inside synchronous engine callbacks only when the
    /// inbound dispatch path runs on another thread (multi-thread runtime);
    /// see [`crate::roundtrip::BlockingLink`].
    pub fn blocking_send(&self, kind: OutboundKind, payload: Value, timeout: Duration) -> Value {
        let seqno = self.next_seqno();
        self.link
            .round_trip(seqno, timeout, || self.send_with_seqno(kind, seqno, payload))
    }

    pub fn blocking_timeout(&self) -> Duration {
        Duration::from_millis(self.config.blocking_timeout_ms)
    }
}

/// Extension events resolve back through the driver: the result is queued
/// and applied against the pending-action registry on the next frame pass,
/// which keeps this callback synchronous and runtime-agnostic.
impl ExtensionEventCallback for DriverInner {
    fn resolve(&self, token: u64, succeeded: bool, result: Value) {
        debug!(token, succeeded, "Extension event resolved");
        lock(&self.extension_results).push(ExtensionResult {
            token,
            succeeded,
            result,
        });
    }
}

/// Extensions push document-bound events through the same queued path.
impl ExtensionEventBridge for DriverInner {
    fn send_extension_event(&self, uri: &str, name: &str, data: Value) {
        lock(&self.extension_pushes).push(ExtensionPush {
            uri: uri.to_string(),
            name: name.to_string(),
            data,
        });
    }
}

/// Public handle to one driver instance.
#[derive(Clone)]
pub struct SessionDriver {
    pub(crate) inner: Arc<DriverInner>,
}

impl SessionDriver {
    /// Create a driver. Returns the receiver side of the outbound frame
    /// channel for the host transport to drain.
    pub fn new(
        config: DriverConfig,
        engine: Arc<dyn DocumentEngine>,
        host: Arc<dyn ViewHost>,
        extensions: ExtensionRegistry,
    ) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let specs = config.viewport_specs.clone();
        let inner = Arc::new(DriverInner {
            instance_id: Uuid::new_v4(),
            config,
            engine,
            host,
            extensions,
            outbound,
            seqno: AtomicU64::new(0),
            pending: Mutex::new(PendingActionRegistry::new()),
            link: BlockingLink::new(),
            session: tokio::sync::Mutex::new(None),
            content: Mutex::new(None),
            requested_extensions: Mutex::new(Vec::new()),
            specs: Mutex::new(specs),
            pending_config_change: Mutex::new(None),
            extension_results: Mutex::new(Vec::new()),
            extension_pushes: Mutex::new(Vec::new()),
        });
        info!(driver_id = %inner.instance_id, "Session driver created");
        (Self { inner }, outbound_rx)
    }

    pub fn config(&self) -> &DriverConfig {
        &self.inner.config
    }

    /// Stage document content and its presentation token for the next build.
    pub fn set_content(&self, content: String, token: String) {
        debug!(driver_id = %self.inner.instance_id, %token, "Content staged");
        *lock(&self.inner.content) = Some(PendingContent { content, token });
    }

    /// Stage the extensions the staged document requests.
    pub fn set_requested_extensions(&self, requests: Vec<ExtensionRequest>) {
        *lock(&self.inner.requested_extensions) = requests;
    }

    /// Replace the supported viewport candidate list.
    pub fn set_viewport_specs(&self, specs: Vec<ViewportSpec>) {
        *lock(&self.inner.specs) = specs;
    }

    /// Pre-filter and dispatch one inbound frame.
    pub async fn handle_message(&self, text: &str) {
        crate::dispatch::handle_message(&self.inner, text).await;
    }

    /// Execute a command batch against the live document.
    pub async fn execute_commands(&self, commands: Value) {
        let mut session = self.inner.session.lock().await;
        let Some(session) = session.as_mut() else {
            self.inner.no_session("executeCommands");
            return;
        };
        if let Some(action) = session.root.execute_commands(commands) {
            let token = self.inner.next_seqno();
            lock(&self.inner.pending).register(token, action, false);
        }
    }

    /// Update a data source; returns false when the engine rejected it.
    pub async fn update_data_source(&self, kind: &str, payload: Value) -> bool {
        let mut session = self.inner.session.lock().await;
        let Some(session) = session.as_mut() else {
            self.inner.no_session("updateDataSource");
            return false;
        };
        let accepted = session.root.update_data_source(kind, payload);
        if !accepted {
            warn!(driver_id = %self.inner.instance_id, kind, "Data source update rejected");
        }
        accepted
    }

    /// Interrupt the running command sequence.
    pub async fn interrupt_command_sequence(&self) {
        let mut session = self.inner.session.lock().await;
        match session.as_mut() {
            Some(session) => session.root.cancel_execution(),
            None => self.inner.no_session("interruptCommandSequence"),
        }
    }

    /// One blocking round trip to the view host with the configured timeout.
    ///
    /// Returns `Value::Null` on timeout; callers supply their own default.
    pub fn blocking_send(&self, kind: OutboundKind, payload: Value) -> Value {
        self.inner
            .blocking_send(kind, payload, self.inner.blocking_timeout())
    }

    /// Current visual-context state, if a session is live.
    pub async fn visual_context(&self) -> Option<Value> {
        let session = self.inner.session.lock().await;
        session.as_ref().map(|s| s.root.visual_context())
    }

    /// Run one frame-loop pass.
    pub async fn frame_tick(&self) {
        crate::frame::frame_tick(&self.inner).await;
    }

    /// Tear down the session: engine root, staged content, and the
    /// pending-action registry are cleared together under the session lock.
    pub async fn reset(&self) {
        let mut session = self.inner.session.lock().await;
        *session = None;
        *lock(&self.inner.content) = None;
        lock(&self.inner.pending).clear();
        *lock(&self.inner.pending_config_change) = None;
        lock(&self.inner.extension_results).clear();
        lock(&self.inner.extension_pushes).clear();
        self.inner.seqno.store(0, Ordering::SeqCst);
        info!(driver_id = %self.inner.instance_id, "Session reset");
    }

    /// Look up a registered extension by uri.
    pub fn extension(&self, uri: &str) -> Option<Arc<dyn Extension>> {
        self.inner.extensions.get(uri)
    }

    /// Queue an extension-originated event for the live document; applied at
    /// the start of the next frame pass.
    pub fn handle_extension_event(&self, uri: &str, name: &str, data: Value) {
        self.inner.send_extension_event(uri, name, data);
    }

    /// Detach the live document into an opaque capsule.
    pub async fn capture_document(&self) -> Option<DocumentCapsule> {
        let mut session = self.inner.session.lock().await;
        let state = session.take()?;
        info!(driver_id = %self.inner.instance_id, token = %state.token, "Document captured");
        Some(DocumentCapsule::new(
            state.token,
            state.root,
            state.metrics,
            state.scaling,
        ))
    }

    /// Re-attach a captured document, replay any pending configuration
    /// change, and run one frame pass. Re-inflation is skipped.
    pub async fn restore_document(&self, capsule: DocumentCapsule) {
        let (token, mut root, metrics, scaling) = capsule.into_parts();
        info!(driver_id = %self.inner.instance_id, %token, "Document restored");

        if let Some(change) = lock(&self.inner.pending_config_change).take() {
            if root.configuration_change(&change) {
                // Size-affecting change on a restored root: re-inflation is
                // deferred until the host sends a fresh build.
                warn!(driver_id = %self.inner.instance_id, "Restored document needs re-inflation");
            }
        }

        {
            let mut session = self.inner.session.lock().await;
            *session = Some(SessionState {
                token,
                root,
                metrics,
                scaling,
                screen_locked: false,
            });
        }
        self.frame_tick().await;
    }

    /// The view host finished drawing; notify the engine and surface the
    /// fresh visual context.
    pub async fn render_complete(&self) {
        let context = {
            let mut session = self.inner.session.lock().await;
            let Some(session) = session.as_mut() else {
                return;
            };
            session.root.render_complete();
            session.root.visual_context()
        };
        self.inner.host.on_visual_context(context).await;
    }
}
