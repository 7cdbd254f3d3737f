//! Extension abstraction and uri-keyed registry.
//!
//! Extensions are pluggable capability modules a document can request by
//! uri: custom commands, event handlers, and live-data objects. The driver
//! registers the intersection of host-supported and document-requested uris
//! into the engine configuration at session build time, and routes extension
//! events both ways afterwards.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use slateview_engine::ExtensionRegistration;

/// Resolution callback handed to an extension along with a dispatched event.
///
/// The driver implements this; `token` is the sequence token the event was
/// dispatched under, and resolving it settles the matching pending action.
pub trait ExtensionEventCallback: Send + Sync {
    fn resolve(&self, token: u64, succeeded: bool, result: Value);
}

/// Back-reference an extension holds to push events into the live document.
///
/// Held weakly: the driver owns the registry which owns the extension, so a
/// strong reference here would cycle. A dead bridge means the session is
/// gone and the push is silently dropped.
pub trait ExtensionEventBridge: Send + Sync {
    fn send_extension_event(&self, uri: &str, name: &str, data: Value);
}

/// A pluggable capability module keyed by uri.
#[async_trait]
pub trait Extension: Send + Sync {
    /// Uri the document requests this extension under (e.g. `slate:backstack:10`).
    fn uri(&self) -> &str;

    /// Environment values exposed to the document.
    fn environment(&self) -> Value;

    /// Custom command definitions contributed to the engine.
    fn command_definitions(&self) -> Vec<Value>;

    /// Event handler definitions contributed to the engine.
    fn event_handlers(&self) -> Vec<Value>;

    /// Live-data object definitions contributed to the engine.
    fn live_data_objects(&self) -> Vec<Value>;

    /// Apply document-provided settings before registration.
    fn apply_settings(&self, settings: &Value) -> anyhow::Result<()>;

    /// Handle an event the document invoked on this extension.
    async fn handle_event(
        &self,
        name: &str,
        source: &Value,
        params: &Value,
        token: u64,
        callback: Arc<dyn ExtensionEventCallback>,
    );

    /// Install the back-reference used to push events into the document.
    fn bind(&self, bridge: Weak<dyn ExtensionEventBridge>);
}

/// Registry of available extensions, keyed by uri.
///
/// Built once at driver construction and read-only afterwards.
#[derive(Default)]
pub struct ExtensionRegistry {
    extensions: HashMap<String, Arc<dyn Extension>>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an extension. A no-op if the uri is already registered.
    pub fn add(&mut self, extension: Arc<dyn Extension>) {
        let uri = extension.uri().to_string();
        if self.extensions.contains_key(&uri) {
            debug!(%uri, "Extension already registered, ignoring");
            return;
        }
        self.extensions.insert(uri, extension);
    }

    pub fn get(&self, uri: &str) -> Option<Arc<dyn Extension>> {
        self.extensions.get(uri).cloned()
    }

    pub fn uris(&self) -> Vec<&str> {
        self.extensions.keys().map(String::as_str).collect()
    }

    /// Apply document settings and build the engine-facing registration for
    /// one extension.
    pub fn registration_for(&self, uri: &str, settings: &Value) -> Option<ExtensionRegistration> {
        let extension = self.get(uri)?;
        if let Err(e) = extension.apply_settings(settings) {
            warn!(%uri, error = %e, "Extension rejected settings, registering without them");
        }
        Some(ExtensionRegistration {
            uri: uri.to_string(),
            environment: extension.environment(),
            commands: extension.command_definitions(),
            event_handlers: extension.event_handlers(),
            live_data: extension.live_data_objects(),
        })
    }

    /// Forward an event to the matching extension. If no extension is
    /// registered under `uri`, the callback is immediately resolved as failed.
    pub async fn dispatch_event(
        &self,
        uri: &str,
        name: &str,
        source: &Value,
        params: &Value,
        token: u64,
        callback: Arc<dyn ExtensionEventCallback>,
    ) {
        match self.get(uri) {
            Some(extension) => {
                extension
                    .handle_event(name, source, params, token, callback)
                    .await;
            }
            None => {
                warn!(%uri, %name, token, "Extension event for unknown uri");
                callback.resolve(token, false, Value::Null);
            }
        }
    }

    /// Install the document back-reference on every registered extension.
    pub fn bind_all(&self, bridge: Weak<dyn ExtensionEventBridge>) {
        for extension in self.extensions.values() {
            extension.bind(bridge.clone());
        }
    }
}
