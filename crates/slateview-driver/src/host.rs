//! View-host callback surface.
//!
//! The host/agent layer that owns the transport and the screen implements
//! [`ViewHost`]; the driver invokes it for everything that is not part of
//! the sequenced message channel. All callbacks default to no-ops so a host
//! only implements what it cares about.

use async_trait::async_trait;
use serde_json::Value;

/// Callbacks from the session driver to the embedding host.
#[async_trait]
pub trait ViewHost: Send + Sync {
    /// A named long-running activity began (e.g. screen lock held).
    async fn on_activity_start(&self, _name: &str) {}

    /// A previously started activity ended.
    async fn on_activity_end(&self, _name: &str) {}

    /// The document executed a SendEvent; payload already carries the
    /// session token. Delivered outside the sequenced channel.
    async fn on_send_event(&self, _payload: Value) {}

    /// A lazy data source requested more items. Delivered outside the
    /// sequenced channel.
    async fn on_fetch_request(&self, _payload: Value) {}

    /// The document finished; the session is over.
    async fn on_finish(&self, _payload: Value) {}

    /// Fresh visual-context state is available.
    async fn on_visual_context(&self, _context: Value) {}

    /// Inflation failed for every viewport candidate.
    async fn on_render_failure(&self, _reason: String, _data_source_errors: Option<Value>) {}

    /// The engine reported a runtime error.
    async fn on_runtime_error(&self, _error: Value) {}

    /// A log line the host may want to forward to its own sink.
    async fn on_log(&self, _source: &str, _message: String) {}
}

/// Host that ignores every callback; useful as a default and in tests.
pub struct NullViewHost;

#[async_trait]
impl ViewHost for NullViewHost {}
