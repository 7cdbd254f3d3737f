//! Inbound message dispatch.
//!
//! Every inbound frame runs the reply pre-filter first: if a blocking round
//! trip is awaiting this sequence number the frame is consumed by the waiter
//! and never reaches the dispatch table. Everything else is routed through
//! the kind-keyed table below. Malformed or unknown frames are logged and
//! dropped without touching session state.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, warn};

use slateview_core::protocol::{Envelope, InboundKind, OutboundKind};
use slateview_core::scaling::{ScreenShape, ViewportMetrics, ViewportMode};
use slateview_engine::Rect;

use crate::driver::{lock, DriverInner};
use crate::frame::resolution_from_payload;
use crate::inflate::build_session;

pub(crate) async fn handle_message(inner: &Arc<DriverInner>, text: &str) {
    let envelope: Envelope = match serde_json::from_str(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(driver_id = %inner.instance_id, %e, "Dropping malformed inbound frame");
            return;
        }
    };

    // Reply pre-filter: a frame answering the outstanding blocking request
    // is consumed here, before any dispatch or session locking.
    if inner.link.try_consume(&envelope) {
        debug!(seqno = envelope.seqno, "Frame consumed by blocking waiter");
        return;
    }

    let Some(kind) = envelope.inbound_kind() else {
        debug!(kind = %envelope.kind, "Unknown inbound message type, ignoring");
        return;
    };

    dispatch(inner, kind, envelope).await;
}

async fn dispatch(inner: &Arc<DriverInner>, kind: InboundKind, envelope: Envelope) {
    match kind {
        InboundKind::Build => build(inner, envelope).await,
        InboundKind::ConfigurationChange => configuration_change(inner, envelope).await,
        InboundKind::Update => update(inner, envelope).await,
        InboundKind::UpdateMedia => update_media(inner, envelope).await,
        InboundKind::UpdateGraphic => update_graphic(inner, envelope).await,
        InboundKind::Response => response(inner, envelope).await,
        InboundKind::EnsureLayout => ensure_layout(inner, envelope).await,
        InboundKind::ScrollToRectInComponent => scroll_to_rect(inner, envelope).await,
        InboundKind::HandleKeyboard => handle_keyboard(inner, envelope).await,
        InboundKind::GetFocusableAreas => get_focusable_areas(inner, envelope).await,
        InboundKind::GetFocused => get_focused(inner, envelope).await,
        InboundKind::SetFocus => set_focus(inner, envelope).await,
        InboundKind::UpdateCursorPosition => update_cursor_position(inner, envelope).await,
        InboundKind::HandlePointerEvent => handle_pointer_event(inner, envelope).await,
        InboundKind::IsCharacterValid => is_character_valid(inner, envelope).await,
        InboundKind::ReInflate => re_inflate(inner).await,
        InboundKind::ReHierarchy => re_hierarchy(inner).await,
        InboundKind::GetDisplayedChildCount => get_displayed_child_count(inner, envelope).await,
        InboundKind::GetDisplayedChildId => get_displayed_child_id(inner, envelope).await,
    }
}

/// Read a metric field, dropping values that do not fit in u32.
fn dimension(payload: &Value, field: &str) -> Option<u32> {
    let value = payload.get(field).and_then(Value::as_u64)?;
    match u32::try_from(value) {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(field, value, "Ignoring out-of-range metric in configuration change");
            None
        }
    }
}

fn require_str<'a>(payload: &'a Value, field: &str, kind: InboundKind) -> Option<&'a str> {
    let value = payload.get(field).and_then(Value::as_str);
    if value.is_none() {
        warn!(kind = kind.as_str(), field, "Dropping frame with missing field");
    }
    value
}

// ============================================================
// Lifecycle
// ============================================================

async fn build(inner: &Arc<DriverInner>, envelope: Envelope) {
    let metrics: ViewportMetrics = match serde_json::from_value(envelope.payload) {
        Ok(metrics) => metrics,
        Err(e) => {
            warn!(%e, "Dropping build frame with incomplete metrics");
            return;
        }
    };
    build_session(inner, metrics, false).await;
}

async fn configuration_change(inner: &Arc<DriverInner>, envelope: Envelope) {
    let payload = envelope.payload;
    let mut guard = inner.session.lock().await;
    let Some(session) = guard.as_mut() else {
        // No live document; stash for replay when one is restored.
        debug!(driver_id = %inner.instance_id, "Configuration change stashed");
        *lock(&inner.pending_config_change) = Some(payload);
        return;
    };

    let mut metrics = session.metrics;
    if let Some(width) = dimension(&payload, "width") {
        metrics.width = width;
    }
    if let Some(height) = dimension(&payload, "height") {
        metrics.height = height;
    }
    if let Some(dpi) = dimension(&payload, "dpi") {
        metrics.dpi = dpi;
    }
    if let Some(shape) = payload.get("shape") {
        if let Ok(shape) = serde_json::from_value::<ScreenShape>(shape.clone()) {
            metrics.shape = shape;
        }
    }
    if let Some(mode) = payload.get("mode") {
        if let Ok(mode) = serde_json::from_value::<ViewportMode>(mode.clone()) {
            metrics.mode = mode;
        }
    }

    let needs_reinflate = session.root.configuration_change(&payload);
    session.metrics = metrics;
    drop(guard);

    if needs_reinflate {
        debug!(driver_id = %inner.instance_id, "Configuration change requires re-inflation");
        build_session(inner, metrics, true).await;
    }
}

async fn re_inflate(inner: &Arc<DriverInner>) {
    let metrics = {
        let guard = inner.session.lock().await;
        match guard.as_ref() {
            Some(session) => session.metrics,
            None => {
                inner.no_session("reInflate");
                return;
            }
        }
    };
    build_session(inner, metrics, true).await;
}

async fn re_hierarchy(inner: &Arc<DriverInner>) {
    let guard = inner.session.lock().await;
    match guard.as_ref() {
        Some(session) => {
            let hierarchy = session.root.hierarchy();
            inner.send(OutboundKind::ReHierarchy, hierarchy);
        }
        None => inner.no_session("reHierarchy"),
    }
}

// ============================================================
// Component updates
// ============================================================

async fn update(inner: &Arc<DriverInner>, envelope: Envelope) {
    let payload = envelope.payload;
    let Some(id) = require_str(&payload, "id", InboundKind::Update) else {
        return;
    };
    let Some(kind) = require_str(&payload, "type", InboundKind::Update) else {
        return;
    };
    let value = payload.get("value").cloned().unwrap_or(Value::Null);

    let mut guard = inner.session.lock().await;
    let Some(session) = guard.as_mut() else {
        inner.no_session("update");
        return;
    };
    if !session.root.update_component(id, kind, &value) {
        inner.send_error("Unable to find component");
    }
}

async fn update_media(inner: &Arc<DriverInner>, envelope: Envelope) {
    let payload = envelope.payload;
    let Some(id) = require_str(&payload, "id", InboundKind::UpdateMedia) else {
        return;
    };
    let state = payload.get("state").cloned().unwrap_or(Value::Null);

    let mut guard = inner.session.lock().await;
    let Some(session) = guard.as_mut() else {
        inner.no_session("updateMedia");
        return;
    };
    if !session.root.update_media(id, &state) {
        inner.send_error("Unable to find component");
    }
}

async fn update_graphic(inner: &Arc<DriverInner>, envelope: Envelope) {
    let payload = envelope.payload;
    let Some(id) = require_str(&payload, "id", InboundKind::UpdateGraphic) else {
        return;
    };
    let Some(avg) = require_str(&payload, "avg", InboundKind::UpdateGraphic) else {
        return;
    };

    let mut guard = inner.session.lock().await;
    let Some(session) = guard.as_mut() else {
        inner.no_session("updateGraphic");
        return;
    };
    if !session.root.update_graphic(id, avg) {
        inner.send_error("Unable to find component");
    }
}

async fn ensure_layout(inner: &Arc<DriverInner>, envelope: Envelope) {
    let payload = envelope.payload;
    let Some(id) = require_str(&payload, "id", InboundKind::EnsureLayout) else {
        return;
    };

    let mut guard = inner.session.lock().await;
    let Some(session) = guard.as_mut() else {
        inner.no_session("ensureLayout");
        return;
    };
    if !session.root.ensure_layout(id) {
        inner.send_error("Unable to find component");
    }
}

async fn scroll_to_rect(inner: &Arc<DriverInner>, envelope: Envelope) {
    let payload = envelope.payload;
    let Some(id) = require_str(&payload, "id", InboundKind::ScrollToRectInComponent) else {
        return;
    };
    let rect = match payload.get("rect").cloned() {
        Some(rect) => match serde_json::from_value::<Rect>(rect) {
            Ok(rect) => rect,
            Err(e) => {
                warn!(%e, "Dropping scrollToRectInComponent with malformed rect");
                return;
            }
        },
        None => {
            warn!("Dropping scrollToRectInComponent without rect");
            return;
        }
    };

    let mut guard = inner.session.lock().await;
    let Some(session) = guard.as_mut() else {
        inner.no_session("scrollToRectInComponent");
        return;
    };
    if !session.root.scroll_to_rect(id, rect) {
        inner.send_error("Unable to find component");
    }
}

// ============================================================
// Pending-action resolution
// ============================================================

async fn response(inner: &Arc<DriverInner>, envelope: Envelope) {
    let Some(token) = envelope.payload.get("token").and_then(Value::as_u64) else {
        warn!("Dropping response frame without token");
        return;
    };

    let Some(entry) = lock(&inner.pending).remove_by_token(token) else {
        debug!(token, "Response for unknown or already-settled action");
        return;
    };

    let mut guard = inner.session.lock().await;
    let Some(session) = guard.as_mut() else {
        debug!(token, "Response after session teardown, dropping");
        return;
    };
    session
        .root
        .resolve_action(entry.action, resolution_from_payload(&envelope.payload));
}

// ============================================================
// Input round trips
// ============================================================

async fn handle_keyboard(inner: &Arc<DriverInner>, envelope: Envelope) {
    let payload = &envelope.payload;
    let Some(event_type) = require_str(payload, "eventType", InboundKind::HandleKeyboard) else {
        return;
    };
    let keyboard = payload.get("keyboard").cloned().unwrap_or(Value::Null);

    let mut guard = inner.session.lock().await;
    let Some(session) = guard.as_mut() else {
        inner.no_session("handleKeyboard");
        return;
    };
    let result = session.root.handle_keyboard(event_type, &keyboard);
    inner.send(
        OutboundKind::HandleKeyboard,
        json!({ "messageId": envelope.seqno, "result": result }),
    );
}

async fn get_focusable_areas(inner: &Arc<DriverInner>, envelope: Envelope) {
    let guard = inner.session.lock().await;
    let Some(session) = guard.as_ref() else {
        inner.no_session("getFocusableAreas");
        return;
    };
    let areas = session.root.focusable_areas();
    inner.send(
        OutboundKind::GetFocusableAreas,
        json!({ "messageId": envelope.seqno, "areas": areas }),
    );
}

async fn get_focused(inner: &Arc<DriverInner>, envelope: Envelope) {
    let guard = inner.session.lock().await;
    let Some(session) = guard.as_ref() else {
        inner.no_session("getFocused");
        return;
    };
    let focused = session.root.focused_id();
    inner.send(
        OutboundKind::GetFocused,
        json!({ "messageId": envelope.seqno, "id": focused }),
    );
}

async fn set_focus(inner: &Arc<DriverInner>, envelope: Envelope) {
    let payload = envelope.payload;
    let Some(direction) = require_str(&payload, "direction", InboundKind::SetFocus) else {
        return;
    };
    let Some(target) = require_str(&payload, "targetId", InboundKind::SetFocus) else {
        return;
    };
    let origin = payload
        .get("origin")
        .cloned()
        .and_then(|v| serde_json::from_value::<Rect>(v).ok())
        .unwrap_or_default();

    let mut guard = inner.session.lock().await;
    let Some(session) = guard.as_mut() else {
        inner.no_session("setFocus");
        return;
    };
    if !session.root.set_focus(direction, origin, target) {
        debug!(target, "Focus request not honored");
    }
}

async fn update_cursor_position(inner: &Arc<DriverInner>, envelope: Envelope) {
    let payload = &envelope.payload;
    let (Some(x), Some(y)) = (
        payload.get("x").and_then(Value::as_f64),
        payload.get("y").and_then(Value::as_f64),
    ) else {
        warn!("Dropping updateCursorPosition without coordinates");
        return;
    };

    let mut guard = inner.session.lock().await;
    let Some(session) = guard.as_mut() else {
        inner.no_session("updateCursorPosition");
        return;
    };
    session.root.update_cursor_position(x, y);
}

async fn handle_pointer_event(inner: &Arc<DriverInner>, envelope: Envelope) {
    let mut guard = inner.session.lock().await;
    let Some(session) = guard.as_mut() else {
        inner.no_session("handlePointerEvent");
        return;
    };
    if !session.root.handle_pointer_event(&envelope.payload) {
        debug!("Pointer event not handled by document");
    }
}

async fn is_character_valid(inner: &Arc<DriverInner>, envelope: Envelope) {
    let payload = &envelope.payload;
    let Some(id) = require_str(payload, "id", InboundKind::IsCharacterValid) else {
        return;
    };
    let Some(character) = payload
        .get("character")
        .and_then(Value::as_str)
        .and_then(|s| s.chars().next())
    else {
        warn!("Dropping isCharacterValid without character");
        return;
    };

    let guard = inner.session.lock().await;
    let Some(session) = guard.as_ref() else {
        inner.no_session("isCharacterValid");
        return;
    };
    let valid = session.root.is_character_valid(character, id);
    inner.send(
        OutboundKind::IsCharacterValid,
        json!({ "messageId": envelope.seqno, "valid": valid }),
    );
}

async fn get_displayed_child_count(inner: &Arc<DriverInner>, envelope: Envelope) {
    let payload = &envelope.payload;
    let Some(id) = require_str(payload, "id", InboundKind::GetDisplayedChildCount) else {
        return;
    };

    let guard = inner.session.lock().await;
    let Some(session) = guard.as_ref() else {
        inner.no_session("getDisplayedChildCount");
        return;
    };
    match session.root.displayed_child_count(id) {
        Some(count) => {
            inner.send(
                OutboundKind::GetDisplayedChildCount,
                json!({ "messageId": envelope.seqno, "count": count }),
            );
        }
        None => inner.send_error("Unable to find component"),
    }
}

async fn get_displayed_child_id(inner: &Arc<DriverInner>, envelope: Envelope) {
    let payload = &envelope.payload;
    let Some(id) = require_str(payload, "id", InboundKind::GetDisplayedChildId) else {
        return;
    };
    let Some(index) = payload.get("index").and_then(Value::as_u64) else {
        warn!("Dropping getDisplayedChildId without index");
        return;
    };

    let guard = inner.session.lock().await;
    let Some(session) = guard.as_ref() else {
        inner.no_session("getDisplayedChildId");
        return;
    };
    match session.root.displayed_child_id(id, index) {
        Some(child) => {
            inner.send(
                OutboundKind::GetDisplayedChildId,
                json!({ "messageId": envelope.seqno, "id": child }),
            );
        }
        None => inner.send_error("Unable to find component"),
    }
}
