//! The per-session frame-update loop.
//!
//! Step order is a load-bearing invariant, covered by ordering tests:
//! 1. advance the engine clock;
//! 2. let the engine flush pending actions, then apply queued extension
//!    resolutions, drain engine-terminated actions, and surface runtime
//!    errors;
//! 3. drain the engine event queue;
//! 4. flush one dirty diff batch;
//! 5. check the screen-lock transition.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, warn};

use slateview_core::protocol::OutboundKind;
use slateview_engine::{ActionResolution, EngineEvent, Rect};

use crate::driver::{lock, DriverInner, SessionState};

pub(crate) async fn frame_tick(inner: &Arc<DriverInner>) {
    let mut guard = inner.session.lock().await;
    let Some(session) = guard.as_mut() else {
        return;
    };

    // Extension-originated events queued since the last pass enter the
    // document before the clock advances.
    let pushes: Vec<_> = lock(&inner.extension_pushes).drain(..).collect();
    for push in pushes {
        session
            .root
            .handle_extension_event(&push.uri, &push.name, push.data);
    }

    // 1. Clock and timezone offset.
    session
        .root
        .update_tick(Utc::now().timestamp_millis(), inner.config.utc_offset_ms);

    // 2. Engine-internal pending actions, then resolutions, terminations,
    //    and runtime errors.
    session.root.run_pending();
    apply_extension_results(inner, session);
    drain_terminated(inner, session);
    for error in session.root.take_runtime_errors() {
        warn!(driver_id = %inner.instance_id, %error, "Engine runtime error");
        inner.send(OutboundKind::Error, error.clone());
        inner.host.on_runtime_error(error).await;
    }

    // 3. Event queue.
    while let Some(event) = session.root.pop_event() {
        match event {
            EngineEvent::Finish { payload } => {
                debug!(driver_id = %inner.instance_id, "Document finished");
                inner.host.on_finish(payload).await;
                return;
            }
            EngineEvent::SendEvent { payload } => {
                inner
                    .host
                    .on_send_event(merge_token(payload, &session.token))
                    .await;
            }
            EngineEvent::DataSourceFetch { payload } => {
                inner
                    .host
                    .on_fetch_request(merge_token(payload, &session.token))
                    .await;
            }
            EngineEvent::Log { source, message } => {
                inner.host.on_log(&source, message).await;
            }
            EngineEvent::Extension {
                uri,
                name,
                source,
                params,
                action,
            } => {
                let token = inner.next_seqno();
                if let Some(action) = action {
                    lock(&inner.pending).register(token, action, false);
                }
                let callback: Arc<dyn slateview_extensions::ExtensionEventCallback> =
                    inner.clone();
                inner
                    .extensions
                    .dispatch_event(&uri, &name, &source, &params, token, callback)
                    .await;
            }
            EngineEvent::Other {
                kind,
                payload,
                action,
            } => {
                let token = inner.next_seqno();
                // Every event frame carries the token the response echoes,
                // even when the engine payload is not an object.
                let payload = match payload {
                    Value::Object(mut map) => {
                        map.insert("token".into(), json!(token));
                        map.insert("kind".into(), json!(kind));
                        Value::Object(map)
                    }
                    other => json!({ "token": token, "kind": kind, "payload": other }),
                };
                inner.send_with_seqno(OutboundKind::Event, token, payload);
                if let Some(action) = action {
                    lock(&inner.pending).register(token, action, true);
                }
            }
        }
    }

    // 4. Dirty diff batch.
    if session.root.is_dirty() {
        let diff = session.root.serialize_dirty();
        inner.send(OutboundKind::Dirty, diff);
        session.root.clear_dirty();
    }

    // 5. Screen-lock transition.
    let locked = session.root.screen_locked();
    if locked != session.screen_locked {
        session.screen_locked = locked;
        if locked {
            inner.host.on_activity_start("screenLock").await;
        } else {
            inner.host.on_activity_end("screenLock").await;
        }
        inner.send(OutboundKind::ScreenLock, json!({ "locked": locked }));
    }
}

/// Apply queued extension event resolutions to the pending registry and the
/// engine. Each entry settles its pending action exactly once.
fn apply_extension_results(inner: &Arc<DriverInner>, session: &mut SessionState) {
    let results: Vec<_> = lock(&inner.extension_results).drain(..).collect();
    for result in results {
        let Some(entry) = lock(&inner.pending).remove_by_token(result.token) else {
            // Resolution for an event that never carried an action reference.
            continue;
        };
        let resolution = if result.succeeded {
            resolution_from_payload(&result.result)
        } else {
            ActionResolution::Failed
        };
        session.root.resolve_action(entry.action, resolution);
    }
}

/// Remove entries for actions the engine terminated on its own. Only
/// host-visible entries produce an `eventTerminate` frame.
fn drain_terminated(inner: &Arc<DriverInner>, session: &mut SessionState) {
    for action in session.root.take_terminated() {
        let Some(entry) = lock(&inner.pending).remove_by_action(action) else {
            continue;
        };
        debug!(token = entry.token, host_visible = entry.host_visible, "Action terminated");
        if entry.host_visible {
            inner.send(
                OutboundKind::EventTerminate,
                json!({ "token": entry.token }),
            );
        }
    }
}

/// Pick the resolution shape a payload declares: rectangle first, then an
/// integer argument, else no value.
pub(crate) fn resolution_from_payload(payload: &Value) -> ActionResolution {
    if let Some(rect) = payload.get("rect") {
        match serde_json::from_value::<Rect>(rect.clone()) {
            Ok(rect) => return ActionResolution::Rect(rect),
            Err(e) => warn!(%e, "Malformed rect in resolution payload"),
        }
    }
    if let Some(arg) = payload.get("arg").and_then(Value::as_i64) {
        return ActionResolution::Arg(arg);
    }
    ActionResolution::Unit
}

fn merge_token(mut payload: Value, token: &str) -> Value {
    if let Value::Object(map) = &mut payload {
        map.insert("presentationToken".into(), json!(token));
        payload
    } else {
        json!({ "presentationToken": token, "payload": payload })
    }
}
