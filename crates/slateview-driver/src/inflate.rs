//! Build path: scaling negotiation, extension registration, inflation, and
//! the sequenced build output.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, error, info};

use slateview_core::protocol::OutboundKind;
use slateview_core::scaling::{calculate_scaling, ScalingResult, ViewportMetrics};
use slateview_engine::EngineConfig;
use slateview_extensions::ExtensionEventBridge;

use crate::bridge::{LocaleBridge, TextMeasureBridge};
use crate::driver::{lock, DriverInner, SessionState};

/// Inflate the staged content against the given metrics and install the
/// session. On inflation failure the chosen viewport candidate is removed
/// and the next one is tried; when all candidates are exhausted no session
/// root exists and the host gets a render-failure notification.
pub(crate) async fn build_session(
    inner: &Arc<DriverInner>,
    metrics: ViewportMetrics,
    reinflate: bool,
) {
    let Some(content) = lock(&inner.content).clone() else {
        error!(driver_id = %inner.instance_id, "Build requested with no staged content");
        inner.send_error("No content to inflate");
        return;
    };

    let engine_config = engine_config_for(inner);
    let mut specs = lock(&inner.specs).clone();
    let mut failures: Vec<String> = Vec::new();

    if specs.is_empty() {
        // No candidates declared: single attempt at identity scale.
        let scaling = calculate_scaling(&metrics, &[]);
        match inner
            .engine
            .inflate(&content.content, &metrics, &scaling, &engine_config)
        {
            Ok(root) => {
                install(inner, content.token, root, metrics, scaling, reinflate).await;
                return;
            }
            Err(e) => failures.push(e.to_string()),
        }
    } else {
        while !specs.is_empty() {
            let scaling = calculate_scaling(&metrics, &specs);
            match inner
                .engine
                .inflate(&content.content, &metrics, &scaling, &engine_config)
            {
                Ok(root) => {
                    *lock(&inner.specs) = specs;
                    install(inner, content.token, root, metrics, scaling, reinflate).await;
                    return;
                }
                Err(e) => {
                    failures.push(e.to_string());
                    let Some(chosen) = scaling.spec else {
                        break;
                    };
                    debug!(driver_id = %inner.instance_id, ?chosen, "Removing failed viewport candidate");
                    specs.retain(|s| *s != chosen);
                    *lock(&inner.specs) = specs.clone();
                }
            }
        }
    }

    let reason = failures.join("; ");
    error!(driver_id = %inner.instance_id, %reason, "Inflation failed for every viewport candidate");
    // On re-inflation the outgoing root may have accumulated data-source
    // errors that explain the failure; drain and surface them.
    let data_source_errors = {
        let mut session = inner.session.lock().await;
        session.as_mut().and_then(|s| s.root.data_source_errors())
    };
    inner.host.on_render_failure(reason, data_source_errors).await;
}

async fn install(
    inner: &Arc<DriverInner>,
    token: String,
    root: Box<dyn slateview_engine::DocumentRoot>,
    metrics: ViewportMetrics,
    scaling: ScalingResult,
    reinflate: bool,
) {
    let rendering_options = root.rendering_options();
    let hierarchy = root.hierarchy();
    let doc_theme = root.doc_theme();
    let background = root.background();
    let supports_resizing = root.supports_resizing();

    {
        let mut session = inner.session.lock().await;
        *session = Some(SessionState {
            token: token.clone(),
            root,
            metrics,
            scaling,
            screen_locked: false,
        });
    }

    // Extensions get their weak back-reference once a live document exists.
    let bridge: Arc<dyn ExtensionEventBridge> = inner.clone();
    inner.extensions.bind_all(Arc::downgrade(&bridge));

    inner.send(OutboundKind::RenderingOptions, rendering_options);
    let hierarchy_kind = if reinflate {
        OutboundKind::ReHierarchy
    } else {
        OutboundKind::Hierarchy
    };
    inner.send(hierarchy_kind, hierarchy);
    inner.send(
        OutboundKind::Scaling,
        json!({
            "scaleFactor": scaling.scale,
            "viewportWidth": scaling.viewport_width,
            "viewportHeight": scaling.viewport_height,
        }),
    );
    inner.send(OutboundKind::DocTheme, doc_theme);
    inner.send(OutboundKind::Background, background);
    inner.send(
        OutboundKind::SupportsResizing,
        json!({ "supported": supports_resizing }),
    );

    info!(driver_id = %inner.instance_id, %token, reinflate, "Session inflated");
}

/// Assemble the engine configuration for one inflation: timezone offset,
/// environment, the intersection of host-supported and document-requested
/// extensions, and the measurement/locale bridges.
fn engine_config_for(inner: &Arc<DriverInner>) -> EngineConfig {
    let requested = lock(&inner.requested_extensions).clone();
    let mut registrations = Vec::new();
    for request in requested {
        if !inner.config.supported_extensions.contains(&request.uri) {
            debug!(uri = %request.uri, "Requested extension not supported by host");
            continue;
        }
        if let Some(registration) = inner
            .extensions
            .registration_for(&request.uri, &request.settings)
        {
            registrations.push(registration);
        } else {
            debug!(uri = %request.uri, "Supported extension missing from registry");
        }
    }

    let timeout = inner.blocking_timeout();
    EngineConfig {
        utc_offset_ms: inner.config.utc_offset_ms,
        environment: inner.config.environment.clone().unwrap_or(Value::Null),
        extensions: registrations,
        text_measurement: Some(Arc::new(TextMeasureBridge::new(
            Arc::downgrade(inner),
            timeout,
        ))),
        locale: Some(Arc::new(LocaleBridge::new(Arc::downgrade(inner), timeout))),
    }
}
