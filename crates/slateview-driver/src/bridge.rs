//! Text measurement and locale bridges.
//!
//! The engine's measurement and casing contracts are synchronous and are
//! invoked from inside engine calls made during the frame loop. Each bridge
//! satisfies its contract with one blocking round trip through the driver
//! and degrades to a safe default on timeout, malformed reply, or a dead
//! driver back-reference. Nothing propagates past this boundary.

use std::sync::Weak;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::warn;

use slateview_core::protocol::OutboundKind;
use slateview_engine::{LocaleTransform, MeasureRequest, MeasuredSize, TextMeasurement};

use crate::driver::DriverInner;

pub(crate) struct TextMeasureBridge {
    driver: Weak<DriverInner>,
    timeout: Duration,
}

impl TextMeasureBridge {
    pub fn new(driver: Weak<DriverInner>, timeout: Duration) -> Self {
        Self { driver, timeout }
    }
}

impl TextMeasurement for TextMeasureBridge {
    fn measure(&self, request: &MeasureRequest) -> MeasuredSize {
        let Some(inner) = self.driver.upgrade() else {
            warn!("Text measurement requested after driver teardown");
            return MeasuredSize::zero();
        };
        let payload = match serde_json::to_value(request) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(%e, "Unserializable measure request");
                return MeasuredSize::zero();
            }
        };
        let reply = inner.blocking_send(OutboundKind::Measure, payload, self.timeout);
        match serde_json::from_value::<MeasuredSize>(reply) {
            Ok(size) => size,
            Err(_) => {
                warn!("No usable measurement reply, treating as unmeasured");
                MeasuredSize::zero()
            }
        }
    }
}

pub(crate) struct LocaleBridge {
    driver: Weak<DriverInner>,
    timeout: Duration,
}

impl LocaleBridge {
    pub fn new(driver: Weak<DriverInner>, timeout: Duration) -> Self {
        Self { driver, timeout }
    }

    fn transform(&self, method: &str, value: &str, locale: &str) -> String {
        let Some(inner) = self.driver.upgrade() else {
            warn!(method, "Locale transform requested after driver teardown");
            return value.to_string();
        };
        let reply = inner.blocking_send(
            OutboundKind::LocaleMethod,
            json!({ "method": method, "value": value, "locale": locale }),
            self.timeout,
        );
        match reply.get("value").and_then(Value::as_str) {
            Some(transformed) => transformed.to_string(),
            None => {
                warn!(method, "No usable locale reply, keeping original string");
                value.to_string()
            }
        }
    }
}

impl LocaleTransform for LocaleBridge {
    fn to_upper(&self, value: &str, locale: &str) -> String {
        self.transform("toUpperCase", value, locale)
    }

    fn to_lower(&self, value: &str, locale: &str) -> String {
        self.transform("toLowerCase", value, locale)
    }
}
