//! Slateview wire protocol v1.
//!
//! All traffic between the session driver and the view host is JSON text
//! frames over an already-connected, ordered channel. Every frame is one
//! [`Envelope`] of `{ "type", "seqno", "payload" }`; outbound sequence
//! numbers increase strictly per session.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Protocol version implemented by this driver.
pub const PROTOCOL_VERSION: u32 = 1;

/// The top-level wire frame in both directions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Message kind string. Unknown kinds are preserved so the reply
    /// pre-filter can still match on `seqno` before dispatch drops them.
    #[serde(rename = "type")]
    pub kind: String,

    pub seqno: u64,

    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub payload: Value,
}

impl Envelope {
    /// Build an outbound frame with an already-allocated sequence number.
    pub fn outbound(kind: OutboundKind, seqno: u64, payload: Value) -> Self {
        Self {
            kind: kind.as_str().to_string(),
            seqno,
            payload,
        }
    }

    /// Parse the kind string into a known inbound kind, if it is one.
    pub fn inbound_kind(&self) -> Option<InboundKind> {
        InboundKind::parse(&self.kind)
    }
}

/// Messages the view host may send to the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InboundKind {
    Build,
    ConfigurationChange,
    Update,
    UpdateMedia,
    UpdateGraphic,
    Response,
    EnsureLayout,
    ScrollToRectInComponent,
    HandleKeyboard,
    GetFocusableAreas,
    GetFocused,
    SetFocus,
    UpdateCursorPosition,
    HandlePointerEvent,
    IsCharacterValid,
    ReInflate,
    ReHierarchy,
    GetDisplayedChildCount,
    GetDisplayedChildId,
}

impl InboundKind {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "build" => Self::Build,
            "configurationChange" => Self::ConfigurationChange,
            "update" => Self::Update,
            "updateMedia" => Self::UpdateMedia,
            "updateGraphic" => Self::UpdateGraphic,
            "response" => Self::Response,
            "ensureLayout" => Self::EnsureLayout,
            "scrollToRectInComponent" => Self::ScrollToRectInComponent,
            "handleKeyboard" => Self::HandleKeyboard,
            "getFocusableAreas" => Self::GetFocusableAreas,
            "getFocused" => Self::GetFocused,
            "setFocus" => Self::SetFocus,
            "updateCursorPosition" => Self::UpdateCursorPosition,
            "handlePointerEvent" => Self::HandlePointerEvent,
            "isCharacterValid" => Self::IsCharacterValid,
            "reInflate" => Self::ReInflate,
            "reHierarchy" => Self::ReHierarchy,
            "getDisplayedChildCount" => Self::GetDisplayedChildCount,
            "getDisplayedChildId" => Self::GetDisplayedChildId,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Build => "build",
            Self::ConfigurationChange => "configurationChange",
            Self::Update => "update",
            Self::UpdateMedia => "updateMedia",
            Self::UpdateGraphic => "updateGraphic",
            Self::Response => "response",
            Self::EnsureLayout => "ensureLayout",
            Self::ScrollToRectInComponent => "scrollToRectInComponent",
            Self::HandleKeyboard => "handleKeyboard",
            Self::GetFocusableAreas => "getFocusableAreas",
            Self::GetFocused => "getFocused",
            Self::SetFocus => "setFocus",
            Self::UpdateCursorPosition => "updateCursorPosition",
            Self::HandlePointerEvent => "handlePointerEvent",
            Self::IsCharacterValid => "isCharacterValid",
            Self::ReInflate => "reInflate",
            Self::ReHierarchy => "reHierarchy",
            Self::GetDisplayedChildCount => "getDisplayedChildCount",
            Self::GetDisplayedChildId => "getDisplayedChildId",
        }
    }
}

/// Messages the driver sends to the view host.
///
/// The per-request result kinds (`handleKeyboard`, `getFocusableAreas`, ...)
/// reuse the inbound kind string; the result payload carries the originating
/// request's sequence number in `messageId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutboundKind {
    RenderingOptions,
    Hierarchy,
    ReHierarchy,
    Scaling,
    DocTheme,
    Background,
    ScreenLock,
    SupportsResizing,
    Event,
    EventTerminate,
    Dirty,
    Error,
    LocaleMethod,
    Measure,
    HandleKeyboard,
    GetFocusableAreas,
    GetFocused,
    IsCharacterValid,
    GetDisplayedChildCount,
    GetDisplayedChildId,
}

impl OutboundKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RenderingOptions => "renderingOptions",
            Self::Hierarchy => "hierarchy",
            Self::ReHierarchy => "reHierarchy",
            Self::Scaling => "scaling",
            Self::DocTheme => "docTheme",
            Self::Background => "background",
            Self::ScreenLock => "screenLock",
            Self::SupportsResizing => "supportsResizing",
            Self::Event => "event",
            Self::EventTerminate => "eventTerminate",
            Self::Dirty => "dirty",
            Self::Error => "error",
            Self::LocaleMethod => "localeMethod",
            Self::Measure => "measure",
            Self::HandleKeyboard => "handleKeyboard",
            Self::GetFocusableAreas => "getFocusableAreas",
            Self::GetFocused => "getFocused",
            Self::IsCharacterValid => "isCharacterValid",
            Self::GetDisplayedChildCount => "getDisplayedChildCount",
            Self::GetDisplayedChildId => "getDisplayedChildId",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_round_trip() {
        let env = Envelope::outbound(OutboundKind::Event, 7, json!({"token": 7}));
        let text = serde_json::to_string(&env).unwrap();
        let back: Envelope = serde_json::from_str(&text).unwrap();
        assert_eq!(back.kind, "event");
        assert_eq!(back.seqno, 7);
        assert_eq!(back.payload["token"], json!(7));
    }

    #[test]
    fn test_null_payload_omitted() {
        let env = Envelope::outbound(OutboundKind::ScreenLock, 1, Value::Null);
        let text = serde_json::to_string(&env).unwrap();
        assert!(!text.contains("payload"));
    }

    #[test]
    fn test_missing_payload_defaults_to_null() {
        let env: Envelope = serde_json::from_str(r#"{"type":"getFocused","seqno":3}"#).unwrap();
        assert_eq!(env.inbound_kind(), Some(InboundKind::GetFocused));
        assert!(env.payload.is_null());
    }

    #[test]
    fn test_unknown_kind_still_parses() {
        let env: Envelope =
            serde_json::from_str(r#"{"type":"totallyUnknown","seqno":9,"payload":{}}"#).unwrap();
        assert_eq!(env.inbound_kind(), None);
        assert_eq!(env.seqno, 9);
    }

    #[test]
    fn test_missing_seqno_is_an_error() {
        let parsed = serde_json::from_str::<Envelope>(r#"{"type":"update","payload":{}}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_inbound_kind_round_trip() {
        for kind in [
            InboundKind::Build,
            InboundKind::ConfigurationChange,
            InboundKind::Response,
            InboundKind::ScrollToRectInComponent,
            InboundKind::GetDisplayedChildId,
        ] {
            assert_eq!(InboundKind::parse(kind.as_str()), Some(kind));
        }
    }
}
