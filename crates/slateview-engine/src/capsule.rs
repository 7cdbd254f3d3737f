//! Opaque document-state capture.
//!
//! A [`DocumentCapsule`] bundles a live engine root with the token and
//! metrics it was inflated under, so a host can park a document and later
//! re-attach it without re-inflating. Fields are private; the capsule is an
//! opaque capability, not a raw handle.

use slateview_core::scaling::{ScalingResult, ViewportMetrics};

use crate::DocumentRoot;

pub struct DocumentCapsule {
    token: String,
    root: Box<dyn DocumentRoot>,
    metrics: ViewportMetrics,
    scaling: ScalingResult,
}

impl DocumentCapsule {
    pub fn new(
        token: String,
        root: Box<dyn DocumentRoot>,
        metrics: ViewportMetrics,
        scaling: ScalingResult,
    ) -> Self {
        Self {
            token,
            root,
            metrics,
            scaling,
        }
    }

    /// Token of the captured session.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Consume the capsule, handing ownership of the root back to a driver.
    pub fn into_parts(self) -> (String, Box<dyn DocumentRoot>, ViewportMetrics, ScalingResult) {
        (self.token, self.root, self.metrics, self.scaling)
    }
}

impl std::fmt::Debug for DocumentCapsule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentCapsule")
            .field("token", &self.token)
            .field("metrics", &self.metrics)
            .finish()
    }
}
