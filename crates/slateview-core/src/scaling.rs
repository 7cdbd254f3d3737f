//! Viewport scaling negotiation math.
//!
//! [`calculate_scaling`] is a pure transform from raw device metrics plus a
//! priority-ordered list of viewport specifications to the chosen
//! specification, the pixel-independent viewport size, and the core-to-
//! viewport scale factor. It holds no session state; the driver re-runs it
//! whenever metrics or the candidate list change.

use serde::{Deserialize, Serialize};

/// Cost penalty applied when a candidate's mode differs from the device mode.
const MODE_MISMATCH_PENALTY: f64 = 10.0;

/// Cost penalty applied when a candidate constrains the screen shape and the
/// device shape differs.
const SHAPE_MISMATCH_PENALTY: f64 = 1.0;

/// Physical screen shape reported by the view host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScreenShape {
    Rectangle,
    Round,
}

/// Device class the document is being shown on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ViewportMode {
    Hub,
    Tv,
    Mobile,
    Pc,
    Auto,
}

/// Raw device metrics as reported in a `build` payload.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportMetrics {
    pub width: u32,
    pub height: u32,
    pub dpi: u32,
    pub shape: ScreenShape,
    pub mode: ViewportMode,
}

impl ViewportMetrics {
    /// Device width in density-independent units.
    pub fn width_dp(&self) -> f64 {
        f64::from(self.width) * 160.0 / f64::from(self.dpi.max(1))
    }

    /// Device height in density-independent units.
    pub fn height_dp(&self) -> f64 {
        f64::from(self.height) * 160.0 / f64::from(self.dpi.max(1))
    }
}

/// One viewport candidate a document declares support for.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewportSpec {
    pub min_width: f64,
    pub max_width: f64,
    pub min_height: f64,
    pub max_height: f64,
    pub mode: ViewportMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<ScreenShape>,
}

/// Result of scaling negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScalingResult {
    /// The candidate that won, or `None` for the identity fallback.
    pub spec: Option<ViewportSpec>,
    /// Viewport size in dp that the document is laid out against.
    pub viewport_width: f64,
    pub viewport_height: f64,
    /// Multiplier from document coordinates to device dp.
    pub scale: f64,
}

impl ScalingResult {
    fn identity(metrics: &ViewportMetrics) -> Self {
        Self {
            spec: None,
            viewport_width: metrics.width_dp(),
            viewport_height: metrics.height_dp(),
            scale: 1.0,
        }
    }
}

/// Choose the best candidate for the given device metrics.
///
/// Each candidate clamps the device dp size into its allowed range; the
/// scale factor is the uniform multiplier that fits that viewport back onto
/// the device. Cost is `|ln scale|` plus fixed penalties for mode and shape
/// mismatches, lowest cost wins, ties keep the earlier (higher-priority)
/// candidate. An empty candidate list yields the identity result.
pub fn calculate_scaling(metrics: &ViewportMetrics, specs: &[ViewportSpec]) -> ScalingResult {
    if specs.is_empty() {
        return ScalingResult::identity(metrics);
    }

    let device_w = metrics.width_dp();
    let device_h = metrics.height_dp();

    let mut best: Option<(f64, ScalingResult)> = None;
    for spec in specs {
        // Specs come from untrusted config; clamp panics on non-finite or
        // inverted bounds, so such candidates are unusable and skipped.
        if !valid_bounds(spec) {
            continue;
        }
        let vw = device_w.clamp(spec.min_width, spec.max_width);
        let vh = device_h.clamp(spec.min_height, spec.max_height);
        if vw <= 0.0 || vh <= 0.0 {
            continue;
        }
        let scale = (device_w / vw).min(device_h / vh);

        let mut cost = scale.ln().abs();
        if spec.mode != metrics.mode {
            cost += MODE_MISMATCH_PENALTY;
        }
        if let Some(shape) = spec.shape {
            if shape != metrics.shape {
                cost += SHAPE_MISMATCH_PENALTY;
            }
        }

        let candidate = ScalingResult {
            spec: Some(*spec),
            viewport_width: vw,
            viewport_height: vh,
            scale,
        };
        match &best {
            Some((best_cost, _)) if cost >= *best_cost => {}
            _ => best = Some((cost, candidate)),
        }
    }

    best.map_or_else(|| ScalingResult::identity(metrics), |(_, r)| r)
}

fn valid_bounds(spec: &ViewportSpec) -> bool {
    let bounds = [
        spec.min_width,
        spec.max_width,
        spec.min_height,
        spec.max_height,
    ];
    bounds.iter().all(|b| b.is_finite())
        && spec.min_width <= spec.max_width
        && spec.min_height <= spec.max_height
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hub_metrics() -> ViewportMetrics {
        ViewportMetrics {
            width: 1024,
            height: 600,
            dpi: 160,
            shape: ScreenShape::Rectangle,
            mode: ViewportMode::Hub,
        }
    }

    fn spec(min_w: f64, max_w: f64, min_h: f64, max_h: f64, mode: ViewportMode) -> ViewportSpec {
        ViewportSpec {
            min_width: min_w,
            max_width: max_w,
            min_height: min_h,
            max_height: max_h,
            mode,
            shape: None,
        }
    }

    #[test]
    fn test_empty_specs_is_identity() {
        let result = calculate_scaling(&hub_metrics(), &[]);
        assert_eq!(result.spec, None);
        assert_eq!(result.viewport_width, 1024.0);
        assert_eq!(result.viewport_height, 600.0);
        assert_eq!(result.scale, 1.0);
    }

    #[test]
    fn test_exact_fit_scales_to_one() {
        let s = spec(1024.0, 1024.0, 600.0, 600.0, ViewportMode::Hub);
        let result = calculate_scaling(&hub_metrics(), &[s]);
        assert_eq!(result.spec, Some(s));
        assert_eq!(result.scale, 1.0);
    }

    #[test]
    fn test_clamps_into_spec_range() {
        let s = spec(100.0, 800.0, 100.0, 480.0, ViewportMode::Hub);
        let result = calculate_scaling(&hub_metrics(), &[s]);
        assert_eq!(result.viewport_width, 800.0);
        assert_eq!(result.viewport_height, 480.0);
        // Uniform scale fits the smaller ratio.
        assert!((result.scale - 600.0 / 480.0).abs() < 1e-9);
    }

    #[test]
    fn test_mode_match_beats_better_fit() {
        let tv = spec(1024.0, 1024.0, 600.0, 600.0, ViewportMode::Tv);
        let hub = spec(100.0, 640.0, 100.0, 400.0, ViewportMode::Hub);
        let result = calculate_scaling(&hub_metrics(), &[tv, hub]);
        assert_eq!(result.spec, Some(hub));
    }

    #[test]
    fn test_tie_keeps_earlier_candidate() {
        let a = spec(1024.0, 1024.0, 600.0, 600.0, ViewportMode::Hub);
        let b = spec(1024.0, 1024.0, 600.0, 600.0, ViewportMode::Hub);
        let result = calculate_scaling(&hub_metrics(), &[a, b]);
        assert_eq!(result.spec, Some(a));
    }

    #[test]
    fn test_dpi_converts_to_dp() {
        let metrics = ViewportMetrics {
            width: 2048,
            height: 1200,
            dpi: 320,
            shape: ScreenShape::Rectangle,
            mode: ViewportMode::Mobile,
        };
        assert_eq!(metrics.width_dp(), 1024.0);
        assert_eq!(metrics.height_dp(), 600.0);
    }

    #[test]
    fn test_non_finite_bounds_fall_back_to_identity() {
        // JSON5 config happily admits NaN; the negotiation must not panic.
        let bad = spec(f64::NAN, 1024.0, 100.0, 600.0, ViewportMode::Hub);
        let result = calculate_scaling(&hub_metrics(), &[bad]);
        assert_eq!(result.spec, None);
        assert_eq!(result.scale, 1.0);
    }

    #[test]
    fn test_inverted_bounds_are_skipped() {
        let inverted = spec(1024.0, 100.0, 100.0, 600.0, ViewportMode::Hub);
        let good = spec(100.0, 640.0, 100.0, 600.0, ViewportMode::Hub);
        let result = calculate_scaling(&hub_metrics(), &[inverted, good]);
        assert_eq!(result.spec, Some(good));
    }

    #[test]
    fn test_shape_penalty_prefers_matching_shape() {
        let metrics = ViewportMetrics {
            shape: ScreenShape::Round,
            ..hub_metrics()
        };
        let mut rect = spec(1024.0, 1024.0, 600.0, 600.0, ViewportMode::Hub);
        rect.shape = Some(ScreenShape::Rectangle);
        let mut round = spec(1024.0, 1024.0, 600.0, 600.0, ViewportMode::Hub);
        round.shape = Some(ScreenShape::Round);
        let result = calculate_scaling(&metrics, &[rect, round]);
        assert_eq!(result.spec, Some(round));
    }
}
