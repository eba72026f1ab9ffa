//! Grid-based defuzzification of an aggregated membership function.
//!
//! All methods sample a unary mu(y) over [ymin, ymax] and fall back to the
//! range midpoint when the sampled mass is zero.

use crate::utils::linspace;
use serde::{Deserialize, Serialize};

const REFINE_PER_PEAK: usize = 5;
const WINDOW_FRAC: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefuzzMethod {
    Centroid,
    Mom,
    Bisector,
    CentroidAdaptive,
}

impl DefuzzMethod {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "centroid" => Some(Self::Centroid),
            "mom" => Some(Self::Mom),
            "bisector" => Some(Self::Bisector),
            "centroid_adaptive" => Some(Self::CentroidAdaptive),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Centroid => "centroid",
            Self::Mom => "mom",
            Self::Bisector => "bisector",
            Self::CentroidAdaptive => "centroid_adaptive",
        }
    }

    pub fn apply(&self, ymin: f64, ymax: f64, n: usize, mu: impl Fn(f64) -> f64) -> f64 {
        match self {
            Self::Centroid => centroid_on_grid(ymin, ymax, n, mu),
            Self::Mom => mom_on_grid(ymin, ymax, n, mu),
            Self::Bisector => bisector_on_grid(ymin, ymax, n, mu),
            Self::CentroidAdaptive => centroid_adaptive(ymin, ymax, n.max(101), mu),
        }
    }
}

/// Weighted mean of n equally spaced samples.
pub fn centroid_on_grid(ymin: f64, ymax: f64, n: usize, mu: impl Fn(f64) -> f64) -> f64 {
    if n <= 1 {
        return (ymin + ymax) / 2.0;
    }
    let mut num = 0.0;
    let mut den = 0.0;
    for y in linspace(ymin, ymax, n) {
        let w = mu(y);
        num += y * w;
        den += w;
    }
    if den > 0.0 {
        num / den
    } else {
        (ymin + ymax) / 2.0
    }
}

/// Mean of the samples attaining the maximum, within numeric tolerance.
pub fn mom_on_grid(ymin: f64, ymax: f64, n: usize, mu: impl Fn(f64) -> f64) -> f64 {
    let ys = linspace(ymin, ymax, n);
    let ws: Vec<f64> = ys.iter().map(|&y| mu(y)).collect();
    let m = ws.iter().copied().fold(0.0f64, f64::max);
    if m <= 0.0 {
        return (ymin + ymax) / 2.0;
    }
    let tol = (1e-6 * m).max(1e-12);
    let mut sum = 0.0;
    let mut count = 0usize;
    for (y, w) in ys.iter().zip(ws.iter()) {
        if (w - m).abs() <= tol {
            sum += y;
            count += 1;
        }
    }
    if count > 0 {
        sum / count as f64
    } else {
        (ymin + ymax) / 2.0
    }
}

/// First sample whose prefix area reaches half of the total area.
pub fn bisector_on_grid(ymin: f64, ymax: f64, n: usize, mu: impl Fn(f64) -> f64) -> f64 {
    if n <= 1 {
        return (ymin + ymax) / 2.0;
    }
    let ys = linspace(ymin, ymax, n);
    let ws: Vec<f64> = ys.iter().map(|&y| mu(y)).collect();
    let dy = (ymax - ymin) / (ys.len() - 1) as f64;
    let total: f64 = ws.iter().map(|w| w * dy).sum();
    if total <= 0.0 {
        return (ymin + ymax) / 2.0;
    }
    let half = total / 2.0;
    let mut acc = 0.0;
    for (y, w) in ys.iter().zip(ws.iter()) {
        acc += w * dy;
        if acc >= half {
            return *y;
        }
    }
    *ys.last().unwrap()
}

/// Centroid over a base grid plus refined samples around each interior
/// local maximum; the refinement window is clipped to the domain.
pub fn centroid_adaptive(ymin: f64, ymax: f64, n_base: usize, mu: impl Fn(f64) -> f64) -> f64 {
    let ys = linspace(ymin, ymax, n_base);
    let ws: Vec<f64> = ys.iter().map(|&y| mu(y)).collect();
    if !ws.iter().any(|&w| w > 0.0) {
        return (ymin + ymax) / 2.0;
    }

    let mut peaks = Vec::new();
    for i in 1..ws.len().saturating_sub(1) {
        if ws[i] >= ws[i - 1] && ws[i] >= ws[i + 1] && ws[i] > 0.0 {
            peaks.push(ys[i]);
        }
    }

    let mut samples = ys;
    let window = (WINDOW_FRAC * (ymax - ymin)).max(1e-9);
    for p in peaks {
        let a = (p - window).max(ymin);
        let b = (p + window).min(ymax);
        samples.extend(linspace(a, b, (REFINE_PER_PEAK * 10).max(3)));
    }

    let mut num = 0.0;
    let mut den = 0.0;
    for y in samples {
        let w = mu(y);
        num += y * w;
        den += w;
    }
    if den > 0.0 {
        num / den
    } else {
        (ymin + ymax) / 2.0
    }
}
