//! Level-from-XP curves.

use crate::models::{LevelCurve, LevelingConfig};

/// XP needed to reach level 2 on the geometric curve.
const GEOMETRIC_BASE_XP: f64 = 300.0;

/// Per-level growth of the geometric curve's XP step.
const GEOMETRIC_GROWTH: f64 = 1.08;

/// Calculate the (fractional) level reached with `xp`.
///
/// Returns NaN when the level is undefined for the input.
pub fn calculate_level(levels: &LevelingConfig, xp: f64) -> f64 {
    match levels.curve {
        LevelCurve::Quadratic {
            increment,
            increment_cap,
        } => quadratic_level(increment, increment_cap, xp),
        LevelCurve::Geometric => geometric_level(xp),
    }
}

/// Inverse of the quadratic XP table, linear after `increment_cap`.
pub fn quadratic_level(increment: u32, increment_cap: Option<u32>, xp: f64) -> f64 {
    let i = f64::from(increment) / 2.0;
    let level = (-i + (i.powi(2) + 4.0 * i * xp).sqrt()) / (2.0 * i) + 1.0;

    match increment_cap.map(f64::from) {
        Some(cap) if level > cap => {
            let cap_xp = i * (cap - 1.0).powi(2) + (cap - 1.0) * i;
            cap + (xp - cap_xp) / ((cap - 1.0) * i * 2.0)
        }
        _ => level,
    }
}

/// Level on the geometric curve, interpolated between thresholds.
///
/// Zero XP has no level on this curve.
pub fn geometric_level(xp: f64) -> f64 {
    if !xp.is_finite() || xp <= 0.0 {
        return f64::NAN;
    }

    let mut level = 2.0;
    let mut previous = 0.0;
    let mut threshold = GEOMETRIC_BASE_XP;
    let mut step = GEOMETRIC_BASE_XP;

    while xp > threshold {
        step *= GEOMETRIC_GROWTH;
        previous = threshold;
        threshold += step;
        level += 1.0;
    }

    level - 1.0 + (xp - previous) / (threshold - previous)
}
