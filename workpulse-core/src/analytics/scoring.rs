//! Scoring functions
//!
//! Pure statistics over already-classified data. Every scorer returns a
//! default (usually 0) for degenerate input instead of dividing by zero.

use super::focus::{minutes, FocusBlock};

/// Mean and population variance. `None` for empty input.
fn mean_and_population_variance(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    Some((mean, variance))
}

/// How uneven block lengths are, 0 (uniform) to 1.
///
/// Population standard deviation of durations in minutes over `mean + 1`.
/// The `+ 1` damps the score for very short blocks.
pub fn fragmentation_score(blocks: &[FocusBlock]) -> f64 {
    if blocks.len() < 2 {
        return 0.0;
    }
    let durations: Vec<f64> = blocks.iter().map(|b| minutes(b.duration)).collect();
    let Some((mean, variance)) = mean_and_population_variance(&durations) else {
        return 0.0;
    };
    let score = variance.sqrt() / (mean + 1.0);
    if score.is_finite() {
        score.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Day-to-day consistency of activity counts, 0 to 100.
///
/// Population coefficient of variation mapped to `max(0, 100 - cv * 50)`.
/// Fewer than two days, or no activity at all, scores 0.
pub fn consistency_score(daily_counts: &[f64]) -> f64 {
    if daily_counts.len() < 2 {
        return 0.0;
    }
    let Some((mean, variance)) = mean_and_population_variance(daily_counts) else {
        return 0.0;
    };
    if mean <= 0.0 {
        return 0.0;
    }
    let cv = variance.sqrt() / mean;
    (100.0 - cv * 50.0).max(0.0)
}

/// Composite focus score, always within 0 to 100.
///
/// `deep% * 0.5 + min(flows * 5, 20) - min(switches * 2, 20) - fragmentation * 10`
pub fn focus_score(
    deep_work_percentage: f64,
    flow_sessions: usize,
    context_switches: usize,
    fragmentation: f64,
) -> f64 {
    let flow_bonus = (flow_sessions as f64 * 5.0).min(20.0);
    let switch_penalty = (context_switches as f64 * 2.0).min(20.0);
    let score = deep_work_percentage * 0.5 + flow_bonus - switch_penalty - fragmentation * 10.0;

    if score.is_finite() {
        score.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

/// Consistency of pattern productivity samples, 0 to 1.
///
/// Sample coefficient of variation over the positive values, mapped to
/// `max(0, 1 - cv)`. Fewer than two positive values scores 0.
pub fn pattern_consistency(productivity: &[f64]) -> f64 {
    let positive: Vec<f64> = productivity.iter().copied().filter(|p| *p > 0.0).collect();
    if positive.len() < 2 {
        return 0.0;
    }
    let n = positive.len() as f64;
    let mean = positive.iter().sum::<f64>() / n;
    let variance = positive.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (n - 1.0);
    let cv = variance.sqrt() / mean;
    if cv.is_finite() {
        (1.0 - cv).max(0.0)
    } else {
        0.0
    }
}

/// Mean focus weight of a run of blocks, 0 when empty.
pub fn flow_quality(blocks: &[FocusBlock]) -> f64 {
    if blocks.is_empty() {
        return 0.0;
    }
    let total: f64 = blocks.iter().map(|b| b.focus_level.quality_weight()).sum();
    total / blocks.len() as f64
}
