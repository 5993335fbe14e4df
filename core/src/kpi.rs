//! KPI achievement calculator.
//!
//! Achievement is magnitude-based: the distance travelled from the
//! baseline, relative to the distance the target requires. Regression
//! past the baseline is not penalised below zero and overshoot is
//! clamped at exactly 100.

use crate::model::EsgKpi;

/// Unclamped progress ratio `|current − baseline| / |target − baseline|`.
///
/// None when any value is missing or the target equals the baseline.
pub fn kpi_progress_ratio(
    baseline: Option<f64>,
    current: Option<f64>,
    target: Option<f64>,
) -> Option<f64> {
    let (baseline, current, target) = (baseline?, current?, target?);
    let target_progress = (target - baseline).abs();
    if target_progress <= 0.0 || !target_progress.is_finite() {
        return None;
    }
    Some((current - baseline).abs() / target_progress)
}

/// Achievement percentage in [0, 100], or None when undefined.
///
/// An undefined achievement must be excluded from aggregation,
/// never counted as zero.
pub fn kpi_achievement(
    baseline: Option<f64>,
    current: Option<f64>,
    target: Option<f64>,
) -> Option<f64> {
    kpi_progress_ratio(baseline, current, target).map(|ratio| (ratio * 100.0).min(100.0))
}

impl EsgKpi {
    pub fn achievement(&self) -> Option<f64> {
        kpi_achievement(self.baseline_value, self.current_value, self.target_value)
    }

    pub fn progress_ratio(&self) -> Option<f64> {
        kpi_progress_ratio(self.baseline_value, self.current_value, self.target_value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reduction_kpi_halfway() {
        let a = kpi_achievement(Some(100.0), Some(65.0), Some(30.0)).unwrap();
        assert!((a - 50.0).abs() < 1e-9);
    }

    #[test]
    fn overshoot_clamps_at_100() {
        assert_eq!(kpi_achievement(Some(0.5), Some(5.0), Some(1.0)), Some(100.0));
    }

    #[test]
    fn regression_is_magnitude_not_signed() {
        // Moved 20 away from a target 40 above baseline: still 50%.
        let a = kpi_achievement(Some(100.0), Some(80.0), Some(140.0)).unwrap();
        assert!((a - 50.0).abs() < 1e-9);
    }

    #[test]
    fn undefined_when_target_equals_baseline_or_missing() {
        assert_eq!(kpi_achievement(Some(10.0), Some(12.0), Some(10.0)), None);
        assert_eq!(kpi_achievement(None, Some(12.0), Some(20.0)), None);
        assert_eq!(kpi_achievement(Some(10.0), None, Some(20.0)), None);
        assert_eq!(kpi_achievement(Some(10.0), Some(12.0), None), None);
    }

    #[test]
    fn achievement_always_within_bounds() {
        let samples = [-500.0, -1.0, 0.0, 0.3, 7.0, 99.0, 1e6];
        for &b in &samples {
            for &c in &samples {
                for &t in &samples {
                    if let Some(a) = kpi_achievement(Some(b), Some(c), Some(t)) {
                        assert!((0.0..=100.0).contains(&a), "{b} {c} {t} -> {a}");
                    }
                }
            }
        }
    }
}
