/// 生产效率色带
///
/// 比较在整数域完成，避免 85.0% 之类的边界被浮点误差推到错误的色带

use crate::models::EfficiencyBand;

/// 中间色带下限（含）
pub const MEDIUM_THRESHOLD_PERCENT: u64 = 85;
/// 最高色带下限（含）
pub const HIGH_THRESHOLD_PERCENT: u64 = 95;

/// 根据实际产量与目标产量计算色带，目标为 0 时没有色带
pub fn efficiency_band(production: u64, target: u64) -> Option<EfficiencyBand> {
    if target == 0 {
        return None;
    }
    let scaled = production as u128 * 100;
    let target = target as u128;

    if scaled >= target * HIGH_THRESHOLD_PERCENT as u128 {
        Some(EfficiencyBand::High)
    } else if scaled >= target * MEDIUM_THRESHOLD_PERCENT as u128 {
        Some(EfficiencyBand::Medium)
    } else {
        Some(EfficiencyBand::Low)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_boundaries() {
        assert_eq!(efficiency_band(84, 100), Some(EfficiencyBand::Low));
        assert_eq!(efficiency_band(85, 100), Some(EfficiencyBand::Medium));
        assert_eq!(efficiency_band(94, 100), Some(EfficiencyBand::Medium));
        assert_eq!(efficiency_band(95, 100), Some(EfficiencyBand::High));
        assert_eq!(efficiency_band(130, 100), Some(EfficiencyBand::High));
    }

    #[test]
    fn test_exact_85_percent_with_awkward_target() {
        // 17 / 20 = 85%
        assert_eq!(efficiency_band(17, 20), Some(EfficiencyBand::Medium));
        // 16 / 20 = 80%
        assert_eq!(efficiency_band(16, 20), Some(EfficiencyBand::Low));
        // 849 / 1000 = 84.9%
        assert_eq!(efficiency_band(849, 1000), Some(EfficiencyBand::Low));
    }

    #[test]
    fn test_zero_target_has_no_band() {
        assert_eq!(efficiency_band(0, 0), None);
        assert_eq!(efficiency_band(10, 0), None);
    }
}
