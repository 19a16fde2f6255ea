/// 班次聚合
///
/// 对时段求和得到班次汇总，再对班次求和得到机器 / 组汇总。
/// 所有汇总都从源数据重新计算，不缓存。

use serde::{Deserialize, Serialize};

use crate::models::{Group, Shift, ShiftTotals};

/// 没有可用班次时的展示文本
pub const NO_SHIFT_LABEL: &str = "No shift available";

/// 单个班次的汇总（空班次为 0）
pub fn aggregate_shift(shift: &Shift) -> ShiftTotals {
    shift.slots.iter().map(ShiftTotals::from).sum()
}

/// 多个班次的汇总
pub fn aggregate_shifts(shifts: &[Shift]) -> ShiftTotals {
    shifts.iter().map(aggregate_shift).sum()
}

/// 最新班次：有时段数据的班次中 shift_no 最大的一个
pub fn latest_shift(shifts: &[Shift]) -> Option<&Shift> {
    shifts
        .iter()
        .filter(|s| s.has_timing())
        .max_by_key(|s| s.shift_no)
}

/// 最新班次的显示名，没有时为 `No shift available`
pub fn latest_shift_label(shifts: &[Shift]) -> String {
    latest_shift(shifts)
        .map(Shift::label)
        .unwrap_or_else(|| NO_SHIFT_LABEL.to_string())
}

/// 汇总表表头：所有组中出现过的有效班次名，按首次出现顺序
pub fn shift_headers(groups: &[Group]) -> Vec<String> {
    let mut headers: Vec<String> = Vec::new();
    let shifts = groups
        .iter()
        .flat_map(|g| g.machines.iter())
        .flat_map(|m| m.shifts.iter())
        .filter(|s| s.has_timing());
    for shift in shifts {
        let label = shift.label();
        if !headers.contains(&label) {
            headers.push(label);
        }
    }
    headers
}

/// 单台机器在汇总表中的一行
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineSummary {
    pub machine_id: String,
    pub machine_name: String,
    /// 与表头一一对应
    pub per_shift: Vec<ShiftTotals>,
    pub total: ShiftTotals,
}

/// 单个组的汇总
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub group_id: String,
    pub group_name: String,
    pub shift_headers: Vec<String>,
    pub machines: Vec<MachineSummary>,
    /// 每个班次列的合计，与表头一一对应
    pub shift_totals: Vec<ShiftTotals>,
    pub grand_total: ShiftTotals,
}

/// 按给定表头汇总一个组
///
/// 机器缺少某个班次时该列为 0；同名班次会合并；不在表头中的班次不计入
pub fn aggregate_group(group: &Group, shift_headers: &[String]) -> GroupSummary {
    let machines: Vec<MachineSummary> = group
        .machines
        .iter()
        .map(|machine| {
            let per_shift: Vec<ShiftTotals> = shift_headers
                .iter()
                .map(|header| {
                    machine
                        .shifts
                        .iter()
                        .filter(|s| s.label() == *header)
                        .map(aggregate_shift)
                        .sum()
                })
                .collect();
            let total = per_shift.iter().copied().sum();
            MachineSummary {
                machine_id: machine.machine_id.clone(),
                machine_name: machine.machine_name.clone(),
                per_shift,
                total,
            }
        })
        .collect();

    let shift_totals: Vec<ShiftTotals> = (0..shift_headers.len())
        .map(|col| machines.iter().map(|m| m.per_shift[col]).sum())
        .collect();
    let grand_total = shift_totals.iter().copied().sum();

    GroupSummary {
        group_id: group.group_id.clone(),
        group_name: group.group_name.clone(),
        shift_headers: shift_headers.to_vec(),
        machines,
        shift_totals,
        grand_total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Machine, TimeSlot};

    fn shift(no: u32, name: Option<&str>, slots: Vec<(u64, u64)>) -> Shift {
        Shift {
            shift_no: no,
            shift_name: name.map(str::to_string),
            shift_start_time: None,
            slots: slots
                .into_iter()
                .enumerate()
                .map(|(i, (p, t))| TimeSlot::new(format!("{}:00", i), format!("{}:00", i + 1), p, t))
                .collect(),
        }
    }

    fn machine(id: &str, shifts: Vec<Shift>) -> Machine {
        Machine {
            machine_id: id.to_string(),
            machine_name: format!("Machine {}", id),
            shifts,
            production_count: 0,
            target_production: 0,
        }
    }

    #[test]
    fn test_aggregate_shift_sums_slots() {
        let totals = aggregate_shift(&shift(1, None, vec![(10, 12), (15, 12), (0, 12)]));
        assert_eq!(totals, ShiftTotals { total_production: 25, total_target: 36, total_difference: -11 });
    }

    #[test]
    fn test_aggregate_empty_shift_is_zero() {
        assert_eq!(aggregate_shift(&shift(1, None, vec![])), ShiftTotals::ZERO);
        assert_eq!(aggregate_shifts(&[]), ShiftTotals::ZERO);
    }

    #[test]
    fn test_aggregate_shift_with_huge_counts_does_not_overflow() {
        let totals = aggregate_shift(&shift(1, None, vec![(u64::MAX, 0), (1, 0)]));
        assert_eq!(totals.total_production, u64::MAX);
        assert_eq!(totals.total_difference, i64::MAX);
    }

    #[test]
    fn test_totals_equal_slot_sums_for_many_inputs() {
        // 简单的确定性伪随机序列，覆盖不同规模的输入
        let mut seed: u64 = 17;
        for len in 0..20 {
            let mut slots = Vec::new();
            for _ in 0..len {
                seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                slots.push(((seed >> 33) % 500, (seed >> 17) % 500));
            }
            let s = shift(1, None, slots.clone());
            let totals = aggregate_shift(&s);
            let production: u64 = slots.iter().map(|(p, _)| p).sum();
            let target: u64 = slots.iter().map(|(_, t)| t).sum();
            assert_eq!(totals.total_production, production);
            assert_eq!(totals.total_target, target);
            assert_eq!(totals.total_difference, production as i64 - target as i64);
            let by_slot: i64 = s.slots.iter().map(TimeSlot::difference).sum();
            assert_eq!(totals.total_difference, by_slot);
        }
    }

    #[test]
    fn test_latest_shift_skips_empty_timing() {
        let shifts = vec![
            shift(1, None, vec![]),
            shift(2, None, vec![(5, 5)]),
            shift(3, None, vec![]),
        ];
        assert_eq!(latest_shift(&shifts).map(|s| s.shift_no), Some(2));
        assert_eq!(latest_shift_label(&shifts), "Shift 2");
    }

    #[test]
    fn test_latest_shift_none_when_no_timing() {
        let shifts = vec![shift(1, None, vec![]), shift(2, None, vec![])];
        assert!(latest_shift(&shifts).is_none());
        assert_eq!(latest_shift_label(&shifts), NO_SHIFT_LABEL);
    }

    #[test]
    fn test_aggregate_group_per_shift_and_grand_total() {
        let group = Group {
            group_id: "g1".into(),
            group_name: "Assembly".into(),
            machines: vec![
                machine("A", vec![shift(1, None, vec![(10, 10), (20, 10)]), shift(2, None, vec![(5, 10)])]),
                machine("B", vec![shift(2, None, vec![(7, 7)]), shift(3, None, vec![])]),
            ],
        };
        let headers = shift_headers(std::slice::from_ref(&group));
        assert_eq!(headers, vec!["Shift 1".to_string(), "Shift 2".to_string()]);

        let summary = aggregate_group(&group, &headers);
        assert_eq!(summary.machines[0].per_shift[0], ShiftTotals::from_counts(30, 20));
        assert_eq!(summary.machines[1].per_shift[0], ShiftTotals::ZERO);
        assert_eq!(summary.shift_totals[1], ShiftTotals::from_counts(12, 17));
        assert_eq!(summary.grand_total, ShiftTotals::from_counts(42, 37));
        assert_eq!(
            summary.grand_total,
            summary.machines.iter().map(|m| m.total).sum::<ShiftTotals>()
        );
    }
}
