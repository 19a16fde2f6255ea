/// 时段规范化
///
/// 服务端的 timing 字段在不同接口中形态不同：
/// - 对象映射 `"08:00 AM - 09:00 AM" → {actual_production, target_production}`
/// - 对象映射 `"08:00 AM - 09:00 AM" → [production, target]`
/// - 对象数组 `[{start_time, end_time, actual_production, target_production}]`
///
/// 这里统一转换为有序的 `TimeSlot` 序列，聚合逻辑只面对这一种形态。
/// 标签本身不能独立排序，因此始终保留服务端给出的顺序。

use serde_json::Value;

use crate::models::{Shift, TimeSlot};

/// 时段标签中起止时间的分隔符
const LABEL_SEPARATOR: char = '-';

/// 规范化单个班次的 timing 字段
///
/// 缺失、null 或无法识别的形态返回空序列；计数缺失按 0 处理，不视为错误
pub fn normalize_timing(timing: &Value) -> Vec<TimeSlot> {
    match timing {
        Value::Object(map) => map
            .iter()
            .map(|(label, value)| {
                let (start, end) = split_label(label);
                let (production, target) = read_count_pair(value);
                TimeSlot::new(start, end, production, target)
            })
            .collect(),
        Value::Array(items) => items.iter().filter_map(structured_slot).collect(),
        _ => Vec::new(),
    }
}

/// 去掉没有时段数据的班次（幂等）
pub fn retain_active_shifts(shifts: Vec<Shift>) -> Vec<Shift> {
    shifts.into_iter().filter(Shift::has_timing).collect()
}

/// 拆分 `HH:MM AM - HH:MM PM` 形式的标签
///
/// `HH:MM` 本身不含 `-`，按第一个 `-` 拆分即可；没有分隔符时整个标签作为开始时间
pub fn split_label(label: &str) -> (String, String) {
    match label.split_once(LABEL_SEPARATOR) {
        Some((start, end)) => (start.trim().to_string(), end.trim().to_string()),
        None => (label.trim().to_string(), String::new()),
    }
}

/// 读取一个计数值：负数、非数字、缺失都按 0 处理
pub fn read_count(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::Number(n)) => {
            if let Some(v) = n.as_u64() {
                v
            } else if let Some(v) = n.as_f64() {
                if v.is_finite() && v > 0.0 { v.trunc() as u64 } else { 0 }
            } else {
                0
            }
        }
        Some(Value::String(s)) => s.trim().parse::<f64>().ok()
            .filter(|v| v.is_finite() && *v > 0.0)
            .map(|v| v.trunc() as u64)
            .unwrap_or(0),
        _ => 0,
    }
}

/// 读取 (实际产量, 目标产量)，兼容对象与二元组两种形态
fn read_count_pair(value: &Value) -> (u64, u64) {
    match value {
        Value::Object(obj) => (
            read_count(obj.get("actual_production")),
            read_count(obj.get("target_production")),
        ),
        Value::Array(items) => (read_count(items.first()), read_count(items.get(1))),
        // 只有一个数字时视为实际产量
        Value::Number(_) | Value::String(_) => (read_count(Some(value)), 0),
        _ => (0, 0),
    }
}

/// 结构化时段对象
fn structured_slot(item: &Value) -> Option<TimeSlot> {
    let obj = item.as_object()?;

    let (start, end) = match (obj.get("start_time").and_then(Value::as_str), obj.get("end_time").and_then(Value::as_str)) {
        (Some(start), end) => (start.trim().to_string(), end.unwrap_or_default().trim().to_string()),
        (None, _) => {
            let label = obj.get("label")
                .or_else(|| obj.get("time_slot"))
                .and_then(Value::as_str)?;
            split_label(label)
        }
    };

    let (production, target) = read_count_pair(item);
    Some(TimeSlot::new(start, end, production, target))
}
