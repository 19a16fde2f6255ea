/// 响应结构校验
///
/// 所有接口数据在进入聚合逻辑之前都在这里转换为强类型模型。
/// 结构不符时返回 `AppError::DataShapeUnexpected`，并带上出错位置，
/// 调用方据此记录日志并把界面重置为空状态。

use serde_json::{Map, Value};

use crate::models::{Group, LoginResponse, Machine, MachineInfo, MachineReport, Shift};
use crate::services::domain::time_slot_normalizer::{normalize_timing, read_count};
use crate::utils::error::{AppError, AppResult};

/// 解析机器组列表（看板、产量汇总、实时推送共用）
///
/// 接受 `{"groups": [...]}` 或直接的数组；没有机器的组会被丢弃
pub fn parse_groups(payload: &Value, context: &str) -> AppResult<Vec<Group>> {
    let items = list_field(payload, "groups", context)?;

    let mut groups = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let group = parse_group(item, &format!("{}.groups[{}]", context, index))?;
        if group.machines.is_empty() {
            log::debug!("[Schema] 丢弃没有机器的组: {}", group.group_id);
            continue;
        }
        groups.push(group);
    }
    Ok(groups)
}

/// 解析单个机器组
pub fn parse_group(value: &Value, context: &str) -> AppResult<Group> {
    let obj = as_object(value, context)?;

    let group_id = id_field(obj, "group_id");
    let group_name = text_field(obj, "group_name");
    let (group_id, group_name) = match (group_id, group_name) {
        (Some(id), Some(name)) => (id, name),
        (Some(id), None) => (id.clone(), id),
        (None, Some(name)) => (name.clone(), name),
        (None, None) => {
            return Err(AppError::data_shape_unexpected(context, "缺少 group_id 与 group_name"));
        }
    };

    let machines_value = obj.get("machines")
        .ok_or_else(|| AppError::data_shape_unexpected(context, "缺少 machines 数组"))?;
    let machines = machines_value.as_array()
        .ok_or_else(|| AppError::data_shape_unexpected(context, "machines 不是数组"))?
        .iter()
        .enumerate()
        .map(|(i, m)| parse_machine(m, &format!("{}.machines[{}]", context, i)))
        .collect::<AppResult<Vec<_>>>()?;

    Ok(Group { group_id, group_name, machines })
}

/// 解析单台机器
pub fn parse_machine(value: &Value, context: &str) -> AppResult<Machine> {
    let obj = as_object(value, context)?;

    let machine_id = id_field(obj, "machine_id")
        .ok_or_else(|| AppError::data_shape_unexpected(context, "缺少 machine_id"))?;
    let machine_name = text_field(obj, "machine_name").unwrap_or_else(|| machine_id.clone());
    let shifts = parse_shift_list(obj.get("shifts"), context)?;

    Ok(Machine {
        machine_id,
        machine_name,
        shifts,
        production_count: read_count(obj.get("production_count")),
        target_production: read_count(obj.get("target_production")),
    })
}

/// 解析单个班次，timing 在这里完成规范化
pub fn parse_shift(value: &Value, context: &str) -> AppResult<Shift> {
    let obj = as_object(value, context)?;

    let shift_no = match obj.get("shift_no") {
        Some(Value::Number(n)) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Some(Value::String(s)) => s.trim().parse::<u32>().ok(),
        _ => None,
    }
    .ok_or_else(|| AppError::data_shape_unexpected(context, "shift_no 缺失或不是非负整数"))?;

    Ok(Shift {
        shift_no,
        shift_name: text_field(obj, "shift_name"),
        shift_start_time: text_field(obj, "shift_start_time"),
        slots: obj.get("timing").map(normalize_timing).unwrap_or_default(),
    })
}

/// 解析单机报告 / 小时报告
///
/// 接受 `{machine_id?, machine_name?, shifts: [...]}` 或直接的班次数组；
/// 响应中没有机器信息时使用请求参数补齐
pub fn parse_machine_report(payload: &Value, machine_id: &str, date: Option<&str>) -> AppResult<MachineReport> {
    let context = "machine_report";
    match payload {
        Value::Array(_) => Ok(MachineReport {
            machine_id: machine_id.to_string(),
            machine_name: machine_id.to_string(),
            date: date.map(str::to_string),
            shifts: parse_shift_list(Some(payload), context)?,
        }),
        Value::Object(obj) => {
            if !obj.contains_key("shifts") {
                return Err(AppError::data_shape_unexpected(context, "缺少 shifts 数组"));
            }
            let id = id_field(obj, "machine_id").unwrap_or_else(|| machine_id.to_string());
            let name = text_field(obj, "machine_name").unwrap_or_else(|| id.clone());
            Ok(MachineReport {
                machine_id: id,
                machine_name: name,
                date: text_field(obj, "date").or_else(|| date.map(str::to_string)),
                shifts: parse_shift_list(obj.get("shifts"), context)?,
            })
        }
        _ => Err(AppError::data_shape_unexpected(context, "响应既不是对象也不是数组")),
    }
}

/// 解析机器列表
pub fn parse_machine_list(payload: &Value) -> AppResult<Vec<MachineInfo>> {
    let context = "machines";
    list_field(payload, "machines", context)?
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let item_context = format!("{}[{}]", context, i);
            let obj = as_object(item, &item_context)?;
            let machine_id = id_field(obj, "machine_id")
                .ok_or_else(|| AppError::data_shape_unexpected(&item_context, "缺少 machine_id"))?;
            let machine_name = text_field(obj, "machine_name").unwrap_or_else(|| machine_id.clone());
            Ok(MachineInfo { machine_id, machine_name })
        })
        .collect()
}

/// 解析登录响应，令牌字段兼容 `token` 与 `access_token`
pub fn parse_login(payload: &Value) -> AppResult<LoginResponse> {
    let context = "login";
    let obj = as_object(payload, context)?;
    let token = text_field(obj, "token")
        .or_else(|| text_field(obj, "access_token"))
        .ok_or_else(|| AppError::data_shape_unexpected(context, "缺少 token"))?;

    Ok(LoginResponse {
        token,
        user_name: text_field(obj, "user_name").or_else(|| text_field(obj, "username")),
        role: text_field(obj, "role"),
    })
}

fn parse_shift_list(value: Option<&Value>, context: &str) -> AppResult<Vec<Shift>> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, s)| parse_shift(s, &format!("{}.shifts[{}]", context, i)))
            .collect(),
        Some(_) => Err(AppError::data_shape_unexpected(context, "shifts 不是数组")),
    }
}

fn list_field<'a>(payload: &'a Value, field: &str, context: &str) -> AppResult<&'a Vec<Value>> {
    match payload {
        Value::Array(items) => Ok(items),
        Value::Object(obj) => obj.get(field)
            .and_then(Value::as_array)
            .ok_or_else(|| AppError::data_shape_unexpected(context, format!("缺少 {} 数组", field))),
        _ => Err(AppError::data_shape_unexpected(context, "响应既不是对象也不是数组")),
    }
}

fn as_object<'a>(value: &'a Value, context: &str) -> AppResult<&'a Map<String, Value>> {
    value.as_object()
        .ok_or_else(|| AppError::data_shape_unexpected(context, "期望对象"))
}

/// 标识字段可能是字符串也可能是数字
fn id_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn text_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}
