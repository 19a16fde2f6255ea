/// 报告格式化
///
/// HTML（用于 PDF）与 CSV 两种输出，列顺序与数值都来自同一份 `ReportTable`

use once_cell::sync::Lazy;
use tera::{Context, Tera};

use crate::services::domain::report_table::{build_report_table, ReportData, ReportTable};
use crate::utils::error::{AppError, AppResult};

const REPORT_TEMPLATE_NAME: &str = "report.html";

const REPORT_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>{{ title }}</title>
    <style>
        body { font-family: Helvetica, Arial, sans-serif; margin: 20px; }
        h1 { text-align: center; margin-bottom: 4px; }
        .date { text-align: center; color: #555; margin-top: 0; }
        table { width: 100%; border-collapse: collapse; }
        th, td { border: 1px solid #ccc; padding: 6px; text-align: center; }
        th { background-color: #f0f0f0; }
        tr.subtotal td { font-weight: bold; background-color: #f7f7f7; }
        tr.grand-total td { font-weight: bold; background-color: #e9ecef; }
    </style>
</head>
<body>
    <h1>{{ title }}</h1>
    <p class="date">Date: {{ date }}</p>
    <table>
        <thead>
            <tr>{% for column in columns %}<th>{{ column }}</th>{% endfor %}</tr>
        </thead>
        <tbody>
{% for line in lines %}{% if line.kind == "item" %}            <tr>{% if line.section.rowspan > 0 %}<td rowspan="{{ line.section.rowspan }}">{{ line.section.text }}</td>{% endif %}{% if line.shift.rowspan > 0 %}<td rowspan="{{ line.shift.rowspan }}">{{ line.shift.text }}</td>{% endif %}<td>{{ line.item }}</td><td{% if line.band_color %} style="background-color: {{ line.band_color }}"{% endif %}>{{ line.production }}</td><td>{{ line.target }}</td><td>{{ line.difference }}</td></tr>
{% elif line.kind == "subtotal" %}            <tr class="subtotal"><td colspan="2"><b>{{ line.shift.text }}</b></td><td><b>{{ line.production }}</b></td><td><b>{{ line.target }}</b></td><td><b>{{ line.difference }}</b></td></tr>
{% else %}            <tr class="grand-total"><td colspan="3"><b>{{ line.section.text }}</b></td><td><b>{{ line.production }}</b></td><td><b>{{ line.target }}</b></td><td><b>{{ line.difference }}</b></td></tr>
{% endif %}{% endfor %}        </tbody>
    </table>
</body>
</html>
"#;

static TEMPLATES: Lazy<AppResult<Tera>> = Lazy::new(|| {
    let mut tera = Tera::default();
    tera.add_raw_template(REPORT_TEMPLATE_NAME, REPORT_TEMPLATE)
        .map_err(|e| AppError::template_error(format!("添加报告模板失败: {}", e)))?;
    Ok(tera)
});

/// 渲染为 HTML，文本内容会被转义
pub fn to_html(data: &ReportData) -> AppResult<String> {
    render_html(&build_report_table(data))
}

/// 渲染为 CSV
pub fn to_csv(data: &ReportData) -> AppResult<String> {
    render_csv(&build_report_table(data))
}

pub fn render_html(table: &ReportTable) -> AppResult<String> {
    let tera = TEMPLATES.as_ref().map_err(Clone::clone)?;
    let context = Context::from_serialize(table)?;
    Ok(tera.render(REPORT_TEMPLATE_NAME, &context)?)
}

/// 表头一行，之后每个表格行一行；重复的分区名与班次名留空
pub fn render_csv(table: &ReportTable) -> AppResult<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(table.columns)?;
    for line in &table.lines {
        writer.write_record(line.plain_cells())?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::csv_error(format!("写入CSV缓冲失败: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| AppError::csv_error(format!("CSV内容不是有效的UTF-8: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MachineReport, Shift, TimeSlot};

    fn report(machine_name: &str) -> ReportData {
        ReportData::shift_wise(
            "2024-05-01",
            &[MachineReport {
                machine_id: "M1".into(),
                machine_name: machine_name.into(),
                date: None,
                shifts: vec![
                    Shift {
                        shift_no: 1,
                        shift_name: None,
                        shift_start_time: None,
                        slots: vec![
                            TimeSlot::new("06:00 AM", "07:00 AM", 10, 12),
                            TimeSlot::new("07:00 AM", "08:00 AM", 14, 12),
                        ],
                    },
                    Shift {
                        shift_no: 2,
                        shift_name: None,
                        shift_start_time: None,
                        slots: vec![TimeSlot::new("02:00 PM", "03:00 PM", 9, 10)],
                    },
                ],
            }],
        )
    }

    #[test]
    fn test_csv_layout() {
        let csv = to_csv(&report("Press 1")).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "Machine,Shift,Time Slot,Production,Target,Difference");
        assert_eq!(lines[1], "Press 1,Shift 1,06:00 AM - 07:00 AM,10,12,-2");
        assert_eq!(lines[2], ",,07:00 AM - 08:00 AM,14,12,2");
        assert_eq!(lines[3], ",Shift 1 Total,,24,24,0");
        assert_eq!(lines[4], ",Shift 2,02:00 PM - 03:00 PM,9,10,-1");
        assert_eq!(lines[5], ",Shift 2 Total,,9,10,-1");
        assert_eq!(lines[6], "Grand Total,,,33,34,-1");
        assert_eq!(lines.len(), 7);
    }

    #[test]
    fn test_html_merges_cells_and_flags_totals() {
        let html = to_html(&report("Press 1")).unwrap();
        assert!(html.contains("<th>Machine</th><th>Shift</th><th>Time Slot</th>"));
        assert!(html.contains(r#"<td rowspan="5">Press 1</td>"#));
        assert!(html.contains(r#"<td rowspan="2">Shift 1</td>"#));
        assert!(html.contains(r#"<tr class="subtotal"><td colspan="2"><b>Shift 1 Total</b></td><td><b>24</b></td>"#));
        assert!(html.contains(r#"<tr class="grand-total"><td colspan="3"><b>Grand Total</b></td><td><b>33</b></td>"#));
        assert_eq!(html.matches("class=\"subtotal\"").count(), 2);
    }

    #[test]
    fn test_html_escapes_names() {
        let html = to_html(&report("<b>Press & Co</b>")).unwrap();
        assert!(html.contains("&lt;b&gt;Press &amp; Co&lt;&#x2F;b&gt;"));
        assert!(!html.contains("<b>Press"));
    }
}
