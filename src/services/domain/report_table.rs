/// 报告表格构建
///
/// HTML 与 CSV 两种输出共用这里生成的同一份扁平行列表，
/// 因此两者的班次小计与总计必然一致。

use serde::Serialize;

use crate::models::{Group, MachineReport, ReportKind, ShiftTotals};
use crate::services::domain::efficiency::efficiency_band;
use crate::services::domain::shift_aggregator::{aggregate_group, shift_headers};

/// 总计行标签
pub const GRAND_TOTAL_LABEL: &str = "Grand Total";

/// 报告中的一个明细项（一个时段或一台机器）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportItem {
    pub label: String,
    pub totals: ShiftTotals,
}

/// 同一班次下的明细项
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShiftBlock {
    pub shift_label: String,
    pub items: Vec<ReportItem>,
}

impl ShiftBlock {
    pub fn subtotal(&self) -> ShiftTotals {
        self.items.iter().map(|i| i.totals).sum()
    }
}

/// 报告分区：明细报告中是一台机器，汇总报告中是一个组
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSection {
    pub title: String,
    pub blocks: Vec<ShiftBlock>,
}

impl ReportSection {
    pub fn grand_total(&self) -> ShiftTotals {
        self.blocks.iter().map(ShiftBlock::subtotal).sum()
    }
}

/// 待格式化的报告数据
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportData {
    pub kind: ReportKind,
    pub date: String,
    pub sections: Vec<ReportSection>,
}

impl ReportData {
    /// 班次明细报告：每台机器一个分区，每个有效班次一个块，每个时段一行
    pub fn shift_wise(date: impl Into<String>, reports: &[MachineReport]) -> Self {
        let sections = reports
            .iter()
            .map(|report| ReportSection {
                title: report.machine_name.clone(),
                blocks: report
                    .shifts
                    .iter()
                    .filter(|s| s.has_timing())
                    .map(|shift| ShiftBlock {
                        shift_label: shift.label(),
                        items: shift
                            .slots
                            .iter()
                            .map(|slot| ReportItem { label: slot.label(), totals: slot.into() })
                            .collect(),
                    })
                    .collect(),
            })
            .collect();

        Self { kind: ReportKind::ShiftWise, date: date.into(), sections }
    }

    /// 产量汇总报告：每个组一个分区，每个班次表头一个块，每台机器一行
    pub fn summary(date: impl Into<String>, groups: &[Group]) -> Self {
        let headers = shift_headers(groups);
        let sections = groups
            .iter()
            .map(|group| {
                let summary = aggregate_group(group, &headers);
                let blocks = headers
                    .iter()
                    .enumerate()
                    .map(|(col, header)| ShiftBlock {
                        shift_label: header.clone(),
                        items: summary
                            .machines
                            .iter()
                            .map(|m| ReportItem { label: m.machine_name.clone(), totals: m.per_shift[col] })
                            .collect(),
                    })
                    .collect();
                ReportSection { title: summary.group_name, blocks }
            })
            .collect();

        Self { kind: ReportKind::Summary, date: date.into(), sections }
    }

    pub fn is_empty(&self) -> bool {
        self.sections.iter().all(|s| s.blocks.iter().all(|b| b.items.is_empty()))
    }
}

/// 行类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LineKind {
    Item,
    Subtotal,
    GrandTotal,
}

/// 可合并的单元格
///
/// `rowspan == 0` 表示被上方单元格合并覆盖：HTML 中省略，CSV 中留空
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpanCell {
    pub text: String,
    pub rowspan: usize,
}

impl SpanCell {
    fn start(text: impl Into<String>, rowspan: usize) -> Self {
        Self { text: text.into(), rowspan }
    }

    fn covered(text: impl Into<String>) -> Self {
        Self { text: text.into(), rowspan: 0 }
    }

    pub fn is_covered(&self) -> bool {
        self.rowspan == 0
    }
}

/// 表格中的一行
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportLine {
    pub kind: LineKind,
    pub section: SpanCell,
    pub shift: SpanCell,
    pub item: String,
    pub production: u64,
    pub target: u64,
    pub difference: i64,
    /// 明细行的效率色带背景色，目标为 0 时没有
    pub band_color: Option<&'static str>,
}

impl ReportLine {
    /// 不支持单元格合并的输出（CSV / PDF）使用的文本列，被合并的单元格留空
    pub fn plain_cells(&self) -> [String; 6] {
        let span_text = |cell: &SpanCell| {
            if cell.is_covered() { String::new() } else { cell.text.clone() }
        };
        [
            span_text(&self.section),
            span_text(&self.shift),
            self.item.clone(),
            self.production.to_string(),
            self.target.to_string(),
            self.difference.to_string(),
        ]
    }
}

/// 渲染前的完整表格
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportTable {
    pub kind: ReportKind,
    pub title: &'static str,
    pub date: String,
    pub columns: [&'static str; 6],
    pub lines: Vec<ReportLine>,
}

impl ReportTable {
    /// 所有班次小计行
    pub fn subtotals(&self) -> impl Iterator<Item = &ReportLine> {
        self.lines.iter().filter(|l| l.kind == LineKind::Subtotal)
    }

    /// 所有总计行
    pub fn grand_totals(&self) -> impl Iterator<Item = &ReportLine> {
        self.lines.iter().filter(|l| l.kind == LineKind::GrandTotal)
    }
}

/// 把报告数据展开为扁平的行列表
///
/// 每个班次块之后追加 `"{班次} Total"` 小计行，每个分区最后追加 `Grand Total` 行；
/// 没有任何明细的分区和班次块不输出
pub fn build_report_table(data: &ReportData) -> ReportTable {
    let mut lines = Vec::new();

    for section in &data.sections {
        let blocks: Vec<&ShiftBlock> = section.blocks.iter().filter(|b| !b.items.is_empty()).collect();
        if blocks.is_empty() {
            continue;
        }
        // 分区名覆盖明细行与小计行，总计行单独成行
        let section_span: usize = blocks.iter().map(|b| b.items.len() + 1).sum();
        let mut section_started = false;

        for block in &blocks {
            for (index, item) in block.items.iter().enumerate() {
                let section_cell = if section_started {
                    SpanCell::covered(section.title.clone())
                } else {
                    section_started = true;
                    SpanCell::start(section.title.clone(), section_span)
                };
                let shift_cell = if index == 0 {
                    SpanCell::start(block.shift_label.clone(), block.items.len())
                } else {
                    SpanCell::covered(block.shift_label.clone())
                };
                lines.push(total_line(
                    LineKind::Item,
                    section_cell,
                    shift_cell,
                    item.label.clone(),
                    item.totals,
                ));
            }

            lines.push(total_line(
                LineKind::Subtotal,
                SpanCell::covered(section.title.clone()),
                SpanCell::start(format!("{} Total", block.shift_label), 1),
                String::new(),
                block.subtotal(),
            ));
        }

        lines.push(total_line(
            LineKind::GrandTotal,
            SpanCell::start(GRAND_TOTAL_LABEL, 1),
            SpanCell::start(String::new(), 1),
            String::new(),
            section.grand_total(),
        ));
    }

    ReportTable {
        kind: data.kind,
        title: data.kind.title(),
        date: data.date.clone(),
        columns: data.kind.columns(),
        lines,
    }
}

fn total_line(kind: LineKind, section: SpanCell, shift: SpanCell, item: String, totals: ShiftTotals) -> ReportLine {
    let band_color = match kind {
        LineKind::Item => efficiency_band(totals.total_production, totals.total_target)
            .map(|band| band.background_color()),
        _ => None,
    };
    ReportLine {
        kind,
        section,
        shift,
        item,
        production: totals.total_production,
        target: totals.total_target,
        difference: totals.total_difference,
        band_color,
    }
}
