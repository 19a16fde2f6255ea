/// 报告导出
///
/// 接收格式化好的报告内容与文件名，写入导出目录并返回可分享的文件句柄

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::info;
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfLayerReference};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::models::ExportFormat;
use crate::services::domain::report_table::{LineKind, ReportTable};
use crate::utils::error::{AppError, AppResult};

/// A4 纵向
const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
const TOP_MM: f32 = 280.0;
const BOTTOM_MM: f32 = 15.0;
const ROW_HEIGHT_MM: f32 = 6.0;
const COLUMN_X_MM: [f32; 6] = [12.0, 52.0, 92.0, 137.0, 160.0, 183.0];

/// 待导出的内容
#[derive(Debug, Clone)]
pub enum ExportPayload {
    Csv(String),
    /// PDF 由表格直接绘制，HTML 作为可打印版本一并保存
    Pdf { html: String, table: ReportTable },
}

impl ExportPayload {
    pub fn format(&self) -> ExportFormat {
        match self {
            ExportPayload::Csv(_) => ExportFormat::Csv,
            ExportPayload::Pdf { .. } => ExportFormat::Pdf,
        }
    }
}

/// 导出结果（可分享的文件句柄）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedFile {
    pub report_id: String,
    pub format: ExportFormat,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
}

/// 导出接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IExportSink: Send + Sync {
    /// `file_name` 不含扩展名
    async fn export(&self, file_name: &str, payload: ExportPayload) -> AppResult<ExportedFile>;
}

/// 写入本地目录
pub struct DirectoryExportSink {
    export_dir: PathBuf,
}

impl DirectoryExportSink {
    pub fn new(export_dir: impl Into<PathBuf>) -> Self {
        Self { export_dir: export_dir.into() }
    }

    pub fn export_dir(&self) -> &Path {
        &self.export_dir
    }

    fn target_path(&self, file_name: &str, format: ExportFormat) -> PathBuf {
        self.export_dir.join(format!("{}.{}", sanitize_file_name(file_name), format.extension()))
    }
}

#[async_trait]
impl IExportSink for DirectoryExportSink {
    async fn export(&self, file_name: &str, payload: ExportPayload) -> AppResult<ExportedFile> {
        tokio::fs::create_dir_all(&self.export_dir)
            .await
            .map_err(|e| AppError::export_failure(format!("创建导出目录失败 {:?}: {}", self.export_dir, e)))?;

        let format = payload.format();
        let path = self.target_path(file_name, format);
        match payload {
            ExportPayload::Csv(text) => {
                tokio::fs::write(&path, text)
                    .await
                    .map_err(|e| AppError::export_failure(format!("写入CSV失败 {:?}: {}", path, e)))?;
            }
            ExportPayload::Pdf { html, table } => {
                let html_path = path.with_extension("html");
                tokio::fs::write(&html_path, html)
                    .await
                    .map_err(|e| AppError::export_failure(format!("写入HTML失败 {:?}: {}", html_path, e)))?;
                export_pdf(table, path.clone()).await?;
            }
        }

        let size_bytes = tokio::fs::metadata(&path)
            .await
            .map_err(|e| AppError::export_failure(format!("读取导出文件失败 {:?}: {}", path, e)))?
            .len();

        let exported = ExportedFile {
            report_id: Uuid::new_v4().to_string(),
            format,
            path,
            size_bytes,
            created_at: Utc::now(),
        };
        info!("[Export] {} 报告已导出: {:?} ({} 字节)", format, exported.path, size_bytes);
        Ok(exported)
    }
}

/// 文件名中只保留字母、数字、`-`、`_`
pub fn sanitize_file_name(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() { "report".to_string() } else { cleaned }
}

/// PDF 排版与写文件都是同步操作，放到阻塞线程池执行
async fn export_pdf(table: ReportTable, path: PathBuf) -> AppResult<()> {
    tokio::task::spawn_blocking(move || write_pdf(&table, &path))
        .await
        .map_err(|e| AppError::pdf_error(format!("PDF 生成任务异常退出: {}", e)))?
}

/// 使用内置字体逐行绘制报告表格，超出页面时自动分页
fn write_pdf(table: &ReportTable, path: &Path) -> AppResult<()> {
    let (doc, page, layer) = PdfDocument::new(table.title, Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");
    let regular = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| AppError::pdf_error(format!("添加字体失败: {}", e)))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| AppError::pdf_error(format!("添加字体失败: {}", e)))?;

    let mut current = doc.get_page(page).get_layer(layer);
    current.use_text(table.title, 16.0, Mm(COLUMN_X_MM[0]), Mm(TOP_MM), &bold);
    current.use_text(format!("Date: {}", table.date), 10.0, Mm(COLUMN_X_MM[0]), Mm(TOP_MM - 7.0), &regular);

    let mut y = TOP_MM - 18.0;
    draw_row(&current, &table.columns.map(String::from), y, &bold);
    y -= ROW_HEIGHT_MM;

    for line in &table.lines {
        if y < BOTTOM_MM {
            let (page, layer) = doc.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");
            current = doc.get_page(page).get_layer(layer);
            y = TOP_MM;
            draw_row(&current, &table.columns.map(String::from), y, &bold);
            y -= ROW_HEIGHT_MM;
        }
        let font = match line.kind {
            LineKind::Item => &regular,
            LineKind::Subtotal | LineKind::GrandTotal => &bold,
        };
        draw_row(&current, &line.plain_cells(), y, font);
        y -= ROW_HEIGHT_MM;
    }

    let file = File::create(path).map_err(|e| AppError::export_failure(format!("创建PDF文件失败 {:?}: {}", path, e)))?;
    doc.save(&mut BufWriter::new(file))
        .map_err(|e| AppError::pdf_error(format!("保存PDF文件失败: {}", e)))?;
    Ok(())
}

fn draw_row(layer: &PdfLayerReference, cells: &[String; 6], y: f32, font: &IndirectFontRef) {
    for (cell, x) in cells.iter().zip(COLUMN_X_MM) {
        if !cell.is_empty() {
            layer.use_text(cell.as_str(), 9.0, Mm(x), Mm(y), font);
        }
    }
}
