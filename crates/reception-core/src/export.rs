//! CSV and ZIP export of the collected data.
//!
//! CSV files are UTF-8 with a byte-order mark and CRLF line endings so that
//! spreadsheet software on the reception laptops opens them with the right
//! encoding. Fields are quoted only when they contain a comma, a quote or a
//! line break.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone};
use thiserror::Error;
use tracing::info;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::models::{Category, LogEntry, VisitorLists};
use crate::store::Snapshot;

const BOM: &[u8] = "\u{FEFF}".as_bytes();

pub const MEMBER_LOG_FILE_NAME: &str = "部員出退勤履歴.csv";

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("エクスポートするデータがありません。")]
    NothingToExport,

    #[error("File error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// What the admin asked to export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Category(Category),
    MemberLog,
    Bundle,
}

impl ExportKind {
    pub fn label(&self) -> String {
        match self {
            ExportKind::Category(c) => format!("{} CSV", c.label()),
            ExportKind::MemberLog => "出退勤履歴 CSV".to_string(),
            ExportKind::Bundle => "一括 ZIP".to_string(),
        }
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "はい"
    } else {
        "いいえ"
    }
}

fn header(category: Category) -> Vec<&'static str> {
    let mut columns = match category {
        Category::Student => vec!["受付日時", "学年", "クラス", "出席番号", "棋力"],
        _ => vec!["受付日時", "人数", "棋力"],
    };
    if let Some(question) = category.extra_question() {
        columns.push(question.column_label());
    }
    columns
}

fn rows(visitors: &VisitorLists, category: Category) -> Vec<Vec<String>> {
    match category {
        Category::Student => visitors
            .students
            .iter()
            .map(|s| {
                vec![
                    s.timestamp.clone(),
                    s.grade.clone(),
                    s.class.clone(),
                    s.student_id.clone(),
                    s.shogi_strength.clone(),
                ]
            })
            .collect(),
        Category::External | Category::Teacher => {
            let list = if category == Category::External {
                &visitors.external
            } else {
                &visitors.teachers
            };
            list.iter()
                .map(|g| vec![g.timestamp.clone(), g.count.to_string(), g.shogi_strength.clone()])
                .collect()
        }
        Category::Parent => visitors
            .parents
            .iter()
            .map(|p| {
                vec![
                    p.timestamp.clone(),
                    p.count.to_string(),
                    p.shogi_strength.clone(),
                    yes_no(p.son_in_club).to_string(),
                ]
            })
            .collect(),
        Category::Alumni => visitors
            .alumni
            .iter()
            .map(|a| {
                vec![
                    a.timestamp.clone(),
                    a.count.to_string(),
                    a.shogi_strength.clone(),
                    yes_no(a.was_in_club).to_string(),
                ]
            })
            .collect(),
    }
}

/// Encode a header and rows. Refuses to produce a header-only file.
fn encode(header: &[&str], rows: &[Vec<String>]) -> Result<Vec<u8>, ExportError> {
    if rows.is_empty() {
        return Err(ExportError::NothingToExport);
    }

    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(BOM.to_vec());
    writer.write_record(header)?;
    for row in rows {
        writer.write_record(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| ExportError::Io(e.into_error()))
}

pub fn category_csv(visitors: &VisitorLists, category: Category) -> Result<Vec<u8>, ExportError> {
    encode(&header(category), &rows(visitors, category))
}

pub fn member_log_csv(log: &[LogEntry]) -> Result<Vec<u8>, ExportError> {
    let rows: Vec<Vec<String>> = log
        .iter()
        .map(|e| vec![e.timestamp.clone(), e.name.clone(), e.kind.label().to_string()])
        .collect();
    encode(&["日時", "部員名", "種別"], &rows)
}

pub fn bundle_file_name<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("reception_export_{}.zip", now.format("%Y%m%d_%H%M%S"))
}

/// Zip every non-empty collection, one CSV each.
pub fn bundle(snapshot: &Snapshot) -> Result<Vec<u8>, ExportError> {
    let mut entries: Vec<(&str, Vec<u8>)> = Vec::new();
    for category in Category::ALL {
        match category_csv(&snapshot.visitors, category) {
            Ok(bytes) => entries.push((category.export_file_name(), bytes)),
            Err(ExportError::NothingToExport) => {}
            Err(e) => return Err(e),
        }
    }
    match member_log_csv(&snapshot.member_log) {
        Ok(bytes) => entries.push((MEMBER_LOG_FILE_NAME, bytes)),
        Err(ExportError::NothingToExport) => {}
        Err(e) => return Err(e),
    }
    if entries.is_empty() {
        return Err(ExportError::NothingToExport);
    }

    let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let opts = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, bytes) in &entries {
        zip.start_file(*name, opts)?;
        zip.write_all(bytes)?;
    }
    Ok(zip.finish()?.into_inner())
}

/// Produce the requested export and write it under `dir`.
pub fn export_to_dir<Tz: TimeZone>(
    dir: &Path,
    snapshot: &Snapshot,
    kind: ExportKind,
    now: &DateTime<Tz>,
) -> Result<PathBuf, ExportError>
where
    Tz::Offset: std::fmt::Display,
{
    let (file_name, bytes) = match kind {
        ExportKind::Category(category) => (
            category.export_file_name().to_string(),
            category_csv(&snapshot.visitors, category)?,
        ),
        ExportKind::MemberLog => (
            MEMBER_LOG_FILE_NAME.to_string(),
            member_log_csv(&snapshot.member_log)?,
        ),
        ExportKind::Bundle => (bundle_file_name(now), bundle(snapshot)?),
    };

    std::fs::create_dir_all(dir)?;
    let path = dir.join(file_name);
    std::fs::write(&path, bytes)?;
    info!(path = %path.display(), "Export written");
    Ok(path)
}

// ============================================================================
// Tests
// ============================================================================
