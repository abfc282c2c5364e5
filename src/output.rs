use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::dates;
use crate::record::Record;
use crate::render;

const MAX_NAME_CHARS: usize = 50;

/// Filesystem-safe fragment of a category/subcategory label.
pub fn sanitize_filename(name: &str) -> String {
    name.replace('/', "-")
        .replace('&', "and")
        .replace(' ', "_")
        .chars()
        .filter(|c| !matches!(c, '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|'))
        .take(MAX_NAME_CHARS)
        .collect()
}

/// `meetings-<sub>-<category>-<yyyymmdd>.md`, or without `<sub>-` when the
/// record has no subcategory.
pub fn file_name(record: &Record, iso_date: &str) -> String {
    let name_part = if record.subcategory.is_empty() {
        sanitize_filename(&record.category)
    } else {
        format!(
            "{}-{}",
            sanitize_filename(&record.subcategory),
            sanitize_filename(&record.category)
        )
    };
    format!("meetings-{}-{}.md", name_part, iso_date.replace('-', ""))
}

/// Outcome of one conversion batch.
#[derive(Debug, Default)]
pub struct WriteReport {
    pub written: Vec<PathBuf>,
    /// Titles of records whose date had no ISO form.
    pub skipped_undated: Vec<String>,
    /// Titles of records that never got a category.
    pub skipped_uncategorized: Vec<String>,
    pub failed: usize,
}

/// Write each placeable record to `<root>/<iso-date>/<file_name>`,
/// overwriting existing files. Records without a category or ISO-convertible
/// date are skipped; a failed write is logged and the batch continues.
pub fn write_records(root: &Path, records: &[Record], crawled_at: &str) -> WriteReport {
    let mut report = WriteReport::default();

    for record in records {
        if record.category.is_empty() {
            warn!("Skipping {:?}: no category", record.title);
            report.skipped_uncategorized.push(record.title.clone());
            continue;
        }
        let iso = dates::to_iso(&record.date);
        if iso.is_empty() {
            warn!("Skipping {:?}: no usable date ({:?})", record.title, record.date);
            report.skipped_undated.push(record.title.clone());
            continue;
        }

        match write_one(root, record, &iso, crawled_at) {
            Ok(path) => {
                debug!("Wrote {}", path.display());
                report.written.push(path);
            }
            Err(e) => {
                warn!("Failed to write {:?}: {:#}", record.title, e);
                report.failed += 1;
            }
        }
    }

    info!(
        "Wrote {} files ({} undated, {} uncategorized, {} failed)",
        report.written.len(),
        report.skipped_undated.len(),
        report.skipped_uncategorized.len(),
        report.failed
    );
    report
}

fn write_one(root: &Path, record: &Record, iso: &str, crawled_at: &str) -> Result<PathBuf> {
    let dir = root.join(iso);
    fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;

    let path = dir.join(file_name(record, iso));
    let doc = render::document(record, iso, crawled_at);
    fs::write(&path, doc).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(category: &str, sub: &str, title: &str, date: &str) -> Record {
        Record {
            title: title.into(),
            date: date.into(),
            ..Record::new(category, sub)
        }
    }

    #[test]
    fn sanitizes_labels() {
        assert_eq!(
            sanitize_filename("Shopper自動化&發票快查 Test/Case"),
            "Shopper自動化and發票快查_Test-Case"
        );
        assert_eq!(sanitize_filename(r#"a\b:c*d?e"f<g>h|i"#), "abcdefghi");
        assert_eq!(sanitize_filename(""), "");
        let long = "x".repeat(80);
        assert_eq!(sanitize_filename(&long).chars().count(), 50);
    }

    #[test]
    fn truncation_counts_chars_not_bytes() {
        let long = "會".repeat(60);
        assert_eq!(sanitize_filename(&long), "會".repeat(50));
    }

    #[test]
    fn file_names() {
        let plain = record("APP月會", "", "t", "");
        assert_eq!(file_name(&plain, "2025-11-24"), "meetings-APP月會-20251124.md");
        let nested = record("顧客洞察專案", "DM & CI", "t", "");
        assert_eq!(
            file_name(&nested, "2026-01-05"),
            "meetings-DM_and_CI-顧客洞察專案-20260105.md"
        );
    }

    #[test]
    fn undated_record_produces_no_file() {
        let root = tempfile::tempdir().unwrap();
        let records = vec![
            record("C", "", "dated", "2025年11月24日"),
            record("C", "sub", "undated", "Last Blursday"),
            record("", "", "orphan", "2025年11月24日"),
        ];
        let report = write_records(root.path(), &records, "2026-01-01T00:00:00.000Z");

        assert_eq!(report.written.len(), 1);
        assert_eq!(report.skipped_undated, vec!["undated".to_string()]);
        assert_eq!(report.skipped_uncategorized, vec!["orphan".to_string()]);
        assert!(root.path().join("2025-11-24/meetings-C-20251124.md").is_file());

        let dirs: Vec<_> = fs::read_dir(root.path()).unwrap().collect();
        assert_eq!(dirs.len(), 1);
    }

    #[test]
    fn converting_same_document_twice_is_byte_identical() {
        let doc = "\
# 會議記錄總整理

> 日期：2026-01-01

---

## C

### one
- **類別**：`C`
- **子類別**：`（無）`
- **時間**：`2025年11月24日`
- **摘要**：Shipped the beta.
- **筆記**：（無）

---

## D

### two
- **類別**：`D`
- **子類別**：`s`
- **時間**：`2025年12月1日 (週一)`
- **摘要**：（無）
- **筆記**：
- first point
- second point

---
";
        let root = tempfile::tempdir().unwrap();
        let stamp = "2026-01-01T00:00:00.000Z";

        let first = write_records(root.path(), &crate::parser::intermediate::parse(doc), stamp);
        assert_eq!(first.written.len(), 2);
        assert!(root.path().join("2025-12-01/meetings-s-D-20251201.md").is_file());
        let before: Vec<String> = first
            .written
            .iter()
            .map(|p| fs::read_to_string(p).unwrap())
            .collect();

        let second = write_records(root.path(), &crate::parser::intermediate::parse(doc), stamp);
        assert_eq!(first.written, second.written);
        let after: Vec<String> = second
            .written
            .iter()
            .map(|p| fs::read_to_string(p).unwrap())
            .collect();
        assert_eq!(before, after);
        assert!(after[1].contains("- first point\n- second point"));
    }
}
