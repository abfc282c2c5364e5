use std::fmt::Write;

use chrono::NaiveDate;

use crate::parser::intermediate::{DATE_MARK, NOTES_MARK, SUBCATEGORY_MARK, SUMMARY_MARK};
use crate::record::{Record, NONE_MARK, UNKNOWN_DATE_MARK, UNTITLED_MARK};

fn or_mark<'a>(value: &'a str, mark: &'a str) -> &'a str {
    if value.is_empty() {
        mark
    } else {
        value
    }
}

/// Serialize records into the intermediate document read back by
/// `parser::intermediate::parse`. A new `## ` section starts whenever the
/// category changes.
///
/// Summary and notes lines are written as-is. A body line that looks like
/// structure does not survive a re-read: `### ` opens a new record, `---`
/// or `## ` ends the field, a leading `- ` is stripped and `- **` lines
/// are dropped.
pub fn intermediate(records: &[Record], run_date: NaiveDate) -> String {
    let mut out = String::new();
    out.push_str("# 會議記錄總整理\n\n");
    let _ = writeln!(out, "> 日期：{}", run_date.format("%Y-%m-%d"));
    out.push_str("> 來源：Notion 公開頁面\n\n---\n\n");

    let mut current_category: Option<&str> = None;
    for r in records {
        if current_category != Some(r.category.as_str()) {
            current_category = Some(r.category.as_str());
            let _ = write!(out, "\n## {}\n\n", r.category);
        }

        let _ = writeln!(out, "### {}", or_mark(&r.title, UNTITLED_MARK));
        let _ = writeln!(out, "- **類別**：`{}`", r.category);
        let _ = writeln!(out, "- {}：`{}`", SUBCATEGORY_MARK, or_mark(&r.subcategory, NONE_MARK));
        let _ = writeln!(out, "- {}：`{}`", DATE_MARK, or_mark(&r.date, UNKNOWN_DATE_MARK));
        write_field(&mut out, SUMMARY_MARK, &r.summary);
        write_field(&mut out, NOTES_MARK, &r.notes);
        out.push_str("\n---\n\n");
    }

    out
}

fn write_field(out: &mut String, mark: &str, body: &str) {
    let mut lines = body.lines();
    let first = lines.next().unwrap_or("");
    let _ = writeln!(out, "- {}：{}", mark, or_mark(first, NONE_MARK));
    for line in lines {
        let _ = writeln!(out, "{}", line);
    }
}

/// Render one record as a standalone dated document. `iso_date` must be the
/// record's date in ISO form; `crawled_at` is stamped into the front matter.
pub fn document(record: &Record, iso_date: &str, crawled_at: &str) -> String {
    let mut lines: Vec<String> = vec![
        "---".into(),
        format!("category: {}", record.category),
        format!("subcategory: {}", record.subcategory),
        format!("date: {}", iso_date),
        format!("crawled_at: {}", crawled_at),
        "---".into(),
        String::new(),
        "## 📋 會議資訊".into(),
        String::new(),
        "| 項目 | 內容 |".into(),
        "|------|------|".into(),
        format!("| 分類 | {} |", record.category),
    ];
    if !record.subcategory.is_empty() {
        lines.push(format!("| 子類別 | {} |", record.subcategory));
    }
    lines.push(format!("| 日期 | {} |", record.date));
    lines.push(String::new());
    lines.push("---".into());
    lines.push(String::new());

    lines.push(format!("## 📋 {}", or_mark(&record.title, UNTITLED_MARK)));
    lines.push(String::new());

    if !record.summary.is_empty() {
        lines.push("## 📝 摘要".into());
        lines.push(String::new());
        lines.push(record.summary.clone());
        lines.push(String::new());
    }

    if !record.notes.is_empty() {
        lines.push("## 📓 筆記".into());
        lines.push(String::new());
        lines.extend(
            record
                .notes
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(|l| format!("- {}", l)),
        );
        lines.push(String::new());
    }

    lines.push("---".into());

    let mut doc = lines.join("\n");
    doc.push('\n');
    doc
}
