use std::sync::LazyLock;

use regex::Regex;

use crate::dates;
use crate::record::{strip_placeholder, Record, NONE_MARK, UNTITLED_MARK};

static BACKTICK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"`([^`]+)`").unwrap());

pub const SUBCATEGORY_MARK: &str = "**子類別**";
pub const DATE_MARK: &str = "**時間**";
pub const SUMMARY_MARK: &str = "**摘要**";
pub const NOTES_MARK: &str = "**筆記**";

/// One line of an intermediate document, classified.
#[derive(Debug, Clone, PartialEq)]
pub enum Line<'a> {
    Section(&'a str),
    Meeting(&'a str),
    Subcategory(&'a str),
    Date(&'a str),
    SummaryStart(&'a str),
    NotesStart(&'a str),
    /// `---` rule: pauses field accumulation.
    Rule,
    Blank,
    Content(&'a str),
}

/// Which buffer content lines currently feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Idle,
    Summary,
    Notes,
}

pub fn classify(raw: &str) -> Line<'_> {
    let line = raw.trim();

    if line.starts_with("## ") && !line.starts_with("### ") {
        return Line::Section(line[3..].trim());
    }
    if let Some(title) = line.strip_prefix("### ") {
        return Line::Meeting(title.trim());
    }
    if line.contains(SUBCATEGORY_MARK) {
        return Line::Subcategory(line);
    }
    if line.contains(DATE_MARK) {
        return Line::Date(line);
    }
    if line.contains(SUMMARY_MARK) {
        return Line::SummaryStart(seed_after(line, SUMMARY_MARK));
    }
    if line.contains(NOTES_MARK) {
        return Line::NotesStart(seed_after(line, NOTES_MARK));
    }
    if line.starts_with("---") {
        return Line::Rule;
    }
    if line.is_empty() {
        return Line::Blank;
    }
    Line::Content(line)
}

/// Text after the first `：` or `:` following `marker`.
fn seed_after<'a>(line: &'a str, marker: &str) -> &'a str {
    let Some(at) = line.find(marker) else {
        return "";
    };
    let rest = &line[at + marker.len()..];
    match rest.find(['：', ':']) {
        Some(colon) => {
            let after = &rest[colon..];
            let width = after.chars().next().map(char::len_utf8).unwrap_or(0);
            after[width..].trim()
        }
        None => "",
    }
}

fn first_backtick_token(line: &str) -> Option<&str> {
    BACKTICK_RE.captures(line).and_then(|c| c.get(1)).map(|m| m.as_str())
}

/// A record under construction plus its field buffers.
struct Pending {
    record: Record,
    summary: Vec<String>,
    notes: Vec<String>,
}

impl Pending {
    fn open(category: &str, title: &str) -> Self {
        let title = if title == UNTITLED_MARK { "" } else { title };
        Pending {
            record: Record {
                title: title.to_string(),
                ..Record::new(category, "")
            },
            summary: Vec::new(),
            notes: Vec::new(),
        }
    }

    fn finish(self) -> Record {
        Record {
            summary: strip_placeholder(&self.summary.join("\n")),
            notes: strip_placeholder(&self.notes.join("\n")),
            ..self.record
        }
    }
}

/// Parse an intermediate document into records, in document order.
///
/// The grammar is permissive: lines that match no marker are content while a
/// summary/notes field is open and are ignored otherwise.
pub fn parse(doc: &str) -> Vec<Record> {
    let mut records = Vec::new();
    let mut category = String::new();
    let mut current: Option<Pending> = None;
    let mut mode = Mode::Idle;

    for raw in doc.lines() {
        match classify(raw) {
            Line::Section(name) => {
                category = name.to_string();
                mode = Mode::Idle;
            }
            Line::Meeting(title) => {
                if let Some(done) = current.take() {
                    records.push(done.finish());
                }
                current = Some(Pending::open(&category, title));
                mode = Mode::Idle;
            }
            Line::Subcategory(line) => {
                if let (Some(p), Some(token)) = (current.as_mut(), first_backtick_token(line)) {
                    p.record.subcategory = if token == NONE_MARK {
                        String::new()
                    } else {
                        token.to_string()
                    };
                }
            }
            Line::Date(line) => {
                if let (Some(p), Some(token)) = (current.as_mut(), first_backtick_token(line)) {
                    p.record.date = dates::find_cjk_date(token).unwrap_or_default().to_string();
                }
            }
            Line::SummaryStart(seed) => {
                if let Some(p) = current.as_mut() {
                    mode = Mode::Summary;
                    if !seed.is_empty() {
                        p.summary.push(seed.to_string());
                    }
                }
            }
            Line::NotesStart(seed) => {
                if let Some(p) = current.as_mut() {
                    mode = Mode::Notes;
                    if !seed.is_empty() {
                        p.notes.push(seed.to_string());
                    }
                }
            }
            Line::Rule => mode = Mode::Idle,
            Line::Blank => {}
            Line::Content(text) => {
                let Some(p) = current.as_mut() else { continue };
                let buffer = match mode {
                    Mode::Idle => continue,
                    Mode::Summary => &mut p.summary,
                    Mode::Notes => &mut p.notes,
                };
                if text.starts_with("- **") {
                    continue;
                }
                let text = text.strip_prefix("- ").unwrap_or(text);
                buffer.push(text.to_string());
            }
        }
    }

    if let Some(done) = current.take() {
        records.push(done.finish());
    }
    records
}
