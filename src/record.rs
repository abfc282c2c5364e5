use serde::Serialize;

/// Placeholder written for an absent subcategory, summary or notes field.
pub const NONE_MARK: &str = "（無）";
/// Placeholder written for a record whose title could not be parsed.
pub const UNTITLED_MARK: &str = "（無標題）";
/// Placeholder written for a record whose date could not be resolved.
pub const UNKNOWN_DATE_MARK: &str = "（未知）";

/// One meeting entry. Empty strings mean "absent" for every field except
/// `category`, which a record must carry to reach a sink.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Record {
    pub category: String,
    pub subcategory: String,
    pub title: String,
    pub date: String,
    pub summary: String,
    pub notes: String,
}

impl Record {
    pub fn new(category: &str, subcategory: &str) -> Self {
        Record {
            category: category.to_string(),
            subcategory: subcategory.to_string(),
            ..Default::default()
        }
    }
}

/// Collapse the `（無）` placeholder (and blank text) to an empty string.
pub fn strip_placeholder(text: &str) -> String {
    let t = text.trim();
    if t == NONE_MARK {
        String::new()
    } else {
        t.to_string()
    }
}
