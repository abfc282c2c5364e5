pub mod intermediate;
pub mod page;

use chrono::NaiveDate;

use crate::record::Record;
use page::Pairing;

/// Page text → records: full extraction, listing date override, and the
/// single-record fallback when no `title @ date` matched.
pub fn process_page(
    text: &str,
    category: &str,
    subcategory: &str,
    today: NaiveDate,
    pairing: Pairing,
) -> Vec<Record> {
    let mut records = page::extract_records(text, category, subcategory, today, pairing);
    if records.is_empty() {
        return page::extract_single(text, category, subcategory, today)
            .into_iter()
            .collect();
    }
    let listing = page::list_meetings(text);
    page::override_dates(&mut records, &listing, today);
    records
}
