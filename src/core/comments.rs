//! Parsing of structured action comments
//!
//! Comments may carry several messages in one string, one `KEY : value` pair
//! per line, e.g. `"STAFF : waived per policy \n PATRON : sorry for the delay"`.
//! Everything that reads or writes that encoding goes through this module.

use std::collections::HashMap;

/// Separates one `KEY : value` pair from the next
pub const ENTRY_DELIMITER: char = '\n';

/// Separates a key from its value
pub const KEY_VALUE_DELIMITER: char = ':';

/// Key of the message meant for staff
pub const STAFF: &str = "STAFF";

/// Key of the message shown to the patron
pub const PATRON: &str = "PATRON";

/// Split comments into key/value pairs
///
/// Keys and values are trimmed. Lines without a `:` are ignored, and when a
/// key appears more than once the last value wins.
pub fn parse(comments: &str) -> HashMap<String, String> {
    let mut pairs = HashMap::new();

    for entry in comments.split(ENTRY_DELIMITER) {
        if let Some((key, value)) = entry.split_once(KEY_VALUE_DELIMITER) {
            let key = key.trim();
            if !key.is_empty() {
                pairs.insert(key.to_string(), value.trim().to_string());
            }
        }
    }

    pairs
}

/// The patron-facing message, if any
pub fn patron_message(comments: &str) -> Option<String> {
    parse(comments).remove(PATRON)
}

/// The staff-facing message, if any
pub fn staff_message(comments: &str) -> Option<String> {
    parse(comments).remove(STAFF)
}

/// Build a comments string from staff and patron messages
pub fn format(staff: Option<&str>, patron: Option<&str>) -> Option<String> {
    let parts: Vec<String> = [(STAFF, staff), (PATRON, patron)]
        .into_iter()
        .filter_map(|(key, message)| message.map(|m| format!("{} {} {}", key, KEY_VALUE_DELIMITER, m)))
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" \n "))
    }
}
