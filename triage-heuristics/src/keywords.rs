//! Keyword matching: case-insensitive whole-word occurrence counts of a
//! category's keywords in the raw markup text.

use regex::Regex;
use tracing::debug;
use triage_types::Category;

/// Score one category's keywords against the raw markup text.
///
/// Each keyword is matched as a whole word (`\b`-bounded, so "icon" does
/// not match inside "iconography"), occurrence counts are summed across the
/// category's keywords, and the total is scaled by 0.2 and capped at 1.0.
/// A category with no keywords scores 0.
pub fn keyword_score(markup: &str, category: &Category) -> f64 {
    let mut total = 0usize;

    for keyword in &category.keywords {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            continue;
        }
        let pattern = format!(r"(?i)\b{}\b", regex::escape(keyword));
        match Regex::new(&pattern) {
            Ok(re) => total += re.find_iter(markup).count(),
            Err(err) => debug!(keyword, %err, "skipping unmatchable keyword"),
        }
    }

    (total as f64 * 0.2).min(1.0)
}
