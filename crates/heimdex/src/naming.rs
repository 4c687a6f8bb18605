//! 🏷️ Index naming — one prefix, one date, one daily partition. No surprises.
//!
//! Both delivery modes funnel through this module, and that is the entire
//! point: a batch re-import of `events-2025-12-10.ndjson` and a live tail of
//! the same file MUST land documents in the same `{prefix}-2025-12-10` index,
//! or Kibana shows you two half-days and you spend an evening you'll never get
//! back discovering why. Ask me how I know. Actually don't.
//!
//! 🦆 The duck approves of pure functions. The duck distrusts everything else.

use std::path::Path;

use chrono::{Local, NaiveDate};
use tracing::warn;

/// 📂 Daily files look like `events-2025-12-10.ndjson`. These two halves are
/// the recognized pattern; everything between them had better be a date.
const FILE_STEM_PREFIX: &str = "events-";
const FILE_SUFFIX: &str = ".ndjson";

/// 🏷️ `{prefix}-{YYYY-MM-DD}` — the daily partition a document lands in.
pub fn index_name(prefix: &str, date: NaiveDate) -> String {
    format!("{prefix}-{}", date.format("%Y-%m-%d"))
}

/// 📂 The daily file name for a given date. The mirror image of
/// [`date_embedded_in`], used by the watcher to know what it's looking for.
pub fn daily_file_name(date: NaiveDate) -> String {
    format!("{FILE_STEM_PREFIX}{}{FILE_SUFFIX}", date.format("%Y-%m-%d"))
}

/// 📅 Today, in the machine's local timezone. The collector writes local days,
/// so the watcher reads local days. UTC purists may file their complaints with
/// the thermostat.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// 🔍 Extract the embedded date from a daily file name, if it matches the
/// recognized pattern. Pure, no logging — the opinionated wrapper is
/// [`date_from_filename`].
pub fn date_embedded_in(file_name: &str) -> Option<NaiveDate> {
    let middle = file_name
        .strip_prefix(FILE_STEM_PREFIX)?
        .strip_suffix(FILE_SUFFIX)?;
    NaiveDate::parse_from_str(middle, "%Y-%m-%d").ok()
}

/// 📅 The date a file's documents belong to, per its name.
///
/// Falls back to today when the name doesn't match the pattern — logged as
/// unexpected, not fatal. Someone importing `backup-final-FINAL2.ndjson` gets
/// their data indexed under today's partition and a warning to read.
pub fn date_from_filename(path: &Path) -> NaiveDate {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default();

    match date_embedded_in(file_name) {
        Some(date) => date,
        None => {
            // ⚠️ Off-pattern name. We shrug, stamp it with today, and move on.
            let fallback = today();
            warn!(
                "🤨 '{}' does not look like a daily event file — falling back to today's date {fallback}",
                path.display()
            );
            fallback
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn the_one_where_prefix_and_date_become_a_daily_index() {
        let the_date = NaiveDate::from_ymd_opt(2025, 12, 10).expect("valid date");
        assert_eq!(index_name("sh", the_date), "sh-2025-12-10");
    }

    #[test]
    fn the_one_where_the_filename_date_wins() {
        let the_path = PathBuf::from("/var/lib/heimdex/data/events-2025-12-10.ndjson");
        assert_eq!(
            date_from_filename(&the_path),
            NaiveDate::from_ymd_opt(2025, 12, 10).expect("valid date")
        );
    }

    #[test]
    fn the_one_where_batch_and_watch_agree_on_the_index_target() {
        // 🎯 The property that keeps Kibana honest: filename-derived and
        // date-derived targets must be the same string.
        let the_date = NaiveDate::from_ymd_opt(2025, 12, 10).expect("valid date");
        let the_batch_target = index_name("sh", date_from_filename(Path::new("events-2025-12-10.ndjson")));
        let the_watch_target = index_name("sh", the_date);
        assert_eq!(the_batch_target, the_watch_target);
    }

    #[test]
    fn the_one_where_an_off_pattern_name_falls_back_to_today() {
        let the_path = PathBuf::from("backup-final-FINAL2.ndjson");
        assert_eq!(date_from_filename(&the_path), today());
    }

    #[test]
    fn the_one_where_almost_matching_names_do_not_fool_the_parser() {
        assert!(date_embedded_in("events-2025-13-40.ndjson").is_none(), "not a real date");
        assert!(date_embedded_in("events-2025-12-10.ndjson.bak").is_none(), "wrong suffix");
        assert!(date_embedded_in("everything-2025-12-10.ndjson").is_none(), "wrong prefix");
    }

    #[test]
    fn the_one_where_file_name_round_trips_through_its_date() {
        let the_date = NaiveDate::from_ymd_opt(2025, 1, 2).expect("valid date");
        assert_eq!(date_embedded_in(&daily_file_name(the_date)), Some(the_date));
    }
}
