//! 📂 The batch importer — yesterday's files, today's dashboard.
//!
//! 🎬 COLD OPEN — INT. HOME OFFICE — A SUNDAY, ALLEGEDLY A DAY OFF
//!
//! Three weeks of daily event files sit on disk. Kibana sits empty. Between
//! them: this module. It reads each file line by line, enriches every record,
//! derives its deterministic id, and ships the whole file as ONE bulk request.
//! Then it does the next file. Then the next. Strictly in order, strictly one
//! at a time — `await` per file is the entire backpressure strategy, and for a
//! house's worth of events it is exactly enough strategy.
//!
//! 🔁 Re-running the importer over the same files is not just safe, it's the
//! recommended recovery procedure: deterministic ids mean overwrite, not
//! duplicate. Import twice, count once.
//!
//! 💀 Failure taxonomy, enforced here:
//! - bad line → logged, skipped, file continues
//! - bulk item failure → logged (first few with payloads), counted, run continues
//! - unreachable store / unreadable file → actual `Err`, because there is
//!   nothing sensible to continue *with*
//!
//! 🦆 (the duck audits the totals. the totals have always balanced. the duck
//! keeps auditing. that's why they balance.)

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use glob::glob;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use crate::app_config::IngestConfig;
use crate::events::parse_line;
use crate::identity::derive_id;
use crate::naming::{date_from_filename, index_name};
use crate::progress::{ImportSummary, file_progress_bar};
use crate::registry::RegistryCache;
use crate::store::{BulkDoc, DocumentStore};
use crate::transform::transform;

/// 📋 What one file's import amounted to.
///
/// `indexed` is the per-document success count; `failed` are documents the
/// store's bulk response bounced; `skipped` are lines that never became
/// documents (parse failures, records without a timestamp).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileReport {
    pub indexed: u64,
    pub failed: u64,
    pub skipped: u64,
}

/// 📋 The grand totals of a multi-file run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportTotals {
    pub files: u64,
    pub indexed: u64,
    pub failed: u64,
    pub skipped: u64,
}

/// 📂 Import one daily file: stream lines, enrich, derive ids, ship one bulk
/// request, account for every document.
///
/// The index target comes from the *filename* — `events-2025-12-10.ndjson`
/// lands in `{prefix}-2025-12-10` no matter when you run the import. A
/// zero-valid-line file returns a zero report without touching the store:
/// no documents, no request, no ceremony.
pub async fn import_file<S: DocumentStore + ?Sized>(
    store: &S,
    registry: &RegistryCache,
    path: &Path,
    index_prefix: &str,
) -> Result<FileReport> {
    let index = index_name(index_prefix, date_from_filename(path));

    let file = File::open(path).await.with_context(|| {
        format!(
            "💀 The door to '{}' would not budge. We knocked. We checked if it existed (it might not). We checked permissions (they might be wrong). The file remains unopened. We remain outside.",
            path.display()
        )
    })?;

    let mut reader = BufReader::new(file);
    let mut line = String::new();
    let mut line_number = 0u64;
    let mut skipped = 0u64;
    let mut docs: Vec<BulkDoc> = Vec::new();

    // 🔄 THE LOOP. One line, one verdict: document or skip. Never a crash.
    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await.with_context(|| {
            format!("💀 Mid-file read failure in '{}'. The disk blinked.", path.display())
        })?;
        if bytes_read == 0 {
            // ✅ EOF. The file has been consumed. Like a bag of chips at midnight.
            break;
        }
        line_number += 1;

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let event = match parse_line(trimmed) {
            Ok(event) => event,
            Err(err) => {
                // 🗑️ One bad line. Logged with a preview, skipped, forgotten.
                warn!(
                    "🗑️ {}:{line_number} skipped — {err:#}",
                    path.display()
                );
                skipped += 1;
                continue;
            }
        };

        let id = match derive_id(&event) {
            Ok(id) => id,
            Err(err) => {
                // ⏱️ No timestamp, no identity — a parse/skip case by contract.
                warn!("🗑️ {}:{line_number} skipped — {err:#}", path.display());
                skipped += 1;
                continue;
            }
        };

        let document = serde_json::to_value(transform(registry, &event))
            .context("💀 A freshly transformed document refused to serialize. This should be impossible, which is exactly what makes it interesting.")?;
        docs.push(BulkDoc { id, document });
    }

    if docs.is_empty() {
        // 🤷 Nothing valid in the whole file. No store call — the contract says so.
        debug!("🤷 '{}' contained no indexable lines ({} skipped)", path.display(), skipped);
        return Ok(FileReport { indexed: 0, failed: 0, skipped });
    }

    let doc_count = docs.len();
    let report = store.bulk(&index, &docs).await.with_context(|| {
        format!(
            "💀 The bulk submission for '{}' stumbled at the finish line. The NDJSON was built with care, the request was formed with love, and the transport still said no.",
            path.display()
        )
    })?;

    // 💀 Partial failure is a normal outcome — reported, never thrown.
    for error in &report.first_errors {
        warn!("💀 bulk item error from '{index}': {error}");
    }
    if report.failed > 0 {
        warn!(
            "⚠️ '{}' → '{index}': {} of {doc_count} documents failed to index",
            path.display(),
            report.failed
        );
    } else {
        debug!("✅ '{}' → '{index}': all {doc_count} documents indexed", path.display());
    }

    Ok(FileReport {
        indexed: report.indexed,
        failed: report.failed,
        skipped,
    })
}

/// 📂 Import every matching daily file, strictly in sorted (chronological)
/// filename order, one bulk call at a time.
///
/// `pattern` defaults to all daily event files in the configured data
/// directory. An empty match set is an info-level no-op, not an error —
/// "nothing to do" is a perfectly good day.
pub async fn import_files<S: DocumentStore + ?Sized>(
    store: &S,
    registry: &RegistryCache,
    config: &IngestConfig,
    pattern: Option<&str>,
) -> Result<ImportTotals> {
    let effective_pattern = match pattern {
        Some(p) => p.to_string(),
        None => config
            .data_dir
            .join("events-*.ndjson")
            .to_string_lossy()
            .into_owned(),
    };

    let mut paths: Vec<PathBuf> = glob(&effective_pattern)
        .with_context(|| format!("💀 '{effective_pattern}' is not a glob pattern anyone can love."))?
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(err) => {
                warn!("⚠️ glob stumbled over an entry: {err}");
                None
            }
        })
        .collect();
    // 📅 Sorted filenames ARE chronological order — the date is in the name.
    paths.sort();

    if paths.is_empty() {
        info!("🤷 No files matched '{effective_pattern}'. Nothing to import, nowhere to be.");
        return Ok(ImportTotals::default());
    }

    info!("📂 Importing {} file(s) matching '{effective_pattern}'", paths.len());
    let bar = file_progress_bar(paths.len() as u64);
    let mut summary = ImportSummary::default();
    let mut totals = ImportTotals::default();

    for path in &paths {
        let display_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        bar.set_message(display_name.clone());

        // 🔄 Strictly sequential: file N+1 does not start until file N's bulk
        // call has returned. Simplicity IS the backpressure.
        let report = import_file(store, registry, path, &config.index_prefix).await?;

        summary.record(&display_name, report.indexed, report.failed, report.skipped);
        totals.files += 1;
        totals.indexed += report.indexed;
        totals.failed += report.failed;
        totals.skipped += report.skipped;
        bar.inc(1);
    }

    bar.finish_and_clear();
    info!(
        "📊 Batch import done: {} files, {} indexed, {} failed, {} skipped\n{}",
        totals.files,
        totals.indexed,
        totals.failed,
        totals.skipped,
        summary.render()
    );

    Ok(totals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use std::path::PathBuf;

    fn empty_registry(dir: &tempfile::TempDir) -> RegistryCache {
        RegistryCache::new(dir.path().join("no-registry.json"))
    }

    fn write_file(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
        let the_path = dir.path().join(name);
        std::fs::write(&the_path, contents).expect("write event file fixture");
        the_path
    }

    const THREE_GOOD_ONE_BAD: &str = concat!(
        r#"{"@type":"room","id":"hz_1","time":"2025-01-01T00:00:01Z"}"#, "\n",
        "not json\n",
        r#"{"@type":"room","id":"hz_1","time":"2025-01-01T00:00:02Z"}"#, "\n",
        r#"{"@type":"message","id":"m1","time":"2025-01-01T00:00:03Z"}"#, "\n",
    );

    #[tokio::test]
    async fn the_one_where_an_empty_file_means_zero_and_zero_store_calls() {
        let the_dir = tempfile::tempdir().expect("tempdir");
        let the_registry = empty_registry(&the_dir);
        let the_store = InMemoryStore::new();
        let the_path = write_file(&the_dir, "events-2025-01-01.ndjson", "");

        let the_report = import_file(&the_store, &the_registry, &the_path, "sh")
            .await
            .expect("empty file is fine");

        assert_eq!(the_report, FileReport::default());
        assert!(the_store.bulk_call_sizes().await.is_empty(), "no docs, no request");
    }

    #[tokio::test]
    async fn the_one_where_one_bad_line_does_not_spoil_the_file() {
        let the_dir = tempfile::tempdir().expect("tempdir");
        let the_registry = empty_registry(&the_dir);
        let the_store = InMemoryStore::new();
        let the_path = write_file(&the_dir, "events-2025-01-01.ndjson", THREE_GOOD_ONE_BAD);

        let the_report = import_file(&the_store, &the_registry, &the_path, "sh")
            .await
            .expect("import succeeds around the bad line");

        assert_eq!(the_report.indexed, 3);
        assert_eq!(the_report.skipped, 1);
        assert_eq!(the_store.bulk_call_sizes().await, vec![3], "one bulk call per file");
        // 🏷️ Everything from this file belongs in the filename-derived index.
        assert!(
            the_store
                .accepted()
                .await
                .iter()
                .all(|doc| doc.index == "sh-2025-01-01")
        );
    }

    #[tokio::test]
    async fn the_one_where_reimporting_overwrites_instead_of_duplicating() {
        let the_dir = tempfile::tempdir().expect("tempdir");
        let the_registry = empty_registry(&the_dir);
        let the_store = InMemoryStore::new();
        let the_path = write_file(&the_dir, "events-2025-01-01.ndjson", THREE_GOOD_ONE_BAD);

        import_file(&the_store, &the_registry, &the_path, "sh").await.expect("first run");
        import_file(&the_store, &the_registry, &the_path, "sh").await.expect("second run");

        // 🪪 Same file, same ids, same three documents. Zero clones.
        assert_eq!(the_store.accepted_count().await, 3);
    }

    #[tokio::test]
    async fn the_one_where_partial_failures_are_subtracted_not_thrown() {
        let the_dir = tempfile::tempdir().expect("tempdir");
        let the_registry = empty_registry(&the_dir);
        let the_store = InMemoryStore::new();
        the_store.reject_id("room-hz_1-2025-01-01T00:00:02Z").await;
        let the_path = write_file(&the_dir, "events-2025-01-01.ndjson", THREE_GOOD_ONE_BAD);

        let the_report = import_file(&the_store, &the_registry, &the_path, "sh")
            .await
            .expect("partial failure is a report, not an Err");

        assert_eq!(the_report.indexed, 2, "n - k documents indexed");
        assert_eq!(the_report.failed, 1);
    }

    #[tokio::test]
    async fn the_one_where_an_unreachable_store_is_a_hard_error() {
        // 🔌 Per-document failures get counted; a dead transport gets thrown.
        // Different emergencies, different pagers.
        let the_dir = tempfile::tempdir().expect("tempdir");
        let the_registry = empty_registry(&the_dir);
        let the_store = InMemoryStore::new();
        the_store.sever_connection().await;
        let the_path = write_file(&the_dir, "events-2025-01-01.ndjson", THREE_GOOD_ONE_BAD);

        let the_result = import_file(&the_store, &the_registry, &the_path, "sh").await;
        assert!(the_result.is_err(), "no cluster, no report — only an Err");
    }

    #[tokio::test]
    async fn the_one_where_a_record_without_time_is_skipped_at_the_door() {
        let the_dir = tempfile::tempdir().expect("tempdir");
        let the_registry = empty_registry(&the_dir);
        let the_store = InMemoryStore::new();
        let the_path = write_file(
            &the_dir,
            "events-2025-01-01.ndjson",
            concat!(
                r#"{"@type":"message","id":"timeless"}"#, "\n",
                r#"{"@type":"message","id":"m1","time":"2025-01-01T00:00:00Z"}"#, "\n",
            ),
        );

        let the_report = import_file(&the_store, &the_registry, &the_path, "sh")
            .await
            .expect("import succeeds");
        assert_eq!(the_report.indexed, 1);
        assert_eq!(the_report.skipped, 1);
    }

    #[tokio::test]
    async fn the_one_where_files_import_in_chronological_order() {
        let the_dir = tempfile::tempdir().expect("tempdir");
        let the_registry = empty_registry(&the_dir);
        let the_store = InMemoryStore::new();
        // 📅 Written out of order on purpose; sorted names must win.
        write_file(
            &the_dir,
            "events-2025-01-02.ndjson",
            concat!(r#"{"@type":"room","id":"hz_2","time":"2025-01-02T00:00:00Z"}"#, "\n"),
        );
        write_file(
            &the_dir,
            "events-2025-01-01.ndjson",
            concat!(r#"{"@type":"room","id":"hz_1","time":"2025-01-01T00:00:00Z"}"#, "\n"),
        );
        // 🎭 A decoy that must not match the default pattern.
        write_file(&the_dir, "registry.json", "{}");

        let the_config = IngestConfig {
            data_dir: the_dir.path().to_path_buf(),
            ..IngestConfig::default()
        };
        let the_totals = import_files(&the_store, &the_registry, &the_config, None)
            .await
            .expect("multi-file import succeeds");

        assert_eq!(the_totals.files, 2);
        assert_eq!(the_totals.indexed, 2);
        let the_docs = the_store.accepted().await;
        assert_eq!(the_docs[0].index, "sh-2025-01-01", "day one lands first");
        assert_eq!(the_docs[1].index, "sh-2025-01-02");
    }

    #[tokio::test]
    async fn the_one_where_an_empty_match_set_is_a_shrug_not_an_error() {
        let the_dir = tempfile::tempdir().expect("tempdir");
        let the_registry = empty_registry(&the_dir);
        let the_store = InMemoryStore::new();

        let the_config = IngestConfig {
            data_dir: the_dir.path().to_path_buf(),
            ..IngestConfig::default()
        };
        let the_totals = import_files(&the_store, &the_registry, &the_config, None)
            .await
            .expect("no files is a no-op");
        assert_eq!(the_totals, ImportTotals::default());
        assert!(the_store.bulk_call_sizes().await.is_empty());
    }
}
