//! 👀 The continuous watch pipeline — today's file, tailed live, one line at a time.
//!
//! 🎬 COLD OPEN — INT. LIVING ROOM — 23:59:58, TWO SECONDS TO ROTATION
//!
//! The collector is appending to `events-2025-12-10.ndjson`. This module is
//! reading right behind it. At midnight the collector starts a new file, the
//! old path goes quiet, and the tail has to notice, let go, and latch onto the
//! new day without anyone restarting anything. That handoff is the whole job.
//!
//! 🗺️ The shape: a two-state polling machine.
//!
//! ```text
//!   WaitingForFile ──(newest daily file found)──▶ Tailing
//!        ▲                                           │
//!        └──(path gone, or a newer day appeared)─────┘
//!   (cancellation exits from either state)
//! ```
//!
//! 🔁 The tail opens at the current END of the file — prior content is never
//! re-indexed, so a process restart does not replay the morning. New lines flow
//! through a BOUNDED channel into exactly one consumer that awaits every
//! single-document index call before touching the next line. Ordering and
//! backpressure are load-bearing here, not vibes: a slow cluster pauses the
//! tail instead of flooding the heap with unawaited futures.
//!
//! 💀 Failure taxonomy, same as everywhere else:
//! - bad line → logged, skipped, the tail keeps tailing
//! - store says no to one document → logged, counted as life, the tail keeps tailing
//! - store unreachable → actual `Err`, the whole pipeline unwinds
//!
//! 🦆 (the duck watches the watcher. someone has to.)

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader, SeekFrom};
use tokio::time::{Duration, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::app_config::IngestConfig;
use crate::events::parse_line;
use crate::identity::derive_id;
use crate::naming::{date_embedded_in, index_name};
use crate::registry::RegistryCache;
use crate::store::{DocumentStore, IndexOutcome};
use crate::transform::transform;

/// ✉️ One appended line, stamped with the index it belongs to. The stamp is
/// applied by the tail (which knows which file it came from), so the consumer
/// never has to re-derive it — rotation can't race the delivery.
struct TailedLine {
    index: String,
    line: String,
}

/// 📼 An open tail: the file, the date baked into its name, and a stash for
/// the half-line the collector may be mid-writing at any poll tick.
struct ActiveTail {
    path: PathBuf,
    date: NaiveDate,
    index: String,
    reader: BufReader<File>,
    /// ✂️ Bytes read that haven't seen their newline yet. Only lines that END
    /// in '\n' are complete lines; everything else waits here for the rest.
    pending: String,
}

/// 👀 Run the continuous pipeline until cancelled.
///
/// Resolves only once everything has unwound: the watcher has stopped polling
/// and the consumer has drained the channel. Cancelling while no file is being
/// tailed is perfectly fine — waiting is an interruptible activity.
///
/// 💀 Returns `Err` only for connection-level store failures. One rejected
/// document is a log line; a cluster that stopped answering is a shutdown.
pub async fn start_watch_mode<S: DocumentStore + ?Sized>(
    store: &S,
    registry: &RegistryCache,
    config: &IngestConfig,
    cancel: CancellationToken,
) -> Result<()> {
    info!(
        "👀 Watch mode engaged: polling '{}' every {}ms",
        config.data_dir.display(),
        config.watch_poll_interval_ms
    );

    // ✉️ Bounded on purpose. When the consumer is stuck awaiting a slow
    // cluster, `send` blocks and the tail stops reading. That IS the
    // backpressure design, in its entirety.
    let (tx, rx) = async_channel::bounded::<TailedLine>(config.watch_queue_capacity.max(1));

    // 🔄 Two halves, joined: the watcher (files in, lines out) and the
    // consumer (lines in, index calls out). The watcher returning drops `tx`,
    // which closes the channel, which lets the consumer drain and finish —
    // teardown is just the channel's own lifecycle.
    let watcher = watch_loop(config, cancel, tx);
    let consumer = consume_loop(store, registry, rx);
    tokio::try_join!(watcher, consumer)?;

    info!("👋 Watch mode fully unwound. The tail rests.");
    Ok(())
}

/// 🔄 The polling state machine. Owns `tx`; dropping it on return is the
/// consumer's signal that no more lines are coming.
async fn watch_loop(
    config: &IngestConfig,
    cancel: CancellationToken,
    tx: async_channel::Sender<TailedLine>,
) -> Result<()> {
    let poll = Duration::from_millis(config.watch_poll_interval_ms.max(1));
    let mut tail: Option<ActiveTail> = None;

    loop {
        // ⏸️ Cancellation is checked BETWEEN drains, never mid-line. An
        // in-flight index call downstream finishes on its own terms.
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("🛑 Cancellation received — stopping the watcher");
                break;
            }
            _ = sleep(poll) => {}
        }

        match tail.take() {
            None => {
                // 🔍 WaitingForFile: is there a daily file to latch onto?
                if let Some((path, date)) = newest_daily_file(config).await {
                    match open_tail(config, path, date).await {
                        Ok(active) => tail = Some(active),
                        Err(err) => {
                            // ⚠️ It was there a moment ago. Rotation races are
                            // real; we stay in waiting and look again.
                            warn!("⚠️ Could not open the daily file for tailing: {err:#}");
                        }
                    }
                }
            }
            Some(mut active) => {
                // 🔍 Tailing, step one: is this still the file to be tailing?
                let path_still_there = tokio::fs::try_exists(&active.path).await.unwrap_or(false);
                let newer_day_appeared = matches!(
                    newest_daily_file(config).await,
                    Some((_, newest_date)) if newest_date > active.date
                );
                if !path_still_there || newer_day_appeared {
                    // 🌅 Daily rotation. One last sweep first: lines appended
                    // between the previous tick and midnight are still sitting
                    // in the old file, and 23:59:59 events deserve to exist.
                    if path_still_there && !drain_appended_lines(&mut active, &tx).await? {
                        break;
                    }
                    // Then let go; the next tick finds the new file and tails
                    // it from ITS current end.
                    info!(
                        "🌅 '{}' rotated away — returning to waiting",
                        active.path.display()
                    );
                    continue;
                }

                // 📨 Step two: drain whatever got appended since last tick.
                if !drain_appended_lines(&mut active, &tx).await? {
                    // ✉️ Consumer hung up (its half of try_join is unwinding).
                    break;
                }
                tail = Some(active);
            }
        }
    }

    Ok(())
    // 🚪 `tx` drops here. Channel closes. Consumer finishes its backlog and exits.
}

/// ✉️ The single serialized consumer: one line, one parse, one index call,
/// fully awaited, then the next. Per-document rejections are logged and
/// survived; an unreachable store propagates and takes the pipeline down.
async fn consume_loop<S: DocumentStore + ?Sized>(
    store: &S,
    registry: &RegistryCache,
    rx: async_channel::Receiver<TailedLine>,
) -> Result<()> {
    while let Ok(tailed) = rx.recv().await {
        let event = match parse_line(&tailed.line) {
            Ok(event) => event,
            Err(err) => {
                // 🗑️ A malformed line mid-tail. Logged, skipped, tail continues.
                warn!("🗑️ tailed line skipped — {err:#}");
                continue;
            }
        };
        let id = match derive_id(&event) {
            Ok(id) => id,
            Err(err) => {
                warn!("🗑️ tailed line skipped — {err:#}");
                continue;
            }
        };

        let document = serde_json::to_value(transform(registry, &event)).context(
            "💀 A freshly transformed document refused to serialize. Mid-tail, no less. Bold.",
        )?;

        // 📡 Single-document path: latency over throughput, by contract.
        // At-least-effort, not at-least-once — no retry, no buffer.
        match store.index(&tailed.index, &id, &document).await? {
            IndexOutcome::Indexed => {
                debug!("✅ '{id}' → '{}'", tailed.index);
            }
            IndexOutcome::Rejected { status, reason } => {
                warn!("🚫 '{}' refused '{id}' ({status}): {reason}", tailed.index);
            }
        }
    }
    Ok(())
}

/// 🔍 Scan the data directory for the newest daily file by the date in its
/// NAME, not its mtime — a late backfill touching an old file must not steal
/// the tail from today.
async fn newest_daily_file(config: &IngestConfig) -> Option<(PathBuf, NaiveDate)> {
    let mut entries = match tokio::fs::read_dir(&config.data_dir).await {
        Ok(entries) => entries,
        Err(err) => {
            // 📂 No data dir yet. The collector may simply not have started.
            debug!("📂 '{}' is not readable yet: {err}", config.data_dir.display());
            return None;
        }
    };

    let mut newest: Option<(PathBuf, NaiveDate)> = None;
    while let Ok(Some(entry)) = entries.next_entry().await {
        let file_name = entry.file_name();
        let Some(date) = file_name.to_str().and_then(date_embedded_in) else {
            continue;
        };
        if newest.as_ref().is_none_or(|(_, best)| date > *best) {
            newest = Some((entry.path(), date));
        }
    }
    newest
}

/// 📼 Open a file for tailing: seek straight to the end, because content that
/// existed before we were watching is the batch importer's business.
async fn open_tail(config: &IngestConfig, path: PathBuf, date: NaiveDate) -> Result<ActiveTail> {
    let mut file = File::open(&path)
        .await
        .with_context(|| format!("💀 '{}' appeared and then wouldn't open. Rude.", path.display()))?;
    let position = file
        .seek(SeekFrom::End(0))
        .await
        .with_context(|| format!("💀 Could not seek to the end of '{}'.", path.display()))?;

    let index = index_name(&config.index_prefix, date);
    info!(
        "📼 Tailing '{}' from byte {position} → '{index}'",
        path.display()
    );

    Ok(ActiveTail {
        path,
        date,
        index,
        reader: BufReader::new(file),
        pending: String::new(),
    })
}

/// 📨 Read everything appended since the last tick and ship each COMPLETE
/// line down the channel. Returns `Ok(false)` when the consumer has hung up.
async fn drain_appended_lines(
    active: &mut ActiveTail,
    tx: &async_channel::Sender<TailedLine>,
) -> Result<bool> {
    let mut chunk = String::new();
    loop {
        chunk.clear();
        let bytes_read = active.reader.read_line(&mut chunk).await.with_context(|| {
            format!("💀 Mid-tail read failure on '{}'. The disk blinked.", active.path.display())
        })?;
        if bytes_read == 0 {
            // ⏸️ Caught up to the writer. See you next tick.
            return Ok(true);
        }

        active.pending.push_str(&chunk);
        if !active.pending.ends_with('\n') {
            // ✂️ The collector is mid-line. We hold what we have and wait for
            // the newline — half a JSON object indexes exactly as well as
            // you'd expect, which is why we don't try.
            continue;
        }

        let line = active.pending.trim().to_string();
        active.pending.clear();
        if line.is_empty() {
            continue;
        }

        let delivery = TailedLine {
            index: active.index.clone(),
            line,
        };
        // ✉️ Bounded send: if the consumer is busy, WE wait. Backpressure.
        if tx.send(delivery).await.is_err() {
            return Ok(false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use std::io::Write;
    use std::path::Path;

    // ⏱️ Fast poll for tests, with sleeps generous enough that a wheezing CI
    // runner still makes every deadline with room to spare.
    const POLL_MS: u64 = 20;
    const SETTLE: Duration = Duration::from_millis(250);

    fn watch_config(dir: &tempfile::TempDir) -> IngestConfig {
        IngestConfig {
            data_dir: dir.path().to_path_buf(),
            watch_poll_interval_ms: POLL_MS,
            ..IngestConfig::default()
        }
    }

    fn empty_registry(dir: &tempfile::TempDir) -> RegistryCache {
        RegistryCache::new(dir.path().join("no-registry.json"))
    }

    fn append_line(path: &Path, line: &str) {
        let mut the_file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .expect("open daily file for append");
        writeln!(the_file, "{line}").expect("append line");
    }

    fn append_raw(path: &Path, bytes: &str) {
        let mut the_file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .expect("open daily file for append");
        write!(the_file, "{bytes}").expect("append raw bytes");
    }

    #[tokio::test]
    async fn the_one_where_only_lines_appended_after_observation_are_indexed() {
        let the_dir = tempfile::tempdir().expect("tempdir");
        let the_registry = empty_registry(&the_dir);
        let the_store = InMemoryStore::new();
        let the_config = watch_config(&the_dir);
        let the_cancel = CancellationToken::new();
        let the_path = the_dir.path().join("events-2025-01-01.ndjson");

        // 📼 Morning content, written BEFORE the watcher exists. Must not index.
        append_line(&the_path, r#"{"@type":"room","id":"hz_0","time":"2025-01-01T08:00:00Z"}"#);

        let the_watch = start_watch_mode(&the_store, &the_registry, &the_config, the_cancel.clone());
        let the_script = async {
            sleep(SETTLE).await; // watcher latches on, seeks to end
            append_line(&the_path, r#"{"@type":"room","id":"hz_1","time":"2025-01-01T12:00:00Z"}"#);
            append_line(&the_path, r#"{"@type":"message","id":"m1","time":"2025-01-01T12:00:01Z"}"#);
            sleep(SETTLE).await;
            the_cancel.cancel();
        };

        let (the_result, ()) = tokio::join!(the_watch, the_script);
        the_result.expect("watch unwinds cleanly on cancel");

        let the_docs = the_store.accepted().await;
        assert_eq!(the_docs.len(), 2, "pre-observation content stays unindexed");
        assert!(the_docs.iter().all(|doc| doc.index == "sh-2025-01-01"));
        assert!(the_docs.iter().all(|doc| !doc.via_bulk), "watch mode is the single-doc path");
    }

    #[tokio::test]
    async fn the_one_where_rotation_moves_the_tail_to_the_new_day() {
        let the_dir = tempfile::tempdir().expect("tempdir");
        let the_registry = empty_registry(&the_dir);
        let the_store = InMemoryStore::new();
        let the_config = watch_config(&the_dir);
        let the_cancel = CancellationToken::new();
        let day_one = the_dir.path().join("events-2025-01-01.ndjson");
        let day_two = the_dir.path().join("events-2025-01-02.ndjson");

        append_raw(&day_one, "");

        let the_watch = start_watch_mode(&the_store, &the_registry, &the_config, the_cancel.clone());
        let the_script = async {
            sleep(SETTLE).await;
            append_line(&day_one, r#"{"@type":"room","id":"hz_1","time":"2025-01-01T23:59:59Z"}"#);
            sleep(SETTLE).await;
            // 🌅 Midnight: a new day's file appears. The old one is still on
            // disk — the newer date alone must move the tail over.
            append_raw(&day_two, "");
            sleep(SETTLE).await;
            append_line(&day_two, r#"{"@type":"room","id":"hz_1","time":"2025-01-02T00:00:01Z"}"#);
            sleep(SETTLE).await;
            the_cancel.cancel();
        };

        let (the_result, ()) = tokio::join!(the_watch, the_script);
        the_result.expect("watch unwinds cleanly on cancel");

        let the_docs = the_store.accepted().await;
        assert_eq!(the_docs.len(), 2);
        assert_eq!(the_docs[0].index, "sh-2025-01-01");
        assert_eq!(the_docs[1].index, "sh-2025-01-02", "new day, new index, same process");
    }

    #[tokio::test]
    async fn the_one_where_the_last_lines_of_the_old_day_survive_rotation() {
        let the_dir = tempfile::tempdir().expect("tempdir");
        let the_registry = empty_registry(&the_dir);
        let the_store = InMemoryStore::new();
        let the_config = watch_config(&the_dir);
        let the_cancel = CancellationToken::new();
        let day_one = the_dir.path().join("events-2025-01-01.ndjson");
        let day_two = the_dir.path().join("events-2025-01-02.ndjson");

        append_raw(&day_one, "");

        let the_watch = start_watch_mode(&the_store, &the_registry, &the_config, the_cancel.clone());
        let the_script = async {
            sleep(SETTLE).await;
            // ⏰ 23:59:59 — the straggler line and the new day's file land in
            // the SAME poll gap. The straggler must still be indexed before
            // the tail lets go of the old day.
            append_line(&day_one, r#"{"@type":"room","id":"hz_last","time":"2025-01-01T23:59:59Z"}"#);
            append_raw(&day_two, "");
            sleep(SETTLE).await;
            append_line(&day_two, r#"{"@type":"room","id":"hz_1","time":"2025-01-02T00:00:01Z"}"#);
            sleep(SETTLE).await;
            the_cancel.cancel();
        };

        let (the_result, ()) = tokio::join!(the_watch, the_script);
        the_result.expect("watch unwinds cleanly on cancel");

        let the_docs = the_store.accepted().await;
        assert_eq!(the_docs.len(), 2, "the end-of-day straggler must not be dropped");
        assert_eq!(the_docs[0].id, "room-hz_last-2025-01-01T23:59:59Z");
        assert_eq!(the_docs[0].index, "sh-2025-01-01", "the straggler belongs to the old day");
        assert_eq!(the_docs[1].index, "sh-2025-01-02");
    }

    #[tokio::test]
    async fn the_one_where_removal_then_a_new_day_switches_the_tail() {
        let the_dir = tempfile::tempdir().expect("tempdir");
        let the_registry = empty_registry(&the_dir);
        let the_store = InMemoryStore::new();
        let the_config = watch_config(&the_dir);
        let the_cancel = CancellationToken::new();
        let day_one = the_dir.path().join("events-2025-01-01.ndjson");
        let day_two = the_dir.path().join("events-2025-01-02.ndjson");

        append_raw(&day_one, "");

        let the_watch = start_watch_mode(&the_store, &the_registry, &the_config, the_cancel.clone());
        let the_script = async {
            sleep(SETTLE).await;
            append_line(&day_one, r#"{"@type":"room","id":"hz_1","time":"2025-01-01T20:00:00Z"}"#);
            sleep(SETTLE).await;
            // 🗑️ Rotation deletes the old file outright. The tail must notice
            // the path is gone and return to waiting.
            std::fs::remove_file(&day_one).expect("delete old daily file");
            sleep(SETTLE).await;
            // 📝 The new day's file arrives already holding a line — written
            // atomically (temp + rename) so it exists fully formed before the
            // watcher can observe it. That line predates observation and must
            // stay unindexed.
            let the_staging = the_dir.path().join("events-2025-01-02.ndjson.tmp");
            std::fs::write(
                &the_staging,
                concat!(r#"{"@type":"room","id":"hz_old","time":"2025-01-02T00:00:00Z"}"#, "\n"),
            )
            .expect("stage new daily file");
            std::fs::rename(&the_staging, &day_two).expect("move new daily file into place");
            sleep(SETTLE).await;
            append_line(&day_two, r#"{"@type":"room","id":"hz_new","time":"2025-01-02T00:00:05Z"}"#);
            sleep(SETTLE).await;
            the_cancel.cancel();
        };

        let (the_result, ()) = tokio::join!(the_watch, the_script);
        the_result.expect("watch unwinds cleanly on cancel");

        let the_docs = the_store.accepted().await;
        assert_eq!(the_docs.len(), 2, "pre-observation content in the new file stays out");
        assert_eq!(the_docs[0].index, "sh-2025-01-01");
        assert_eq!(the_docs[1].id, "room-hz_new-2025-01-02T00:00:05Z");
        assert_eq!(the_docs[1].index, "sh-2025-01-02");
    }

    #[tokio::test]
    async fn the_one_where_cancelling_mid_wait_is_perfectly_legal() {
        let the_dir = tempfile::tempdir().expect("tempdir");
        let the_registry = empty_registry(&the_dir);
        let the_store = InMemoryStore::new();
        let the_config = watch_config(&the_dir);
        let the_cancel = CancellationToken::new();

        // 📂 No daily file ever shows up. The watcher waits; we cancel the wait.
        let the_watch = start_watch_mode(&the_store, &the_registry, &the_config, the_cancel.clone());
        let the_script = async {
            sleep(Duration::from_millis(100)).await;
            the_cancel.cancel();
        };

        let (the_result, ()) = tokio::join!(the_watch, the_script);
        the_result.expect("cancelling with no active tail must be clean");
        assert_eq!(the_store.accepted_count().await, 0);
    }

    #[tokio::test]
    async fn the_one_where_a_rejected_document_does_not_stop_the_tail() {
        let the_dir = tempfile::tempdir().expect("tempdir");
        let the_registry = empty_registry(&the_dir);
        let the_store = InMemoryStore::new();
        the_store.reject_id("room-hz_1-2025-01-01T12:00:00Z").await;
        let the_config = watch_config(&the_dir);
        let the_cancel = CancellationToken::new();
        let the_path = the_dir.path().join("events-2025-01-01.ndjson");
        append_raw(&the_path, "");

        let the_watch = start_watch_mode(&the_store, &the_registry, &the_config, the_cancel.clone());
        let the_script = async {
            sleep(SETTLE).await;
            append_line(&the_path, r#"{"@type":"room","id":"hz_1","time":"2025-01-01T12:00:00Z"}"#);
            append_line(&the_path, r#"{"@type":"room","id":"hz_1","time":"2025-01-01T12:00:01Z"}"#);
            sleep(SETTLE).await;
            the_cancel.cancel();
        };

        let (the_result, ()) = tokio::join!(the_watch, the_script);
        the_result.expect("a per-document refusal is not a pipeline failure");
        assert_eq!(the_store.accepted_count().await, 1, "the second line still lands");
    }

    #[tokio::test]
    async fn the_one_where_a_half_written_line_waits_for_its_newline() {
        let the_dir = tempfile::tempdir().expect("tempdir");
        let the_registry = empty_registry(&the_dir);
        let the_store = InMemoryStore::new();
        let the_config = watch_config(&the_dir);
        let the_cancel = CancellationToken::new();
        let the_path = the_dir.path().join("events-2025-01-01.ndjson");
        append_raw(&the_path, "");

        let the_watch = start_watch_mode(&the_store, &the_registry, &the_config, the_cancel.clone());
        let the_script = async {
            sleep(SETTLE).await;
            // ✂️ The collector gets interrupted mid-write...
            append_raw(&the_path, r#"{"@type":"room","id":"hz_1","ti"#);
            sleep(SETTLE).await;
            // ...and finishes the line a beat later.
            append_raw(&the_path, "me\":\"2025-01-01T12:00:00Z\"}\n");
            sleep(SETTLE).await;
            the_cancel.cancel();
        };

        let (the_result, ()) = tokio::join!(the_watch, the_script);
        the_result.expect("watch unwinds cleanly");

        let the_docs = the_store.accepted().await;
        assert_eq!(the_docs.len(), 1, "one complete line, one document — no torn JSON");
        assert_eq!(the_docs[0].id, "room-hz_1-2025-01-01T12:00:00Z");
    }

    #[tokio::test]
    async fn the_one_where_a_dead_cluster_stops_the_watch_with_an_err() {
        // 🔌 A rejected document is survivable; a cluster that stopped
        // answering is not. The pipeline must unwind with an Err on its own,
        // no cancellation required.
        let the_dir = tempfile::tempdir().expect("tempdir");
        let the_registry = empty_registry(&the_dir);
        let the_store = InMemoryStore::new();
        the_store.sever_connection().await;
        let the_config = watch_config(&the_dir);
        let the_cancel = CancellationToken::new();
        let the_path = the_dir.path().join("events-2025-01-01.ndjson");
        append_raw(&the_path, "");

        let the_watch = start_watch_mode(&the_store, &the_registry, &the_config, the_cancel.clone());
        let the_script = async {
            sleep(SETTLE).await;
            append_line(&the_path, r#"{"@type":"room","id":"hz_1","time":"2025-01-01T12:00:00Z"}"#);
            sleep(SETTLE).await;
            // 🛟 Belt and suspenders: if the Err path ever regresses, this
            // cancel keeps the test from hanging instead of failing.
            the_cancel.cancel();
        };

        let (the_result, ()) = tokio::join!(the_watch, the_script);
        assert!(the_result.is_err(), "a connection-level failure must propagate out");
        assert_eq!(the_store.accepted_count().await, 0);
    }

    #[tokio::test]
    async fn the_one_where_a_bad_tailed_line_is_skipped_not_fatal() {
        let the_dir = tempfile::tempdir().expect("tempdir");
        let the_registry = empty_registry(&the_dir);
        let the_store = InMemoryStore::new();
        let the_config = watch_config(&the_dir);
        let the_cancel = CancellationToken::new();
        let the_path = the_dir.path().join("events-2025-01-01.ndjson");
        append_raw(&the_path, "");

        let the_watch = start_watch_mode(&the_store, &the_registry, &the_config, the_cancel.clone());
        let the_script = async {
            sleep(SETTLE).await;
            append_line(&the_path, "not json at all");
            append_line(&the_path, r#"{"@type":"message","id":"m1","time":"2025-01-01T12:00:00Z"}"#);
            sleep(SETTLE).await;
            the_cancel.cancel();
        };

        let (the_result, ()) = tokio::join!(the_watch, the_script);
        the_result.expect("a garbage line must not end the watch");
        assert_eq!(the_store.accepted_count().await, 1);
    }
}
