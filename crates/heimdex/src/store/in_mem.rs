//! # Previously, on Heimdex...
//!
//! 🎬 The tests needed a cluster. Standing up Elasticsearch for every unit
//! test is the kind of decision that turns a 4-second test suite into a
//! lifestyle. Someone had to write a store so simple it lives entirely in
//! RAM, gone the moment you blink.
//!
//! That someone was this module.
//!
//! [`InMemoryStore`] implements [`DocumentStore`] by hoarding every call in an
//! `Arc<Mutex<...>>` so tests can inspect exactly what arrived, in what order,
//! through which path (single vs bulk). It can also be told to reject specific
//! document ids — great for exercising partial-failure accounting, great for
//! trust issues, great for both — or to sever the connection entirely, for the
//! days when the whole cluster needs to call in sick.
//!
//! ⚠️ This is NOT for production. This is for tests. If you deploy this to
//! prod, your dashboard will be very fast and very empty. 🦆

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Result, bail};
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::store::{BulkDoc, BulkReport, DocumentStore, IndexOutcome, MAX_REPORTED_ERRORS};

/// 📦 One document the store accepted, with enough provenance for assertions.
#[derive(Debug, Clone)]
pub struct StoredDoc {
    /// 🏷️ The daily index it was aimed at.
    pub index: String,
    /// 🪪 The deterministic id it arrived under.
    pub id: String,
    pub document: Value,
    /// 🚰 `true` if it came through `bulk`, `false` for the single-doc path.
    pub via_bulk: bool,
}

/// 📦 The evidence locker of document stores.
///
/// Clone-able because tests need to peek inside after handing a reference off
/// to the pipeline — the `Arc` means every clone shares the same Vec.
/// Idempotence is honored: a document arriving under an existing id replaces
/// the earlier entry, exactly like an upsert-by-id would.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    /// 🔒 Everything successfully "indexed", in arrival order.
    accepted: Arc<Mutex<Vec<StoredDoc>>>,
    /// 🚫 Ids scripted to bounce with a 400 — the partial-failure lever.
    rejected_ids: Arc<Mutex<HashSet<String>>>,
    /// 📊 The size of every bulk call received, for "one bulk per file" claims.
    bulk_calls: Arc<Mutex<Vec<usize>>>,
    /// 🔌 When set, every call answers like the cluster is unplugged — a hard
    /// `Err`, not a per-document rejection. The other kind of bad day.
    connection_down: Arc<Mutex<bool>>,
}

impl InMemoryStore {
    /// 🚀 A fresh, empty store. The most peaceful constructor in the codebase.
    pub fn new() -> Self {
        Self::default()
    }

    /// 🚫 Script a rejection: any document arriving under `id` bounces with a
    /// 400 instead of being stored.
    pub async fn reject_id(&self, id: &str) {
        self.rejected_ids.lock().await.insert(id.to_string());
    }

    /// 🔌 Script a connection-level failure: from now on, `index` and `bulk`
    /// both return `Err`, as if somebody tripped over the cluster's power cord.
    pub async fn sever_connection(&self) {
        *self.connection_down.lock().await = true;
    }

    /// 🔍 A snapshot of everything accepted so far.
    pub async fn accepted(&self) -> Vec<StoredDoc> {
        self.accepted.lock().await.clone()
    }

    /// 📊 The doc counts of every bulk call, in call order.
    pub async fn bulk_call_sizes(&self) -> Vec<usize> {
        self.bulk_calls.lock().await.clone()
    }

    /// 🧮 Total calls of any flavor that stored or bounced a document.
    pub async fn accepted_count(&self) -> usize {
        self.accepted.lock().await.len()
    }

    /// 📥 Upsert semantics, honored for real: same id replaces, new id appends.
    async fn upsert(&self, doc: StoredDoc) {
        let mut accepted = self.accepted.lock().await;
        if let Some(existing) = accepted.iter_mut().find(|d| d.id == doc.id && d.index == doc.index) {
            *existing = doc;
        } else {
            accepted.push(doc);
        }
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn index(&self, index: &str, id: &str, document: &Value) -> Result<IndexOutcome> {
        if *self.connection_down.lock().await {
            bail!("💀 connection refused (scripted): nobody is home at the cluster");
        }
        if self.rejected_ids.lock().await.contains(id) {
            // 🚫 As scripted. The test asked for this. The test gets this.
            return Ok(IndexOutcome::Rejected {
                status: 400,
                reason: format!("scripted rejection of '{id}'"),
            });
        }
        self.upsert(StoredDoc {
            index: index.to_string(),
            id: id.to_string(),
            document: document.clone(),
            via_bulk: false,
        })
        .await;
        Ok(IndexOutcome::Indexed)
    }

    async fn bulk(&self, index: &str, docs: &[BulkDoc]) -> Result<BulkReport> {
        if *self.connection_down.lock().await {
            bail!("💀 connection refused (scripted): nobody is home at the cluster");
        }
        self.bulk_calls.lock().await.push(docs.len());

        let mut report = BulkReport::default();
        let rejected = self.rejected_ids.lock().await.clone();
        for doc in docs {
            if rejected.contains(&doc.id) {
                report.failed += 1;
                if report.first_errors.len() < MAX_REPORTED_ERRORS {
                    report
                        .first_errors
                        .push(format!("scripted rejection of '{}'", doc.id));
                }
                continue;
            }
            self.upsert(StoredDoc {
                index: index.to_string(),
                id: doc.id.clone(),
                document: doc.document.clone(),
                via_bulk: true,
            })
            .await;
            report.indexed += 1;
        }
        Ok(report)
    }
}
