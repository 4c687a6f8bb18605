//! 🔌 The document store seam — where the pipeline stops caring *which* store.
//!
//! 🚰 Everything upstream of this trait is pure-ish and testable. Everything
//! downstream is HTTP and hope. The [`DocumentStore`] trait is the membrane:
//! two operations, injected by the caller, implemented by a real Elasticsearch
//! client in production and by an in-memory recorder in tests.
//!
//! The error taxonomy lives in the signatures, on purpose:
//! - A **per-document** problem (mapping conflict, version clash, a document
//!   the store simply disliked) is a *value* — [`IndexOutcome::Rejected`] or a
//!   failed item inside a [`BulkReport`]. Logged, counted, life goes on.
//! - A **connection-level** problem (nobody home at the cluster URL) is an
//!   `Err`. There is no per-document recovery when the transport itself is
//!   face-down in the parking lot.
//!
//! 🦆 The duck has opinions about leaky abstractions. This one holds water.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

pub(crate) mod elasticsearch;
pub(crate) mod in_mem;

pub use elasticsearch::{ElasticsearchStore, ElasticsearchStoreConfig};
pub use in_mem::InMemoryStore;

/// 📋 How many per-item bulk errors we keep verbatim for the logs.
/// Enough to diagnose, few enough that a systemic failure doesn't turn the
/// log into a crime-scene photo album.
pub const MAX_REPORTED_ERRORS: usize = 3;

/// 🎯 What happened to one single-document index call.
///
/// `Rejected` is the store looking at a specific document and saying no.
/// It is not an error. It is feedback. Painful, specific feedback.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexOutcome {
    /// ✅ The document lives in the index now. Upserted, even.
    Indexed,
    /// 🚫 The store declined this particular document. The pipeline logs it
    /// and keeps moving — one bad mapping must not stall a live tail.
    Rejected { status: u16, reason: String },
}

/// 📦 One document headed for a bulk request: its deterministic id and body.
#[derive(Debug, Clone)]
pub struct BulkDoc {
    pub id: String,
    pub document: Value,
}

/// 📊 Per-item accounting for one bulk request.
///
/// A partial failure is a *normal outcome* here — `failed > 0` with no `Err`
/// in sight. The first few error payloads ride along so the importer can log
/// something more actionable than "some stuff broke".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkReport {
    pub indexed: u64,
    pub failed: u64,
    /// 💀 Up to [`MAX_REPORTED_ERRORS`] verbatim item-error payloads.
    pub first_errors: Vec<String>,
}

/// 🔌 The store contract both delivery modes are written against.
///
/// `index` is the low-latency path (watch mode, one document at a time).
/// `bulk` is the throughput path (batch import, one request per file).
/// Both take the target index and deterministic ids — idempotent upsert
/// semantics are the caller's gift to their future self.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// 📡 Upsert a single document by id. `Err` means the store was
    /// unreachable; a refusal for *this* document is an [`IndexOutcome`].
    async fn index(&self, index: &str, id: &str, document: &Value) -> Result<IndexOutcome>;

    /// 📡 Index many documents in one request, with per-item accounting.
    /// `Err` means the request as a whole never got an answer.
    async fn bulk(&self, index: &str, docs: &[BulkDoc]) -> Result<BulkReport>;
}
