//! 📡 THE ELASTICSEARCH STORE
//!
//! *Previously, on Heimdex...*
//!
//! 🎬 COLD OPEN — INT. HALLWAY CLOSET — 3:47 AM
//!
//! The Raspberry Pi hums on its shelf between the router and a box of cables
//! nobody will ever untangle. Somewhere in the house, a thermostat reports
//! 21.5°C for the four-hundredth time today. The events must flow. The events
//! must be indexed. The dashboard must glow.
//!
//! 🚀 This module is the HTTP muscle behind [`DocumentStore`]: a reqwest
//! client with actual timeouts, the api-key-beats-basic-auth dance, the
//! `_bulk` endpoint's beloved `application/x-ndjson`, and a response parser
//! that refuses to confuse "three documents bounced" with "the cluster is
//! unreachable." Those are different emergencies with different pagers.
//!
//! ⚠️ NOTE: If you are reading this at 3am during an incident, take a breath.
//! The data is fine. Probably. The leading comma artifact is handled upstream.
//! You are fine. Debatable.
//!
//! 🦆 (mandatory duck, no context provided, none shall be requested)

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, trace};

use crate::store::{BulkDoc, BulkReport, DocumentStore, IndexOutcome, MAX_REPORTED_ERRORS};

/// 📡 ElasticsearchStoreConfig — "It's just Elasticsearch", she said, before
/// the cluster went yellow. Co-located with the store that uses it, because
/// configs should live near the thing they configure. Socks near feet.
///
/// 🔒 Auth is tri-modal: username+password, api_key, or "I hope anonymous
/// works" (on a LAN-only home setup, it genuinely might).
#[derive(Debug, Deserialize, Clone)]
pub struct ElasticsearchStoreConfig {
    /// 📡 The cluster URL. Scheme + host + port. Yes, all of it.
    pub url: String,
    /// 🔒 Username for basic auth. Optional, like flossing.
    #[serde(default)]
    pub username: Option<String>,
    /// 🔒 Password. If this is plaintext in your config file, at least the
    /// config file is on the same shelf as the cluster.
    #[serde(default)]
    pub password: Option<String>,
    /// 🔒 API key auth — preferred over basic auth when both are present.
    /// Hierarchy. This field respects hierarchy.
    #[serde(default)]
    pub api_key: Option<String>,
}

/// 📦 The reqwest-backed [`DocumentStore`].
///
/// Holds one `reqwest::Client`, reused across requests, because spinning up a
/// new client per call is the networking equivalent of buying a new car for
/// every grocery run. Connectivity is verified once at construction so a bad
/// URL fails loudly at startup, not forty thousand documents deep.
#[derive(Debug, Clone)]
pub struct ElasticsearchStore {
    client: reqwest::Client,
    config: ElasticsearchStoreConfig,
}

/// 📋 The `_bulk` response, reduced to the parts we account for.
#[derive(Debug, Deserialize)]
struct BulkResponse {
    #[serde(default)]
    errors: bool,
    #[serde(default)]
    items: Vec<BulkResponseItem>,
}

/// 📋 One bulk item wrapper — the action name keys the detail object.
#[derive(Debug, Deserialize)]
struct BulkResponseItem {
    #[serde(rename = "index")]
    index: Option<BulkItemDetail>,
}

#[derive(Debug, Deserialize)]
struct BulkItemDetail {
    #[serde(default)]
    status: u16,
    #[serde(default)]
    error: Option<Value>,
}

impl ElasticsearchStore {
    /// 🚀 Stand up the store: build the client (10s connect, 30s response —
    /// we will wait, but not forever), then ping the cluster root so a typo'd
    /// URL dies here instead of mid-import.
    pub async fn new(config: ElasticsearchStoreConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            // 💀 "Failed to initialize http client" — a tragedy in one act.
            .context("💀 The HTTP client refused to be born. Probably a missing TLS cert or a cursed system OpenSSL. Either way: tragic.")?;

        // 📡 Connectivity ping — "Hello? Is this thing on?" We only need the
        // transport to answer; even a grumpy status code proves someone's home.
        let store = Self { client, config };
        store
            .authed(store.client.get(store.base_url()))
            .send()
            .await
            .context("💀 Reached out to the cluster root and got ghosted. Check the URL, check the network, check whether the Pi is unplugged again.")?;
        debug!("✅ Elasticsearch answered the door at {}", store.base_url());

        Ok(store)
    }

    /// 🔧 The configured URL with trailing-slash hygiene applied.
    /// One slash of difference. Infinite suffering of difference.
    fn base_url(&self) -> &str {
        self.config.url.trim_end_matches('/')
    }

    /// 🔒 Apply the auth dance: api_key beats basic auth. This is not a
    /// democracy. This is an Elasticsearch cluster and api_key is the premium tier.
    fn authed(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(ref api_key) = self.config.api_key {
            request.header("Authorization", format!("ApiKey {api_key}"))
        } else if let Some(ref username) = self.config.username {
            request.basic_auth(username, self.config.password.as_ref())
        } else {
            request
        }
    }

    /// 📦 Assemble the NDJSON `_bulk` body: action line + source line per doc,
    /// trailing newline included — ES requires it, and three engineers lost
    /// weekends learning that before us.
    fn bulk_body(index: &str, docs: &[BulkDoc]) -> Result<String> {
        // 🔧 Rough pre-allocation: body bytes + ~80 per action line. Vibes-based
        // but the allocator has seen worse.
        let estimated: usize = docs
            .iter()
            .map(|doc| doc.id.len() + 80)
            .sum::<usize>();
        let mut body = String::with_capacity(estimated);

        for doc in docs {
            let action = serde_json::json!({
                "index": { "_index": index, "_id": doc.id }
            });
            body.push_str(&action.to_string());
            body.push('\n');
            body.push_str(
                &serde_json::to_string(&doc.document)
                    .context("💀 A document refused to become JSON on its way out the door. The JSON that was JSON failed to re-JSON. Irony noted.")?,
            );
            body.push('\n');
        }
        Ok(body)
    }
}

#[async_trait]
impl DocumentStore for ElasticsearchStore {
    /// 📡 `PUT {index}/_doc/{id}` — the single-document upsert path.
    ///
    /// 2xx → [`IndexOutcome::Indexed`]. Any other *answer* → `Rejected` with
    /// the status and body, because a store that answered is a store that's
    /// reachable. Only a transport failure becomes `Err`.
    async fn index(&self, index: &str, id: &str, document: &Value) -> Result<IndexOutcome> {
        let url = format!("{}/{}/_doc/{}", self.base_url(), index, id);
        let response = self
            .authed(self.client.put(&url))
            .json(document)
            .send()
            .await
            .with_context(|| {
                format!(
                    "💀 The index call for '{id}' never reached the cluster. The network looked at our packet and said 'not vibing with it.'"
                )
            })?;

        let status = response.status();
        if status.is_success() {
            trace!("🚀 Indexed '{id}' into '{index}' — the document has left the building, Elvis-style");
            Ok(IndexOutcome::Indexed)
        } else {
            // 🚫 The cluster answered and the answer was no. Per-document problem,
            // per-document consequence: a value, not an error.
            let reason = response.text().await.unwrap_or_default();
            Ok(IndexOutcome::Rejected {
                status: status.as_u16(),
                reason,
            })
        }
    }

    /// 📡 `POST /_bulk` with one index action per document, then per-item
    /// accounting from the response. A partial failure is a report, not a bail.
    async fn bulk(&self, index: &str, docs: &[BulkDoc]) -> Result<BulkReport> {
        let bulk_url = format!("{}/_bulk", self.base_url());
        let body = Self::bulk_body(index, docs)?;

        let response = self
            .authed(self.client.post(&bulk_url))
            // ⚠️ application/x-ndjson — not application/json. ES returns a 406
            // or silently misbehaves without this header. The x- prefix means
            // "we made this up but we're committing to it." Classic.
            .header("Content-Type", "application/x-ndjson")
            .body(body)
            .send()
            .await
            .context("💀 The bulk request never made it to Elasticsearch. We launched the payload into the network and the network dropped it like a group project.")?;

        let status = response.status();
        if !status.is_success() {
            // 💀 The *request* failed — not items within it. That's a hard error:
            // no per-document recovery is meaningful here.
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "💀 The bulk request arrived, but Elasticsearch looked at it as a whole and said '{status}'. Response body: '{body}'. We have no one to blame but ourselves, and possibly whoever wrote the mapping."
            );
        }

        let parsed: BulkResponse = response
            .json()
            .await
            .context("💀 The bulk response was not the JSON we were promised. The contract said per-item accounting. The contract lied.")?;

        let mut report = BulkReport::default();
        for item in &parsed.items {
            let Some(ref detail) = item.index else {
                // 🐛 An item that isn't an index action shouldn't exist in our
                // responses — count it failed rather than inventing a success.
                report.failed += 1;
                continue;
            };
            if detail.error.is_none() && detail.status < 300 {
                report.indexed += 1;
            } else {
                report.failed += 1;
                if report.first_errors.len() < MAX_REPORTED_ERRORS {
                    report.first_errors.push(
                        detail
                            .error
                            .as_ref()
                            .map(|error| error.to_string())
                            .unwrap_or_else(|| format!("status {}", detail.status)),
                    );
                }
            }
        }

        debug!(
            "📡 Bulk into '{index}': {} indexed, {} failed (errors flag: {})",
            report.indexed, report.failed, parsed.errors
        );
        Ok(report)
    }
}
