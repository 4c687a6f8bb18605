//! 🔧 App Configuration — the sacred TOML-to-struct pipeline.
//!
//! 📡 "Config not found: We looked everywhere. Under the couch. Behind the
//! fridge. In the junk drawer. Nothing." — every developer at 3am 🦆
//!
//! 🏗️ Powered by Figment, because manually parsing env vars is a form of
//! self-harm that even the borrow checker wouldn't approve of.

use std::path::{Path, PathBuf};

use anyhow::Context;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use tracing::info;

use crate::store::ElasticsearchStoreConfig;

/// 📦 The AppConfig: one struct to rule them all, one struct to find them,
/// one struct to bring them all, and in the Figment bind them.
///
/// 🎯 Two halves: where the documents go (`elasticsearch`) and how the
/// pipeline behaves (`ingest`). That's it. That's the app.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// 📡 Where to send the documents. The cluster config lives next to the
    /// store that uses it (`store::elasticsearch`) — socks near feet.
    pub elasticsearch: ElasticsearchStoreConfig,
    /// 🔧 Pipeline knobs, all defaulted. A minimal config is just a cluster URL.
    #[serde(default)]
    pub ingest: IngestConfig,
}

/// 🔧 The pipeline's knobs: paths, prefix, and watch-mode pacing.
#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    /// 🏷️ Daily indices become `{index_prefix}-{YYYY-MM-DD}`.
    #[serde(default = "default_index_prefix")]
    pub index_prefix: String,
    /// 📂 Where the collector drops the daily `events-*.ndjson` files.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// 🗄️ The registry snapshot written by the external fetch process.
    #[serde(default = "default_registry_file")]
    pub registry_file: PathBuf,
    /// ⏱️ How often watch mode polls for file changes. 500ms is plenty for a
    /// house; your thermostat is not a high-frequency trading desk.
    #[serde(default = "default_watch_poll_interval_ms")]
    pub watch_poll_interval_ms: u64,
    /// ✉️ Bounded queue depth between the tail and the index consumer.
    /// Backpressure on purpose: a slow cluster pauses the tail, it does not
    /// balloon the heap.
    #[serde(default = "default_watch_queue_capacity")]
    pub watch_queue_capacity: usize,
}

// 🔧 The defaults exist so serde can call them when the TOML stays silent.
// The `#[serde(default = "...")]` attributes up top are the boss. These are
// just the errand boys.
fn default_index_prefix() -> String {
    "sh".to_string()
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn default_registry_file() -> PathBuf {
    PathBuf::from("./data/registry.json")
}
fn default_watch_poll_interval_ms() -> u64 {
    500
}
fn default_watch_queue_capacity() -> usize {
    256
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            index_prefix: default_index_prefix(),
            data_dir: default_data_dir(),
            registry_file: default_registry_file(),
            watch_poll_interval_ms: default_watch_poll_interval_ms(),
            watch_queue_capacity: default_watch_queue_capacity(),
        }
    }
}

/// 🚀 Load the config — from a file, from env vars, or from the sheer power of hoping.
///
/// 🔧 Merges environment variables (HEIMDEX_*) with an optional TOML file.
/// No `.only(...)` restriction — ALL HEIMDEX_ vars are fair game. We don't
/// gatekeep env vars here. This is a safe space. 🦆
///
/// 📐 DESIGN NOTE (tribal knowledge, written down for once):
///   - If `config_file_name` is None  → env vars only. No file. No assumptions.
///   - If `config_file_name` is Some  → env vars + TOML file, merged. TOML wins on conflicts.
///
/// 💀 Returns an error if the merged config is unparseable — most commonly a
/// missing `[elasticsearch] url`, which is the one thing we cannot default for you.
pub fn load_config(config_file_name: Option<&Path>) -> anyhow::Result<AppConfig> {
    // 🚀 Log what we're loading — because silent failures are the villain
    // origin story of every 3am incident.
    info!(
        "🔧 Loading configuration: {:#?}",
        config_file_name.unwrap_or(Path::new(""))
    );

    // 🏗️ Start with env vars as the base layer — like a good sourdough starter.
    let config = Figment::new().merge(Env::prefixed("HEIMDEX_").split("__"));

    // 🎯 Conditionally layer in TOML only if a file was actually provided.
    let config = match config_file_name {
        Some(file_name) => config.merge(Toml::file(file_name)),
        None => config,
    };

    let context_msg = match config_file_name {
        Some(path) => format!(
            "💀 Failed to parse configuration from file '{}' and environment variables (HEIMDEX_*). \
             Most likely culprit: no [elasticsearch] url. The pipeline needs to know where the cluster lives.",
            path.display()
        ),
        None => "💀 Failed to parse configuration from environment variables (HEIMDEX_*). \
                 No file was provided — this one's all on the environment. Classic."
            .to_string(),
    };

    // ✅ or 💀, there is no try — actually there is, it's called `?`
    config.extract().context(context_msg)
}
