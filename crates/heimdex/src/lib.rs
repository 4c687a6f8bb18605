//! 🏠 heimdex — the pipeline between a house's event log and a Kibana dashboard.
//!
//! 📥 Daily NDJSON files in, enriched documents out. Two delivery modes share
//! every interesting part (parsing, enrichment, identity, index naming) and
//! differ only at the very end:
//!
//! - [`importer::import_files`] — batch: finite files, one bulk request each.
//! - [`watch::start_watch_mode`] — live: tail today's file, one document at a time.
//!
//! Both are written against the injected [`store::DocumentStore`] seam, so the
//! whole pipeline tests against an in-memory store and ships against a real
//! Elasticsearch cluster without changing a line in between. 🦆

pub mod app_config;
pub mod events;
pub mod identity;
pub mod importer;
pub mod naming;
pub mod registry;
pub mod store;
pub mod transform;
pub mod watch;

pub(crate) mod progress;

pub use app_config::{AppConfig, IngestConfig, load_config};
pub use importer::{import_file, import_files};
pub use registry::RegistryCache;
pub use store::{DocumentStore, ElasticsearchStore, ElasticsearchStoreConfig};
pub use watch::start_watch_mode;
