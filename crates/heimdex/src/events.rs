//! 📦 Raw events — one NDJSON line, one smart-home mood swing.
//!
//! 🎬 COLD OPEN — INT. UTILITY CLOSET — 3:47 AM
//!
//! The controller had been long-polled for six months straight. It never
//! complained. It just kept emitting: a thermostat here, a door contact there,
//! the occasional `@type` nobody had ever seen before and nobody has seen since.
//! Every one of them landed in a daily file, one JSON object per line,
//! written by a collector that — on certain builds, during certain moon phases —
//! left a stray comma at the front of a line like a cat leaving a dead bird
//! on the doorstep. A gift. Technically.
//!
//! This module is the front door for those lines. It parses them into
//! [`RawEvent`], a deliberately loose struct: the controller's schema is
//! "whatever the firmware felt like this release," so we keep the known fields
//! typed and sweep everything else into a flattened map. The `@type` string is
//! classified into [`EventKind`] — the known cast members plus an `Other`
//! variant for the walk-ons — so the transformer can match exhaustively on the
//! kinds it understands while staying total for the ones it doesn't.
//!
//! 🦆 (mandatory duck, no context provided, none shall be requested)

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value};

/// 🎭 The cast list of `@type` values we actually know how to enrich.
///
/// The controller speaks in `DeviceServiceData`, `device`, `room`, `message`,
/// `client`, and `light`. Everything else — and there is always an "everything
/// else" one firmware update away — is [`EventKind::Other`]. `Other` carries
/// nothing on purpose: the [`RawEvent`] stays the source of truth, the kind is
/// just the dispatch tag.
///
/// What's the DEAL with `DeviceServiceData` being PascalCase while everything
/// else is lowercase? We don't know. The controller doesn't know. Kevin on the
/// firmware team might know, but Kevin is not answering Slack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// 📡 A device service reporting state — the bread and butter of the feed.
    DeviceService,
    /// 🔌 A device itself changed (renamed, moved rooms, had a midlife crisis).
    Device,
    /// 🚪 A room event — carries `extProperties` instead of `state`, because consistency is a myth.
    Room,
    /// ✉️ A controller message. Usually a complaint. Occasionally a threat.
    Message,
    /// 🧑‍💻 A paired client came or went.
    Client,
    /// 💡 A light. It turned on, or it turned off. Gripping stuff.
    Light,
    /// 🛸 Something the firmware invented after this code was written.
    Other,
}

impl EventKind {
    /// 🔄 Classify a raw `@type` string.
    ///
    /// Accepts both the controller's wire spelling (`DeviceServiceData`) and the
    /// kebab-case spelling older collector builds wrote (`device-service-data`).
    /// Anything unrecognized maps to `Other` — never an error. The unknown is
    /// not a failure. The unknown is Tuesday.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "DeviceServiceData" | "device-service-data" => EventKind::DeviceService,
            "device" => EventKind::Device,
            "room" => EventKind::Room,
            "message" => EventKind::Message,
            "client" => EventKind::Client,
            "light" => EventKind::Light,
            _ => EventKind::Other,
        }
    }
}

/// 📦 One raw event record, as it fell off the controller and onto disk.
///
/// Loosely typed on purpose. The only field we genuinely rely on is `@type`;
/// `time` is stamped by the collector and is a precondition for identity
/// derivation (not for parsing — a record without a clock still deserves to be
/// looked at before it's skipped). The rest is optional, and anything we didn't
/// anticipate lands in `extra`, unjudged.
///
/// Never mutated after parsing. It is read, transformed, and released back into
/// the heap it came from. A catch-and-release program for JSON.
#[derive(Debug, Clone, Deserialize)]
pub struct RawEvent {
    /// 🎭 The discriminator. The one field every record must bring to the party.
    #[serde(rename = "@type")]
    pub event_type: String,
    /// ⏱️ Collector-stamped ISO-8601 timestamp. Absent on malformed records;
    /// identity derivation treats that as a skip, not a crash.
    #[serde(default)]
    pub time: Option<String>,
    /// 🏷️ The record's own id — rooms, messages, and clients key on this.
    #[serde(default)]
    pub id: Option<String>,
    /// 🔌 Which device a service event belongs to.
    #[serde(rename = "deviceId", default)]
    pub device_id: Option<String>,
    /// 🛣️ The controller resource path, e.g. `/devices/hdm:.../services/TemperatureLevel`.
    #[serde(default)]
    pub path: Option<String>,
    /// 📊 Nested state object — where device services keep their numbers.
    #[serde(default)]
    pub state: Option<Map<String, Value>>,
    /// 📊 Room events keep their numbers here instead. As strings. Obviously.
    #[serde(rename = "extProperties", default)]
    pub ext_properties: Option<Map<String, Value>>,
    /// 🛸 Everything the firmware sent that we didn't see coming.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RawEvent {
    /// 🎭 The classified kind of this record. Cheap, derived, never cached —
    /// a string match costs less than the bookkeeping to avoid it.
    pub fn kind(&self) -> EventKind {
        EventKind::parse(&self.event_type)
    }
}

/// 🧹 Scrub the known collector writer artifact off a line before parsing.
///
/// Certain collector builds occasionally emit `{,"@type":...}` — a stray comma
/// right after the opening brace — or prefix the whole line with a comma, as if
/// the file were one big JSON array in the writer's imagination. Both are
/// tolerated here, not rejected: strip the stray comma, keep the document.
fn scrub_line(line: &str) -> String {
    let trimmed = line.trim();
    if let Some(rest) = trimmed.strip_prefix("{,") {
        // ⚠️ `{,"a":1}` → `{"a":1}` — the comma never belonged. It knows what it did.
        let mut scrubbed = String::with_capacity(trimmed.len());
        scrubbed.push('{');
        scrubbed.push_str(rest);
        scrubbed
    } else if let Some(rest) = trimmed.strip_prefix(',') {
        rest.trim_start().to_string()
    } else {
        trimmed.to_string()
    }
}

/// 📖 Parse one NDJSON line into a [`RawEvent`].
///
/// Tolerates the leading-comma artifact (see [`scrub_line`]). A parse failure
/// is an `Err` the caller logs-and-skips — one bad line must never take down a
/// file of forty thousand good ones. That is the whole social contract of this
/// pipeline.
pub fn parse_line(line: &str) -> Result<RawEvent> {
    let cleaned = scrub_line(line);
    serde_json::from_str(&cleaned).with_context(|| {
        // 💀 Keep a short preview in the error so the 3am log reader can find the
        // offending line without diffing the whole file by hand.
        let preview: String = cleaned.chars().take(80).collect();
        format!("💀 This line claimed to be JSON and lied to our face: '{preview}'")
    })
}
