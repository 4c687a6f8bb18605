//! 🔄 The event transformer — raw controller gossip in, Kibana-ready documents out.
//!
//! 🎬 COLD OPEN — INT. LIVING ROOM — THE THERMOSTAT SPEAKS
//!
//! `{"@type":"DeviceServiceData","deviceId":"hdm:HomeMaticIP:3014F711A0...`
//! That is what the thermostat actually says. What the human wants to read is
//! "Thermostat, Living Room, 21.5°C". This module is the interpreter between
//! those two worlds, and it has exactly one unbreakable rule:
//!
//! ⚠️ **It never fails.** Not on unknown `@type` values. Not on devices the
//! registry has never heard of. Not on records with no state at all. Every
//! record becomes a document; missing knowledge means fewer fields, never an
//! error. Enrichment is best-effort *per sub-field* — a device that resolves
//! but whose room doesn't still gets its `device` block. All-or-nothing is for
//! transactions. This is journalism.
//!
//! Metric extraction runs over every record regardless of kind: a fixed
//! allowlist of numeric fields is scanned in the nested `state` object and the
//! room `extProperties` (where the controller, in its wisdom, ships numbers as
//! strings). At most one metric per record. Zero is a fine number of metrics.
//!
//! 🦆 (the duck reads every document before it ships. quality assurance.)

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::events::{EventKind, RawEvent};
use crate::registry::RegistryCache;

/// 📊 The metric allowlist, in priority order. First match wins.
///
/// Left: the field name as the controller writes it. Right: the normalized
/// metric name a dashboard can rely on. Adding a pair here is the whole
/// process for teaching the pipeline a new measurement.
const METRIC_FIELDS: &[(&str, &str)] = &[
    ("temperature", "temperature"),
    ("humidity", "humidity"),
    ("valvePosition", "valve_position"),
    ("batteryLevel", "battery_level"),
    ("illuminance", "illuminance"),
    ("currentPowerConsumption", "power_consumption"),
    ("energyConsumption", "energy_consumption"),
    ("purity", "purity"),
];

/// 📦 The enriched output document — what actually gets indexed.
///
/// `Option` fields vanish from the JSON entirely when absent
/// (`skip_serializing_if`), because a dashboard filtering on `device.name`
/// does not want to meet ten thousand `null`s on the way.
///
/// Invariant: `device`/`room` only ever contain data from the currently loaded
/// registry snapshot. No snapshot, no blocks — never fabricated, never stale
/// beyond the snapshot itself.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Document {
    /// ⏱️ The collector's timestamp, promoted to the field name Kibana worships.
    #[serde(rename = "@timestamp", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// 🎭 The original discriminator, verbatim — unknown types included.
    #[serde(rename = "@type")]
    pub event_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "deviceId", skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// 🔌 Registry enrichment: what the device is called (and what it is).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<DeviceField>,
    /// 🚪 Registry enrichment: where it lives.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room: Option<RoomField>,
    /// 📊 The one normalized measurement this record carried, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric: Option<Metric>,
}

/// 🔌 The `device` block of an enriched document.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DeviceField {
    pub name: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
}

/// 🚪 The `room` block of an enriched document.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RoomField {
    pub id: String,
    pub name: String,
}

/// 📊 One normalized measurement: a name off the allowlist and an f64.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Metric {
    pub name: String,
    pub value: f64,
}

/// 🔄 Transform a raw record into an enriched [`Document`]. Total. Never fails.
///
/// The algorithm, in order of appearance:
/// 1. Base fields are copied for everyone: timestamp, type, id, deviceId, path.
/// 2. Kind-specific enrichment — device-service events get `device` (and, if
///    the device's room resolves, `room`); room events get `room` by their own
///    id; the rest of the known cast gets nothing extra.
/// 3. Unknown kinds log a warning and proceed with the base fields. The
///    fallback path is a feature, not an apology.
/// 4. Metric extraction runs last, unconditionally.
pub fn transform(registry: &RegistryCache, event: &RawEvent) -> Document {
    let mut document = Document {
        timestamp: event.time.clone(),
        event_type: event.event_type.clone(),
        id: event.id.clone(),
        device_id: event.device_id.clone(),
        path: event.path.clone(),
        device: None,
        room: None,
        metric: None,
    };

    match event.kind() {
        EventKind::DeviceService => {
            // 🔌 Best-effort, per sub-field. A registry miss here removes ONE
            // block, never the whole enrichment.
            if let Some(ref device_id) = event.device_id {
                if let Some(device) = registry.lookup_device(device_id) {
                    document.device = Some(DeviceField {
                        name: device.name,
                        device_type: device.device_type,
                    });
                    if let Some(ref room_id) = device.room_id {
                        if let Some(room) = registry.lookup_room(room_id) {
                            document.room = Some(RoomField {
                                id: room_id.clone(),
                                name: room.name,
                            });
                        }
                    }
                }
            }
        }
        EventKind::Room => {
            if let Some(ref room_id) = event.id {
                if let Some(room) = registry.lookup_room(room_id) {
                    document.room = Some(RoomField {
                        id: room_id.clone(),
                        name: room.name,
                    });
                }
            }
        }
        // 🎭 Known, but nothing structural to add beyond the base fields.
        EventKind::Device | EventKind::Message | EventKind::Client | EventKind::Light => {}
        EventKind::Other => {
            // 🛸 New firmware, who dis. Logged once per record, indexed anyway.
            warn!(
                "🛸 Unrecognized @type '{}' — indexing with base fields only",
                event.event_type
            );
        }
    }

    document.metric = extract_metric(event);
    document
}

/// 📊 Scan a record for its first allowlisted numeric field.
///
/// `state` is searched before `extProperties`; within each, the allowlist
/// order decides priority. Values may be JSON numbers or numeric strings —
/// the controller ships room humidity as `"54.5"` and nobody at the factory
/// saw a problem with that.
fn extract_metric(event: &RawEvent) -> Option<Metric> {
    for source in [event.state.as_ref(), event.ext_properties.as_ref()] {
        let Some(map) = source else { continue };
        for &(raw_key, metric_name) in METRIC_FIELDS {
            if let Some(value) = map.get(raw_key).and_then(numeric_value) {
                return Some(Metric {
                    name: metric_name.to_string(),
                    value,
                });
            }
        }
    }
    None
}

/// 🔢 Coax a JSON value into an f64, accepting numbers and numeric strings.
/// Booleans, nulls, arrays, and interpretive-dance values yield `None`.
fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
}
