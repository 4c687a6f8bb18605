//! 🪪 Document identity — the same event gets the same id, every single time.
//!
//! Idempotent re-ingestion lives or dies right here. The id is a pure function
//! of record content — `{@type}-{primaryKey}-{time}` — so re-importing
//! yesterday's file overwrites yesterday's documents instead of cloning them.
//! No UUIDs, no ingestion timestamps, no "how many times did the cron run this
//! week" archaeology in Kibana.
//!
//! Ancient proverb: "He who derives ids from wall-clock time at ingestion,
//! counts every event twice and trusts nothing thereafter." 🦆

use anyhow::{Result, bail};

use crate::events::{EventKind, RawEvent};

/// 🔗 The glue between id segments. Fixed forever — changing it orphans every
/// previously indexed document under a new identity.
const SEPARATOR: &str = "-";

/// 🪪 The key segment when a record genuinely has nothing to key on.
/// Never an empty string: `type--time` would be an id with a hole in it.
const NO_KEY: &str = "unknown";

/// 🪪 Derive the deterministic document id for a record.
///
/// Primary key selection by kind: device-service events key on `deviceId`
/// (that's the thing that changed), everything else keys on the record's own
/// `id`, and each falls back to the other before surrendering to `unknown`.
///
/// # Errors
/// 💀 Only if `time` is absent — a precondition violation the caller treats as
/// a parse/skip case, never something to forward to the store. A record with
/// no clock has no place on a time axis.
pub fn derive_id(event: &RawEvent) -> Result<String> {
    let Some(ref time) = event.time else {
        bail!(
            "💀 Record of @type '{}' arrived without a 'time' field. An event that cannot say when it happened cannot be given an identity. Skipping is the only dignified option.",
            event.event_type
        );
    };

    let primary_key = match event.kind() {
        // 📡 Service data is *about* a device — the device id is the identity anchor.
        EventKind::DeviceService => event
            .device_id
            .as_deref()
            .or(event.id.as_deref())
            .unwrap_or(NO_KEY),
        // 🚪 Rooms, messages, clients, devices, lights — and whatever the firmware
        // dreams up next — key on their own id.
        _ => event
            .id
            .as_deref()
            .or(event.device_id.as_deref())
            .unwrap_or(NO_KEY),
    };

    Ok(format!(
        "{}{SEPARATOR}{}{SEPARATOR}{}",
        event.event_type, primary_key, time
    ))
}
