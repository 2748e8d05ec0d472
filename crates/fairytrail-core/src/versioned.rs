//! Schema-versioned JSON records in key-value storage.
//!
//! Every stored record embeds a `schemaVersion`. On load the stored version
//! is compared with the current one; a registered migration chain upgrades
//! old shapes in place, anything else is reset so the caller starts fresh.

use serde::de::DeserializeOwned;
use serde_json::Value;

/// Upgrades a record one version: `(from_version, upgrade)`.
pub type Migration = (u32, fn(Value) -> Value);

const VERSION_FIELD: &str = "schemaVersion";

/// Outcome of decoding a raw stored value.
#[derive(Debug, PartialEq)]
pub enum Decoded<T> {
    /// Stored value was current (or migrated to current).
    Current(T),
    /// Stored value is unusable: malformed, wrong shape, or an unknown version.
    Reset,
}

#[derive(Debug, Clone)]
pub struct VersionedCodec {
    current: u32,
    migrations: &'static [Migration],
}

impl VersionedCodec {
    pub const fn new(current: u32, migrations: &'static [Migration]) -> Self {
        Self {
            current,
            migrations,
        }
    }

    pub fn current_version(&self) -> u32 {
        self.current
    }

    pub fn decode<T: DeserializeOwned>(&self, raw: &str) -> Decoded<T> {
        let Ok(mut value) = serde_json::from_str::<Value>(raw) else {
            return Decoded::Reset;
        };

        let Some(mut version) = stored_version(&value) else {
            return Decoded::Reset;
        };

        while version != self.current {
            let Some((_, upgrade)) = self.migrations.iter().find(|(from, _)| *from == version)
            else {
                return Decoded::Reset;
            };
            value = upgrade(value);
            match stored_version(&value) {
                // A migration must move forward, otherwise we would loop forever.
                Some(next) if next > version => version = next,
                _ => return Decoded::Reset,
            }
        }

        match serde_json::from_value(value) {
            Ok(record) => Decoded::Current(record),
            Err(_) => Decoded::Reset,
        }
    }
}

fn stored_version(value: &Value) -> Option<u32> {
    value
        .get(VERSION_FIELD)
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
}
