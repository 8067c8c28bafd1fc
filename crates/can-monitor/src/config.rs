//! Monitor configuration
//!
//! Loaded from an optional TOML file, then overridden by `CAN_MONITOR_*`
//! environment variables (`CAN_MONITOR_SESSION__DEVICE=/dev/ttyACM0`).
//! ID lists accept a single ID or comma-separated IDs, each decimal or
//! `0x` hex (`CAN_MONITOR_IGNORE=0x20f,0x211`).

use config::{Config, ConfigError, Environment, File};
use elm_can::SessionConfig;
use serde::{Deserialize, Serialize};

/// Monitor configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Adapter connection
    pub session: SessionConfig,

    /// Acceptance filter sent before monitoring
    pub filter: FilterSettings,

    /// IDs never reported
    #[serde(deserialize_with = "id_list::deserialize")]
    pub ignore: Vec<u32>,

    /// Report every frame, not only payload changes
    pub firehose: bool,

    pub logging: LoggingConfig,
}

/// Acceptance filter settings. A non-empty whitelist takes precedence over
/// an explicit filter/mask.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    pub filter: Option<u32>,
    pub mask: Option<u32>,
    /// 11-bit IDs reduced to a single filter/mask pair
    #[serde(deserialize_with = "id_list::deserialize")]
    pub whitelist: Vec<u16>,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Maximum level (trace, debug, info, warn, error)
    pub level: String,
    /// Emit JSON lines instead of human-readable text
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl MonitorConfig {
    /// File read when no path is given
    pub const DEFAULT_PATH: &'static str = "can-monitor.toml";

    /// Load `path` (if it exists) layered under the environment
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        Self::load_with(path, Self::environment())
    }

    fn load_with(path: &str, environment: Environment) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(environment)
            .build()?
            .try_deserialize()
    }

    fn environment() -> Environment {
        Environment::with_prefix("CAN_MONITOR")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("ignore")
            .with_list_parse_key("filter.whitelist")
    }
}

/// ID lists as written by hand: one ID or a sequence, where each ID is an
/// integer or a decimal / `0x` hex string. A single string may hold several
/// comma-separated IDs.
mod id_list {
    use serde::de::{self, Deserialize, Deserializer, SeqAccess, Unexpected, Visitor};
    use std::fmt;
    use std::marker::PhantomData;

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: TryFrom<u64>,
    {
        deserializer.deserialize_any(ListVisitor(PhantomData))
    }

    fn parse_id(text: &str) -> Option<u64> {
        let text = text.trim();
        match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
            Some(hex) => u64::from_str_radix(hex, 16).ok(),
            None => text.parse().ok(),
        }
    }

    struct IdVisitor<T>(PhantomData<T>);

    impl<'de, T: TryFrom<u64>> Visitor<'de> for IdVisitor<T> {
        type Value = T;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a CAN ID as an integer, decimal string or 0x-prefixed hex string")
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<T, E> {
            T::try_from(value).map_err(|_| E::custom(format!("CAN ID {:#x} is out of range", value)))
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<T, E> {
            let value = u64::try_from(value)
                .map_err(|_| E::invalid_value(Unexpected::Signed(value), &self))?;
            self.visit_u64(value)
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<T, E> {
            let id = parse_id(value).ok_or_else(|| E::invalid_value(Unexpected::Str(value), &self))?;
            self.visit_u64(id)
        }
    }

    struct Id<T>(T);

    impl<'de, T: TryFrom<u64>> Deserialize<'de> for Id<T> {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            deserializer.deserialize_any(IdVisitor(PhantomData)).map(Id)
        }
    }

    struct ListVisitor<T>(PhantomData<T>);

    impl<'de, T: TryFrom<u64>> Visitor<'de> for ListVisitor<T> {
        type Value = Vec<T>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a CAN ID or a list of CAN IDs")
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<Vec<T>, E> {
            IdVisitor(PhantomData).visit_u64(value).map(|id| vec![id])
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<Vec<T>, E> {
            IdVisitor(PhantomData).visit_i64(value).map(|id| vec![id])
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<Vec<T>, E> {
            value
                .split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(|part| IdVisitor(PhantomData).visit_str(part))
                .collect()
        }

        fn visit_unit<E: de::Error>(self) -> Result<Vec<T>, E> {
            Ok(Vec::new())
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Vec<T>, A::Error> {
            let mut ids = Vec::with_capacity(seq.size_hint().unwrap_or(0));
            while let Some(Id(id)) = seq.next_element::<Id<T>>()? {
                ids.push(id);
            }
            Ok(ids)
        }
    }
}
