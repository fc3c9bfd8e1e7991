#![forbid(unsafe_code)]

//! Engine configuration: timings, cycle budget, and reveal trigger.
//!
//! Every delay the engine waits on lives in [`Timings`]. The defaults
//! reproduce the product walkthrough; hosts may override any of them in
//! code, from `STAGEHAND_*` environment variables, or (with the
//! `config-file` feature) from JSON.
//!
//! # Environment Variables
//!
//! | Variable | Field |
//! |----------|-------|
//! | `STAGEHAND_MAX_CYCLES` | [`EngineConfig::max_cycles`] |
//! | `STAGEHAND_HOTSPOT_OFFSET` | [`EngineConfig::hotspot_offset`] |
//! | `STAGEHAND_REVEAL_TRIGGER` | `manual` or `cycles-exhausted` |
//! | `STAGEHAND_<TIMING>_MS` | any [`Timings`] field, upper-cased |
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | `ConfigError::InvalidValue` | Unparseable env/JSON value | Load fails |
//! | `ConfigError::OutOfRange` | Zero cycle budget, zero type interval | Load fails |
//! | `ConfigError::Io` | Config file unreadable | Load fails |
//! | `ConfigError::Parse` | Malformed JSON | Load fails |

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use stagehand_core::anchor::DEFAULT_HOTSPOT_OFFSET;

// ─────────────────────────────────────────────────────────────────────────────
// Error Types
// ─────────────────────────────────────────────────────────────────────────────

/// Errors produced while building an [`EngineConfig`].
#[derive(Debug)]
pub enum ConfigError {
    /// A value could not be parsed.
    InvalidValue { key: String, value: String },
    /// A value parsed but is not usable.
    OutOfRange { key: String, reason: &'static str },
    /// I/O error while reading a config file.
    #[cfg(feature = "config-file")]
    Io(std::io::Error),
    /// Malformed config file.
    #[cfg(feature = "config-file")]
    Parse(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidValue { key, value } => {
                write!(f, "invalid value for {key}: {value:?}")
            }
            ConfigError::OutOfRange { key, reason } => write!(f, "{key} out of range: {reason}"),
            #[cfg(feature = "config-file")]
            ConfigError::Io(e) => write!(f, "I/O error: {e}"),
            #[cfg(feature = "config-file")]
            ConfigError::Parse(msg) => write!(f, "config parse error: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            #[cfg(feature = "config-file")]
            ConfigError::Io(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(feature = "config-file")]
impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

// ─────────────────────────────────────────────────────────────────────────────
// Timings
// ─────────────────────────────────────────────────────────────────────────────

/// Every delay used by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "config-file",
    derive(serde::Serialize, serde::Deserialize)
)]
#[cfg_attr(feature = "config-file", serde(default))]
pub struct Timings {
    /// Wait before the first detection cycle shows the pointer.
    #[cfg_attr(feature = "config-file", serde(with = "millis"))]
    pub detection_start_delay: Duration,
    /// Wait between two detection cycles.
    #[cfg_attr(feature = "config-file", serde(with = "millis"))]
    pub inter_cycle_pause: Duration,
    /// Wait before the login demo starts typing.
    #[cfg_attr(feature = "config-file", serde(with = "millis"))]
    pub prevention_start_delay: Duration,
    /// Time between two typed characters.
    #[cfg_attr(feature = "config-file", serde(with = "millis"))]
    pub type_interval: Duration,
    /// Pause after the last character before typing counts as finished.
    #[cfg_attr(feature = "config-file", serde(with = "millis"))]
    pub typing_settle: Duration,
    /// Wait between finished typing and the outcome.
    #[cfg_attr(feature = "config-file", serde(with = "millis"))]
    pub outcome_delay: Duration,
    /// How long an outcome stays up before the next attempt.
    #[cfg_attr(feature = "config-file", serde(with = "millis"))]
    pub outcome_hold: Duration,
    /// Spacing of the detected-events cascade.
    #[cfg_attr(feature = "config-file", serde(with = "millis"))]
    pub event_reveal_interval: Duration,
    /// Spacing of the feature-unlock cascade.
    #[cfg_attr(feature = "config-file", serde(with = "millis"))]
    pub feature_unlock_interval: Duration,
    /// Pause after a cascade's last item before it is ready.
    #[cfg_attr(feature = "config-file", serde(with = "millis"))]
    pub reveal_trailing_pause: Duration,
    /// Wait between the feature section and the verification section.
    #[cfg_attr(feature = "config-file", serde(with = "millis"))]
    pub verification_delay: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            detection_start_delay: Duration::from_millis(2000),
            inter_cycle_pause: Duration::from_millis(2000),
            prevention_start_delay: Duration::from_millis(1000),
            type_interval: Duration::from_millis(100),
            typing_settle: Duration::from_millis(100),
            outcome_delay: Duration::from_millis(500),
            outcome_hold: Duration::from_millis(4000),
            event_reveal_interval: Duration::from_millis(500),
            feature_unlock_interval: Duration::from_millis(1500),
            reveal_trailing_pause: Duration::from_millis(1500),
            verification_delay: Duration::from_millis(1500),
        }
    }
}

/// `(env var, field)` pairs for every timing.
fn timing_vars(t: &mut Timings) -> [(&'static str, &mut Duration); 11] {
    [
        ("STAGEHAND_DETECTION_START_DELAY_MS", &mut t.detection_start_delay),
        ("STAGEHAND_INTER_CYCLE_PAUSE_MS", &mut t.inter_cycle_pause),
        ("STAGEHAND_PREVENTION_START_DELAY_MS", &mut t.prevention_start_delay),
        ("STAGEHAND_TYPE_INTERVAL_MS", &mut t.type_interval),
        ("STAGEHAND_TYPING_SETTLE_MS", &mut t.typing_settle),
        ("STAGEHAND_OUTCOME_DELAY_MS", &mut t.outcome_delay),
        ("STAGEHAND_OUTCOME_HOLD_MS", &mut t.outcome_hold),
        ("STAGEHAND_EVENT_REVEAL_INTERVAL_MS", &mut t.event_reveal_interval),
        ("STAGEHAND_FEATURE_UNLOCK_INTERVAL_MS", &mut t.feature_unlock_interval),
        ("STAGEHAND_REVEAL_TRAILING_PAUSE_MS", &mut t.reveal_trailing_pause),
        ("STAGEHAND_VERIFICATION_DELAY_MS", &mut t.verification_delay),
    ]
}

// ─────────────────────────────────────────────────────────────────────────────
// Reveal trigger
// ─────────────────────────────────────────────────────────────────────────────

/// What starts the feature-unlock reveal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "config-file",
    derive(serde::Serialize, serde::Deserialize)
)]
#[cfg_attr(feature = "config-file", serde(rename_all = "kebab-case"))]
pub enum RevealTrigger {
    /// The host calls `continue_to_unlock`.
    #[default]
    Manual,
    /// The detection walkthrough spending its cycle budget.
    #[cfg_attr(feature = "config-file", serde(rename = "cycles-exhausted"))]
    OnCycleBudgetExhausted,
}

impl RevealTrigger {
    /// Stable name used in env vars and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::OnCycleBudgetExhausted => "cycles-exhausted",
        }
    }
}

impl fmt::Display for RevealTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RevealTrigger {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "manual" => Ok(Self::Manual),
            "cycles-exhausted" | "cycles_exhausted" | "auto" => Ok(Self::OnCycleBudgetExhausted),
            _ => Err(ConfigError::InvalidValue {
                key: "reveal_trigger".into(),
                value: s.to_string(),
            }),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// EngineConfig
// ─────────────────────────────────────────────────────────────────────────────

/// Default number of detection cycles before the pointer freezes.
pub const DEFAULT_MAX_CYCLES: u32 = 3;

/// Configuration for one walkthrough engine.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "config-file",
    derive(serde::Serialize, serde::Deserialize)
)]
#[cfg_attr(feature = "config-file", serde(default))]
pub struct EngineConfig {
    pub timings: Timings,
    /// Detection cycles before the pointer freezes.
    pub max_cycles: u32,
    /// Pointer hotspot adjustment in pixels.
    pub hotspot_offset: f64,
    pub reveal_trigger: RevealTrigger,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timings: Timings::default(),
            max_cycles: DEFAULT_MAX_CYCLES,
            hotspot_offset: DEFAULT_HOTSPOT_OFFSET,
            reveal_trigger: RevealTrigger::Manual,
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub fn with_timings(mut self, timings: Timings) -> Self {
        self.timings = timings;
        self
    }

    #[must_use]
    pub fn with_max_cycles(mut self, max_cycles: u32) -> Self {
        self.max_cycles = max_cycles;
        self
    }

    #[must_use]
    pub fn with_hotspot_offset(mut self, offset: f64) -> Self {
        self.hotspot_offset = offset;
        self
    }

    #[must_use]
    pub fn with_reveal_trigger(mut self, trigger: RevealTrigger) -> Self {
        self.reveal_trigger = trigger;
        self
    }

    /// Check values the engine cannot run with.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_cycles == 0 {
            return Err(ConfigError::OutOfRange {
                key: "max_cycles".into(),
                reason: "must be at least 1",
            });
        }
        if self.timings.type_interval.is_zero() {
            return Err(ConfigError::OutOfRange {
                key: "type_interval".into(),
                reason: "must be non-zero",
            });
        }
        if !self.hotspot_offset.is_finite() {
            return Err(ConfigError::OutOfRange {
                key: "hotspot_offset".into(),
                reason: "must be finite",
            });
        }
        Ok(())
    }

    /// Defaults overlaid with `STAGEHAND_*` environment variables.
    pub fn from_env() -> ConfigResult<Self> {
        Self::default().overlay(|key| env::var(key).ok())
    }

    /// Overlay values from `lookup` (an env-like source) onto `self`.
    pub fn overlay(mut self, lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<Self> {
        if let Some(val) = lookup("STAGEHAND_MAX_CYCLES") {
            self.max_cycles = parse_value("STAGEHAND_MAX_CYCLES", &val)?;
        }
        if let Some(val) = lookup("STAGEHAND_HOTSPOT_OFFSET") {
            self.hotspot_offset = parse_value("STAGEHAND_HOTSPOT_OFFSET", &val)?;
        }
        if let Some(val) = lookup("STAGEHAND_REVEAL_TRIGGER") {
            self.reveal_trigger = val.parse().map_err(|_| ConfigError::InvalidValue {
                key: "STAGEHAND_REVEAL_TRIGGER".into(),
                value: val.clone(),
            })?;
        }
        for (key, field) in timing_vars(&mut self.timings) {
            if let Some(val) = lookup(key) {
                let ms: u64 = parse_value(key, &val)?;
                *field = Duration::from_millis(ms);
            }
        }
        self.validate()?;
        Ok(self)
    }

    /// Parse a JSON document. Missing fields keep their defaults.
    #[cfg(feature = "config-file")]
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ConfigError::Parse(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON config file.
    #[cfg(feature = "config-file")]
    pub fn load_json(path: impl AsRef<std::path::Path>) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}

fn parse_value<T: FromStr>(key: &str, val: &str) -> ConfigResult<T> {
    val.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: val.to_string(),
    })
}

#[cfg(feature = "config-file")]
mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_product() {
        let config = EngineConfig::default();
        assert_eq!(config.max_cycles, 3);
        assert_eq!(config.hotspot_offset, 12.0);
        assert_eq!(config.reveal_trigger, RevealTrigger::Manual);
        assert_eq!(config.timings.type_interval, Duration::from_millis(100));
        assert_eq!(config.timings.outcome_hold, Duration::from_millis(4000));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_setters() {
        let config = EngineConfig::default()
            .with_max_cycles(5)
            .with_hotspot_offset(8.0)
            .with_reveal_trigger(RevealTrigger::OnCycleBudgetExhausted);
        assert_eq!(config.max_cycles, 5);
        assert_eq!(config.hotspot_offset, 8.0);
        assert_eq!(config.reveal_trigger, RevealTrigger::OnCycleBudgetExhausted);
    }

    #[test]
    fn validate_rejects_zero_budget() {
        let err = EngineConfig::default()
            .with_max_cycles(0)
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { .. }));
        assert!(err.to_string().contains("max_cycles"));
    }

    #[test]
    fn validate_rejects_zero_type_interval() {
        let timings = Timings {
            type_interval: Duration::ZERO,
            ..Timings::default()
        };
        let err = EngineConfig::default()
            .with_timings(timings)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("type_interval"));
    }

    #[test]
    fn validate_rejects_nan_hotspot() {
        assert!(
            EngineConfig::default()
                .with_hotspot_offset(f64::NAN)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn overlay_reads_vars() {
        let config = EngineConfig::default()
            .overlay(lookup(&[
                ("STAGEHAND_MAX_CYCLES", "1"),
                ("STAGEHAND_TYPE_INTERVAL_MS", "40"),
                ("STAGEHAND_OUTCOME_HOLD_MS", " 250 "),
                ("STAGEHAND_REVEAL_TRIGGER", "cycles-exhausted"),
            ]))
            .unwrap();
        assert_eq!(config.max_cycles, 1);
        assert_eq!(config.timings.type_interval, Duration::from_millis(40));
        assert_eq!(config.timings.outcome_hold, Duration::from_millis(250));
        assert_eq!(config.reveal_trigger, RevealTrigger::OnCycleBudgetExhausted);
        assert_eq!(
            config.timings.detection_start_delay,
            Timings::default().detection_start_delay
        );
    }

    #[test]
    fn overlay_rejects_garbage() {
        let err = EngineConfig::default()
            .overlay(lookup(&[("STAGEHAND_INTER_CYCLE_PAUSE_MS", "soon")]))
            .unwrap_err();
        match err {
            ConfigError::InvalidValue { key, value } => {
                assert_eq!(key, "STAGEHAND_INTER_CYCLE_PAUSE_MS");
                assert_eq!(value, "soon");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn overlay_validates_result() {
        let err = EngineConfig::default()
            .overlay(lookup(&[("STAGEHAND_MAX_CYCLES", "0")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { .. }));
    }

    #[test]
    fn every_timing_var_is_wired() {
        let mut scratch = Timings::default();
        let vars: Vec<(&str, &str)> = timing_vars(&mut scratch)
            .into_iter()
            .map(|(k, _)| (k, "7"))
            .collect();
        let config = EngineConfig::default().overlay(lookup(&vars)).unwrap();
        let t = config.timings;
        let seven = Duration::from_millis(7);
        for d in [
            t.detection_start_delay,
            t.inter_cycle_pause,
            t.prevention_start_delay,
            t.type_interval,
            t.typing_settle,
            t.outcome_delay,
            t.outcome_hold,
            t.event_reveal_interval,
            t.feature_unlock_interval,
            t.reveal_trailing_pause,
            t.verification_delay,
        ] {
            assert_eq!(d, seven);
        }
    }

    #[test]
    fn reveal_trigger_parse_and_display() {
        assert_eq!(
            "Manual".parse::<RevealTrigger>().unwrap(),
            RevealTrigger::Manual
        );
        assert_eq!(
            "auto".parse::<RevealTrigger>().unwrap(),
            RevealTrigger::OnCycleBudgetExhausted
        );
        assert!("later".parse::<RevealTrigger>().is_err());
        assert_eq!(
            RevealTrigger::OnCycleBudgetExhausted.to_string(),
            "cycles-exhausted"
        );
    }

    #[cfg(feature = "config-file")]
    #[test]
    fn json_partial_document_keeps_defaults() {
        let doc = r#"{
            "max_cycles": 2,
            "timings": { "type_interval": 50 },
            "reveal_trigger": "cycles-exhausted"
        }"#;
        let config = EngineConfig::from_json_str(doc).unwrap();
        assert_eq!(config.max_cycles, 2);
        assert_eq!(config.timings.type_interval, Duration::from_millis(50));
        assert_eq!(config.timings.outcome_delay, Duration::from_millis(500));
        assert_eq!(config.reveal_trigger, RevealTrigger::OnCycleBudgetExhausted);
    }

    #[cfg(feature = "config-file")]
    #[test]
    fn json_errors() {
        assert!(matches!(
            EngineConfig::from_json_str("{ not json"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            EngineConfig::from_json_str(r#"{ "max_cycles": 0 }"#),
            Err(ConfigError::OutOfRange { .. })
        ));
    }
}
