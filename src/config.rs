//! Session configuration (spec §4.3) and ambient engine tunables.
//!
//! `SessionConfig` is the JSON-loaded, per-session configuration spec §4.3
//! describes. `Config` is kept from the teacher's `Config` (`core/src/lib.rs`)
//! trimmed of its phonetic-only fields (fuzzy equivalence rules, full-width
//! toggles, select keys, parser penalties) down to the tunables that are not
//! part of the wire JSON: result-cache capacity and a log-verbosity hint,
//! still TOML-(de)serializable the same way.

use std::path::Path;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

/// Weighted Damerau–Levenshtein cost constants (spec §4.4) plus the
/// incremental-training deltas (spec §4.7), grouped per entry kind because
/// word-level and n-gram-level searches may reasonably use different costs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionWeights {
    pub max_cost_sum: u32,
    pub cost_is_equal: u32,
    pub cost_is_equal_ignoring_case: u32,
    pub cost_insert: u32,
    pub cost_insert_start_of_str: u32,
    pub cost_delete: u32,
    pub cost_delete_start_of_str: u32,
    pub cost_substitute: u32,
    pub cost_substitute_start_of_str: u32,
    pub cost_substitute_in_proximity: u32,
    pub cost_transpose: u32,

    /// Additive bump applied to a trained entry's `absolute_score` (spec
    /// §4.7). Positive.
    pub usage_bonus: u32,
    /// Non-negative amount accumulated into `global_penalties` on every
    /// training call, decaying every other entry at the next recompute
    /// (spec §4.7).
    pub usage_reduction_others: u32,
    /// Default window for `train` (spec §4.7's `max_prev_words`).
    pub max_prev_words: u8,
}

impl Default for PredictionWeights {
    /// Matches the literal weights spec §8's concrete scenarios are written
    /// against.
    fn default() -> Self {
        Self {
            max_cost_sum: 6,
            cost_is_equal: 0,
            cost_is_equal_ignoring_case: 1,
            cost_insert: 2,
            cost_insert_start_of_str: 4,
            cost_delete: 2,
            cost_delete_start_of_str: 4,
            cost_substitute: 2,
            cost_substitute_start_of_str: 4,
            cost_substitute_in_proximity: 1,
            cost_transpose: 1,
            usage_bonus: 10,
            usage_reduction_others: 1,
            max_prev_words: 3,
        }
    }
}

/// Per-kind prediction weights: words and n-grams may be tuned separately
/// (spec §4.3's `predictionWeights{words,ngrams}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionWeightsByKind {
    pub words: PredictionWeights,
    pub ngrams: PredictionWeights,
}

impl Default for PredictionWeightsByKind {
    fn default() -> Self {
        Self {
            words: PredictionWeights::default(),
            ngrams: PredictionWeights::default(),
        }
    }
}

/// Keyboard-proximity relation consumed as configuration (spec §4.4, §6):
/// substitutions between proximate graphemes cost `cost_substitute_in_proximity`
/// instead of `cost_substitute`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyProximityChecker {
    pub enabled: bool,
    /// grapheme -> set of graphemes considered keyboard-adjacent to it.
    /// Lookups are symmetric: callers should populate both directions if the
    /// layout is symmetric (the struct itself does not infer symmetry).
    pub proximate: AHashMap<String, Vec<String>>,
}

impl KeyProximityChecker {
    pub fn is_proximate(&self, a: &str, b: &str) -> bool {
        if !self.enabled {
            return false;
        }
        self.proximate
            .get(a)
            .map(|neighbors| neighbors.iter().any(|n| n == b))
            .unwrap_or(false)
    }
}

/// Selects between the two frequency-estimation strategies spec §9's Open
/// Question leaves configurable: the spec's primary description (`Mean`) and
/// the noted acceptable alternative (`Pooled`: sum of numerators over sum of
/// denominators). See DESIGN.md.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrequencyPooling {
    #[default]
    Mean,
    Pooled,
}

/// One base dictionary reference in the session JSON config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseDictionaryRef {
    pub id: u32,
    pub path: String,
}

/// The session configuration a host loads from JSON (spec §4.3):
/// `{primaryLocale, secondaryLocales, baseDictionaries, userDictionary,
/// predictionWeights{words,ngrams}, keyProximityChecker}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    pub primary_locale: String,
    #[serde(default)]
    pub secondary_locales: Vec<String>,
    #[serde(default)]
    pub base_dictionaries: Vec<BaseDictionaryRef>,
    /// Path to the user dictionary file, loaded (if present) as dictionary
    /// id 0 and the sole persistence target of `train`.
    pub user_dictionary: Option<String>,
    #[serde(default)]
    pub prediction_weights: PredictionWeightsByKind,
    #[serde(default)]
    pub key_proximity_checker: KeyProximityChecker,
    #[serde(default)]
    pub frequency_pooling: FrequencyPooling,
}

impl SessionConfig {
    pub fn from_json_str(content: &str) -> serde_json::Result<Self> {
        serde_json::from_str(content)
    }

    pub fn to_json_string(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Ambient engine-wide tunables that are not part of the session wire
/// format: bounded result-cache capacity and a log-verbosity hint. Kept
/// TOML-(de)serializable exactly like the teacher's `Config`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Entries kept in the optional per-session result cache (§5 ambient
    /// note); `0` disables the cache entirely.
    pub result_cache_capacity: usize,
    /// Forwarded to `tracing_subscriber::EnvFilter` by the host if it wants
    /// a default; the engine itself only emits events/spans.
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            result_cache_capacity: 64,
            log_filter: "info".to_string(),
        }
    }
}

impl Config {
    pub fn load_toml<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_config_round_trips_through_json() {
        let json = r#"{
            "primaryLocale": "en-US",
            "secondaryLocales": ["en-GB"],
            "baseDictionaries": [{"id": 1, "path": "en.dict"}],
            "userDictionary": "user.dict"
        }"#;
        let cfg = SessionConfig::from_json_str(json).unwrap();
        assert_eq!(cfg.primary_locale, "en-US");
        assert_eq!(cfg.secondary_locales, vec!["en-GB".to_string()]);
        assert_eq!(cfg.base_dictionaries[0].id, 1);
        assert_eq!(cfg.frequency_pooling, FrequencyPooling::Mean);
    }

    #[test]
    fn key_proximity_checker_respects_enabled_flag() {
        let mut checker = KeyProximityChecker::default();
        checker.proximate.insert("j".into(), vec!["k".into()]);
        assert!(!checker.is_proximate("j", "k"));
        checker.enabled = true;
        assert!(checker.is_proximate("j", "k"));
        assert!(!checker.is_proximate("k", "j"));
    }

    #[test]
    fn config_round_trips_through_toml() {
        let cfg = Config::default();
        let text = cfg.to_toml_string().unwrap();
        let back = Config::from_toml_str(&text).unwrap();
        assert_eq!(cfg.result_cache_capacity, back.result_cache_capacity);
    }
}
