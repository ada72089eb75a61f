//! Session: owns the shared trie, the dictionary list, and the lock that
//! arbitrates concurrent access to them (spec §4.3, §5).
//!
//! Grounded on the teacher's `Engine<P>` (`core/src/engine.rs`): a struct
//! bundling the shared model with a bounded LRU result cache, swapping the
//! teacher's single-writer `RefCell` (the teacher never calls `Engine`
//! methods concurrently) for an `RwLock` (spec §5 requires concurrent
//! readers and a writer that excludes them, not just single-threaded reuse).

use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::{Mutex, RwLock};

use ahash::AHashMap;
use lru::LruCache;
use tracing::{debug, info, instrument};

use crate::config::{FrequencyPooling, KeyProximityChecker, PredictionWeightsByKind, SessionConfig};
use crate::dictionary::Dictionary;
use crate::entry::{DictionaryId, EntryKind, NgramProps, ShortcutProps, WordProps, USER_DICTIONARY_ID};
use crate::error::EngineError;
use crate::flags::{RequestFlags, SpellResult, SuggestResult};
use crate::format::{self, DictionaryMeta, NgramId, ParsedDictionary, WordRecord};
use crate::grapheme::{Grapheme, GraphemeService, UnicodeGraphemeService, NGRAM_SEP, SOS};
use crate::predict::{self, PredictionContext};
use crate::trie::Trie;

struct Inner {
    trie: Trie,
    dictionaries: Vec<Dictionary>,
}

/// Translate a freshly parsed dictionary file into trie nodes and `dict`'s
/// bookkeeping (spec §4.2/§4.3 boundary: `format.rs` only knows records,
/// `Session` is where a record becomes a node).
fn ingest(
    trie: &mut Trie,
    dict: &mut Dictionary,
    parsed: &ParsedDictionary,
    graphemes: &dyn GraphemeService,
    locale: &str,
) -> crate::error::Result<()> {
    if let Some(name) = &parsed.meta.name {
        dict.name = name.clone();
    }
    dict.display_name = parsed.meta.display_name.clone().unwrap_or_default();
    dict.locales = parsed.meta.locales.clone();
    dict.generated_by = parsed.meta.generated_by.clone().unwrap_or_default();
    dict.authors = parsed.meta.authors.clone();
    dict.license = parsed.meta.license.clone().unwrap_or_default();

    let mut word_graphemes: Vec<Vec<Grapheme>> = Vec::with_capacity(parsed.words.len());

    for record in &parsed.words {
        let internal_id = (word_graphemes.len() + 1) as u32;
        let path = graphemes.segment_graphemes(&record.word, locale);
        let node = trie.find_or_create(&path);
        let value = trie.value_or_create(node, dict.id);
        value.word = Some(WordProps {
            internal_id,
            absolute_score: record.score,
            is_possibly_offensive: record.possibly_offensive,
            is_hidden_by_user: record.hidden_by_user,
        });
        dict.register_new_entry(EntryKind::Word, record.score)?;
        word_graphemes.push(path);
    }

    for record in &parsed.ngrams {
        let mut path = Vec::new();
        for (i, id) in record.ids.iter().enumerate() {
            let segment: Vec<Grapheme> = match id {
                NgramId::Word(w) => word_graphemes
                    .get((*w as usize).wrapping_sub(1))
                    .cloned()
                    .ok_or(EngineError::OutOfRange { id: *w as i64 })?,
                NgramId::Special(b) => vec![(*b as char).to_string()],
            };
            path.extend(segment);
            if i + 1 < record.ids.len() {
                path.push(NGRAM_SEP.to_string());
            }
        }
        let node = trie.find_or_create(&path);
        let value = trie.value_or_create(node, dict.id);
        value.ngram = Some(NgramProps {
            absolute_score: record.score,
        });
        dict.register_new_entry(EntryKind::Ngram(record.ids.len() as u8), record.score)?;
    }

    for record in &parsed.shortcuts {
        let path = graphemes.segment_graphemes(&record.trigger, locale);
        let node = trie.find_or_create(&path);
        let value = trie.value_or_create(node, dict.id);
        value.shortcut = Some(ShortcutProps {
            expansion_text: record.expansion.clone(),
            absolute_score: record.score,
            is_possibly_offensive: record.possibly_offensive,
            is_hidden_by_user: record.hidden_by_user,
        });
        dict.register_new_entry(EntryKind::Shortcut, record.score)?;
    }

    Ok(())
}

fn cache_key(history: &[String], current_word: &str, flags: RequestFlags) -> String {
    format!("{}\u{1}{}\u{1}{}", history.join("\u{0}"), current_word, flags.to_bits())
}

/// A loaded session: shared trie + dictionary list under one `RwLock`, plus
/// the session-wide configuration `suggest`/`spell` read on every call.
pub struct Session {
    inner: RwLock<Inner>,
    weights: PredictionWeightsByKind,
    proximity: KeyProximityChecker,
    graphemes: Box<dyn GraphemeService>,
    primary_locale: String,
    #[allow(dead_code)]
    secondary_locales: Vec<String>,
    frequency_pooling: FrequencyPooling,
    /// Keyed on `(history, current_word, flags)`; `is_private_session`
    /// requests bypass it entirely (spec §5 resource policy).
    cache: Mutex<LruCache<String, SuggestResult>>,
}

impl Session {
    pub fn new(config: &SessionConfig) -> anyhow::Result<Self> {
        Self::with_cache_capacity(config, crate::config::Config::default().result_cache_capacity)
    }

    pub fn with_cache_capacity(config: &SessionConfig, cache_capacity: usize) -> anyhow::Result<Self> {
        let graphemes: Box<dyn GraphemeService> = Box::new(UnicodeGraphemeService);
        let mut trie = Trie::new();
        let mut dictionaries = Vec::new();

        for base in &config.base_dictionaries {
            let parsed = format::load_file(&base.path)?;
            let mut dict = Dictionary::empty(base.id, String::new(), true);
            ingest(&mut trie, &mut dict, &parsed, graphemes.as_ref(), &config.primary_locale)?;
            info!(dictionary_id = base.id, path = %base.path, words = parsed.words.len(), "loaded base dictionary");
            dictionaries.push(dict);
        }

        let mut user_dict = Dictionary::new_user();
        if let Some(path) = &config.user_dictionary {
            if Path::new(path).exists() {
                let parsed = format::load_file(path)?;
                ingest(&mut trie, &mut user_dict, &parsed, graphemes.as_ref(), &config.primary_locale)?;
                info!(path = %path, words = parsed.words.len(), "loaded user dictionary");
            }
        }
        dictionaries.push(user_dict);
        dictionaries.sort_by_key(|d| d.id);

        let capacity = NonZeroUsize::new(cache_capacity.max(1)).expect("capacity is clamped to at least 1");

        Ok(Self {
            inner: RwLock::new(Inner { trie, dictionaries }),
            weights: config.prediction_weights.clone(),
            proximity: config.key_proximity_checker.clone(),
            graphemes,
            primary_locale: config.primary_locale.clone(),
            secondary_locales: config.secondary_locales.clone(),
            frequency_pooling: config.frequency_pooling,
            cache: Mutex::new(LruCache::new(capacity)),
        })
    }

    /// Load an additional dictionary file at runtime (spec §5: a write-lock
    /// operation). `read_only` should be `false` only for the user dictionary.
    pub fn load_dictionary(&self, id: DictionaryId, path: impl AsRef<Path>, read_only: bool) -> anyhow::Result<()> {
        let parsed = format::load_file(&path)?;
        let mut guard = self.inner.write().expect("session lock poisoned");
        let Inner { trie, dictionaries } = &mut *guard;
        let mut dict = Dictionary::empty(id, String::new(), read_only);
        ingest(trie, &mut dict, &parsed, self.graphemes.as_ref(), &self.primary_locale)?;
        dictionaries.retain(|d| d.id != id);
        dictionaries.push(dict);
        dictionaries.sort_by_key(|d| d.id);
        self.cache.lock().expect("cache lock poisoned").clear();
        Ok(())
    }

    /// Recompute `dict_id`'s frequency scores (spec §4.7) and write it back
    /// out in the textual format (spec §4.2). A write-lock operation.
    #[instrument(skip(self))]
    pub fn persist_dictionary(&self, dict_id: DictionaryId, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let mut guard = self.inner.write().expect("session lock poisoned");
        let Inner { trie, dictionaries } = &mut *guard;
        let dict = dictionaries
            .iter_mut()
            .find(|d| d.id == dict_id)
            .ok_or_else(|| anyhow::anyhow!("no such dictionary {dict_id}"))?;

        let max_ngram_level = self.weights.words.max_prev_words;
        dict.recalculate_all(trie, trie.root(), max_ngram_level);

        let mut nodes = Vec::new();
        trie.for_each(trie.root(), &[], &mut |_path, node| nodes.push(node));

        let mut word_records = Vec::new();
        let mut word_id_by_text: AHashMap<String, u32> = AHashMap::new();
        for &node in &nodes {
            if let Some(word) = trie.value_or_null(node, dict.id).and_then(|v| v.word.as_ref()) {
                let text = trie.path_to(node).join("");
                let internal_id = word_records.len() as u32 + 1;
                word_id_by_text.insert(text.clone(), internal_id);
                word_records.push(WordRecord {
                    word: text,
                    score: word.absolute_score,
                    possibly_offensive: word.is_possibly_offensive,
                    hidden_by_user: word.is_hidden_by_user,
                });
            }
        }

        let mut ngram_records = Vec::new();
        for &node in &nodes {
            if let Some(ngram) = trie.value_or_null(node, dict.id).and_then(|v| v.ngram.as_ref()) {
                let path = trie.path_to(node);
                let mut ids = Vec::new();
                for segment in path.split(|g: &String| g.as_str() == NGRAM_SEP) {
                    if segment.is_empty() {
                        continue;
                    }
                    let text: String = segment.join("");
                    if text == SOS {
                        ids.push(NgramId::Special(SOS.as_bytes()[0]));
                    } else {
                        let id = *word_id_by_text
                            .get(&text)
                            .ok_or(EngineError::OutOfRange { id: 0 })?;
                        ids.push(NgramId::Word(id));
                    }
                }
                ngram_records.push(crate::format::NgramRecord {
                    ids,
                    score: ngram.absolute_score,
                });
            }
        }

        let mut shortcut_records = Vec::new();
        for &node in &nodes {
            if let Some(shortcut) = trie.value_or_null(node, dict.id).and_then(|v| v.shortcut.as_ref()) {
                let trigger = trie.path_to(node).join("");
                shortcut_records.push(crate::format::ShortcutRecord {
                    trigger,
                    expansion: shortcut.expansion_text.clone(),
                    score: shortcut.absolute_score,
                    possibly_offensive: shortcut.is_possibly_offensive,
                    hidden_by_user: shortcut.is_hidden_by_user,
                });
            }
        }

        let parsed = ParsedDictionary {
            meta: DictionaryMeta {
                name: Some(dict.name.clone()),
                display_name: Some(dict.display_name.clone()),
                locales: dict.locales.clone(),
                generated_by: Some(dict.generated_by.clone()),
                authors: dict.authors.clone(),
                license: Some(dict.license.clone()),
            },
            words: word_records,
            ngrams: ngram_records,
            shortcuts: shortcut_records,
        };

        format::save_file(path, &parsed)?;
        debug!(dictionary_id = dict_id, "persisted dictionary");
        Ok(())
    }

    /// Train the user dictionary on one recently typed sentence (spec §4.7).
    /// A write-lock operation; invalidates the result cache.
    pub fn train(&self, words: &[String]) -> anyhow::Result<()> {
        let mut guard = self.inner.write().expect("session lock poisoned");
        let Inner { trie, dictionaries } = &mut *guard;
        let user_dict = dictionaries
            .iter_mut()
            .find(|d| d.id == USER_DICTIONARY_ID)
            .expect("user dictionary is always present");
        crate::train::train(trie, user_dict, words, &self.weights, self.graphemes.as_ref(), &self.primary_locale)?;
        self.cache.lock().expect("cache lock poisoned").clear();
        Ok(())
    }

    /// `suggest` per spec §4.5. A read-lock operation; the result cache is
    /// consulted first and bypassed entirely for private sessions.
    pub fn suggest(&self, history: &[String], current_word: &str, flags: RequestFlags) -> SuggestResult {
        let key = cache_key(history, current_word, flags);
        if !flags.is_private_session {
            if let Some(hit) = self.cache.lock().expect("cache lock poisoned").get(&key) {
                return hit.clone();
            }
        }

        let guard = self.inner.read().expect("session lock poisoned");
        let ctx = PredictionContext {
            trie: &guard.trie,
            dictionaries: &guard.dictionaries,
            weights: &self.weights,
            proximity: &self.proximity,
            graphemes: self.graphemes.as_ref(),
            locale: &self.primary_locale,
            frequency_pooling: self.frequency_pooling,
        };
        let result = predict::suggest(&ctx, history, current_word, flags);
        drop(guard);

        if !flags.is_private_session {
            self.cache.lock().expect("cache lock poisoned").put(key, result.clone());
        }
        result
    }

    /// `spell` per spec §4.5/§6. A read-lock operation; never cached (spell
    /// results are a small fixed-shape bitset, not worth the cache slot).
    pub fn spell(&self, word: &str, flags: RequestFlags) -> SpellResult {
        let guard = self.inner.read().expect("session lock poisoned");
        let ctx = PredictionContext {
            trie: &guard.trie,
            dictionaries: &guard.dictionaries,
            weights: &self.weights,
            proximity: &self.proximity,
            graphemes: self.graphemes.as_ref(),
            locale: &self.primary_locale,
            frequency_pooling: self.frequency_pooling,
        };
        predict::spell(&ctx, word, flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BaseDictionaryRef;
    use crate::flags::SpellAttributes;
    use crate::format::WordRecord as FormatWordRecord;

    fn write_sample_dictionary(path: &Path) {
        let parsed = ParsedDictionary {
            meta: DictionaryMeta {
                name: Some("en-sample".into()),
                ..DictionaryMeta::default()
            },
            words: vec![
                FormatWordRecord {
                    word: "the".into(),
                    score: 1000,
                    possibly_offensive: false,
                    hidden_by_user: false,
                },
                FormatWordRecord {
                    word: "tie".into(),
                    score: 10,
                    possibly_offensive: false,
                    hidden_by_user: false,
                },
            ],
            ngrams: Vec::new(),
            shortcuts: Vec::new(),
        };
        format::save_file(path, &parsed).unwrap();
    }

    fn base_config(path: &Path) -> SessionConfig {
        SessionConfig {
            primary_locale: "en-US".into(),
            secondary_locales: Vec::new(),
            base_dictionaries: vec![BaseDictionaryRef {
                id: 1,
                path: path.to_string_lossy().into_owned(),
            }],
            user_dictionary: None,
            prediction_weights: PredictionWeightsByKind::default(),
            key_proximity_checker: KeyProximityChecker::default(),
            frequency_pooling: FrequencyPooling::Mean,
        }
    }

    #[test]
    fn session_loads_base_dictionary_and_serves_spell_and_suggest() {
        let path = std::env::temp_dir().join(format!("latin_nlp_core_test_{}.dict", std::process::id()));
        write_sample_dictionary(&path);

        let session = Session::new(&base_config(&path)).unwrap();

        let spelled = session.spell("the", RequestFlags::default());
        assert_eq!(spelled.attributes, SpellAttributes::IN_DICTIONARY.0);

        let suggestions = session.suggest(&[], "teh", RequestFlags::default());
        assert!(suggestions.iter().any(|c| c.text == "the"));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn suggest_cache_is_bypassed_for_private_sessions() {
        let path = std::env::temp_dir().join(format!("latin_nlp_core_priv_{}.dict", std::process::id()));
        write_sample_dictionary(&path);
        let session = Session::new(&base_config(&path)).unwrap();

        let private_flags = RequestFlags {
            is_private_session: true,
            ..RequestFlags::default()
        };
        session.suggest(&[], "teh", private_flags);
        assert!(session.cache.lock().unwrap().is_empty());

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn train_then_persist_round_trips_user_dictionary() {
        let path = std::env::temp_dir().join(format!("latin_nlp_core_user_{}.dict", std::process::id()));
        let config = SessionConfig {
            primary_locale: "en-US".into(),
            secondary_locales: Vec::new(),
            base_dictionaries: Vec::new(),
            user_dictionary: None,
            prediction_weights: PredictionWeightsByKind::default(),
            key_proximity_checker: KeyProximityChecker::default(),
            frequency_pooling: FrequencyPooling::Mean,
        };
        let session = Session::new(&config).unwrap();
        session.train(&["the".to_string(), "cat".to_string(), "sat".to_string()]).unwrap();
        session.persist_dictionary(USER_DICTIONARY_ID, &path).unwrap();

        let saved = std::fs::read_to_string(&path).unwrap();
        assert!(saved.contains("the\t"));
        assert!(saved.contains("[ngrams]"));

        let _ = std::fs::remove_file(&path);
    }
}
