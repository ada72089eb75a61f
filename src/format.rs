//! Textual dictionary file format: parse and emit (spec §4.2).
//!
//! This module is a pure `&str` <-> structured-record translation with no
//! knowledge of the trie or live bookkeeping, the same split the teacher
//! uses between a core (de)serialize routine and a thin path-based
//! convenience wrapper (`NGramModel::save_bincode`/`load_bincode`,
//! `WordBigram::load`/`save` in `core/src/ngram.rs` and
//! `core/src/word_bigram.rs`). Turning a `ParsedDictionary` into trie nodes
//! (and back) is `Session`'s job (spec §4.3).

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::error::{EngineError, Result};

/// The single schema version this crate accepts (spec §3 inv. 5, §6).
pub const SUPPORTED_SCHEMA: &str = "urn:latin-nlp-core:dictionary:v1";
pub const SUPPORTED_ENCODING: &str = "utf-8";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DictionaryMeta {
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub locales: Vec<String>,
    pub generated_by: Option<String>,
    pub authors: Vec<String>,
    pub license: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordRecord {
    pub word: String,
    pub score: u32,
    pub possibly_offensive: bool,
    pub hidden_by_user: bool,
}

/// An id referencing either a `[words]` record (`Word(1-based index)`) or a
/// special single-byte token (`Special(byte value)`, e.g. `SOS` is `-2`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NgramId {
    Word(u32),
    Special(u8),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NgramRecord {
    pub ids: Vec<NgramId>,
    pub score: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortcutRecord {
    pub trigger: String,
    pub expansion: String,
    pub score: u32,
    pub possibly_offensive: bool,
    pub hidden_by_user: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedDictionary {
    pub meta: DictionaryMeta,
    pub words: Vec<WordRecord>,
    pub ngrams: Vec<NgramRecord>,
    pub shortcuts: Vec<ShortcutRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Meta,
    Words,
    Ngrams,
    Shortcuts,
}

impl Section {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "meta" => Some(Section::Meta),
            "words" => Some(Section::Words),
            "ngrams" => Some(Section::Ngrams),
            "shortcuts" => Some(Section::Shortcuts),
            _ => None,
        }
    }
}

fn malformed(line: usize, reason: impl Into<String>) -> EngineError {
    EngineError::MalformedLine {
        line,
        reason: reason.into(),
    }
}

fn parse_u32_field(line: usize, field: &str) -> Result<u32> {
    field
        .parse::<u32>()
        .map_err(|_| malformed(line, format!("expected a non-negative 32-bit integer, got {field:?}")))
}

/// Parse a `"..."` quoted string, returning its inner content.
fn parse_quoted(line: usize, field: &str) -> Result<String> {
    let field = field.trim();
    if field.len() >= 2 && field.starts_with('"') && field.ends_with('"') {
        Ok(field[1..field.len() - 1].to_string())
    } else {
        Err(malformed(line, format!("expected a quoted string, got {field:?}")))
    }
}

/// Parse a `[ "...", "..." ]` bracketed, comma-separated list of quoted
/// strings.
fn parse_quoted_list(line: usize, field: &str) -> Result<Vec<String>> {
    let field = field.trim();
    if !(field.starts_with('[') && field.ends_with(']')) {
        return Err(malformed(line, format!("expected a bracketed list, got {field:?}")));
    }
    let inner = &field[1..field.len() - 1];
    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }
    inner
        .split(',')
        .map(|item| parse_quoted(line, item.trim()))
        .collect()
}

fn quote(s: &str) -> String {
    format!("\"{s}\"")
}

fn quote_list(items: &[String]) -> String {
    let inner: Vec<String> = items.iter().map(|s| quote(s)).collect();
    format!("[{}]", inner.join(", "))
}

impl ParsedDictionary {
    pub fn parse(text: &str) -> Result<Self> {
        let mut schema: Option<String> = None;
        let mut encoding: Option<String> = None;
        let mut meta = DictionaryMeta::default();
        let mut words = Vec::new();
        let mut ngrams = Vec::new();
        let mut shortcuts = Vec::new();

        let mut in_preamble = true;
        let mut current: Option<Section> = None;
        let mut seen_sections: Vec<Section> = Vec::new();

        for (idx, raw_line) in text.lines().enumerate() {
            let line_no = idx + 1;
            // tolerate CRLF: `str::lines` already splits on both "\n" and
            // "\r\n", stripping the trailing "\r" for us.
            let line = raw_line.trim_end();
            let trimmed = line.trim_start();

            if trimmed.is_empty() {
                continue;
            }

            if trimmed.starts_with('[') {
                let close = trimmed
                    .find(']')
                    .ok_or_else(|| malformed(line_no, "unterminated section header"))?;
                let name = &trimmed[1..close];
                let section = Section::from_name(name).ok_or_else(|| EngineError::UnknownSection {
                    name: name.to_string(),
                    line: line_no,
                })?;
                if seen_sections.contains(&section) {
                    return Err(malformed(line_no, format!("section [{name}] appears more than once")));
                }
                seen_sections.push(section);
                current = Some(section);
                in_preamble = false;
                continue;
            }

            if in_preamble {
                if let Some(rest) = trimmed.strip_prefix("#~") {
                    if let Some((key, value)) = rest.split_once(':') {
                        match key.trim() {
                            "schema" => schema = Some(value.trim().to_string()),
                            "encoding" => encoding = Some(value.trim().to_string()),
                            _ => {}
                        }
                    }
                }
                // Any other preamble line (including unrecognized directives
                // and plain comments) is ignored per spec §4.2.
                continue;
            }

            match current {
                None => return Err(malformed(line_no, "content line before any section header")),
                Some(Section::Meta) => {
                    if trimmed.starts_with('#') {
                        continue;
                    }
                    let (key, value) = trimmed
                        .split_once('=')
                        .ok_or_else(|| malformed(line_no, "expected key=value"))?;
                    match key.trim() {
                        "name" => meta.name = Some(parse_quoted(line_no, value)?),
                        "display_name" => meta.display_name = Some(parse_quoted(line_no, value)?),
                        "locales" => meta.locales = parse_quoted_list(line_no, value)?,
                        "generated_by" => meta.generated_by = Some(parse_quoted(line_no, value)?),
                        "authors" => meta.authors = parse_quoted_list(line_no, value)?,
                        "license" => meta.license = Some(parse_quoted(line_no, value)?),
                        _ => {} // unknown meta keys are silently ignored
                    }
                }
                Some(Section::Words) => {
                    let fields: Vec<&str> = trimmed.split('\t').collect();
                    if fields.len() < 2 {
                        return Err(malformed(line_no, "expected word\\tscore[\\tflags]"));
                    }
                    let score = parse_u32_field(line_no, fields[1])?;
                    let flags = fields.get(2).copied().unwrap_or("");
                    words.push(WordRecord {
                        word: fields[0].to_string(),
                        score,
                        possibly_offensive: flags.contains('p'),
                        hidden_by_user: flags.contains('h'),
                    });
                }
                Some(Section::Ngrams) => {
                    let fields: Vec<&str> = trimmed.split('\t').collect();
                    if fields.len() < 2 {
                        return Err(malformed(line_no, "expected id,id,...\\tscore"));
                    }
                    let score = parse_u32_field(line_no, fields[1])?;
                    let mut ids = Vec::new();
                    for raw_id in fields[0].split(',') {
                        let raw_id = raw_id.trim();
                        let parsed: i64 = raw_id
                            .parse()
                            .map_err(|_| malformed(line_no, format!("bad n-gram id {raw_id:?}")))?;
                        let id = if parsed < 0 {
                            let byte = (-parsed)
                                .try_into()
                                .map_err(|_| malformed(line_no, format!("n-gram id {parsed} out of byte range")))?;
                            NgramId::Special(byte)
                        } else {
                            let word_id: u32 = parsed
                                .try_into()
                                .map_err(|_| malformed(line_no, format!("n-gram id {parsed} out of range")))?;
                            NgramId::Word(word_id)
                        };
                        ids.push(id);
                    }
                    if ids.len() < 2 {
                        return Err(malformed(line_no, "n-gram chain must have at least 2 ids"));
                    }
                    ngrams.push(NgramRecord { ids, score });
                }
                Some(Section::Shortcuts) => {
                    let fields: Vec<&str> = trimmed.split('\t').collect();
                    if fields.len() < 3 {
                        return Err(malformed(line_no, "expected trigger\\texpansion\\tscore[\\tflags]"));
                    }
                    let score = parse_u32_field(line_no, fields[2])?;
                    let flags = fields.get(3).copied().unwrap_or("");
                    shortcuts.push(ShortcutRecord {
                        trigger: fields[0].to_string(),
                        expansion: fields[1].to_string(),
                        score,
                        possibly_offensive: flags.contains('p'),
                        hidden_by_user: flags.contains('h'),
                    });
                }
            }
        }

        let schema = schema.unwrap_or_default();
        if schema != SUPPORTED_SCHEMA {
            return Err(EngineError::SchemaUnsupported { schema });
        }
        let encoding = encoding.unwrap_or_default();
        if encoding != SUPPORTED_ENCODING {
            return Err(EngineError::EncodingUnsupported { encoding });
        }

        Ok(ParsedDictionary {
            meta,
            words,
            ngrams,
            shortcuts,
        })
    }

    /// Emit the textual format. `[ngrams]` whose ids are all
    /// `NgramId::Special` are skipped (spec §4.2: "never emitted on write").
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "#~schema:{SUPPORTED_SCHEMA}");
        let _ = writeln!(out, "#~encoding:{SUPPORTED_ENCODING}");

        let _ = writeln!(out, "[meta]");
        if let Some(name) = &self.meta.name {
            let _ = writeln!(out, "name={}", quote(name));
        }
        if let Some(display_name) = &self.meta.display_name {
            let _ = writeln!(out, "display_name={}", quote(display_name));
        }
        if !self.meta.locales.is_empty() {
            let _ = writeln!(out, "locales={}", quote_list(&self.meta.locales));
        }
        if let Some(generated_by) = &self.meta.generated_by {
            let _ = writeln!(out, "generated_by={}", quote(generated_by));
        }
        if !self.meta.authors.is_empty() {
            let _ = writeln!(out, "authors={}", quote_list(&self.meta.authors));
        }
        if let Some(license) = &self.meta.license {
            let _ = writeln!(out, "license={}", quote(license));
        }

        let _ = writeln!(out, "[words]");
        for w in &self.words {
            let mut flags = String::new();
            if w.possibly_offensive {
                flags.push('p');
            }
            if w.hidden_by_user {
                flags.push('h');
            }
            if flags.is_empty() {
                let _ = writeln!(out, "{}\t{}", w.word, w.score);
            } else {
                let _ = writeln!(out, "{}\t{}\t{}", w.word, w.score, flags);
            }
        }

        let emittable_ngrams: Vec<&NgramRecord> = self
            .ngrams
            .iter()
            .filter(|n| n.ids.iter().any(|id| matches!(id, NgramId::Word(_))))
            .collect();
        if !emittable_ngrams.is_empty() {
            let _ = writeln!(out, "[ngrams]");
            for n in emittable_ngrams {
                let ids: Vec<String> = n
                    .ids
                    .iter()
                    .map(|id| match id {
                        NgramId::Word(w) => w.to_string(),
                        NgramId::Special(b) => format!("-{b}"),
                    })
                    .collect();
                let _ = writeln!(out, "{}\t{}", ids.join(","), n.score);
            }
        }

        if !self.shortcuts.is_empty() {
            let _ = writeln!(out, "[shortcuts]");
            for s in &self.shortcuts {
                let mut flags = String::new();
                if s.possibly_offensive {
                    flags.push('p');
                }
                if s.hidden_by_user {
                    flags.push('h');
                }
                if flags.is_empty() {
                    let _ = writeln!(out, "{}\t{}\t{}", s.trigger, s.expansion, s.score);
                } else {
                    let _ = writeln!(out, "{}\t{}\t{}\t{}", s.trigger, s.expansion, s.score, flags);
                }
            }
        }

        out
    }
}

/// Thin path-based convenience wrapper around [`ParsedDictionary::parse`],
/// mirroring the teacher's `File`+`BufReader` wrappers around a pure
/// (de)serialize routine.
pub fn load_file(path: impl AsRef<Path>) -> anyhow::Result<ParsedDictionary> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| EngineError::DictionaryFileOpen {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(ParsedDictionary::parse(&text)?)
}

pub fn save_file(path: impl AsRef<Path>, dict: &ParsedDictionary) -> anyhow::Result<()> {
    let path = path.as_ref();
    fs::write(path, dict.serialize()).map_err(|e| EngineError::DictionaryFileOpen {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> String {
        format!(
            "#~schema:{SUPPORTED_SCHEMA}\n#~encoding:utf-8\n[meta]\nname=\"demo\"\nlocales=[\"en-US\"]\n[words]\nthe\t1000\ntie\t10\ndamn\t800\tp\n[ngrams]\n1,2\t50\n-2,1\t5\n[shortcuts]\nomw\ton my way\t20\n"
        )
    }

    #[test]
    fn parses_full_sample() {
        let parsed = ParsedDictionary::parse(&sample()).unwrap();
        assert_eq!(parsed.meta.name.as_deref(), Some("demo"));
        assert_eq!(parsed.meta.locales, vec!["en-US".to_string()]);
        assert_eq!(parsed.words.len(), 3);
        assert_eq!(parsed.words[0].word, "the");
        assert_eq!(parsed.words[0].score, 1000);
        assert!(parsed.words[2].possibly_offensive);
        assert_eq!(parsed.ngrams.len(), 2);
        assert_eq!(parsed.ngrams[1].ids[0], NgramId::Special(2));
        assert_eq!(parsed.shortcuts[0].trigger, "omw");
    }

    #[test]
    fn tolerates_crlf_line_endings() {
        let text = sample().replace('\n', "\r\n");
        let parsed = ParsedDictionary::parse(&text).unwrap();
        assert_eq!(parsed.words.len(), 3);
    }

    #[test]
    fn rejects_unsupported_schema() {
        let text = sample().replace(SUPPORTED_SCHEMA, "urn:other:v9");
        let err = ParsedDictionary::parse(&text).unwrap_err();
        assert!(matches!(err, EngineError::SchemaUnsupported { .. }));
    }

    #[test]
    fn rejects_unsupported_encoding() {
        let text = sample().replace("utf-8", "latin1");
        let err = ParsedDictionary::parse(&text).unwrap_err();
        assert!(matches!(err, EngineError::EncodingUnsupported { .. }));
    }

    #[test]
    fn rejects_unknown_section() {
        let text = sample().replace("[shortcuts]", "[bogus]");
        let err = ParsedDictionary::parse(&text).unwrap_err();
        assert!(matches!(err, EngineError::UnknownSection { .. }));
    }

    #[test]
    fn rejects_out_of_range_score() {
        let text = sample().replace("the\t1000", "the\t99999999999999");
        let err = ParsedDictionary::parse(&text).unwrap_err();
        assert!(matches!(err, EngineError::MalformedLine { .. }));
    }

    #[test]
    fn round_trips_through_serialize() {
        let parsed = ParsedDictionary::parse(&sample()).unwrap();
        let rendered = parsed.serialize();
        let reparsed = ParsedDictionary::parse(&rendered).unwrap();
        assert_eq!(parsed.words, reparsed.words);
        assert_eq!(parsed.shortcuts, reparsed.shortcuts);
    }

    #[test]
    fn all_negative_ngram_is_not_emitted() {
        let mut parsed = ParsedDictionary::parse(&sample()).unwrap();
        parsed.ngrams.push(NgramRecord {
            ids: vec![NgramId::Special(2), NgramId::Special(3)],
            score: 1,
        });
        let rendered = parsed.serialize();
        assert_eq!(rendered.matches("[ngrams]").count(), 1);
        // 2 ngrams existed, but the all-special one must not appear as a line
        let ngram_section = rendered.split("[ngrams]").nth(1).unwrap();
        let ngram_lines: Vec<&str> = ngram_section
            .split("[shortcuts]")
            .next()
            .unwrap()
            .lines()
            .filter(|l| !l.trim().is_empty())
            .collect();
        assert_eq!(ngram_lines.len(), 2);
    }
}
