//! Structured error surface for the dictionary/training APIs.
//!
//! `spell`/`suggest` never fail (empty input degrades to an empty/unspecified
//! result, per spec); every other mutating or file-parsing entry point
//! returns `Result<_, EngineError>`.

use thiserror::Error;

/// Fatal error kinds for dictionary loading, persistence, and training.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("could not open dictionary file {path}: {source}")]
    DictionaryFileOpen {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported schema: {schema}")]
    SchemaUnsupported { schema: String },

    #[error("unsupported encoding: {encoding} (only \"utf-8\" is accepted)")]
    EncodingUnsupported { encoding: String },

    #[error("malformed line {line}: {reason}")]
    MalformedLine { line: usize, reason: String },

    #[error("unknown section [{name}] at line {line}")]
    UnknownSection { name: String, line: usize },

    #[error("mutation attempted on read-only dictionary {dictionary_id}")]
    MutationOnReadOnly { dictionary_id: u32 },

    #[error("id {id} does not refer to an existing word record")]
    OutOfRange { id: i64 },
}

pub type Result<T> = std::result::Result<T, EngineError>;
