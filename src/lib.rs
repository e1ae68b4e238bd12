//! Hanzi, pinyin and English dictionary search.
//!
//! Dictionaries load from XML word lists or a versioned binary container into
//! a [`DictionarySnapshot`]: one string arena plus plain records holding
//! offsets into it. Queries are scored against the headword, pronunciations
//! and translations of every record by a fixed worker pool
//! ([`SearchService`]) or on the calling thread ([`search_snapshot`]).

pub mod arena;
pub mod cancel;
pub mod codec;
pub mod config;
pub mod data;
pub mod error;
pub mod index;
#[cfg(feature = "cli")]
pub mod logging;
pub mod matcher;
pub mod query;
pub mod scheduler;
pub mod snapshot;
pub mod storage;
pub mod text;
pub mod thumb;

pub use arena::{DictionaryBuilder, MeaningDraft, StringArena, WordDraft};
pub use cancel::{CancelToken, Outcome};
pub use codec::{BinaryWriter, DictionaryLoader, DictionarySource, FormatVersion, LoadTask};
pub use config::{AppConfig, LoadConfig, SearchConfig};
pub use data::{IndexedWordEntry, Meaning, MeaningGroup, StringList, StringSlice, WordRecord};
pub use error::{DictError, Result};
pub use index::TranslationIndex;
pub use matcher::{MatchSpan, Pattern, SearchFlags, find_direct};
pub use query::SearchQuery;
pub use scheduler::{
    ResultSlot, SearchHit, SearchResults, SearchService, SessionState, rank_hits, search_snapshot,
};
pub use snapshot::{DictionarySnapshot, MeaningRef, SharedDictionary, WordRef};
pub use storage::{FsStorage, MemoryStorage, Storage};
