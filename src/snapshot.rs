//! Immutable, fully built dictionaries and the handle that publishes them.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::arena::{DictionaryBuilder, StringArena, WordDraft, unpack_record};
use crate::data::{Meaning, StringList, StringSlice, WordRecord};
use crate::error::{DictError, Result};
use crate::index::TranslationIndex;
use crate::matcher::{SearchFlags, find_direct};

/// Arena, records and meanings of one completed load.
#[derive(Debug, Default)]
pub struct DictionarySnapshot {
    arena: StringArena,
    slices: Vec<StringSlice>,
    meanings: Vec<Meaning>,
    records: Vec<WordRecord>,
    index: Option<TranslationIndex>,
}

impl DictionarySnapshot {
    pub fn from_builder(builder: DictionaryBuilder, index: Option<TranslationIndex>) -> Self {
        let DictionaryBuilder {
            arena,
            slices,
            meanings,
            records,
        } = builder;
        Self {
            arena,
            slices,
            meanings,
            records,
            index,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn arena(&self) -> &StringArena {
        &self.arena
    }

    pub fn records(&self) -> &[WordRecord] {
        &self.records
    }

    pub fn meaning_count(&self) -> usize {
        self.meanings.len()
    }

    pub fn string_count(&self) -> usize {
        self.slices.len()
    }

    pub fn index(&self) -> Option<&TranslationIndex> {
        self.index.as_ref()
    }

    pub fn string(&self, slice: StringSlice) -> &str {
        self.arena.get(slice)
    }

    pub(crate) fn slices(&self) -> &[StringSlice] {
        &self.slices
    }

    pub(crate) fn list(&self, list: StringList) -> &[StringSlice] {
        &self.slices[list.range()]
    }

    pub fn word(&self, index: usize) -> Option<WordRef<'_>> {
        self.records.get(index).map(|record| WordRef {
            snapshot: self,
            index,
            record,
        })
    }

    pub fn words(&self) -> impl Iterator<Item = WordRef<'_>> + '_ {
        self.records
            .iter()
            .enumerate()
            .map(move |(index, record)| WordRef {
                snapshot: self,
                index,
                record,
            })
    }

    pub(crate) fn draft(&self, index: usize) -> Option<WordDraft<&str>> {
        let record = self.records.get(index)?;
        Some(unpack_record(&self.arena, &self.slices, &self.meanings, record))
    }

    /// Finds a word by headword, falling back to traditional spellings.
    pub fn find(&self, text: &str) -> Option<WordRef<'_>> {
        let first = self
            .records
            .partition_point(|record| self.arena.get(record.headword) < text);
        if self
            .records
            .get(first)
            .is_some_and(|record| self.arena.get(record.headword) == text)
        {
            return self.word(first);
        }
        self.records
            .iter()
            .position(|record| !record.traditional.is_empty() && self.arena.get(record.traditional) == text)
            .and_then(|index| self.word(index))
    }

    /// Words whose headword contains, or is contained in, the headword of
    /// record `index`, in dictionary order.
    pub fn similar_words(&self, index: usize) -> Vec<WordRef<'_>> {
        let Some(target) = self.word(index) else {
            return Vec::new();
        };
        let headword = target.headword();
        self.words()
            .filter(|word| word.index() != index)
            .filter(|word| {
                let other = word.headword();
                find_direct(other, headword, SearchFlags::NONE).is_found()
                    || find_direct(headword, other, SearchFlags::NONE).is_found()
            })
            .collect()
    }

    /// Records whose stored previews differ from freshly built ones.
    pub fn stale_thumbs(&self) -> Vec<usize> {
        self.words()
            .filter(|word| {
                let Some(draft) = self.draft(word.index()) else {
                    return false;
                };
                draft.build_pronunciation_thumb() != word.thumb_pronunciation()
                    || draft.build_translation_thumb() != word.thumb_translation()
            })
            .map(|word| word.index())
            .collect()
    }

    pub fn is_sorted(&self) -> bool {
        self.records.windows(2).all(|pair| {
            let a = (self.string(pair[0].headword), self.string(pair[0].traditional));
            let b = (self.string(pair[1].headword), self.string(pair[1].traditional));
            a <= b
        })
    }
}

/// Borrowed view of one record.
#[derive(Clone, Copy)]
pub struct WordRef<'a> {
    snapshot: &'a DictionarySnapshot,
    index: usize,
    record: &'a WordRecord,
}

impl<'a> WordRef<'a> {
    /// Position in the sorted record array.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn record(&self) -> &'a WordRecord {
        self.record
    }

    pub fn headword(&self) -> &'a str {
        self.snapshot.string(self.record.headword)
    }

    pub fn traditional(&self) -> &'a str {
        self.snapshot.string(self.record.traditional)
    }

    pub fn radicals(&self) -> &'a str {
        self.snapshot.string(self.record.radicals)
    }

    pub fn link(&self) -> &'a str {
        self.snapshot.string(self.record.link)
    }

    pub fn thumb_pronunciation(&self) -> &'a str {
        self.snapshot.string(self.record.thumb_pronunciation)
    }

    pub fn thumb_translation(&self) -> &'a str {
        self.snapshot.string(self.record.thumb_translation)
    }

    pub fn letter_mask(&self) -> u64 {
        self.record.letter_mask
    }

    /// Resolves one of this word's slices.
    pub fn text(&self, slice: StringSlice) -> &'a str {
        self.snapshot.string(slice)
    }

    pub fn pronunciation_slices(&self) -> &'a [StringSlice] {
        self.snapshot.list(self.record.pronunciations)
    }

    pub fn translation_slices(&self) -> &'a [StringSlice] {
        self.snapshot.list(self.record.translations)
    }

    pub fn pronunciations(&self) -> impl Iterator<Item = &'a str> + use<'a> {
        string_iter(self.snapshot, self.record.pronunciations)
    }

    pub fn translations(&self) -> impl Iterator<Item = &'a str> + use<'a> {
        string_iter(self.snapshot, self.record.translations)
    }

    pub fn tags(&self) -> impl Iterator<Item = &'a str> + use<'a> {
        string_iter(self.snapshot, self.record.tags)
    }

    pub fn meanings(&self) -> MeaningIter<'a> {
        MeaningIter {
            snapshot: self.snapshot,
            meanings: &self.snapshot.meanings[self.record.meanings.range()],
            index: 0,
        }
    }
}

impl std::fmt::Debug for WordRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WordRef")
            .field("index", &self.index)
            .field("headword", &self.headword())
            .field("traditional", &self.traditional())
            .finish()
    }
}

pub struct MeaningIter<'a> {
    snapshot: &'a DictionarySnapshot,
    meanings: &'a [Meaning],
    index: usize,
}

impl<'a> Iterator for MeaningIter<'a> {
    type Item = MeaningRef<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let meaning = self.meanings.get(self.index)?;
        self.index += 1;
        Some(MeaningRef {
            snapshot: self.snapshot,
            meaning,
        })
    }
}

pub struct MeaningRef<'a> {
    snapshot: &'a DictionarySnapshot,
    meaning: &'a Meaning,
}

impl<'a> MeaningRef<'a> {
    pub fn pronunciations(&self) -> impl Iterator<Item = &'a str> + use<'a> {
        string_iter(self.snapshot, self.meaning.pronunciations)
    }

    pub fn translations(&self) -> impl Iterator<Item = &'a str> + use<'a> {
        string_iter(self.snapshot, self.meaning.translations)
    }
}

fn string_iter(snapshot: &DictionarySnapshot, list: StringList) -> impl Iterator<Item = &str> + '_ {
    snapshot
        .list(list)
        .iter()
        .map(move |slice| snapshot.string(*slice))
}

/// The currently published dictionary. Searches clone the inner `Arc` and
/// keep using it while a reload installs a replacement.
#[derive(Clone, Default)]
pub struct SharedDictionary {
    current: Arc<RwLock<Option<Arc<DictionarySnapshot>>>>,
}

impl SharedDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: DictionarySnapshot) -> Self {
        let shared = Self::new();
        shared.install(Arc::new(snapshot));
        shared
    }

    pub fn current(&self) -> Option<Arc<DictionarySnapshot>> {
        self.current.read().clone()
    }

    pub fn require(&self) -> Result<Arc<DictionarySnapshot>> {
        self.current().ok_or(DictError::NoDictionary)
    }

    /// Publishes a snapshot and returns the one it replaced.
    pub fn install(&self, snapshot: Arc<DictionarySnapshot>) -> Option<Arc<DictionarySnapshot>> {
        self.current.write().replace(snapshot)
    }
}
