//! Inverted index from normalized translation words to record positions.

use crate::arena::{DictionaryBuilder, StringArena};
use crate::data::{IndexedWordEntry, StringSlice, WordRecord};
use crate::error::{DictError, Result};
use crate::text::{is_blank, letter_mask, strip_accents};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslationIndex {
    entries: Vec<IndexedWordEntry>,
    matches: Vec<u32>,
    offsets: Vec<usize>,
}

/// Splits a translation on blank characters, the same classification the
/// matcher uses to skip punctuation.
pub fn split_words(text: &str) -> impl Iterator<Item = &str> {
    text.split(is_blank).filter(|word| !word.is_empty())
}

/// Lower-cased, accent-free form of an index word.
pub fn normalize_word(word: &str) -> String {
    strip_accents(&word.to_lowercase())
}

/// Distinct normalized words with their match counts, and the flat array of
/// record positions, ordered by word then position.
pub(crate) fn collect_words(
    arena: &StringArena,
    slices: &[StringSlice],
    records: &[WordRecord],
) -> Result<(Vec<(String, u32)>, Vec<u32>)> {
    let mut occurrences: Vec<(String, u32)> = Vec::new();
    for (position, record) in records.iter().enumerate() {
        let position = u32::try_from(position)
            .map_err(|_| DictError::InvalidFormat("too many records to index".to_string()))?;
        for slice in &slices[record.translations.range()] {
            for word in split_words(arena.get(*slice)) {
                occurrences.push((normalize_word(word), position));
            }
        }
    }
    occurrences.sort_unstable();
    occurrences.dedup();

    let mut words: Vec<(String, u32)> = Vec::new();
    let mut matches = Vec::with_capacity(occurrences.len());
    for (word, position) in occurrences {
        match words.last_mut() {
            Some((last, count)) if *last == word => *count += 1,
            _ => words.push((word, 1)),
        }
        matches.push(position);
    }
    Ok((words, matches))
}

impl TranslationIndex {
    /// Indexes every translation word of `builder` and appends the distinct
    /// words to its arena. Records must already be in their final order.
    pub fn build(builder: &mut DictionaryBuilder) -> Result<Self> {
        let (words, matches) = collect_words(&builder.arena, &builder.slices, &builder.records)?;
        let words = words
            .iter()
            .map(|(word, count)| (word.as_str(), letter_mask([word.as_str()]), *count));
        Self::from_parts(&mut builder.arena, words, matches)
    }

    /// Assembles an index from `(word, letter mask, match count)` triples and
    /// the flat match array, appending the words to `arena`.
    pub fn from_parts<'a, I>(arena: &mut StringArena, words: I, matches: Vec<u32>) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, u64, u32)>,
    {
        let mut entries = Vec::new();
        let mut offsets = Vec::new();
        let mut next = 0usize;
        for (word, letter_mask, match_count) in words {
            entries.push(IndexedWordEntry {
                word: arena.push(word)?,
                letter_mask,
                match_count,
            });
            offsets.push(next);
            next += match_count as usize;
        }
        if next != matches.len() {
            return Err(DictError::InvalidFormat(format!(
                "index words reference {next} matches but {} are stored",
                matches.len()
            )));
        }
        Ok(Self {
            entries,
            matches,
            offsets,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[IndexedWordEntry] {
        &self.entries
    }

    /// Flat record positions; entry `i` owns `match_count` consecutive values.
    pub fn matches(&self) -> &[u32] {
        &self.matches
    }

    /// Record positions for the entry at `entry`.
    pub fn positions(&self, entry: usize) -> &[u32] {
        match (self.entries.get(entry), self.offsets.get(entry)) {
            (Some(found), Some(&start)) => &self.matches[start..start + found.match_count as usize],
            _ => &[],
        }
    }

    /// Records whose translations contain `word`, ignoring case and accents.
    pub fn lookup(&self, arena: &StringArena, word: &str) -> &[u32] {
        let needle = normalize_word(word);
        self.entries
            .binary_search_by(|entry| arena.get(entry.word).cmp(needle.as_str()))
            .map(|entry| self.positions(entry))
            .unwrap_or_default()
    }

    /// Entry indices ordered by descending match count.
    pub fn most_popular(&self, limit: usize) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.entries.len()).collect();
        order.sort_by(|&a, &b| {
            self.entries[b]
                .match_count
                .cmp(&self.entries[a].match_count)
                .then(a.cmp(&b))
        });
        order.truncate(limit);
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::{MeaningDraft, WordDraft};

    fn add(builder: &mut DictionaryBuilder, headword: &str, translations: &[&str]) {
        let draft = WordDraft {
            headword: headword.to_string(),
            meanings: vec![MeaningDraft {
                pronunciations: vec![],
                translations: translations.iter().map(|t| t.to_string()).collect(),
            }],
            ..WordDraft::default()
        };
        builder.add_word(&draft, false).unwrap();
    }

    fn sample() -> (DictionaryBuilder, TranslationIndex) {
        let mut builder = DictionaryBuilder::new();
        add(&mut builder, "吃", &["to eat", "to eat (a meal)"]);
        add(&mut builder, "咖啡", &["Café, coffee"]);
        add(&mut builder, "食", &["to eat", "food"]);
        let index = TranslationIndex::build(&mut builder).unwrap();
        (builder, index)
    }

    #[test]
    fn splits_on_blank_characters() {
        let words: Vec<_> = split_words("to eat (a meal), quickly.").collect();
        assert_eq!(words, vec!["to", "eat", "a", "meal", "quickly"]);
        assert_eq!(split_words(" ,. ").count(), 0);
    }

    #[test]
    fn deduplicates_by_word_and_record() {
        let (builder, index) = sample();
        let words: Vec<_> = index
            .entries()
            .iter()
            .map(|entry| builder.arena().get(entry.word))
            .collect();
        assert_eq!(words, vec!["a", "cafe", "coffee", "eat", "food", "meal", "to"]);

        let counts: Vec<_> = index.entries().iter().map(|entry| entry.match_count).collect();
        assert_eq!(counts, vec![1, 1, 1, 2, 1, 1, 2]);
        assert_eq!(index.matches().len(), 9);
        assert_eq!(index.positions(3), &[0, 2]);
    }

    #[test]
    fn lookup_normalizes_the_query() {
        let (builder, index) = sample();
        assert_eq!(index.lookup(builder.arena(), "EAT"), &[0, 2]);
        assert_eq!(index.lookup(builder.arena(), "café"), &[1]);
        assert!(index.lookup(builder.arena(), "drink").is_empty());
    }

    #[test]
    fn entry_masks_cover_their_letters() {
        let (builder, index) = sample();
        let food = index
            .entries()
            .iter()
            .find(|entry| builder.arena().get(entry.word) == "food")
            .unwrap();
        assert_eq!(food.letter_mask, letter_mask(["fod"]));
    }

    #[test]
    fn most_popular_orders_by_count() {
        let (builder, index) = sample();
        let top: Vec<_> = index
            .most_popular(2)
            .into_iter()
            .map(|entry| builder.arena().get(index.entries()[entry].word))
            .collect();
        assert_eq!(top, vec!["eat", "to"]);
    }

    #[test]
    fn mismatched_match_count_is_rejected() {
        let mut arena = StringArena::new();
        let result = TranslationIndex::from_parts(&mut arena, [("eat", 0, 3)], vec![0, 1]);
        assert!(matches!(result, Err(DictError::InvalidFormat(_))));
    }
}
