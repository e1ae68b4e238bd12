//! The append-only string arena and the builder load jobs fill.

use crate::data::{Meaning, MeaningGroup, StringList, StringSlice, WordRecord};
use crate::error::{DictError, Result};
use crate::text::{display_length, letter_mask};
use crate::thumb::build_thumb;

/// Backing store for every string of a dictionary.
#[derive(Debug, Default, Clone)]
pub struct StringArena {
    text: String,
}

impl StringArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            text: String::with_capacity(bytes),
        }
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Resolves a slice. Slices handed out by this arena always fall on
    /// character boundaries.
    pub fn get(&self, slice: StringSlice) -> &str {
        let start = slice.offset as usize;
        self.text.get(start..slice.end()).unwrap_or_default()
    }

    pub fn push(&mut self, value: &str) -> Result<StringSlice> {
        if value.is_empty() {
            return Ok(StringSlice::EMPTY);
        }
        let length = u16::try_from(value.len()).map_err(|_| DictError::FieldTooLong {
            field: "string bytes",
            length: value.len(),
            max: u16::MAX as usize,
        })?;
        let offset = self.offset()?;
        self.text.push_str(value);
        // display length never exceeds the byte length
        Ok(StringSlice::new(offset, length, display_length(value) as u16))
    }

    /// Appends another arena and returns the offset its slices must be shifted by.
    pub fn append(&mut self, other: &StringArena) -> Result<u32> {
        let delta = self.offset()?;
        if self.text.len() + other.text.len() > u32::MAX as usize {
            return Err(DictError::InvalidFormat(
                "string arena exceeds 4 GiB".to_string(),
            ));
        }
        self.text.push_str(&other.text);
        Ok(delta)
    }

    fn offset(&self) -> Result<u32> {
        u32::try_from(self.text.len())
            .map_err(|_| DictError::InvalidFormat("string arena exceeds 4 GiB".to_string()))
    }
}

/// Owned or borrowed description of one word, before it is packed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WordDraft<S = String> {
    pub headword: S,
    pub traditional: S,
    pub radicals: S,
    pub link: S,
    pub thumb_pronunciation: S,
    pub thumb_translation: S,
    pub meanings: Vec<MeaningDraft<S>>,
    pub tags: Vec<S>,
    /// Stored mask; recomputed from the pronunciations when absent.
    pub letter_mask: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MeaningDraft<S = String> {
    pub pronunciations: Vec<S>,
    pub translations: Vec<S>,
}

impl<S: AsRef<str>> WordDraft<S> {
    pub fn all_pronunciations(&self) -> impl Iterator<Item = &str> {
        self.meanings
            .iter()
            .flat_map(|meaning| meaning.pronunciations.iter().map(AsRef::as_ref))
    }

    /// Preview built from every pronunciation of every meaning.
    pub fn build_pronunciation_thumb(&self) -> String {
        build_thumb(self.all_pronunciations())
    }

    /// Preview built from the translations of the first meaning only.
    pub fn build_translation_thumb(&self) -> String {
        match self.meanings.first() {
            Some(first) => build_thumb(first.translations.iter().map(AsRef::as_ref)),
            None => String::new(),
        }
    }
}

/// Arena, flat slice array, flat meaning array and records of one load job,
/// or of a whole dictionary once jobs are merged.
#[derive(Debug, Default, Clone)]
pub struct DictionaryBuilder {
    pub(crate) arena: StringArena,
    pub(crate) slices: Vec<StringSlice>,
    pub(crate) meanings: Vec<Meaning>,
    pub(crate) records: Vec<WordRecord>,
}

impl DictionaryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(records: usize, arena_bytes: usize) -> Self {
        Self {
            arena: StringArena::with_capacity(arena_bytes),
            slices: Vec::with_capacity(records * 4),
            meanings: Vec::with_capacity(records * 2),
            records: Vec::with_capacity(records),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[WordRecord] {
        &self.records
    }

    pub fn arena(&self) -> &StringArena {
        &self.arena
    }

    /// Packs one word. Empty previews are regenerated when `build_thumbs` is set.
    pub fn add_word<S: AsRef<str>>(&mut self, draft: &WordDraft<S>, build_thumbs: bool) -> Result<()> {
        let meaning_count = u8::try_from(draft.meanings.len()).map_err(|_| DictError::FieldTooLong {
            field: "meanings",
            length: draft.meanings.len(),
            max: u8::MAX as usize,
        })?;

        let headword = self.arena.push(draft.headword.as_ref())?;
        let traditional = self.arena.push(draft.traditional.as_ref())?;
        let radicals = self.arena.push(draft.radicals.as_ref())?;
        let link = self.arena.push(draft.link.as_ref())?;

        let thumb_pronunciation = if build_thumbs && draft.thumb_pronunciation.as_ref().is_empty() {
            self.arena.push(&draft.build_pronunciation_thumb())?
        } else {
            self.arena.push(draft.thumb_pronunciation.as_ref())?
        };
        let thumb_translation = if build_thumbs && draft.thumb_translation.as_ref().is_empty() {
            self.arena.push(&draft.build_translation_thumb())?
        } else {
            self.arena.push(draft.thumb_translation.as_ref())?
        };

        let meaning_start = u32::try_from(self.meanings.len())
            .map_err(|_| DictError::InvalidFormat("too many meanings".to_string()))?;
        let first_meaning = self.meanings.len();

        let pronunciations_start = self.slice_start()?;
        for meaning in &draft.meanings {
            let list = self.push_strings("pronunciations", &meaning.pronunciations)?;
            self.meanings.push(Meaning {
                pronunciations: list,
                translations: StringList::default(),
            });
        }
        let pronunciations = self.close_list("pronunciations", pronunciations_start)?;

        let translations_start = self.slice_start()?;
        for (offset, meaning) in draft.meanings.iter().enumerate() {
            let list = self.push_strings("translations", &meaning.translations)?;
            self.meanings[first_meaning + offset].translations = list;
        }
        let translations = self.close_list("translations", translations_start)?;

        let tags = self.push_strings("tags", &draft.tags)?;

        let letter_mask = draft
            .letter_mask
            .unwrap_or_else(|| letter_mask(draft.all_pronunciations()));

        self.records.push(WordRecord {
            headword,
            traditional,
            radicals,
            link,
            thumb_pronunciation,
            thumb_translation,
            pronunciations,
            translations,
            tags,
            meanings: MeaningGroup::new(meaning_start, meaning_count),
            letter_mask,
        });
        Ok(())
    }

    /// Unpacks record `index` back into a borrowed draft.
    pub fn draft(&self, index: usize) -> Option<WordDraft<&str>> {
        let record = self.records.get(index)?;
        Some(unpack_record(&self.arena, &self.slices, &self.meanings, record))
    }

    /// Concatenates another job's output, shifting every offset it holds.
    pub fn append(&mut self, other: DictionaryBuilder) -> Result<()> {
        let text_delta = self.arena.append(&other.arena)?;
        let slice_delta = self.slice_start()?;
        let meaning_delta = u32::try_from(self.meanings.len())
            .map_err(|_| DictError::InvalidFormat("too many meanings".to_string()))?;

        self.slices
            .extend(other.slices.into_iter().map(|slice| slice.rebased(text_delta)));
        self.meanings.extend(other.meanings.into_iter().map(|meaning| Meaning {
            pronunciations: meaning.pronunciations.rebased(slice_delta),
            translations: meaning.translations.rebased(slice_delta),
        }));
        self.records.extend(other.records.into_iter().map(|record| WordRecord {
            headword: record.headword.rebased(text_delta),
            traditional: record.traditional.rebased(text_delta),
            radicals: record.radicals.rebased(text_delta),
            link: record.link.rebased(text_delta),
            thumb_pronunciation: record.thumb_pronunciation.rebased(text_delta),
            thumb_translation: record.thumb_translation.rebased(text_delta),
            pronunciations: record.pronunciations.rebased(slice_delta),
            translations: record.translations.rebased(slice_delta),
            tags: record.tags.rebased(slice_delta),
            meanings: MeaningGroup::new(record.meanings.start + meaning_delta, record.meanings.count),
            letter_mask: record.letter_mask,
        }));
        Ok(())
    }

    /// Stable sort by (headword, traditional), then rebuilds every table in
    /// sorted order so each record's data directly follows the previous one.
    pub fn sort(self) -> Result<DictionaryBuilder> {
        let mut order: Vec<usize> = (0..self.records.len()).collect();
        order.sort_by(|&a, &b| {
            let (left, right) = (&self.records[a], &self.records[b]);
            self.arena
                .get(left.headword)
                .cmp(self.arena.get(right.headword))
                .then_with(|| self.arena.get(left.traditional).cmp(self.arena.get(right.traditional)))
        });

        let mut sorted = DictionaryBuilder::with_capacity(self.records.len(), self.arena.len());
        sorted.slices.reserve(self.slices.len());
        sorted.meanings.reserve(self.meanings.len());
        for index in order {
            let draft = unpack_record(&self.arena, &self.slices, &self.meanings, &self.records[index]);
            sorted.add_word(&draft, false)?;
        }
        Ok(sorted)
    }

    pub fn is_sorted(&self) -> bool {
        self.records.windows(2).all(|pair| {
            let a = (self.arena.get(pair[0].headword), self.arena.get(pair[0].traditional));
            let b = (self.arena.get(pair[1].headword), self.arena.get(pair[1].traditional));
            a <= b
        })
    }

    fn slice_start(&self) -> Result<u32> {
        u32::try_from(self.slices.len())
            .map_err(|_| DictError::InvalidFormat("too many strings".to_string()))
    }

    fn close_list(&self, field: &'static str, start: u32) -> Result<StringList> {
        let count = self.slices.len() - start as usize;
        let count = u16::try_from(count).map_err(|_| DictError::FieldTooLong {
            field,
            length: count,
            max: u16::MAX as usize,
        })?;
        Ok(StringList::new(start, count))
    }

    fn push_strings<S: AsRef<str>>(&mut self, field: &'static str, values: &[S]) -> Result<StringList> {
        let start = self.slice_start()?;
        for value in values {
            let slice = self.arena.push(value.as_ref())?;
            self.slices.push(slice);
        }
        self.close_list(field, start)
    }
}

pub(crate) fn unpack_record<'a>(
    arena: &'a StringArena,
    slices: &'a [StringSlice],
    meanings: &'a [Meaning],
    record: &WordRecord,
) -> WordDraft<&'a str> {
    let strings = |list: StringList| -> Vec<&'a str> {
        slices[list.range()].iter().map(|slice| arena.get(*slice)).collect()
    };
    WordDraft {
        headword: arena.get(record.headword),
        traditional: arena.get(record.traditional),
        radicals: arena.get(record.radicals),
        link: arena.get(record.link),
        thumb_pronunciation: arena.get(record.thumb_pronunciation),
        thumb_translation: arena.get(record.thumb_translation),
        meanings: meanings[record.meanings.range()]
            .iter()
            .map(|meaning| MeaningDraft {
                pronunciations: strings(meaning.pronunciations),
                translations: strings(meaning.translations),
            })
            .collect(),
        tags: strings(record.tags),
        letter_mask: Some(record.letter_mask),
    }
}
