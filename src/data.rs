//! Plain value types that make up a packed dictionary. None of them own text;
//! every field is an offset into the snapshot's arena or flat arrays.

/// A view into the string arena. `offset` and `length` are in bytes,
/// `display_length` counts visible characters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct StringSlice {
    pub offset: u32,
    pub length: u16,
    pub display_length: u16,
}

impl StringSlice {
    pub const EMPTY: StringSlice = StringSlice {
        offset: 0,
        length: 0,
        display_length: 0,
    };

    pub const fn new(offset: u32, length: u16, display_length: u16) -> Self {
        Self {
            offset,
            length,
            display_length,
        }
    }

    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub const fn end(&self) -> usize {
        self.offset as usize + self.length as usize
    }

    pub(crate) fn rebased(self, delta: u32) -> Self {
        if self.is_empty() {
            return Self::EMPTY;
        }
        Self {
            offset: self.offset + delta,
            ..self
        }
    }
}

/// A run of consecutive entries in the flat slice array.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StringList {
    pub start: u32,
    pub count: u16,
}

impl StringList {
    pub const fn new(start: u32, count: u16) -> Self {
        Self { start, count }
    }

    pub const fn range(&self) -> std::ops::Range<usize> {
        let start = self.start as usize;
        start..start + self.count as usize
    }

    pub(crate) fn rebased(self, delta: u32) -> Self {
        Self {
            start: self.start + delta,
            ..self
        }
    }
}

/// One sense of a word.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Meaning {
    pub pronunciations: StringList,
    pub translations: StringList,
}

/// All senses of a word, contiguous in the flat meaning array.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MeaningGroup {
    pub start: u32,
    pub count: u8,
}

impl MeaningGroup {
    pub const fn new(start: u32, count: u8) -> Self {
        Self { start, count }
    }

    pub const fn range(&self) -> std::ops::Range<usize> {
        let start = self.start as usize;
        start..start + self.count as usize
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WordRecord {
    pub headword: StringSlice,
    pub traditional: StringSlice,
    pub radicals: StringSlice,
    pub link: StringSlice,
    pub thumb_pronunciation: StringSlice,
    pub thumb_translation: StringSlice,
    /// Every pronunciation of every meaning, in meaning order.
    pub pronunciations: StringList,
    /// Every translation of every meaning, in meaning order.
    pub translations: StringList,
    pub tags: StringList,
    pub meanings: MeaningGroup,
    pub letter_mask: u64,
}

/// One normalized translation word of the inverted index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexedWordEntry {
    pub word: StringSlice,
    pub letter_mask: u64,
    pub match_count: u32,
}
