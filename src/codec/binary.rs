//! Versioned little-endian binary container.
//!
//! ```text
//! u32 version
//! u32 part_count
//! u32 part_size[part_count]
//! part bytes, in order
//! -- version 2 and later --
//! i32 word_count, i32 match_count
//! word_count x { string word, u64 letter_mask, i32 match_count }
//! match_count x i32 record_index
//! ```
//!
//! Strings carry a 7-bit variable-length byte count followed by UTF-8 bytes.

use std::io::Write;
use std::ops::Range;
use std::str;

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use rayon::prelude::*;
use tracing::debug;

use crate::arena::{DictionaryBuilder, MeaningDraft, StringArena, WordDraft};
use crate::cancel::{CancelToken, Outcome};
use crate::config::DEFAULT_PART_SIZE;
use crate::error::{DictError, Result};
use crate::index::{TranslationIndex, collect_words};
use crate::snapshot::DictionarySnapshot;
use crate::text::letter_mask;

/// Field sets of the container, each adding to the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FormatVersion {
    /// Headword, traditional, link, previews, meanings and tags.
    V0 = 0,
    /// Adds radicals after the traditional spelling.
    V1 = 1,
    /// Adds the trailing translation index block.
    V2 = 2,
    /// Adds a stored letter mask per record.
    V3 = 3,
}

impl FormatVersion {
    pub const LATEST: FormatVersion = FormatVersion::V3;

    pub fn from_raw(raw: u32) -> Result<Self> {
        match raw {
            0 => Ok(FormatVersion::V0),
            1 => Ok(FormatVersion::V1),
            2 => Ok(FormatVersion::V2),
            3 => Ok(FormatVersion::V3),
            found => Err(DictError::UnsupportedVersion {
                found,
                max: FormatVersion::LATEST.raw(),
            }),
        }
    }

    pub const fn raw(self) -> u32 {
        self as u32
    }

    pub const fn has_radicals(self) -> bool {
        self.raw() >= 1
    }

    pub const fn has_index(self) -> bool {
        self.raw() >= 2
    }

    pub const fn has_letter_mask(self) -> bool {
        self.raw() >= 3
    }
}

/// Bounds-checked cursor over a byte buffer.
pub(crate) struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
    context: &'static str,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(data: &'a [u8], context: &'static str) -> Self {
        Self {
            data,
            pos: 0,
            context,
        }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub(crate) fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(DictError::Truncated {
                context: self.context,
                needed: len,
                remaining: self.remaining(),
            });
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    pub(crate) fn rest(&mut self) -> &'a [u8] {
        let bytes = &self.data[self.pos..];
        self.pos = self.data.len();
        bytes
    }

    pub(crate) fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn u32(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    pub(crate) fn u64(&mut self) -> Result<u64> {
        Ok(LittleEndian::read_u64(self.take(8)?))
    }

    /// A non-negative `i32`.
    pub(crate) fn count(&mut self) -> Result<usize> {
        let value = LittleEndian::read_i32(self.take(4)?);
        usize::try_from(value)
            .map_err(|_| DictError::InvalidFormat(format!("negative count {value} in {}", self.context)))
    }

    fn varint(&mut self) -> Result<usize> {
        let mut value = 0u64;
        for shift in (0..35).step_by(7) {
            let byte = self.u8()?;
            value |= u64::from(byte & 0x7F) << shift;
            if byte & 0x80 == 0 {
                return usize::try_from(value).map_err(|_| {
                    DictError::InvalidFormat(format!("string length {value} in {}", self.context))
                });
            }
        }
        Err(DictError::InvalidFormat(format!(
            "string length prefix longer than 5 bytes in {}",
            self.context
        )))
    }

    pub(crate) fn string(&mut self) -> Result<&'a str> {
        let len = self.varint()?;
        let bytes = self.take(len)?;
        str::from_utf8(bytes)
            .map_err(|err| DictError::InvalidFormat(format!("invalid UTF-8 in {}: {err}", self.context)))
    }

    fn strings(&mut self, count: usize) -> Result<Vec<&'a str>> {
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            values.push(self.string()?);
        }
        Ok(values)
    }
}

/// A container split into its parts, still borrowing the input buffer.
#[derive(Debug)]
pub struct Container<'a> {
    pub version: FormatVersion,
    pub parts: Vec<&'a [u8]>,
    /// Present from version 2 on.
    pub index: Option<&'a [u8]>,
}

pub fn split_container(bytes: &[u8]) -> Result<Container<'_>> {
    let mut reader = ByteReader::new(bytes, "container header");
    let version = FormatVersion::from_raw(reader.u32()?)?;
    let part_count = reader.u32()? as usize;
    if part_count > reader.remaining() / 4 {
        return Err(DictError::Truncated {
            context: "part size table",
            needed: part_count * 4,
            remaining: reader.remaining(),
        });
    }
    let mut sizes = Vec::with_capacity(part_count);
    for _ in 0..part_count {
        sizes.push(reader.u32()? as usize);
    }

    let declared: u64 = sizes.iter().map(|&size| size as u64).sum();
    let available = reader.remaining() as u64;
    let consistent = if version.has_index() {
        declared <= available
    } else {
        declared == available
    };
    if !consistent {
        return Err(DictError::PartSizeMismatch {
            declared,
            available,
        });
    }

    let mut parts = Vec::with_capacity(part_count);
    for size in sizes {
        parts.push(reader.take(size)?);
    }
    let index = version.has_index().then(|| reader.rest());
    debug!(version = version.raw(), parts = parts.len(), "split binary container");
    Ok(Container {
        version,
        parts,
        index,
    })
}

fn read_record<'a>(reader: &mut ByteReader<'a>, version: FormatVersion) -> Result<WordDraft<&'a str>> {
    let headword = reader.string()?;
    let traditional = reader.string()?;
    let radicals = if version.has_radicals() {
        reader.string()?
    } else {
        ""
    };
    let link = reader.string()?;
    let thumb_pronunciation = reader.string()?;
    let thumb_translation = reader.string()?;

    let meaning_count = reader.u8()?;
    let mut meanings = Vec::with_capacity(meaning_count as usize);
    for _ in 0..meaning_count {
        let count = reader.u8()? as usize;
        let pronunciations = reader.strings(count)?;
        let count = reader.u8()? as usize;
        let translations = reader.strings(count)?;
        meanings.push(MeaningDraft {
            pronunciations,
            translations,
        });
    }
    let count = reader.u8()? as usize;
    let tags = reader.strings(count)?;
    let letter_mask = if version.has_letter_mask() {
        Some(reader.u64()?)
    } else {
        None
    };

    Ok(WordDraft {
        headword,
        traditional,
        radicals,
        link,
        thumb_pronunciation,
        thumb_translation,
        meanings,
        tags,
        letter_mask,
    })
}

/// Parses one part into a private builder, checking `cancel` before every record.
pub fn decode_part(
    part: &[u8],
    version: FormatVersion,
    build_thumbs: bool,
    cancel: &CancelToken,
) -> Result<Outcome<DictionaryBuilder>> {
    let mut reader = ByteReader::new(part, "dictionary part");
    let mut builder = DictionaryBuilder::with_capacity(part.len() / 64, part.len());
    while !reader.is_empty() {
        if cancel.is_cancelled() {
            return Ok(Outcome::Cancelled);
        }
        let draft = read_record(&mut reader, version)?;
        builder.add_word(&draft, build_thumbs)?;
    }
    Ok(Outcome::Complete(builder))
}

/// Parses the trailing index block, appending its words to `arena`.
pub fn decode_index(block: &[u8], arena: &mut StringArena, record_count: usize) -> Result<TranslationIndex> {
    let mut reader = ByteReader::new(block, "index block");
    let word_count = reader.count()?;
    let match_count = reader.count()?;

    let mut words = Vec::with_capacity(word_count.min(reader.remaining() / 13));
    for _ in 0..word_count {
        let word = reader.string()?;
        let letter_mask = reader.u64()?;
        let matches = reader.count()?;
        let matches = u32::try_from(matches)
            .map_err(|_| DictError::InvalidFormat(format!("index word {word:?} has {matches} matches")))?;
        words.push((word, letter_mask, matches));
    }

    let mut matches = Vec::with_capacity(match_count.min(reader.remaining() / 4));
    for _ in 0..match_count {
        let position = reader.count()?;
        if position >= record_count {
            return Err(DictError::InvalidFormat(format!(
                "index refers to record {position} of {record_count}"
            )));
        }
        matches.push(position as u32);
    }
    if !reader.is_empty() {
        return Err(DictError::InvalidFormat(format!(
            "{} trailing bytes after the index block",
            reader.remaining()
        )));
    }
    TranslationIndex::from_parts(arena, words, matches)
}

fn write_string(out: &mut Vec<u8>, value: &str) {
    let mut len = value.len();
    while len >= 0x80 {
        out.push((len as u8 & 0x7F) | 0x80);
        len >>= 7;
    }
    out.push(len as u8);
    out.extend_from_slice(value.as_bytes());
}

fn write_count(out: &mut Vec<u8>, field: &'static str, count: usize) -> Result<()> {
    let byte = u8::try_from(count).map_err(|_| DictError::FieldTooLong {
        field,
        length: count,
        max: u8::MAX as usize,
    })?;
    out.push(byte);
    Ok(())
}

fn write_i32(out: &mut Vec<u8>, context: &'static str, value: usize) -> Result<()> {
    let value = i32::try_from(value)
        .map_err(|_| DictError::InvalidFormat(format!("{context} {value} exceeds i32")))?;
    out.write_i32::<LittleEndian>(value)?;
    Ok(())
}

fn encode_record(out: &mut Vec<u8>, draft: &WordDraft<&str>, version: FormatVersion) -> Result<()> {
    write_string(out, draft.headword);
    write_string(out, draft.traditional);
    if version.has_radicals() {
        write_string(out, draft.radicals);
    }
    write_string(out, draft.link);
    write_string(out, draft.thumb_pronunciation);
    write_string(out, draft.thumb_translation);

    write_count(out, "meanings", draft.meanings.len())?;
    for meaning in &draft.meanings {
        write_count(out, "pronunciations per meaning", meaning.pronunciations.len())?;
        for value in &meaning.pronunciations {
            write_string(out, value);
        }
        write_count(out, "translations per meaning", meaning.translations.len())?;
        for value in &meaning.translations {
            write_string(out, value);
        }
    }
    write_count(out, "tags", draft.tags.len())?;
    for tag in &draft.tags {
        write_string(out, tag);
    }
    if version.has_letter_mask() {
        out.write_u64::<LittleEndian>(draft.letter_mask.unwrap_or_default())?;
    }
    Ok(())
}

fn encode_part(snapshot: &DictionarySnapshot, records: Range<usize>, version: FormatVersion) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(records.len() * 64);
    for index in records {
        if let Some(draft) = snapshot.draft(index) {
            encode_record(&mut out, &draft, version)?;
        }
    }
    Ok(out)
}

fn encode_index(out: &mut Vec<u8>, snapshot: &DictionarySnapshot) -> Result<()> {
    match snapshot.index() {
        Some(index) => {
            write_i32(out, "index word count", index.len())?;
            write_i32(out, "index match count", index.matches().len())?;
            for entry in index.entries() {
                write_string(out, snapshot.string(entry.word));
                out.write_u64::<LittleEndian>(entry.letter_mask)?;
                write_i32(out, "index word match count", entry.match_count as usize)?;
            }
            for &position in index.matches() {
                write_i32(out, "record index", position as usize)?;
            }
        }
        None => {
            let (words, matches) = collect_words(snapshot.arena(), snapshot.slices(), snapshot.records())?;
            write_i32(out, "index word count", words.len())?;
            write_i32(out, "index match count", matches.len())?;
            for (word, count) in &words {
                write_string(out, word);
                out.write_u64::<LittleEndian>(letter_mask([word.as_str()]))?;
                write_i32(out, "index word match count", *count as usize)?;
            }
            for position in matches {
                write_i32(out, "record index", position as usize)?;
            }
        }
    }
    Ok(())
}

/// Serializes snapshots, encoding fixed-size slices of records in parallel.
#[derive(Debug, Clone)]
pub struct BinaryWriter {
    version: FormatVersion,
    part_size: usize,
}

impl Default for BinaryWriter {
    fn default() -> Self {
        Self {
            version: FormatVersion::LATEST,
            part_size: DEFAULT_PART_SIZE,
        }
    }
}

impl BinaryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emits an older layout, dropping the fields it lacks.
    pub fn with_version(mut self, version: FormatVersion) -> Self {
        self.version = version;
        self
    }

    pub fn with_part_size(mut self, part_size: usize) -> Self {
        self.part_size = part_size.max(1);
        self
    }

    pub fn version(&self) -> FormatVersion {
        self.version
    }

    pub fn encode(&self, snapshot: &DictionarySnapshot) -> Result<Vec<u8>> {
        let total = snapshot.len();
        let slices: Vec<Range<usize>> = (0..total)
            .step_by(self.part_size)
            .map(|start| start..(start + self.part_size).min(total))
            .collect();
        let parts = slices
            .into_par_iter()
            .map(|records| encode_part(snapshot, records, self.version))
            .collect::<Result<Vec<_>>>()?;

        let body: usize = parts.iter().map(Vec::len).sum();
        let mut out = Vec::with_capacity(8 + parts.len() * 4 + body);
        out.write_u32::<LittleEndian>(self.version.raw())?;
        out.write_u32::<LittleEndian>(parts.len() as u32)?;
        for part in &parts {
            let size = u32::try_from(part.len())
                .map_err(|_| DictError::InvalidFormat(format!("part of {} bytes exceeds u32", part.len())))?;
            out.write_u32::<LittleEndian>(size)?;
        }
        for part in &parts {
            out.extend_from_slice(part);
        }
        if self.version.has_index() {
            encode_index(&mut out, snapshot)?;
        }
        debug!(
            version = self.version.raw(),
            records = total,
            parts = parts.len(),
            bytes = out.len(),
            "encoded binary container"
        );
        Ok(out)
    }

    pub fn write<W: Write + ?Sized>(&self, snapshot: &DictionarySnapshot, out: &mut W) -> Result<()> {
        let bytes = self.encode(snapshot)?;
        out.write_all(&bytes)?;
        out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(version: FormatVersion, headword: &str) -> Vec<u8> {
        let draft = WordDraft {
            headword,
            traditional: "",
            radicals: "口",
            link: "",
            thumb_pronunciation: "",
            thumb_translation: "",
            meanings: vec![MeaningDraft {
                pronunciations: vec!["chī"],
                translations: vec!["to eat"],
            }],
            tags: vec!["verb"],
            letter_mask: Some(0b111),
        };
        let mut out = Vec::new();
        encode_record(&mut out, &draft, version).unwrap();
        out
    }

    fn container(version: FormatVersion, parts: &[Vec<u8>], tail: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.write_u32::<LittleEndian>(version.raw()).unwrap();
        out.write_u32::<LittleEndian>(parts.len() as u32).unwrap();
        for part in parts {
            out.write_u32::<LittleEndian>(part.len() as u32).unwrap();
        }
        for part in parts {
            out.extend_from_slice(part);
        }
        out.extend_from_slice(tail);
        out
    }

    #[test]
    fn length_prefix_uses_seven_bit_groups() {
        let mut out = Vec::new();
        write_string(&mut out, &"a".repeat(300));
        assert_eq!(&out[..2], &[0xAC, 0x02]);
        let mut reader = ByteReader::new(&out, "test");
        assert_eq!(reader.string().unwrap().len(), 300);
        assert!(reader.is_empty());
    }

    #[test]
    fn overlong_length_prefix_is_rejected() {
        let bytes = [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01];
        let mut reader = ByteReader::new(&bytes, "test");
        assert!(matches!(reader.string(), Err(DictError::InvalidFormat(_))));
    }

    #[test]
    fn rejects_newer_versions() {
        let mut bytes = container(FormatVersion::V3, &[], &[]);
        bytes[0] = 4;
        assert!(matches!(
            split_container(&bytes),
            Err(DictError::UnsupportedVersion { found: 4, max: 3 })
        ));
    }

    #[test]
    fn part_sizes_must_match_for_old_versions() {
        let part = record(FormatVersion::V1, "吃");
        let mut bytes = container(FormatVersion::V1, &[part], &[]);
        assert!(split_container(&bytes).is_ok());
        bytes.push(0);
        assert!(matches!(
            split_container(&bytes),
            Err(DictError::PartSizeMismatch { .. })
        ));
    }

    #[test]
    fn part_sizes_may_leave_room_for_the_index() {
        let part = record(FormatVersion::V2, "吃");
        let bytes = container(FormatVersion::V2, &[part.clone()], &[0, 0, 0, 0, 0, 0, 0, 0]);
        let split = split_container(&bytes).unwrap();
        assert_eq!(split.parts, vec![part.as_slice()]);
        assert_eq!(split.index.map(<[u8]>::len), Some(8));
    }

    #[test]
    fn version_dispatch_per_field() {
        let cancel = CancelToken::new();
        for version in [FormatVersion::V0, FormatVersion::V1, FormatVersion::V2, FormatVersion::V3] {
            let part = record(version, "吃");
            let builder = decode_part(&part, version, false, &cancel)
                .unwrap()
                .complete()
                .unwrap();
            let draft = builder.draft(0).unwrap();
            assert_eq!(draft.headword, "吃");
            assert_eq!(draft.meanings[0].translations, vec!["to eat"]);
            assert_eq!(draft.tags, vec!["verb"]);
            let radicals = if version.has_radicals() { "口" } else { "" };
            assert_eq!(draft.radicals, radicals, "{version:?}");
            let mask = if version.has_letter_mask() {
                0b111
            } else {
                letter_mask(["chī"])
            };
            assert_eq!(draft.letter_mask, Some(mask), "{version:?}");
        }
    }

    #[test]
    fn truncated_part_fails() {
        let part = record(FormatVersion::V3, "吃");
        let cancel = CancelToken::new();
        let result = decode_part(&part[..part.len() - 3], FormatVersion::V3, false, &cancel);
        assert!(matches!(result, Err(DictError::Truncated { .. })));
    }

    #[test]
    fn cancelled_part_stops_early() {
        let mut part = record(FormatVersion::V3, "吃");
        part.extend(record(FormatVersion::V3, "食"));
        let cancel = CancelToken::new();
        cancel.cancel();
        let outcome = decode_part(&part, FormatVersion::V3, false, &cancel).unwrap();
        assert!(outcome.is_cancelled());
    }

    #[test]
    fn index_block_references_must_be_in_range() {
        let mut block = Vec::new();
        write_i32(&mut block, "words", 1).unwrap();
        write_i32(&mut block, "matches", 1).unwrap();
        write_string(&mut block, "eat");
        block.write_u64::<LittleEndian>(0).unwrap();
        write_i32(&mut block, "count", 1).unwrap();
        write_i32(&mut block, "position", 5).unwrap();

        let mut arena = StringArena::new();
        assert!(decode_index(&block, &mut arena, 2).is_err());
        let index = decode_index(&block, &mut arena, 6).unwrap();
        assert_eq!(index.positions(0), &[5]);
    }

    #[test]
    fn oversized_counts_are_reported() {
        let draft = WordDraft {
            headword: "多",
            tags: vec!["t"; 300],
            ..WordDraft::default()
        };
        let mut out = Vec::new();
        assert!(matches!(
            encode_record(&mut out, &draft, FormatVersion::V3),
            Err(DictError::FieldTooLong { field: "tags", .. })
        ));
    }
}
