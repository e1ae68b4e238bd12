//! XML word lists.
//!
//! ```xml
//! <WordList>
//!   <Word>
//!     <Hanzi>吃</Hanzi><Traditional>喫</Traditional>
//!     <Meaning><Pinyin>chī</Pinyin><Translation>to eat</Translation></Meaning>
//!     <Tag>HSK1</Tag>
//!   </Word>
//! </WordList>
//! ```
//!
//! `Radicals`, `Link`, `ThumbPinyin` and `ThumbTranslation` are optional word
//! children. Inside a meaning every `Pinyin` precedes every `Translation`.

use quick_xml::Reader;
use quick_xml::events::Event;
use tracing::debug;

use crate::arena::{DictionaryBuilder, MeaningDraft, WordDraft};
use crate::cancel::{CancelToken, Outcome};
use crate::error::{DictError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Hanzi,
    Traditional,
    Radicals,
    Link,
    ThumbPinyin,
    ThumbTranslation,
    Pinyin,
    Translation,
    Tag,
}

impl Field {
    fn from_name(name: &[u8]) -> Option<Self> {
        Some(match name {
            b"Hanzi" => Field::Hanzi,
            b"Traditional" => Field::Traditional,
            b"Radicals" => Field::Radicals,
            b"Link" => Field::Link,
            b"ThumbPinyin" => Field::ThumbPinyin,
            b"ThumbTranslation" => Field::ThumbTranslation,
            b"Pinyin" => Field::Pinyin,
            b"Translation" => Field::Translation,
            b"Tag" => Field::Tag,
            _ => return None,
        })
    }
}

struct WordListParser<'c> {
    builder: DictionaryBuilder,
    build_thumbs: bool,
    cancel: &'c CancelToken,
    word: Option<WordDraft>,
    meaning: Option<MeaningDraft>,
    field: Option<Field>,
    text: String,
}

impl<'c> WordListParser<'c> {
    fn start(&mut self, name: &[u8]) -> Result<()> {
        match name {
            b"Word" => {
                if self.word.is_some() {
                    return Err(invalid("nested Word element"));
                }
                self.word = Some(WordDraft::default());
            }
            b"Meaning" => {
                if self.word.is_none() {
                    return Err(invalid("Meaning outside of a Word"));
                }
                if self.meaning.is_some() {
                    return Err(invalid("nested Meaning element"));
                }
                self.meaning = Some(MeaningDraft::default());
            }
            other => {
                self.field = Field::from_name(other);
                if self.field.is_some() && self.word.is_none() {
                    return Err(invalid(&format!(
                        "{} outside of a Word",
                        String::from_utf8_lossy(other)
                    )));
                }
                self.text.clear();
            }
        }
        Ok(())
    }

    fn text(&mut self, value: &str) {
        if self.field.is_some() {
            self.text.push_str(value);
        }
    }

    /// Returns `true` once the load should stop because it was cancelled.
    fn end(&mut self, name: &[u8]) -> Result<bool> {
        match name {
            b"Word" => {
                let Some(word) = self.word.take() else {
                    return Err(invalid("unbalanced Word element"));
                };
                if self.meaning.is_some() {
                    return Err(invalid("unterminated Meaning element"));
                }
                if word.headword.is_empty() {
                    return Err(invalid("Word without Hanzi"));
                }
                self.builder.add_word(&word, self.build_thumbs)?;
                return Ok(self.cancel.is_cancelled());
            }
            b"Meaning" => {
                let meaning = self.meaning.take().ok_or_else(|| invalid("unbalanced Meaning element"))?;
                if let Some(word) = self.word.as_mut() {
                    word.meanings.push(meaning);
                }
            }
            _ => {
                if let Some(field) = self.field.take() {
                    let value = std::mem::take(&mut self.text);
                    self.assign(field, value)?;
                }
            }
        }
        Ok(false)
    }

    fn assign(&mut self, field: Field, value: String) -> Result<()> {
        let word = self.word.as_mut().ok_or_else(|| invalid("field outside of a Word"))?;
        match field {
            Field::Hanzi => word.headword = value,
            Field::Traditional => word.traditional = value,
            Field::Radicals => word.radicals = value,
            Field::Link => word.link = value,
            Field::ThumbPinyin => word.thumb_pronunciation = value,
            Field::ThumbTranslation => word.thumb_translation = value,
            Field::Tag => word.tags.push(value),
            Field::Pinyin => {
                let meaning = self.meaning.as_mut().ok_or_else(|| invalid("Pinyin outside of a Meaning"))?;
                if !meaning.translations.is_empty() {
                    return Err(invalid(&format!(
                        "Pinyin {value:?} follows a Translation in {:?}",
                        word.headword
                    )));
                }
                meaning.pronunciations.push(value);
            }
            Field::Translation => {
                let meaning = self
                    .meaning
                    .as_mut()
                    .ok_or_else(|| invalid("Translation outside of a Meaning"))?;
                meaning.translations.push(value);
            }
        }
        Ok(())
    }
}

fn invalid(message: &str) -> DictError {
    DictError::InvalidFormat(message.to_string())
}

/// Parses one XML word list into a private builder, checking `cancel` after
/// every word.
pub fn decode_xml(text: &str, build_thumbs: bool, cancel: &CancelToken) -> Result<Outcome<DictionaryBuilder>> {
    let mut reader = Reader::from_str(text);
    reader.trim_text(true);

    let mut parser = WordListParser {
        builder: DictionaryBuilder::with_capacity(text.len() / 256, text.len() / 2),
        build_thumbs,
        cancel,
        word: None,
        meaning: None,
        field: None,
        text: String::new(),
    };

    loop {
        match reader.read_event()? {
            Event::Start(element) => parser.start(element.name().as_ref())?,
            Event::Empty(element) => {
                let name = element.name();
                parser.start(name.as_ref())?;
                if parser.end(name.as_ref())? {
                    return Ok(Outcome::Cancelled);
                }
            }
            Event::Text(content) => parser.text(&content.unescape()?),
            Event::CData(content) => {
                let bytes = content.into_inner();
                let value = std::str::from_utf8(&bytes)
                    .map_err(|err| DictError::Xml(format!("CDATA is not UTF-8: {err}")))?;
                parser.text(value);
            }
            Event::End(element) => {
                if parser.end(element.name().as_ref())? {
                    return Ok(Outcome::Cancelled);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    if parser.word.is_some() {
        return Err(invalid("unterminated Word element"));
    }
    debug!(words = parser.builder.len(), "parsed XML word list");
    Ok(Outcome::Complete(parser.builder))
}
