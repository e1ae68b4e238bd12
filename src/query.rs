//! Query parsing and per-word relevance scoring.
//!
//! A query is split into Chinese terms (matched against the headword and its
//! traditional spelling), pinyin terms (matched against pronunciations while
//! ignoring case, tones and separators) and translation terms (matched
//! against translations ignoring case). A word scores the best of the three.

use std::ops::RangeInclusive;

use crate::config::DEFAULT_MIN_RELEVANCE;
use crate::data::StringSlice;
use crate::matcher::{MatchSpan, Pattern, SearchFlags, find_direct};
use crate::snapshot::WordRef;
use crate::text::{is_blank, is_chinese_text, is_pinyin, letter_mask};

const WORD_START_BONUS: f32 = 0.35;
const WORD_END_BONUS: f32 = 0.2;
/// Later pronunciations and translations count slightly less.
const POSITION_DECAY: f32 = 0.95;

const HANZI_FLAGS: SearchFlags = SearchFlags::NONE;

fn pinyin_flags() -> SearchFlags {
    SearchFlags::IGNORE_CASE | SearchFlags::IGNORE_DIACRITICS | SearchFlags::IGNORE_NON_LETTER
}

#[derive(Debug, Clone)]
pub struct SearchQuery {
    text: String,
    chinese: Vec<Pattern>,
    pinyin: Vec<Pattern>,
    translation: Vec<Pattern>,
    pinyin_mask: u64,
    translation_window: RangeInclusive<usize>,
    min_relevance: f32,
}

/// Splits a query into terms: apostrophes are dropped, whitespace and blank
/// characters separate terms.
pub fn tokenize(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| c.is_whitespace() || is_blank(c))
        .filter(|token| !token.is_empty())
}

impl SearchQuery {
    pub fn parse(text: &str) -> Self {
        Self::with_min_relevance(text, DEFAULT_MIN_RELEVANCE)
    }

    /// `min_relevance` decides which terms count towards the multi-term bonus.
    pub fn with_min_relevance(text: &str, min_relevance: f32) -> Self {
        let cleaned: String = text.chars().filter(|&c| c != '\'').collect();

        let mut chinese = Vec::new();
        let mut pinyin = Vec::new();
        let mut translation = Vec::new();
        for token in tokenize(&cleaned) {
            if is_chinese_text(token) {
                chinese.push(Pattern::new(token, HANZI_FLAGS));
                continue;
            }
            if is_pinyin(token) {
                pinyin.push(Pattern::new(token, pinyin_flags()));
            }
            translation.push(Pattern::new(token, SearchFlags::IGNORE_CASE));
        }

        let pinyin_mask = pinyin.first().map_or(0, |term| letter_mask([term.text()]));
        let total: usize = translation.iter().map(Pattern::display_length).sum();

        Self {
            text: cleaned,
            chinese,
            pinyin,
            translation,
            pinyin_mask,
            translation_window: total / 2..=total * 3,
            min_relevance,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn chinese_terms(&self) -> impl Iterator<Item = &str> {
        self.chinese.iter().map(Pattern::text)
    }

    pub fn pinyin_terms(&self) -> impl Iterator<Item = &str> {
        self.pinyin.iter().map(Pattern::text)
    }

    pub fn translation_terms(&self) -> impl Iterator<Item = &str> {
        self.translation.iter().map(Pattern::text)
    }

    pub fn min_relevance(&self) -> f32 {
        self.min_relevance
    }

    /// No term survived tokenisation; nothing can match.
    pub fn is_empty(&self) -> bool {
        self.chinese.is_empty() && self.pinyin.is_empty() && self.translation.is_empty()
    }

    /// Best of the headword, pronunciation and translation scores.
    pub fn score(&self, word: WordRef<'_>) -> f32 {
        self.score_hanzi(word)
            .max(self.score_pinyin(word))
            .max(self.score_translation(word))
    }

    pub fn score_hanzi(&self, word: WordRef<'_>) -> f32 {
        if self.chinese.is_empty() {
            return 0.0;
        }
        let headword = self.score_chinese(word.headword(), word.record().headword.display_length);
        if word.record().traditional.is_empty() {
            return headword;
        }
        headword.max(self.score_chinese(word.traditional(), word.record().traditional.display_length))
    }

    fn score_chinese(&self, hanzi: &str, hanzi_length: u16) -> f32 {
        let mut relevance = 0.0;
        for term in &self.chinese {
            let term_text = term.text();
            let term_length = term_text.chars().count() as f32;

            // the whole word appears in the query, earlier is better
            let span = find_direct(hanzi, term_text, HANZI_FLAGS);
            if span.is_found() {
                relevance += 4.0 - span.char_range(term_text).start as f32 / term_length;
            }
            // the query is part of the word
            if term.find(hanzi).is_found() {
                relevance += 2.0 * term_length / f32::from(hanzi_length.max(1));
            }
        }
        relevance
    }

    pub fn score_pinyin(&self, word: WordRef<'_>) -> f32 {
        if self.pinyin.is_empty() || word.letter_mask() & self.pinyin_mask != self.pinyin_mask {
            return 0.0;
        }
        decayed_best(word.pronunciation_slices(), |slice| {
            self.combine(&self.pinyin, word.text(*slice), slice.display_length)
        })
    }

    pub fn score_translation(&self, word: WordRef<'_>) -> f32 {
        if self.translation.is_empty() {
            return 0.0;
        }
        decayed_best(word.translation_slices(), |slice| {
            if !self.translation_window.contains(&(slice.display_length as usize)) {
                return 0.0;
            }
            self.combine(&self.translation, word.text(*slice), slice.display_length)
        })
    }

    /// Sums per-term relevance and multiplies by the number of terms that
    /// scored above the threshold. A miss on the first term ends the entry.
    fn combine(&self, terms: &[Pattern], subject: &str, subject_length: u16) -> f32 {
        let mut sum = 0.0f32;
        let mut strong = 0.0f32;
        for term in terms {
            let score = relevance(subject, subject_length, term);
            if sum == 0.0 && score == 0.0 {
                return 0.0;
            }
            sum += score;
            if score > self.min_relevance {
                strong += 1.0;
            }
        }
        sum * strong
    }
}

fn decayed_best(slices: &[StringSlice], mut score: impl FnMut(&StringSlice) -> f32) -> f32 {
    let mut best = 0.0f32;
    let mut factor = 1.0f32;
    for slice in slices {
        best = best.max(factor * score(slice));
        factor *= POSITION_DECAY;
    }
    best
}

/// Share of the subject covered by the term, plus bonuses when the match
/// starts or ends on a word boundary.
pub fn relevance(subject: &str, subject_length: u16, term: &Pattern) -> f32 {
    let span = term.find(subject);
    if !span.is_found() {
        return 0.0;
    }
    let mut relevance = term.display_length() as f32 / f32::from(subject_length.max(1));
    if starts_word(subject, span) {
        relevance += WORD_START_BONUS;
    }
    if ends_word(subject, span) {
        relevance += WORD_END_BONUS;
    }
    relevance
}

fn starts_word(subject: &str, span: MatchSpan) -> bool {
    span.start == 0 || subject[..span.start].chars().next_back().is_some_and(is_blank)
}

fn ends_word(subject: &str, span: MatchSpan) -> bool {
    span.end == subject.len() || subject[span.end..].chars().next().is_some_and(is_blank)
}
