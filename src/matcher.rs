//! Single-pattern substring matcher with case, accent and punctuation folding.
//!
//! A [`Pattern`] is normalized once and carries a backtrack table, so scanning
//! a subject is linear. Spans are byte offsets into the subject and always
//! fall on character boundaries.

use std::ops::{BitOr, BitOrAssign, Range};

use crate::text::{display_length, fold_diacritic, is_blank, is_diacritic};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SearchFlags(u8);

impl SearchFlags {
    pub const NONE: SearchFlags = SearchFlags(0);
    /// ASCII `A`-`Z` compare equal to `a`-`z`.
    pub const IGNORE_CASE: SearchFlags = SearchFlags(1);
    /// Combining marks are skipped and precomposed Latin letters folded.
    pub const IGNORE_DIACRITICS: SearchFlags = SearchFlags(2);
    /// Blank characters (see [`crate::text::is_blank`]) are skipped.
    pub const IGNORE_NON_LETTER: SearchFlags = SearchFlags(4);

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: SearchFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for SearchFlags {
    type Output = SearchFlags;

    fn bitor(self, rhs: SearchFlags) -> SearchFlags {
        SearchFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for SearchFlags {
    fn bitor_assign(&mut self, rhs: SearchFlags) {
        self.0 |= rhs.0;
    }
}

/// Exclusive byte span inside a subject. Empty means no match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchSpan {
    pub start: usize,
    pub end: usize,
}

impl MatchSpan {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub const fn is_found(&self) -> bool {
        self.end != self.start
    }

    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    pub const fn is_empty(&self) -> bool {
        self.end == self.start
    }

    /// The same span in character coordinates.
    pub fn char_range(&self, subject: &str) -> Range<usize> {
        let start = subject[..self.start].chars().count();
        let end = start + subject[self.start..self.end].chars().count();
        start..end
    }
}

#[inline]
fn normalize(c: char, flags: SearchFlags) -> Option<char> {
    let mut c = c;
    if flags.contains(SearchFlags::IGNORE_DIACRITICS) {
        if is_diacritic(c) {
            return None;
        }
        c = fold_diacritic(c);
    }
    if flags.contains(SearchFlags::IGNORE_NON_LETTER) && is_blank(c) {
        return None;
    }
    if flags.contains(SearchFlags::IGNORE_CASE) {
        c = c.to_ascii_lowercase();
    }
    Some(c)
}

#[inline]
fn char_at(subject: &str, at: usize) -> Option<char> {
    subject.get(at..).and_then(|rest| rest.chars().next())
}

#[inline]
fn step(subject: &str, at: usize) -> usize {
    char_at(subject, at).map_or(subject.len(), |c| at + c.len_utf8())
}

/// Extends a match end over combining marks that decorate its last letter.
fn absorb_marks(subject: &str, mut end: usize) -> usize {
    while let Some(c) = char_at(subject, end) {
        if !is_diacritic(c) {
            break;
        }
        end += c.len_utf8();
    }
    end
}

/// A preprocessed search pattern.
#[derive(Debug, Clone)]
pub struct Pattern {
    text: String,
    chars: Vec<char>,
    backtrack: Vec<usize>,
    display_length: usize,
    flags: SearchFlags,
}

impl Pattern {
    pub fn new(text: &str, flags: SearchFlags) -> Self {
        let chars: Vec<char> = text.chars().filter_map(|c| normalize(c, flags)).collect();
        let backtrack = build_backtrack(&chars);
        Self {
            text: text.to_string(),
            chars,
            backtrack,
            display_length: display_length(text),
            flags,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn flags(&self) -> SearchFlags {
        self.flags
    }

    /// Visible characters of the pattern as typed.
    pub fn display_length(&self) -> usize {
        self.display_length
    }

    /// True when nothing is left after normalization.
    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn find(&self, subject: &str) -> MatchSpan {
        self.find_with(subject, self.flags)
    }

    /// Scans `subject`, normalizing each character with `flags` on the fly.
    pub fn find_with(&self, subject: &str, flags: SearchFlags) -> MatchSpan {
        let len = self.chars.len();
        if len == 0 {
            return MatchSpan::default();
        }
        let mut start = 0usize;
        let mut caret = 0usize;
        let mut matched = 0usize;
        while let Some(raw) = char_at(subject, caret) {
            let at = caret;
            caret += raw.len_utf8();
            let Some(c) = normalize(raw, flags) else {
                continue;
            };

            if self.chars[matched] == c {
                matched += 1;
                if matched == len {
                    let end = if flags.contains(SearchFlags::IGNORE_DIACRITICS) {
                        absorb_marks(subject, caret)
                    } else {
                        caret
                    };
                    return MatchSpan::new(start, end);
                }
            } else if matched > 0 {
                let mut previous = matched;
                loop {
                    matched = self.backtrack[matched];
                    if matched == 0 || self.chars[matched] == c {
                        break;
                    }
                }
                // the mismatching character is examined again
                caret = at;
                if matched > 0 {
                    loop {
                        start = step(subject, start);
                        if !char_at(subject, start).is_some_and(is_diacritic) {
                            previous -= 1;
                        }
                        if previous <= matched {
                            break;
                        }
                    }
                } else {
                    start = caret;
                }
            } else {
                start = caret;
            }
        }
        MatchSpan::new(start, start)
    }

    pub fn is_match(&self, subject: &str) -> bool {
        self.find(subject).is_found()
    }
}

/// `table[i]` is the length of the longest proper prefix of `chars[..i]`
/// that is also a suffix of it.
fn build_backtrack(chars: &[char]) -> Vec<usize> {
    let mut table = vec![0usize; chars.len()];
    for i in 0..chars.len() {
        for j in (1..i).rev() {
            if chars[..j] == chars[i - j..i] {
                table[i] = j;
                break;
            }
        }
    }
    table
}

/// Finds `pattern` inside `subject` without preprocessing, folding both sides
/// with `flags`. Suited to short, one-off comparisons.
pub fn find_direct(pattern: &str, subject: &str, flags: SearchFlags) -> MatchSpan {
    let needle = || pattern.chars().filter_map(|c| normalize(c, flags));
    if needle().next().is_none() {
        return MatchSpan::default();
    }
    for (start, first) in subject.char_indices() {
        if normalize(first, flags).is_none() {
            continue;
        }
        let mut wanted = needle().peekable();
        let mut caret = start;
        while let (Some(&expected), Some(raw)) = (wanted.peek(), char_at(subject, caret)) {
            caret += raw.len_utf8();
            match normalize(raw, flags) {
                None => continue,
                Some(c) if c == expected => {
                    wanted.next();
                }
                Some(_) => break,
            }
        }
        if wanted.peek().is_none() {
            let end = if flags.contains(SearchFlags::IGNORE_DIACRITICS) {
                absorb_marks(subject, caret)
            } else {
                caret
            };
            return MatchSpan::new(start, end);
        }
    }
    MatchSpan::new(subject.len(), subject.len())
}
