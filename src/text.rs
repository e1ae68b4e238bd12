//! Character classification shared by the matcher, the query parser and the
//! index builder.

use once_cell::sync::Lazy;
use regex::Regex;

const INITIALS: &str = "[bpmfdtnlgkhjqxzcsr]|zh|ch|sh";
const STANDALONE_FINALS: &str = "a|o|e|ai|ei|ao|ou|an|en|ang|eng|ong";
const FINALS: &str = "i|ia|ie|iao|iu|ian|in|iang|ing|iong|u|ua|uo|uai|ui|uan|un|uang|ueng|ue";
const STANDALONE: &str =
    "yi|ya|ye|yao|you|yan|yin|yang|ying|yong|wu|wa|wo|wai|wei|wan|wen|wang|weng|yu|yue|yuan|yun";

static PINYIN_RE: Lazy<Regex> = Lazy::new(|| {
    let syllable = format!(
        "(({INITIALS})({STANDALONE_FINALS}|{FINALS})|{STANDALONE_FINALS}|{STANDALONE})r?"
    );
    Regex::new(&format!("(?i)^({syllable})+$")).expect("pinyin grammar is a valid regex")
});

/// Precomposed code points below U+0200 mapped to their base letter.
static DIACRITIC_FOLD: [u16; 0x200] = [
    0x0000, 0x0001, 0x0002, 0x0003, 0x0004, 0x0005, 0x0006, 0x0007, 0x0008, 0x0009, 0x000A, 0x000B,
    0x000C, 0x000D, 0x000E, 0x000F, 0x0010, 0x0011, 0x0012, 0x0013, 0x0014, 0x0015, 0x0016, 0x0017,
    0x0018, 0x0019, 0x001A, 0x001B, 0x001C, 0x001D, 0x001E, 0x001F, 0x0020, 0x0021, 0x0022, 0x0023,
    0x0024, 0x0025, 0x0026, 0x0027, 0x0028, 0x0029, 0x002A, 0x002B, 0x002C, 0x002D, 0x002E, 0x002F,
    0x0030, 0x0031, 0x0032, 0x0033, 0x0034, 0x0035, 0x0036, 0x0037, 0x0038, 0x0039, 0x003A, 0x003B,
    0x003C, 0x003D, 0x003E, 0x003F, 0x0040, 0x0041, 0x0042, 0x0043, 0x0044, 0x0045, 0x0046, 0x0047,
    0x0048, 0x0049, 0x004A, 0x004B, 0x004C, 0x004D, 0x004E, 0x004F, 0x0050, 0x0051, 0x0052, 0x0053,
    0x0054, 0x0055, 0x0056, 0x0057, 0x0058, 0x0059, 0x005A, 0x005B, 0x005C, 0x005D, 0x005E, 0x005F,
    0x0060, 0x0061, 0x0062, 0x0063, 0x0064, 0x0065, 0x0066, 0x0067, 0x0068, 0x0069, 0x006A, 0x006B,
    0x006C, 0x006D, 0x006E, 0x006F, 0x0070, 0x0071, 0x0072, 0x0073, 0x0074, 0x0075, 0x0076, 0x0077,
    0x0078, 0x0079, 0x007A, 0x007B, 0x007C, 0x007D, 0x007E, 0x007F, 0x0080, 0x0081, 0x0082, 0x0083,
    0x0084, 0x0085, 0x0086, 0x0087, 0x0088, 0x0089, 0x008A, 0x008B, 0x008C, 0x008D, 0x008E, 0x008F,
    0x0090, 0x0091, 0x0092, 0x0093, 0x0094, 0x0095, 0x0096, 0x0097, 0x0098, 0x0099, 0x009A, 0x009B,
    0x009C, 0x009D, 0x009E, 0x009F, 0x0020, 0x00A1, 0x00A2, 0x00A3, 0x00A4, 0x00A5, 0x00A6, 0x00A7,
    0x0020, 0x00A9, 0x0061, 0x00AB, 0x00AC, 0x00AD, 0x00AE, 0x0020, 0x00B0, 0x00B1, 0x0032, 0x0033,
    0x0020, 0x03BC, 0x00B6, 0x00B7, 0x0020, 0x0031, 0x006F, 0x00BB, 0x0031, 0x0031, 0x0033, 0x00BF,
    0x0041, 0x0041, 0x0041, 0x0041, 0x0041, 0x0041, 0x00C6, 0x0043, 0x0045, 0x0045, 0x0045, 0x0045,
    0x0049, 0x0049, 0x0049, 0x0049, 0x00D0, 0x004E, 0x004F, 0x004F, 0x004F, 0x004F, 0x004F, 0x00D7,
    0x00D8, 0x0055, 0x0055, 0x0055, 0x0055, 0x0059, 0x00DE, 0x00DF, 0x0061, 0x0061, 0x0061, 0x0061,
    0x0061, 0x0061, 0x00E6, 0x0063, 0x0065, 0x0065, 0x0065, 0x0065, 0x0069, 0x0069, 0x0069, 0x0069,
    0x00F0, 0x006E, 0x006F, 0x006F, 0x006F, 0x006F, 0x006F, 0x00F7, 0x00F8, 0x0075, 0x0075, 0x0075,
    0x0075, 0x0079, 0x00FE, 0x0079, 0x0041, 0x0061, 0x0041, 0x0061, 0x0041, 0x0061, 0x0043, 0x0063,
    0x0043, 0x0063, 0x0043, 0x0063, 0x0043, 0x0063, 0x0044, 0x0064, 0x0110, 0x0111, 0x0045, 0x0065,
    0x0045, 0x0065, 0x0045, 0x0065, 0x0045, 0x0065, 0x0045, 0x0065, 0x0047, 0x0067, 0x0047, 0x0067,
    0x0047, 0x0067, 0x0047, 0x0067, 0x0048, 0x0068, 0x0126, 0x0127, 0x0049, 0x0069, 0x0049, 0x0069,
    0x0049, 0x0069, 0x0049, 0x0069, 0x0049, 0x0131, 0x0049, 0x0069, 0x004A, 0x006A, 0x004B, 0x006B,
    0x0138, 0x004C, 0x006C, 0x004C, 0x006C, 0x004C, 0x006C, 0x004C, 0x006C, 0x0141, 0x0142, 0x004E,
    0x006E, 0x004E, 0x006E, 0x004E, 0x006E, 0x02BC, 0x014A, 0x014B, 0x004F, 0x006F, 0x004F, 0x006F,
    0x004F, 0x006F, 0x0152, 0x0153, 0x0052, 0x0072, 0x0052, 0x0072, 0x0052, 0x0072, 0x0053, 0x0073,
    0x0053, 0x0073, 0x0053, 0x0073, 0x0053, 0x0073, 0x0054, 0x0074, 0x0054, 0x0074, 0x0166, 0x0167,
    0x0055, 0x0075, 0x0055, 0x0075, 0x0055, 0x0075, 0x0055, 0x0075, 0x0055, 0x0075, 0x0055, 0x0075,
    0x0057, 0x0077, 0x0059, 0x0079, 0x0059, 0x005A, 0x007A, 0x005A, 0x007A, 0x005A, 0x007A, 0x0073,
    0x0180, 0x0181, 0x0182, 0x0183, 0x0184, 0x0185, 0x0186, 0x0187, 0x0188, 0x0189, 0x018A, 0x018B,
    0x018C, 0x018D, 0x018E, 0x018F, 0x0190, 0x0191, 0x0192, 0x0193, 0x0194, 0x0195, 0x0196, 0x0197,
    0x0198, 0x0199, 0x019A, 0x019B, 0x019C, 0x019D, 0x019E, 0x019F, 0x004F, 0x006F, 0x01A2, 0x01A3,
    0x01A4, 0x01A5, 0x01A6, 0x01A7, 0x01A8, 0x01A9, 0x01AA, 0x01AB, 0x01AC, 0x01AD, 0x01AE, 0x0055,
    0x0075, 0x01B1, 0x01B2, 0x01B3, 0x01B4, 0x01B5, 0x01B6, 0x01B7, 0x01B8, 0x01B9, 0x01BA, 0x01BB,
    0x01BC, 0x01BD, 0x01BE, 0x01BF, 0x01C0, 0x01C1, 0x01C2, 0x01C3, 0x0044, 0x0044, 0x0064, 0x004C,
    0x004C, 0x006C, 0x004E, 0x004E, 0x006E, 0x0041, 0x0061, 0x0049, 0x0069, 0x004F, 0x006F, 0x0055,
    0x0075, 0x0055, 0x0075, 0x0055, 0x0075, 0x0055, 0x0075, 0x0055, 0x0075, 0x01DD, 0x0041, 0x0061,
    0x0041, 0x0061, 0x00C6, 0x00E6, 0x01E4, 0x01E5, 0x0047, 0x0067, 0x004B, 0x006B, 0x004F, 0x006F,
    0x004F, 0x006F, 0x01B7, 0x0292, 0x006A, 0x0044, 0x0044, 0x0064, 0x0047, 0x0067, 0x01F6, 0x01F7,
    0x004E, 0x006E, 0x0041, 0x0061, 0x00C6, 0x00E6, 0x00D8, 0x00F8,
];

/// Punctuation, spaces and everything at or below `.` in code point order,
/// plus the common full-width separators.
pub fn is_blank(c: char) -> bool {
    matches!(
        c,
        '\0'..='.'
            | '\u{3000}'..='\u{3002}'
            | '\u{FF01}'..='\u{FF0E}'
            | '\u{FF1A}'
            | '\u{FF1B}'
            | '\u{FF1F}'
    )
}

/// Combining diacritical marks block.
pub fn is_diacritic(c: char) -> bool {
    ('\u{0300}'..='\u{036F}').contains(&c)
}

pub fn is_chinese(c: char) -> bool {
    matches!(
        c,
        '\u{2E80}'..='\u{303F}'
            | '\u{3400}'..='\u{9FFF}'
            | '\u{F900}'..='\u{FAFF}'
            | '\u{20000}'..='\u{2CEAF}'
    )
}

/// True when every character of a non-empty token is Chinese script.
pub fn is_chinese_text(text: &str) -> bool {
    !text.is_empty() && text.chars().all(is_chinese)
}

/// Maps precomposed Latin letters to their undecorated base letter.
pub fn fold_diacritic(c: char) -> char {
    let code = c as u32;
    if code < 0x200 {
        char::from_u32(u32::from(DIACRITIC_FOLD[code as usize])).unwrap_or(c)
    } else {
        c
    }
}

/// Removes accents: folds precomposed letters and drops combining marks.
pub fn strip_accents(text: &str) -> String {
    text.chars()
        .filter(|c| !is_diacritic(*c))
        .map(fold_diacritic)
        .collect()
}

/// Number of user-perceptible characters, combining marks excluded.
pub fn display_length(text: &str) -> usize {
    text.chars().filter(|c| !is_diacritic(*c)).count()
}

/// Bit `n` is set when the `n`th Latin letter appears in any of `texts`,
/// ignoring case and accents.
pub fn letter_mask<'a, I>(texts: I) -> u64
where
    I: IntoIterator<Item = &'a str>,
{
    let mut mask = 0u64;
    for text in texts {
        for c in text.chars() {
            let c = fold_diacritic(c).to_ascii_lowercase();
            if c.is_ascii_lowercase() {
                mask |= 1 << (c as u32 - 'a' as u32);
            }
        }
    }
    mask
}

/// Checks a token against the Mandarin syllable grammar.
pub fn is_pinyin(token: &str) -> bool {
    !token.is_empty() && PINYIN_RE.is_match(&strip_accents(token))
}
