//! Font decoding: character codes to Unicode text and glyph advances.

use crate::objects::{self, get, get_array, get_dict, get_name, get_number, resolve};
use lopdf::{Dictionary, Document, Object};
use std::collections::HashMap;

const DEFAULT_WIDTH: f32 = 500.0;
const DEFAULT_CID_WIDTH: f32 = 1000.0;
const MAX_RANGE_ENTRIES: u32 = 0x1_0000;

/// Helvetica advance widths for codes 32..=126, in 1/1000 em.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // 32-47
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // 48-63
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // 64-79
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 80-95
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // 96-111
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 112-126
];

/// WinAnsiEncoding for 0x80..=0x9F; the rest of the upper half is Latin-1.
const WIN_ANSI_HIGH: [Option<char>; 32] = [
    Some('\u{20AC}'),
    None,
    Some('\u{201A}'),
    Some('\u{0192}'),
    Some('\u{201E}'),
    Some('\u{2026}'),
    Some('\u{2020}'),
    Some('\u{2021}'),
    Some('\u{02C6}'),
    Some('\u{2030}'),
    Some('\u{0160}'),
    Some('\u{2039}'),
    Some('\u{0152}'),
    None,
    Some('\u{017D}'),
    None,
    None,
    Some('\u{2018}'),
    Some('\u{2019}'),
    Some('\u{201C}'),
    Some('\u{201D}'),
    Some('\u{2022}'),
    Some('\u{2013}'),
    Some('\u{2014}'),
    Some('\u{02DC}'),
    Some('\u{2122}'),
    Some('\u{0161}'),
    Some('\u{203A}'),
    Some('\u{0153}'),
    None,
    Some('\u{017E}'),
    Some('\u{0178}'),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CodeWidth {
    One,
    Two,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BaseEncoding {
    WinAnsi,
    Standard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StandardMetrics {
    Helvetica,
    Courier,
}

/// One decoded character code.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DecodedCode {
    pub code: u32,
    /// `None` when the code has no known Unicode mapping
    pub text: Option<String>,
    /// Single-byte code 32, which receives word spacing
    pub is_word_space: bool,
}

/// Everything the content interpreter needs to know about a font.
#[derive(Debug, Clone)]
pub(crate) struct FontInfo {
    pub base_font: String,
    code_width: CodeWidth,
    to_unicode: Option<HashMap<u32, String>>,
    differences: HashMap<u32, String>,
    base_encoding: BaseEncoding,
    widths: HashMap<u32, f32>,
    default_width: f32,
    metrics: Option<StandardMetrics>,
    /// Scale from glyph units to 1/1000 em (Type3 fonts carry their own matrix)
    width_scale: f32,
}

impl FontInfo {
    /// Stand-in used when a `Tf` names a font the resources do not define.
    pub fn fallback() -> Self {
        Self {
            base_font: String::from("Unknown"),
            code_width: CodeWidth::One,
            to_unicode: None,
            differences: HashMap::new(),
            base_encoding: BaseEncoding::WinAnsi,
            widths: HashMap::new(),
            default_width: DEFAULT_WIDTH,
            metrics: None,
            width_scale: 1.0,
        }
    }

    pub fn from_dict(doc: &Document, dict: &Dictionary) -> Self {
        let subtype = get_name(doc, dict, b"Subtype").unwrap_or(b"Type1".as_slice());
        let base_font = get_name(doc, dict, b"BaseFont")
            .map(|raw| String::from_utf8_lossy(raw).into_owned())
            .unwrap_or_default();

        let mut font = Self { base_font, ..Self::fallback() };
        let cmap = match get(doc, dict, b"ToUnicode") {
            Some(Object::Stream(stream)) => objects::stream_content(stream).map(|bytes| parse_cmap(&bytes)),
            _ => None,
        };
        let one_byte_cmap = cmap.as_ref().is_some_and(|cmap| cmap.one_byte_codes);
        font.to_unicode = cmap.map(|cmap| cmap.map);

        if subtype == b"Type0" {
            font.load_composite(doc, dict, one_byte_cmap);
        } else {
            font.load_simple(doc, dict, subtype == b"Type3");
        }

        font
    }

    fn load_simple(&mut self, doc: &Document, dict: &Dictionary, is_type3: bool) {
        self.code_width = CodeWidth::One;

        match get(doc, dict, b"Encoding") {
            Some(Object::Name(name)) => self.base_encoding = base_encoding(name),
            Some(Object::Dictionary(encoding)) => {
                if let Some(name) = get_name(doc, encoding, b"BaseEncoding") {
                    self.base_encoding = base_encoding(name);
                }
                if let Some(items) = get_array(doc, encoding, b"Differences") {
                    self.differences = parse_differences(doc, items);
                }
            }
            _ => {}
        }

        if is_type3 {
            if let Some(values) =
                get_array(doc, dict, b"FontMatrix").and_then(|items| objects::matrix_values(doc, items))
            {
                self.width_scale = values[0].abs() * 1000.0;
            }
        }

        if let Some(descriptor) = get_dict(doc, dict, b"FontDescriptor") {
            if let Some(missing) = get_number(doc, descriptor, b"MissingWidth") {
                if missing > 0.0 {
                    self.default_width = missing;
                }
            }
        }

        let first_char = get_number(doc, dict, b"FirstChar").unwrap_or(0.0).max(0.0) as u32;
        if let Some(items) = get_array(doc, dict, b"Widths") {
            for (offset, item) in items.iter().enumerate() {
                let Some(code) = offset_code(first_char, offset) else {
                    break;
                };
                if let Some(width) = resolve(doc, item).and_then(objects::number) {
                    self.widths.insert(code, width);
                }
            }
        }

        if self.widths.is_empty() {
            self.metrics = standard_metrics(&self.base_font);
        }
    }

    fn load_composite(&mut self, doc: &Document, dict: &Dictionary, one_byte_cmap: bool) {
        self.code_width = if one_byte_cmap { CodeWidth::One } else { CodeWidth::Two };
        self.default_width = DEFAULT_CID_WIDTH;

        let descendant = get_array(doc, dict, b"DescendantFonts")
            .and_then(|items| items.first())
            .and_then(|item| resolve(doc, item))
            .and_then(|item| match item {
                Object::Dictionary(inner) => Some(inner),
                _ => None,
            });

        let Some(descendant) = descendant else {
            return;
        };

        if let Some(default_width) = get_number(doc, descendant, b"DW") {
            self.default_width = default_width;
        }
        if let Some(items) = get_array(doc, descendant, b"W") {
            self.widths = parse_cid_widths(doc, items);
        }
    }

    /// Split a shown string into character codes and decode each one.
    pub fn decode(&self, bytes: &[u8]) -> Vec<DecodedCode> {
        match self.code_width {
            CodeWidth::One => bytes.iter().map(|byte| self.decode_code(*byte as u32, true)).collect(),
            CodeWidth::Two => bytes
                .chunks(2)
                .map(|pair| {
                    let code = pair.iter().fold(0u32, |acc, byte| (acc << 8) | *byte as u32);
                    self.decode_code(code, pair.len() == 1)
                })
                .collect(),
        }
    }

    fn decode_code(&self, code: u32, single_byte: bool) -> DecodedCode {
        let text = self
            .to_unicode
            .as_ref()
            .and_then(|map| map.get(&code).cloned())
            .or_else(|| match self.code_width {
                CodeWidth::One => self.simple_unicode(code),
                CodeWidth::Two => char::from_u32(code)
                    .filter(|ch| !ch.is_control())
                    .map(String::from),
            });

        DecodedCode { code, text, is_word_space: single_byte && code == 32 }
    }

    fn simple_unicode(&self, code: u32) -> Option<String> {
        if let Some(name) = self.differences.get(&code) {
            return glyph_name_to_unicode(name);
        }

        let byte = u8::try_from(code).ok()?;
        if self.base_encoding == BaseEncoding::Standard {
            match byte {
                0x27 => return Some('\u{2019}'.to_string()),
                0x60 => return Some('\u{2018}'.to_string()),
                _ => {}
            }
        }
        win_ansi_char(byte).map(String::from)
    }

    /// Advance width of a code, in 1/1000 em.
    pub fn width(&self, code: u32) -> f32 {
        if let Some(width) = self.widths.get(&code) {
            return width * self.width_scale;
        }

        match self.metrics {
            Some(StandardMetrics::Courier) => 600.0,
            Some(StandardMetrics::Helvetica) => match code {
                32..=126 => HELVETICA_WIDTHS[(code - 32) as usize] as f32,
                _ => 556.0,
            },
            None => self.default_width,
        }
    }
}

fn base_encoding(name: &[u8]) -> BaseEncoding {
    match name {
        b"StandardEncoding" => BaseEncoding::Standard,
        _ => BaseEncoding::WinAnsi,
    }
}

fn standard_metrics(base_font: &str) -> Option<StandardMetrics> {
    // Subset fonts carry a six-letter tag such as "ABCDEF+Helvetica".
    let name = base_font.rsplit('+').next().unwrap_or(base_font);
    if name.starts_with("Helvetica") || name.starts_with("Arial") {
        Some(StandardMetrics::Helvetica)
    } else if name.starts_with("Courier") {
        Some(StandardMetrics::Courier)
    } else {
        None
    }
}

fn win_ansi_char(byte: u8) -> Option<char> {
    match byte {
        0x20..=0x7E => Some(byte as char),
        0x80..=0x9F => WIN_ANSI_HIGH[(byte - 0x80) as usize],
        0xA0..=0xFF => Some(byte as char),
        _ => None,
    }
}

fn parse_differences(doc: &Document, items: &[Object]) -> HashMap<u32, String> {
    let mut map = HashMap::new();
    // `None` once a run walks past the code space; names are skipped until
    // the next start code.
    let mut code = Some(0u32);

    for item in items {
        match resolve(doc, item) {
            Some(Object::Integer(start)) => code = u32::try_from(*start).ok(),
            Some(Object::Name(name)) => {
                if let Some(current) = code {
                    map.insert(current, String::from_utf8_lossy(name).into_owned());
                }
                code = code.and_then(|current| current.checked_add(1));
            }
            _ => {}
        }
    }

    map
}

/// `first + offset`, or `None` past the end of the code space.
fn offset_code(first: u32, offset: usize) -> Option<u32> {
    u32::try_from(offset).ok().and_then(|offset| first.checked_add(offset))
}

fn parse_cid_widths(doc: &Document, items: &[Object]) -> HashMap<u32, f32> {
    let mut widths = HashMap::new();
    let values: Vec<&Object> = items.iter().filter_map(|item| resolve(doc, item)).collect();
    let mut index = 0;

    while index < values.len() {
        let Some(first) = objects::number(values[index]) else {
            index += 1;
            continue;
        };
        let first = first.max(0.0) as u32;

        match values.get(index + 1) {
            Some(Object::Array(list)) => {
                for (offset, width) in list.iter().enumerate() {
                    let Some(code) = offset_code(first, offset) else {
                        break;
                    };
                    if let Some(width) = resolve(doc, width).and_then(objects::number) {
                        widths.insert(code, width);
                    }
                }
                index += 2;
            }
            Some(last) => {
                let last = objects::number(last).unwrap_or(first as f32).max(0.0) as u32;
                let width = values.get(index + 2).and_then(|value| objects::number(value));
                if let Some(width) = width {
                    for code in first..=last.min(first.saturating_add(MAX_RANGE_ENTRIES)) {
                        widths.insert(code, width);
                    }
                }
                index += 3;
            }
            None => break,
        }
    }

    widths
}

/// Map a PostScript glyph name to text.
pub(crate) fn glyph_name_to_unicode(name: &str) -> Option<String> {
    let name = name.split('.').next().unwrap_or(name);
    if name.is_empty() {
        return None;
    }

    if name.contains('_') {
        let parts: Option<Vec<String>> = name.split('_').map(glyph_name_to_unicode).collect();
        return parts.map(|parts| parts.concat());
    }

    if let Some(hex) = name.strip_prefix("uni") {
        if hex.len() >= 4 && hex.len() % 4 == 0 {
            let units: Option<Vec<u16>> = (0..hex.len() / 4)
                .map(|index| u16::from_str_radix(&hex[index * 4..index * 4 + 4], 16).ok())
                .collect();
            if let Some(units) = units {
                return Some(String::from_utf16_lossy(&units));
            }
        }
    }

    if let Some(hex) = name.strip_prefix('u') {
        if (4..=6).contains(&hex.len()) {
            if let Some(ch) = u32::from_str_radix(hex, 16).ok().and_then(char::from_u32) {
                return Some(ch.to_string());
            }
        }
    }

    let mut chars = name.chars();
    if let (Some(only), None) = (chars.next(), chars.next()) {
        if only.is_ascii_alphabetic() {
            return Some(only.to_string());
        }
    }

    if let Some(mapped) = named_glyph(name) {
        return Some(mapped.to_owned());
    }

    accented_glyph(name)
}

fn named_glyph(name: &str) -> Option<&'static str> {
    let text = match name {
        "space" | "nbspace" | "nonbreakingspace" => " ",
        "exclam" => "!",
        "quotedbl" => "\"",
        "numbersign" => "#",
        "dollar" => "$",
        "percent" => "%",
        "ampersand" => "&",
        "quotesingle" => "'",
        "parenleft" => "(",
        "parenright" => ")",
        "asterisk" => "*",
        "plus" => "+",
        "comma" => ",",
        "hyphen" | "minus" => "-",
        "sfthyphen" | "softhyphen" => "\u{00AD}",
        "period" => ".",
        "slash" => "/",
        "zero" => "0",
        "one" => "1",
        "two" => "2",
        "three" => "3",
        "four" => "4",
        "five" => "5",
        "six" => "6",
        "seven" => "7",
        "eight" => "8",
        "nine" => "9",
        "colon" => ":",
        "semicolon" => ";",
        "less" => "<",
        "equal" => "=",
        "greater" => ">",
        "question" => "?",
        "at" => "@",
        "bracketleft" => "[",
        "backslash" => "\\",
        "bracketright" => "]",
        "asciicircum" => "^",
        "underscore" => "_",
        "grave" => "`",
        "braceleft" => "{",
        "bar" => "|",
        "braceright" => "}",
        "asciitilde" => "~",
        "quoteleft" => "\u{2018}",
        "quoteright" => "\u{2019}",
        "quotesinglbase" => "\u{201A}",
        "quotedblleft" => "\u{201C}",
        "quotedblright" => "\u{201D}",
        "quotedblbase" => "\u{201E}",
        "guillemotleft" => "\u{00AB}",
        "guillemotright" => "\u{00BB}",
        "guilsinglleft" => "\u{2039}",
        "guilsinglright" => "\u{203A}",
        "endash" => "\u{2013}",
        "emdash" => "\u{2014}",
        "bullet" => "\u{2022}",
        "ellipsis" => "\u{2026}",
        "dagger" => "\u{2020}",
        "daggerdbl" => "\u{2021}",
        "periodcentered" => "\u{00B7}",
        "fi" => "\u{FB01}",
        "fl" => "\u{FB02}",
        "ff" => "\u{FB00}",
        "ffi" => "\u{FB03}",
        "ffl" => "\u{FB04}",
        "trademark" => "\u{2122}",
        "copyright" => "\u{00A9}",
        "registered" => "\u{00AE}",
        "degree" => "\u{00B0}",
        "section" => "\u{00A7}",
        "paragraph" => "\u{00B6}",
        "Euro" => "\u{20AC}",
        "sterling" => "\u{00A3}",
        "yen" => "\u{00A5}",
        "cent" => "\u{00A2}",
        "florin" => "\u{0192}",
        "perthousand" => "\u{2030}",
        "dotlessi" => "\u{0131}",
        "germandbls" => "\u{00DF}",
        "AE" => "\u{00C6}",
        "ae" => "\u{00E6}",
        "OE" => "\u{0152}",
        "oe" => "\u{0153}",
        "Oslash" => "\u{00D8}",
        "oslash" => "\u{00F8}",
        "Eth" => "\u{00D0}",
        "eth" => "\u{00F0}",
        "Thorn" => "\u{00DE}",
        "thorn" => "\u{00FE}",
        _ => return None,
    };
    Some(text)
}

/// Names such as `eacute` become the base letter plus a combining mark;
/// normalisation composes them later.
fn accented_glyph(name: &str) -> Option<String> {
    const ACCENTS: [(&str, char); 8] = [
        ("grave", '\u{0300}'),
        ("acute", '\u{0301}'),
        ("circumflex", '\u{0302}'),
        ("tilde", '\u{0303}'),
        ("dieresis", '\u{0308}'),
        ("ring", '\u{030A}'),
        ("cedilla", '\u{0327}'),
        ("caron", '\u{030C}'),
    ];

    let mut chars = name.chars();
    let base = chars.next().filter(|ch| ch.is_ascii_alphabetic())?;
    let suffix = chars.as_str();

    ACCENTS
        .iter()
        .find(|(accent, _)| *accent == suffix)
        .map(|(_, mark)| format!("{base}{mark}"))
}

/// Result of parsing a ToUnicode CMap.
#[derive(Debug, Default)]
pub(crate) struct ParsedCMap {
    pub map: HashMap<u32, String>,
    /// Every declared codespace range uses one-byte codes
    pub one_byte_codes: bool,
}

#[derive(Debug, Clone, PartialEq)]
enum CMapToken {
    Hex(Vec<u8>),
    ArrayStart,
    ArrayEnd,
    Word(String),
}

pub(crate) fn parse_cmap(bytes: &[u8]) -> ParsedCMap {
    let tokens = tokenize_cmap(bytes);
    let mut parsed = ParsedCMap::default();
    let mut codespace_lengths = Vec::new();
    let mut index = 0;

    while index < tokens.len() {
        match &tokens[index] {
            CMapToken::Word(word) if word == "begincodespacerange" => {
                index += 1;
                while let Some(CMapToken::Hex(low)) = tokens.get(index) {
                    codespace_lengths.push(low.len());
                    index += 2;
                }
            }
            CMapToken::Word(word) if word == "beginbfchar" => {
                index += 1;
                while let (Some(CMapToken::Hex(src)), Some(dst)) = (tokens.get(index), tokens.get(index + 1)) {
                    if let CMapToken::Hex(dst) = dst {
                        parsed.map.insert(code_value(src), utf16_text(dst));
                    }
                    index += 2;
                }
            }
            CMapToken::Word(word) if word == "beginbfrange" => {
                index += 1;
                while let (Some(CMapToken::Hex(low)), Some(CMapToken::Hex(high))) =
                    (tokens.get(index), tokens.get(index + 1))
                {
                    let low = code_value(low);
                    let high = code_value(high).min(low.saturating_add(MAX_RANGE_ENTRIES));
                    index += 2;

                    match tokens.get(index) {
                        Some(CMapToken::Hex(dst)) => {
                            insert_incrementing_range(&mut parsed.map, low, high, dst);
                            index += 1;
                        }
                        Some(CMapToken::ArrayStart) => {
                            index += 1;
                            let mut code = Some(low);
                            while let Some(CMapToken::Hex(dst)) = tokens.get(index) {
                                if let Some(current) = code.filter(|current| *current <= high) {
                                    parsed.map.insert(current, utf16_text(dst));
                                }
                                code = code.and_then(|current| current.checked_add(1));
                                index += 1;
                            }
                            if tokens.get(index) == Some(&CMapToken::ArrayEnd) {
                                index += 1;
                            }
                        }
                        _ => break,
                    }
                }
            }
            _ => index += 1,
        }
    }

    parsed.one_byte_codes =
        !codespace_lengths.is_empty() && codespace_lengths.iter().all(|len| *len == 1);
    parsed
}

fn insert_incrementing_range(map: &mut HashMap<u32, String>, low: u32, high: u32, dst: &[u8]) {
    let mut units: Vec<u16> = dst
        .chunks(2)
        .map(|pair| pair.iter().fold(0u16, |acc, byte| (acc << 8) | *byte as u16))
        .collect();
    if units.is_empty() {
        return;
    }

    for code in low..=high {
        map.insert(code, String::from_utf16_lossy(&units));
        if let Some(last) = units.last_mut() {
            *last = last.wrapping_add(1);
        }
    }
}

fn code_value(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0u32, |acc, byte| (acc << 8) | *byte as u32)
}

fn utf16_text(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks(2)
        .map(|pair| pair.iter().fold(0u16, |acc, byte| (acc << 8) | *byte as u16))
        .collect();
    String::from_utf16_lossy(&units)
}

fn tokenize_cmap(bytes: &[u8]) -> Vec<CMapToken> {
    let mut tokens = Vec::new();
    let mut index = 0;

    while index < bytes.len() {
        let byte = bytes[index];
        match byte {
            b'%' => {
                while index < bytes.len() && bytes[index] != b'\n' && bytes[index] != b'\r' {
                    index += 1;
                }
            }
            b'<' if bytes.get(index + 1) == Some(&b'<') => index += 2,
            b'>' if bytes.get(index + 1) == Some(&b'>') => index += 2,
            b'<' => {
                let start = index + 1;
                let end = bytes[start..]
                    .iter()
                    .position(|b| *b == b'>')
                    .map(|offset| start + offset)
                    .unwrap_or(bytes.len());
                tokens.push(CMapToken::Hex(decode_hex(&bytes[start..end])));
                index = end + 1;
            }
            b'[' => {
                tokens.push(CMapToken::ArrayStart);
                index += 1;
            }
            b']' => {
                tokens.push(CMapToken::ArrayEnd);
                index += 1;
            }
            b'(' => {
                // Literal strings only appear in CMap headers; skip them, honouring nesting.
                let mut depth = 0usize;
                while index < bytes.len() {
                    match bytes[index] {
                        b'\\' => index += 1,
                        b'(' => depth += 1,
                        b')' => {
                            depth = depth.saturating_sub(1);
                            if depth == 0 {
                                index += 1;
                                break;
                            }
                        }
                        _ => {}
                    }
                    index += 1;
                }
            }
            _ if byte.is_ascii_whitespace() => index += 1,
            _ => {
                let start = index;
                while index < bytes.len()
                    && !bytes[index].is_ascii_whitespace()
                    && !matches!(bytes[index], b'<' | b'>' | b'[' | b']' | b'(' | b'%')
                {
                    index += 1;
                }
                if index == start {
                    index += 1;
                    continue;
                }
                tokens.push(CMapToken::Word(String::from_utf8_lossy(&bytes[start..index]).into_owned()));
            }
        }
    }

    tokens
}

fn decode_hex(raw: &[u8]) -> Vec<u8> {
    let digits: Vec<u8> = raw
        .iter()
        .filter_map(|byte| (*byte as char).to_digit(16).map(|digit| digit as u8))
        .collect();

    digits
        .chunks(2)
        .map(|pair| match pair {
            [high, low] => (high << 4) | low,
            [high] => high << 4,
            _ => 0,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Stream};

    const SAMPLE_CMAP: &[u8] = b"/CIDInit /ProcSet findresource begin
12 dict begin
begincmap
/CMapName /Adobe-Identity-UCS def
1 begincodespacerange
<0000> <FFFF>
endcodespacerange
2 beginbfchar
<0003> <0020>
<0011> <00660069>
endbfchar
2 beginbfrange
<0024> <0026> <0041>
<0030> <0031> [<0078> <0079>]
endbfrange
endcmap";

    #[test]
    fn parses_bfchar_and_bfrange_entries() {
        let cmap = parse_cmap(SAMPLE_CMAP);

        assert!(!cmap.one_byte_codes);
        assert_eq!(cmap.map.get(&0x03).map(String::as_str), Some(" "));
        assert_eq!(cmap.map.get(&0x11).map(String::as_str), Some("fi"));
        assert_eq!(cmap.map.get(&0x24).map(String::as_str), Some("A"));
        assert_eq!(cmap.map.get(&0x26).map(String::as_str), Some("C"));
        assert_eq!(cmap.map.get(&0x30).map(String::as_str), Some("x"));
        assert_eq!(cmap.map.get(&0x31).map(String::as_str), Some("y"));
        assert!(cmap.map.get(&0x27).is_none());
    }

    #[test]
    fn bfrange_array_stops_at_the_end_of_the_code_space() {
        let cmap = parse_cmap(b"1 beginbfrange <FFFFFFFF> <FFFFFFFF> [<0061> <0062> <0063>] endbfrange");

        assert_eq!(cmap.map.get(&u32::MAX).map(String::as_str), Some("a"));
        assert_eq!(cmap.map.len(), 1);
    }

    #[test]
    fn detects_one_byte_codespace() {
        let cmap = parse_cmap(b"1 begincodespacerange <00> <FF> endcodespacerange");
        assert!(cmap.one_byte_codes);
    }

    #[test]
    fn glyph_names_map_to_text() {
        assert_eq!(glyph_name_to_unicode("a").as_deref(), Some("a"));
        assert_eq!(glyph_name_to_unicode("fi").as_deref(), Some("\u{FB01}"));
        assert_eq!(glyph_name_to_unicode("f_f_i").as_deref(), Some("ffi"));
        assert_eq!(glyph_name_to_unicode("uni00660069").as_deref(), Some("fi"));
        assert_eq!(glyph_name_to_unicode("u1F600").as_deref(), Some("\u{1F600}"));
        assert_eq!(glyph_name_to_unicode("quoteright").as_deref(), Some("\u{2019}"));
        assert_eq!(glyph_name_to_unicode("eacute").as_deref(), Some("e\u{0301}"));
        assert_eq!(glyph_name_to_unicode("A.sc").as_deref(), Some("A"));
        assert_eq!(glyph_name_to_unicode("g123"), None);
    }

    #[test]
    fn simple_font_uses_differences_then_win_ansi() {
        let doc = Document::with_version("1.5");
        let dict = dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => dictionary! {
                "Type" => "Encoding",
                "BaseEncoding" => "WinAnsiEncoding",
                "Differences" => vec![1.into(), Object::Name(b"fi".to_vec())],
            },
        };

        let font = FontInfo::from_dict(&doc, &dict);
        let decoded = font.decode(&[b'A', 1, 0x93, b' ', 0x05]);

        assert_eq!(decoded[0].text.as_deref(), Some("A"));
        assert_eq!(decoded[1].text.as_deref(), Some("\u{FB01}"));
        assert_eq!(decoded[2].text.as_deref(), Some("\u{201C}"));
        assert!(decoded[3].is_word_space);
        assert_eq!(decoded[4].text, None);
    }

    #[test]
    fn standard_helvetica_metrics_apply_without_widths() {
        let doc = Document::with_version("1.5");
        let dict = dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        };

        let font = FontInfo::from_dict(&doc, &dict);
        assert_eq!(font.width(b'i' as u32), 222.0);
        assert_eq!(font.width(b'W' as u32), 944.0);
        assert_eq!(font.width(b' ' as u32), 278.0);
    }

    #[test]
    fn explicit_widths_override_metrics() {
        let doc = Document::with_version("1.5");
        let dict = dictionary! {
            "Type" => "Font",
            "Subtype" => "TrueType",
            "BaseFont" => "ABCDEF+Arial",
            "FirstChar" => 65,
            "Widths" => vec![600.into(), 700.into()],
        };

        let font = FontInfo::from_dict(&doc, &dict);
        assert_eq!(font.width(65), 600.0);
        assert_eq!(font.width(66), 700.0);
        assert_eq!(font.width(67), DEFAULT_WIDTH);
    }

    #[test]
    fn widths_near_the_end_of_the_code_space_are_clamped() {
        let doc = Document::with_version("1.5");
        let dict = dictionary! {
            "Type" => "Font",
            "Subtype" => "TrueType",
            "BaseFont" => "Odd",
            "FirstChar" => Object::Integer(i64::from(u32::MAX)),
            "Widths" => vec![700.into(), 600.into()],
            "Encoding" => dictionary! {
                "Differences" => vec![
                    Object::Integer(i64::from(u32::MAX)),
                    Object::Name(b"a".to_vec()),
                    Object::Name(b"b".to_vec()),
                    Object::Integer(-4),
                    Object::Name(b"c".to_vec()),
                ],
            },
        };

        let font = FontInfo::from_dict(&doc, &dict);
        assert_eq!(font.width(u32::MAX), 700.0);
        assert_eq!(font.width(0), DEFAULT_WIDTH);
        assert_eq!(font.differences.get(&u32::MAX).map(String::as_str), Some("a"));
        assert_eq!(font.differences.len(), 1);
    }

    #[test]
    fn cid_widths_near_the_end_of_the_code_space_are_clamped() {
        let doc = Document::with_version("1.5");
        let dict = dictionary! {
            "Type" => "Font",
            "Subtype" => "Type0",
            "BaseFont" => "Custom",
            "Encoding" => "Identity-H",
            "DescendantFonts" => vec![Object::Dictionary(dictionary! {
                "Type" => "Font",
                "Subtype" => "CIDFontType2",
                "DW" => 1000,
                "W" => vec![
                    Object::Integer(4_294_967_000),
                    Object::Integer(i64::from(u32::MAX)),
                    Object::Integer(500),
                    Object::Integer(i64::from(u32::MAX)),
                    vec![Object::Integer(610), Object::Integer(620)].into(),
                ],
            })],
        };

        let font = FontInfo::from_dict(&doc, &dict);
        assert_eq!(font.width(4_294_967_000), 500.0);
        assert_eq!(font.width(u32::MAX), 610.0);
        assert_eq!(font.width(0x20), 1000.0);
    }

    #[test]
    fn composite_font_decodes_two_byte_codes_through_to_unicode() {
        let mut doc = Document::with_version("1.5");
        let cmap_id = doc.add_object(Stream::new(dictionary! {}, SAMPLE_CMAP.to_vec()));
        let dict = dictionary! {
            "Type" => "Font",
            "Subtype" => "Type0",
            "BaseFont" => "Custom",
            "Encoding" => "Identity-H",
            "ToUnicode" => cmap_id,
            "DescendantFonts" => vec![Object::Dictionary(dictionary! {
                "Type" => "Font",
                "Subtype" => "CIDFontType2",
                "DW" => 1000,
                "W" => vec![0x24.into(), vec![Object::Integer(650), Object::Integer(660)].into(), 0x30.into(), 0x31.into(), 480.into()],
            })],
        };

        let font = FontInfo::from_dict(&doc, &dict);
        let decoded = font.decode(&[0x00, 0x24, 0x00, 0x11, 0x00, 0x99]);

        assert_eq!(decoded.len(), 3);
        assert_eq!(decoded[0].text.as_deref(), Some("A"));
        assert_eq!(decoded[1].text.as_deref(), Some("fi"));
        assert_eq!(decoded[2].text, None);
        assert_eq!(font.width(0x24), 650.0);
        assert_eq!(font.width(0x25), 660.0);
        assert_eq!(font.width(0x31), 480.0);
        assert_eq!(font.width(0x99), 1000.0);
    }
}
