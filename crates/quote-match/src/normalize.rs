use unicode_normalization::UnicodeNormalization;

/// Fold text into the comparison form shared by quotes and page text.
///
/// Invisible format characters are dropped, then NFKC, lowercase and NFKC
/// again, curly quotes and dash variants map to ASCII, and whitespace runs
/// collapse to a single space with both ends trimmed. Applying it twice
/// gives the same result as applying it once.
pub fn normalize(text: &str) -> String {
    let visible: String = text.chars().filter(|ch| !is_invisible(*ch)).collect();
    let folded: String = visible.nfkc().collect::<String>().to_lowercase().nfkc().collect();

    let mut out = String::with_capacity(folded.len());
    let mut pending_space = false;

    for ch in folded.chars().map(unify_punctuation) {
        if ch.is_whitespace() {
            pending_space = !out.is_empty();
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        out.push(ch);
    }

    out
}

fn is_invisible(ch: char) -> bool {
    matches!(ch, '\u{00AD}' | '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' | '\u{FEFF}')
}

fn unify_punctuation(ch: char) -> char {
    match ch {
        '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' | '\u{2032}' | '\u{2039}' | '\u{203A}' => '\'',
        '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' | '\u{2033}' | '\u{00AB}' | '\u{00BB}' => '"',
        '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2014}' | '\u{2015}' | '\u{2212}' => '-',
        other => other,
    }
}
