/// Best-effort language guess from the dominant script: Hebrew, Arabic, or `en`.
///
/// Only tells scripts apart, not languages: any Latin or Cyrillic text comes back
/// as `en`, and Persian or Urdu text as `ar`. Good enough for he/ar/en corpora;
/// anything wider needs a real detector.
pub fn detect_language(text: &str) -> &'static str {
    let mut hebrew = 0usize;
    let mut arabic = 0usize;
    let mut latin = 0usize;

    for c in text.chars() {
        if is_hebrew(c) {
            hebrew += 1;
        } else if is_arabic(c) {
            arabic += 1;
        } else if c.is_ascii_alphabetic() {
            latin += 1;
        }
    }

    if hebrew > latin && hebrew >= arabic && hebrew > 0 {
        "he"
    } else if arabic > latin && arabic > hebrew {
        "ar"
    } else {
        "en"
    }
}

fn is_hebrew(c: char) -> bool {
    matches!(c, '\u{0590}'..='\u{05FF}' | '\u{FB1D}'..='\u{FB4F}')
}

fn is_arabic(c: char) -> bool {
    matches!(c,
        '\u{0600}'..='\u{06FF}' |
        '\u{0750}'..='\u{077F}' |
        '\u{08A0}'..='\u{08FF}' |
        '\u{FB50}'..='\u{FDFF}' |
        '\u{FE70}'..='\u{FEFF}'
    )
}
