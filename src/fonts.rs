//! Standard-14 font selection, glyph metrics and WinAnsi text encoding.
//! Characters outside WinAnsi go to [`crate::fallback_font`].
//!
//! Widths are in thousandths of an em, taken from the Adobe core font AFMs.
//! Oblique and italic faces reuse the upright widths.

/// Generic family a `font-family` stack resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FontFamily {
    Sans,
    Serif,
    Mono,
}

impl FontFamily {
    /// The first name in the stack that maps to a known family wins;
    /// a stack with no recognizable name falls back to serif.
    pub fn from_stack<S: AsRef<str>>(names: &[S]) -> Self {
        names
            .iter()
            .find_map(|name| Self::classify(name.as_ref()))
            .unwrap_or(FontFamily::Serif)
    }

    fn classify(name: &str) -> Option<Self> {
        let name = name.to_ascii_lowercase();
        const MONO: &[&str] = &["mono", "courier", "consolas", "menlo", "monaco", "code", "fixed"];
        const SANS: &[&str] = &[
            "sans", "helvetica", "arial", "system-ui", "-apple-system", "blinkmacsystemfont",
            "segoe", "roboto", "verdana", "tahoma", "inter", "ubuntu", "cantarell",
        ];
        const SERIF: &[&str] = &[
            "serif", "times", "georgia", "garamond", "cambria", "palatino", "baskerville", "book",
        ];
        if MONO.iter().any(|k| name.contains(k)) {
            Some(FontFamily::Mono)
        } else if SANS.iter().any(|k| name.contains(k)) {
            Some(FontFamily::Sans)
        } else if SERIF.iter().any(|k| name.contains(k)) {
            Some(FontFamily::Serif)
        } else {
            None
        }
    }
}

/// The font a text run is drawn with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PdfFont {
    Standard(StandardFont),
    /// The embedded fallback face; run bytes are two-byte glyph ids.
    Fallback,
}

impl PdfFont {
    /// Name of the font in a page's resource dictionary.
    pub fn resource_name(&self) -> String {
        match self {
            PdfFont::Standard(font) => font.resource_name(),
            PdfFont::Fallback => "FB".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StandardFont {
    Helvetica,
    HelveticaBold,
    HelveticaOblique,
    HelveticaBoldOblique,
    TimesRoman,
    TimesBold,
    TimesItalic,
    TimesBoldItalic,
    Courier,
    CourierBold,
    CourierOblique,
    CourierBoldOblique,
}

impl StandardFont {
    pub const ALL: [StandardFont; 12] = [
        StandardFont::Helvetica,
        StandardFont::HelveticaBold,
        StandardFont::HelveticaOblique,
        StandardFont::HelveticaBoldOblique,
        StandardFont::TimesRoman,
        StandardFont::TimesBold,
        StandardFont::TimesItalic,
        StandardFont::TimesBoldItalic,
        StandardFont::Courier,
        StandardFont::CourierBold,
        StandardFont::CourierOblique,
        StandardFont::CourierBoldOblique,
    ];

    pub fn select(family: FontFamily, bold: bool, italic: bool) -> Self {
        use StandardFont::*;
        match (family, bold, italic) {
            (FontFamily::Sans, false, false) => Helvetica,
            (FontFamily::Sans, true, false) => HelveticaBold,
            (FontFamily::Sans, false, true) => HelveticaOblique,
            (FontFamily::Sans, true, true) => HelveticaBoldOblique,
            (FontFamily::Serif, false, false) => TimesRoman,
            (FontFamily::Serif, true, false) => TimesBold,
            (FontFamily::Serif, false, true) => TimesItalic,
            (FontFamily::Serif, true, true) => TimesBoldItalic,
            (FontFamily::Mono, false, false) => Courier,
            (FontFamily::Mono, true, false) => CourierBold,
            (FontFamily::Mono, false, true) => CourierOblique,
            (FontFamily::Mono, true, true) => CourierBoldOblique,
        }
    }

    pub fn base_font(&self) -> &'static str {
        use StandardFont::*;
        match self {
            Helvetica => "Helvetica",
            HelveticaBold => "Helvetica-Bold",
            HelveticaOblique => "Helvetica-Oblique",
            HelveticaBoldOblique => "Helvetica-BoldOblique",
            TimesRoman => "Times-Roman",
            TimesBold => "Times-Bold",
            TimesItalic => "Times-Italic",
            TimesBoldItalic => "Times-BoldItalic",
            Courier => "Courier",
            CourierBold => "Courier-Bold",
            CourierOblique => "Courier-Oblique",
            CourierBoldOblique => "Courier-BoldOblique",
        }
    }

    /// Name of the font in a page's resource dictionary (`/F1` ...).
    pub fn resource_name(&self) -> String {
        let index = Self::ALL.iter().position(|f| f == self).unwrap_or(0);
        format!("F{}", index + 1)
    }

    pub fn family(&self) -> FontFamily {
        use StandardFont::*;
        match self {
            Helvetica | HelveticaBold | HelveticaOblique | HelveticaBoldOblique => FontFamily::Sans,
            TimesRoman | TimesBold | TimesItalic | TimesBoldItalic => FontFamily::Serif,
            _ => FontFamily::Mono,
        }
    }

    pub fn is_bold(&self) -> bool {
        use StandardFont::*;
        matches!(
            self,
            HelveticaBold | HelveticaBoldOblique | TimesBold | TimesBoldItalic | CourierBold | CourierBoldOblique
        )
    }

    /// Ascender height in thousandths of an em.
    pub fn ascent(&self) -> f32 {
        match self.family() {
            FontFamily::Sans => 718.0,
            FontFamily::Serif => 683.0,
            FontFamily::Mono => 629.0,
        }
    }

    /// Descender depth (positive) in thousandths of an em.
    pub fn descent(&self) -> f32 {
        match self.family() {
            FontFamily::Sans => 207.0,
            FontFamily::Serif => 217.0,
            FontFamily::Mono => 157.0,
        }
    }

    /// Advance width of `c` in thousandths of an em.
    pub fn char_width(&self, c: char) -> f32 {
        let family = self.family();
        if c == '\u{AD}' {
            return 0.0;
        }
        if family == FontFamily::Mono {
            return 600.0;
        }
        let table = match (family, self.is_bold()) {
            (FontFamily::Sans, false) => &HELVETICA_WIDTHS,
            (FontFamily::Sans, true) => &HELVETICA_BOLD_WIDTHS,
            (_, false) => &TIMES_WIDTHS,
            (_, true) => &TIMES_BOLD_WIDTHS,
        };
        let ascii = |c: char| table[(c as usize) - 32] as f32;
        match c {
            ' '..='~' => ascii(c),
            '\u{A0}' | '\t' => ascii(' '),
            _ => {
                if let Some(w) = special_width(c, family) {
                    w
                } else if let Some(base) = fold_to_ascii(c) {
                    ascii(base)
                } else {
                    ascii('?')
                }
            }
        }
    }

    /// Width of `text` in points at `size`.
    pub fn text_width(&self, text: &str, size: f32) -> f32 {
        text.chars().map(|c| self.char_width(c)).sum::<f32>() * size / 1000.0
    }
}

#[rustfmt::skip]
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556,
    278, 278, 584, 584, 584, 556, 1015,
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833,
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611,
    278, 278, 278, 469, 556, 333,
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833,
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500,
    334, 260, 334, 584,
];

#[rustfmt::skip]
const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556,
    333, 333, 584, 584, 584, 611, 975,
    722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833,
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611,
    333, 278, 333, 584, 556, 333,
    556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889,
    611, 611, 611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500,
    389, 280, 389, 584,
];

#[rustfmt::skip]
const TIMES_WIDTHS: [u16; 95] = [
    250, 333, 408, 500, 500, 833, 778, 180, 333, 333, 500, 564, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500,
    278, 278, 564, 564, 564, 444, 921,
    722, 667, 667, 722, 611, 556, 722, 722, 333, 389, 722, 611, 889,
    722, 722, 556, 722, 667, 556, 611, 722, 722, 944, 722, 722, 611,
    333, 278, 333, 469, 500, 333,
    444, 500, 444, 500, 444, 333, 500, 500, 278, 278, 500, 278, 778,
    500, 500, 500, 500, 333, 389, 278, 500, 500, 722, 500, 500, 444,
    480, 200, 480, 541,
];

#[rustfmt::skip]
const TIMES_BOLD_WIDTHS: [u16; 95] = [
    250, 333, 555, 500, 500, 1000, 833, 278, 333, 333, 500, 570, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500,
    333, 333, 570, 570, 570, 500, 930,
    722, 667, 722, 722, 667, 611, 778, 778, 389, 500, 778, 667, 944,
    722, 778, 611, 778, 722, 556, 667, 722, 722, 1000, 722, 722, 667,
    333, 278, 333, 581, 500, 333,
    500, 556, 444, 556, 444, 333, 500, 556, 278, 333, 556, 278, 833,
    556, 500, 556, 556, 444, 389, 333, 556, 500, 722, 500, 500, 444,
    394, 220, 394, 520,
];

fn special_width(c: char, family: FontFamily) -> Option<f32> {
    let (sans, serif) = match c {
        '–' => (556, 500),
        '—' | '…' | '‰' => (1000, 1000),
        '•' => (350, 350),
        '“' | '”' | '„' => (333, 444),
        '‘' | '’' | '‚' | '‹' | '›' => (222, 333),
        '€' | '¢' | '£' | '¥' | '§' | '«' | '»' => (556, 500),
        '™' => (1000, 980),
        '©' | '®' => (737, 760),
        '°' => (400, 400),
        '±' | '×' | '÷' | '¬' => (584, 564),
        '·' => (278, 250),
        '¶' => (537, 453),
        '†' | '‡' => (556, 500),
        'Æ' | 'Œ' => (1000, 889),
        'æ' => (889, 667),
        'œ' => (944, 722),
        'ß' => (611, 500),
        '¡' => (333, 333),
        '¿' => (611, 444),
        _ => return None,
    };
    Some(match family {
        FontFamily::Sans => sans as f32,
        _ => serif as f32,
    })
}

/// The unaccented ASCII letter a Latin-1 character is drawn like.
fn fold_to_ascii(c: char) -> Option<char> {
    Some(match c {
        'À'..='Å' => 'A',
        'Ç' => 'C',
        'È'..='Ë' => 'E',
        'Ì'..='Ï' => 'I',
        'Ð' => 'D',
        'Ñ' => 'N',
        'Ò'..='Ö' | 'Ø' => 'O',
        'Ù'..='Ü' => 'U',
        'Ý' | 'Ÿ' => 'Y',
        'Þ' => 'P',
        'Š' => 'S',
        'Ž' => 'Z',
        'à'..='å' => 'a',
        'ç' => 'c',
        'è'..='ë' => 'e',
        'ì'..='ï' => 'i',
        'ð' | 'ò'..='ö' | 'ø' => 'o',
        'ñ' => 'n',
        'ù'..='ü' => 'u',
        'ý' | 'ÿ' => 'y',
        'þ' => 'p',
        'š' => 's',
        'ž' => 'z',
        'ƒ' => 'f',
        '¹' => '1',
        '²' => '2',
        '³' => '3',
        '¦' => '|',
        '´' | '¨' | '¯' | '¸' | 'ˆ' | '˜' => '`',
        'ª' | 'º' => 'o',
        '¼' | '½' | '¾' => '%',
        '¤' => '$',
        'µ' => 'u',
        _ => return None,
    })
}

/// The WinAnsiEncoding byte for `c`, if it has one.
pub fn winansi_byte(c: char) -> Option<u8> {
    let code = c as u32;
    match code {
        0x20..=0x7E | 0xA0..=0xFF => Some(code as u8),
        _ => Some(match c {
            '€' => 0x80,
            '‚' => 0x82,
            'ƒ' => 0x83,
            '„' => 0x84,
            '…' => 0x85,
            '†' => 0x86,
            '‡' => 0x87,
            'ˆ' => 0x88,
            '‰' => 0x89,
            'Š' => 0x8A,
            '‹' => 0x8B,
            'Œ' => 0x8C,
            'Ž' => 0x8E,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            '˜' => 0x98,
            '™' => 0x99,
            'š' => 0x9A,
            '›' => 0x9B,
            'œ' => 0x9C,
            'ž' => 0x9E,
            'Ÿ' => 0x9F,
            _ => return None,
        }),
    }
}

/// True when the standard fonts can draw `c`.
pub fn is_standard_encodable(c: char) -> bool {
    matches!(c, '\u{AD}' | '\t' | '\u{2212}' | '\u{2009}' | '\u{202F}' | '\u{2002}' | '\u{2003}')
        || winansi_byte(c).is_some()
}

/// Encode text as WinAnsi bytes. Characters outside the encoding become `?`;
/// the second value counts them.
pub fn encode_winansi(text: &str) -> (Vec<u8>, usize) {
    let mut bytes = Vec::with_capacity(text.len());
    let mut missing = 0;
    for c in text.chars() {
        match c {
            '\u{AD}' => {}
            '\t' => bytes.push(b' '),
            '\u{2212}' => bytes.push(b'-'),
            '\u{2009}' | '\u{202F}' | '\u{2002}' | '\u{2003}' => bytes.push(b' '),
            _ => match winansi_byte(c) {
                Some(b) => bytes.push(b),
                None => {
                    missing += 1;
                    bytes.push(b'?');
                }
            },
        }
    }
    (bytes, missing)
}

/// A PDF literal string for already encoded bytes.
pub fn pdf_literal(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() + 2);
    out.push('(');
    for &b in bytes {
        match b {
            b'\\' => out.push_str("\\\\"),
            b'(' => out.push_str("\\("),
            b')' => out.push_str("\\)"),
            0x20..=0x7E => out.push(b as char),
            _ => out.push_str(&format!("\\{:03o}", b)),
        }
    }
    out.push(')');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_from_default_stack() {
        let stack = ["-apple-system", "BlinkMacSystemFont", "Segoe UI", "Roboto", "sans-serif"];
        assert_eq!(FontFamily::from_stack(&stack), FontFamily::Sans);
        let mono = ["SFMono-Regular", "Consolas", "monospace"];
        assert_eq!(FontFamily::from_stack(&mono), FontFamily::Mono);
        assert_eq!(FontFamily::from_stack(&["Georgia", "serif"]), FontFamily::Serif);
        assert_eq!(FontFamily::from_stack(&["Unknown Face"]), FontFamily::Serif);
        let empty: [&str; 0] = [];
        assert_eq!(FontFamily::from_stack(&empty), FontFamily::Serif);
    }

    #[test]
    fn test_select_and_names() {
        let font = StandardFont::select(FontFamily::Sans, true, false);
        assert_eq!(font, StandardFont::HelveticaBold);
        assert_eq!(font.base_font(), "Helvetica-Bold");
        assert_eq!(font.resource_name(), "F2");
        assert_eq!(StandardFont::select(FontFamily::Mono, false, true).base_font(), "Courier-Oblique");
    }

    #[test]
    fn test_widths() {
        let helv = StandardFont::Helvetica;
        assert_eq!(helv.char_width('a'), 556.0);
        assert_eq!(helv.char_width('i'), 222.0);
        assert_eq!(helv.char_width('é'), 556.0);
        assert!((helv.text_width("Hello", 10.0) - 22.78).abs() < 0.01);
        assert_eq!(StandardFont::Courier.text_width("abc", 10.0), 18.0);
        assert!(StandardFont::HelveticaBold.text_width("m", 10.0) > helv.text_width("m", 10.0));
        assert_eq!(StandardFont::TimesRoman.char_width('—'), 1000.0);
    }

    #[test]
    fn test_winansi_encoding() {
        let (bytes, missing) = encode_winansi("Caf\u{e9} \u{2014} \u{20ac}5 \u{4e2d}");
        assert_eq!(bytes, vec![b'C', b'a', b'f', 0xE9, b' ', 0x97, b' ', 0x80, b'5', b' ', b'?']);
        assert_eq!(missing, 1);
    }

    #[test]
    fn test_standard_encodable() {
        assert!(is_standard_encodable('é'));
        assert!(is_standard_encodable('\u{2212}'));
        assert!(!is_standard_encodable('Ω'));
        assert!(!is_standard_encodable('\u{1F600}'));
        assert_eq!(PdfFont::Standard(StandardFont::Helvetica).resource_name(), "F1");
        assert_eq!(PdfFont::Fallback.resource_name(), "FB");
    }

    #[test]
    fn test_pdf_literal_escapes() {
        assert_eq!(pdf_literal(b"a(b)\\"), "(a\\(b\\)\\\\)");
        assert_eq!(pdf_literal(&[0xE9]), "(\\351)");
    }
}
