//! CSS value parsing: lengths, colors, borders and page sizes.
//!
//! All absolute lengths are normalized to PDF points (1/72 in). CSS pixels
//! are 1/96 in, so `1px == 0.75pt`.

use nom::IResult;
use nom::branch::alt;
use nom::bytes::complete::{is_not, tag, tag_no_case, take_while_m_n};
use nom::character::complete::{alpha1, anychar, char, digit0, digit1, multispace0, multispace1, one_of};
use nom::combinator::{map, map_opt, map_res, opt, recognize, value};
use nom::multi::{many0, many1, separated_list0, separated_list1};
use nom::sequence::{delimited, pair, preceded, tuple};

pub const PT_PER_PX: f32 = 0.75;
pub const PT_PER_IN: f32 = 72.0;
pub const PT_PER_CM: f32 = 72.0 / 2.54;
pub const PT_PER_MM: f32 = 72.0 / 25.4;

/// RGBA color; `a` is in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const TRANSPARENT: Color = Color { r: 0, g: 0, b: 0, a: 0.0 };

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Color { r, g, b, a: 1.0 }
    }

    pub fn is_transparent(&self) -> bool {
        self.a <= 0.0
    }

    /// Components in `0.0..=1.0`, translucent colors blended over white paper.
    pub fn to_pdf_rgb(&self) -> (f32, f32, f32) {
        let a = self.a.clamp(0.0, 1.0);
        let blend = |c: u8| (c as f32 / 255.0) * a + (1.0 - a);
        (blend(self.r), blend(self.g), blend(self.b))
    }
}

/// A specified length before layout resolves it against a containing block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Length {
    Pt(f32),
    Em(f32),
    Rem(f32),
    Percent(f32),
    Auto,
}

impl Length {
    pub const ZERO: Length = Length::Pt(0.0);

    /// Points for an already computed length; `%` resolves against `base`,
    /// `auto` resolves to zero.
    pub fn resolve(&self, base: f32) -> f32 {
        match *self {
            Length::Pt(v) => v,
            Length::Percent(p) => base * p / 100.0,
            Length::Em(_) | Length::Rem(_) | Length::Auto => 0.0,
        }
    }

    pub fn is_auto(&self) -> bool {
        matches!(self, Length::Auto)
    }
}

/// Run `parser` over the whole of `input` (surrounding whitespace ignored).
pub(crate) fn run_parser<'a, T, F>(mut parser: F, input: &'a str) -> Option<T>
where
    F: FnMut(&'a str) -> IResult<&'a str, T>,
{
    match parser(input.trim()) {
        Ok(("", result)) => Some(result),
        _ => None,
    }
}

pub(crate) fn ws<'a, F, O>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

fn string_body<'a>(stop: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    recognize(many0(alt((recognize(pair(char('\\'), anychar)), is_not(stop)))))
}

/// A quoted string, quotes included. An unterminated string runs to the end
/// of the input.
pub(crate) fn quoted(input: &str) -> IResult<&str, &str> {
    recognize(alt((
        tuple((char('"'), string_body("\"\\"), opt(char('"')))),
        tuple((char('\''), string_body("'\\"), opt(char('\'')))),
    )))(input)
}

/// A parenthesized group with nested groups and strings; unbalanced groups
/// run to the end of the input.
pub(crate) fn paren_group(input: &str) -> IResult<&str, &str> {
    recognize(tuple((
        char('('),
        many0(alt((quoted, paren_group, is_not("()\"'")))),
        opt(char(')')),
    )))(input)
}

fn value_token(input: &str) -> IResult<&str, &str> {
    recognize(many1(alt((quoted, paren_group, is_not(" \t\r\n\x0c()\"'"), tag(")")))))(input)
}

/// Split a declaration value on whitespace, keeping `rgb(1, 2, 3)` and
/// quoted strings together.
pub fn split_values(value: &str) -> Vec<&str> {
    run_parser(separated_list0(multispace1, value_token), value).unwrap_or_default()
}

fn number(input: &str) -> IResult<&str, f32> {
    map_res(
        recognize(pair(
            opt(one_of("+-")),
            alt((
                recognize(pair(digit1, opt(pair(char('.'), digit0)))),
                recognize(pair(char('.'), digit1)),
            )),
        )),
        |s: &str| s.parse::<f32>(),
    )(input)
}

fn length_from_unit(value: f32, unit: &str) -> Option<Length> {
    let length = match unit.to_ascii_lowercase().as_str() {
        "" if value == 0.0 => Length::Pt(0.0),
        "pt" => Length::Pt(value),
        "px" => Length::Pt(value * PT_PER_PX),
        "pc" => Length::Pt(value * 12.0),
        "in" => Length::Pt(value * PT_PER_IN),
        "cm" => Length::Pt(value * PT_PER_CM),
        "mm" => Length::Pt(value * PT_PER_MM),
        "q" => Length::Pt(value * PT_PER_MM / 4.0),
        "em" => Length::Em(value),
        "ex" => Length::Em(value / 2.0),
        "rem" => Length::Rem(value),
        "%" => Length::Percent(value),
        _ => return None,
    };
    Some(length)
}

fn length(input: &str) -> IResult<&str, Length> {
    alt((
        value(Length::Auto, tag_no_case("auto")),
        map_opt(pair(number, opt(alt((tag("%"), alpha1)))), |(v, unit)| {
            length_from_unit(v, unit.unwrap_or(""))
        }),
    ))(input)
}

/// Parse a length or percentage. A bare `0` is accepted; other unitless
/// numbers are not.
pub fn parse_length(input: &str) -> Option<Length> {
    run_parser(length, input)
}

/// Parse a plain number (`1.6`).
pub fn parse_number(input: &str) -> Option<f32> {
    run_parser(number, input)
}

/// Expand a 1-4 value box shorthand (`margin`, `padding`) into
/// `[top, right, bottom, left]`.
pub fn parse_box_shorthand(value: &str) -> Option<[Length; 4]> {
    let parts = run_parser(separated_list1(multispace1, length), value)?;
    match parts.as_slice() {
        [a] => Some([*a, *a, *a, *a]),
        [v, h] => Some([*v, *h, *v, *h]),
        [t, h, b] => Some([*t, *h, *b, *h]),
        [t, r, b, l] => Some([*t, *r, *b, *l]),
        _ => None,
    }
}

// --- Colors ---

fn hex_digit(input: &str) -> IResult<&str, u8> {
    map_res(take_while_m_n(1, 1, |c: char| c.is_ascii_hexdigit()), |d: &str| u8::from_str_radix(d, 16))(input)
}

fn hex_pair(input: &str) -> IResult<&str, u8> {
    map_res(take_while_m_n(2, 2, |c: char| c.is_ascii_hexdigit()), |d: &str| u8::from_str_radix(d, 16))(input)
}

fn hex_color(input: &str) -> IResult<&str, Color> {
    preceded(
        char('#'),
        alt((
            map(tuple((hex_pair, hex_pair, hex_pair, hex_pair)), |(r, g, b, a)| Color {
                a: a as f32 / 255.0,
                ..Color::rgb(r, g, b)
            }),
            map(tuple((hex_pair, hex_pair, hex_pair)), |(r, g, b)| Color::rgb(r, g, b)),
            map(tuple((hex_digit, hex_digit, hex_digit, hex_digit)), |(r, g, b, a)| Color {
                a: (a * 17) as f32 / 255.0,
                ..Color::rgb(r * 17, g * 17, b * 17)
            }),
            map(tuple((hex_digit, hex_digit, hex_digit)), |(r, g, b)| Color::rgb(r * 17, g * 17, b * 17)),
        )),
    )(input)
}

fn channel(input: &str) -> IResult<&str, u8> {
    map(pair(number, opt(char('%'))), |(v, percent)| match percent {
        Some(_) => (v.clamp(0.0, 100.0) * 2.55).round() as u8,
        None => v.clamp(0.0, 255.0).round() as u8,
    })(input)
}

fn alpha_value(input: &str) -> IResult<&str, f32> {
    map(pair(number, opt(char('%'))), |(v, percent)| match percent {
        Some(_) => v.clamp(0.0, 100.0) / 100.0,
        None => v.clamp(0.0, 1.0),
    })(input)
}

/// `rgb(r, g, b)`, `rgba(r, g, b, a)` or the space-separated `rgb(r g b / a)`.
fn rgb_function(input: &str) -> IResult<&str, Color> {
    map(
        delimited(
            pair(alt((tag_no_case("rgba"), tag_no_case("rgb"))), char('(')),
            alt((
                map(
                    tuple((
                        ws(channel),
                        char(','),
                        ws(channel),
                        char(','),
                        ws(channel),
                        opt(preceded(char(','), ws(alpha_value))),
                    )),
                    |(r, _, g, _, b, a)| (r, g, b, a),
                ),
                tuple((ws(channel), ws(channel), ws(channel), opt(preceded(char('/'), ws(alpha_value))))),
            )),
            char(')'),
        ),
        |(r, g, b, a)| Color { r, g, b, a: a.unwrap_or(1.0) },
    )(input)
}

/// Parse `#rgb`, `#rrggbb` (with optional alpha), `rgb()`/`rgba()`, a named
/// color, or `transparent`.
pub fn parse_color(input: &str) -> Option<Color> {
    run_parser(
        alt((
            hex_color,
            rgb_function,
            map_opt(alpha1, |name: &str| named_color(&name.to_ascii_lowercase())),
        )),
        input,
    )
}

fn named_color(name: &str) -> Option<Color> {
    let (r, g, b) = match name {
        "transparent" => return Some(Color::TRANSPARENT),
        "black" => (0, 0, 0),
        "white" => (255, 255, 255),
        "red" => (255, 0, 0),
        "green" => (0, 128, 0),
        "blue" => (0, 0, 255),
        "yellow" => (255, 255, 0),
        "orange" => (255, 165, 0),
        "purple" => (128, 0, 128),
        "gray" | "grey" => (128, 128, 128),
        "silver" => (192, 192, 192),
        "maroon" => (128, 0, 0),
        "olive" => (128, 128, 0),
        "lime" => (0, 255, 0),
        "aqua" | "cyan" => (0, 255, 255),
        "teal" => (0, 128, 128),
        "navy" => (0, 0, 128),
        "fuchsia" | "magenta" => (255, 0, 255),
        "brown" => (165, 42, 42),
        "pink" => (255, 192, 203),
        "gold" => (255, 215, 0),
        "indigo" => (75, 0, 130),
        "violet" => (238, 130, 238),
        "crimson" => (220, 20, 60),
        "coral" => (255, 127, 80),
        "salmon" => (250, 128, 114),
        "tomato" => (255, 99, 71),
        "khaki" => (240, 230, 140),
        "beige" => (245, 245, 220),
        "ivory" => (255, 255, 240),
        "lavender" => (230, 230, 250),
        "darkgray" | "darkgrey" => (169, 169, 169),
        "lightgray" | "lightgrey" => (211, 211, 211),
        "dimgray" | "dimgrey" => (105, 105, 105),
        "whitesmoke" => (245, 245, 245),
        "gainsboro" => (220, 220, 220),
        "darkblue" => (0, 0, 139),
        "darkgreen" => (0, 100, 0),
        "darkred" => (139, 0, 0),
        "steelblue" => (70, 130, 180),
        "royalblue" => (65, 105, 225),
        "skyblue" => (135, 206, 235),
        "lightblue" => (173, 216, 230),
        "lightyellow" => (255, 255, 224),
        "lightgreen" => (144, 238, 144),
        "slategray" | "slategrey" => (112, 128, 144),
        _ => return None,
    };
    Some(Color::rgb(r, g, b))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorderStyle {
    None,
    Hidden,
    Solid,
    Dashed,
    Dotted,
    Double,
    Groove,
    Ridge,
    Inset,
    Outset,
}

impl BorderStyle {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s.to_ascii_lowercase().as_str() {
            "none" => BorderStyle::None,
            "hidden" => BorderStyle::Hidden,
            "solid" => BorderStyle::Solid,
            "dashed" => BorderStyle::Dashed,
            "dotted" => BorderStyle::Dotted,
            "double" => BorderStyle::Double,
            "groove" => BorderStyle::Groove,
            "ridge" => BorderStyle::Ridge,
            "inset" => BorderStyle::Inset,
            "outset" => BorderStyle::Outset,
            _ => return None,
        })
    }

    pub fn is_visible(&self) -> bool {
        !matches!(self, BorderStyle::None | BorderStyle::Hidden)
    }
}

/// Parse a border width, including `thin`/`medium`/`thick`.
pub fn parse_border_width(s: &str) -> Option<Length> {
    match s.to_ascii_lowercase().as_str() {
        "thin" => Some(Length::Pt(1.0 * PT_PER_PX)),
        "medium" => Some(Length::Pt(3.0 * PT_PER_PX)),
        "thick" => Some(Length::Pt(5.0 * PT_PER_PX)),
        _ => match parse_length(s)? {
            Length::Auto | Length::Percent(_) => None,
            other => Some(other),
        },
    }
}

/// The three optional components of a `border` shorthand, in any order.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BorderShorthand {
    pub width: Option<Length>,
    pub style: Option<BorderStyle>,
    pub color: Option<Color>,
}

pub fn parse_border(value: &str) -> Option<BorderShorthand> {
    let mut border = BorderShorthand::default();
    for part in split_values(value) {
        if border.style.is_none() {
            if let Some(style) = BorderStyle::parse(part) {
                border.style = Some(style);
                continue;
            }
        }
        if border.width.is_none() {
            if let Some(width) = parse_border_width(part) {
                border.width = Some(width);
                continue;
            }
        }
        if border.color.is_none() {
            if let Some(color) = parse_color(part) {
                border.color = Some(color);
                continue;
            }
        }
        return None;
    }
    Some(border)
}

fn family_name(input: &str) -> IResult<&str, &str> {
    ws(alt((quoted, is_not(","))))(input)
}

/// Split a `font-family` list, unquoting names.
pub fn parse_font_family(value: &str) -> Vec<String> {
    let names = separated_list0(char(','), opt(family_name))(value)
        .map(|(_, names)| names)
        .unwrap_or_default();
    names
        .into_iter()
        .flatten()
        .map(|f| f.trim().trim_matches(|c| c == '"' || c == '\'').trim().to_string())
        .filter(|f| !f.is_empty())
        .collect()
}

/// Page dimensions in points for an `@page { size: ... }` value.
pub fn parse_page_size(value: &str) -> Option<(f32, f32)> {
    let mut named: Option<(f32, f32)> = None;
    let mut landscape: Option<bool> = None;
    let mut lengths: Vec<f32> = Vec::new();

    for part in split_values(value) {
        match part.to_ascii_lowercase().as_str() {
            "auto" => named = Some((595.28, 841.89)),
            "landscape" => landscape = Some(true),
            "portrait" => landscape = Some(false),
            name => {
                if let Some(size) = named_page_size(name) {
                    named = Some(size);
                } else if let Some(Length::Pt(v)) = parse_length(part) {
                    lengths.push(v);
                } else {
                    return None;
                }
            }
        }
    }

    let (w, h) = match (named, lengths.as_slice()) {
        (Some(size), []) => size,
        (None, [side]) => (*side, *side),
        (None, [w, h]) => (*w, *h),
        (None, []) if landscape.is_some() => (595.28, 841.89),
        _ => return None,
    };
    Some(match landscape {
        Some(true) => (w.max(h), w.min(h)),
        Some(false) => (w.min(h), w.max(h)),
        None => (w, h),
    })
}

fn named_page_size(name: &str) -> Option<(f32, f32)> {
    let mm = |w: f32, h: f32| (w * PT_PER_MM, h * PT_PER_MM);
    Some(match name {
        "a3" => mm(297.0, 420.0),
        "a4" => mm(210.0, 297.0),
        "a5" => mm(148.0, 210.0),
        "b4" => mm(250.0, 353.0),
        "b5" => mm(176.0, 250.0),
        "letter" => (612.0, 792.0),
        "legal" => (612.0, 1008.0),
        "ledger" => (792.0, 1224.0),
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 0.01
    }

    #[test]
    fn test_parse_lengths() {
        assert_eq!(parse_length("12pt"), Some(Length::Pt(12.0)));
        assert_eq!(parse_length("16px"), Some(Length::Pt(12.0)));
        assert_eq!(parse_length("1.5em"), Some(Length::Em(1.5)));
        assert_eq!(parse_length("85%"), Some(Length::Percent(85.0)));
        assert_eq!(parse_length("0"), Some(Length::Pt(0.0)));
        assert_eq!(parse_length("auto"), Some(Length::Auto));
        assert_eq!(parse_length("12"), None);
        assert_eq!(parse_length("12furlongs"), None);
        match parse_length("2cm") {
            Some(Length::Pt(v)) => assert!(approx(v, 56.69)),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_colors() {
        assert_eq!(parse_color("#333"), Some(Color::rgb(0x33, 0x33, 0x33)));
        assert_eq!(parse_color("#0366d6"), Some(Color::rgb(0x03, 0x66, 0xd6)));
        assert_eq!(parse_color("rgb(10, 20, 30)"), Some(Color::rgb(10, 20, 30)));
        assert_eq!(parse_color("RED"), Some(Color::rgb(255, 0, 0)));
        assert!(parse_color("transparent").unwrap().is_transparent());
        let translucent = parse_color("rgba(0, 0, 0, 0.5)").unwrap();
        assert!(approx(translucent.a, 0.5));
        assert_eq!(parse_color("#12"), None);
        assert_eq!(parse_color("notacolor"), None);
    }

    #[test]
    fn test_modern_color_forms() {
        let c = parse_color("rgb(10 20 30 / 50%)").unwrap();
        assert_eq!((c.r, c.g, c.b), (10, 20, 30));
        assert!(approx(c.a, 0.5));
        let c = parse_color("#0008").unwrap();
        assert_eq!((c.r, c.g, c.b), (0, 0, 0));
        assert!(approx(c.a, 136.0 / 255.0));
        let c = parse_color("#00000080").unwrap();
        assert!(approx(c.a, 128.0 / 255.0));
        assert_eq!(parse_color("rgb(10, 20)"), None);
        assert_eq!(parse_color("#12345"), None);
    }

    #[test]
    fn test_translucent_blends_over_white() {
        let (r, g, b) = Color { r: 0, g: 0, b: 0, a: 0.5 }.to_pdf_rgb();
        assert!(approx(r, 0.5) && approx(g, 0.5) && approx(b, 0.5));
    }

    #[test]
    fn test_box_shorthand() {
        let m = parse_box_shorthand("6px 13px").unwrap();
        assert_eq!(m[0], Length::Pt(4.5));
        assert_eq!(m[1], Length::Pt(9.75));
        assert_eq!(m[2], Length::Pt(4.5));
        assert_eq!(m[3], Length::Pt(9.75));
        let m = parse_box_shorthand("1.5em 0").unwrap();
        assert_eq!(m[0], Length::Em(1.5));
        assert_eq!(m[1], Length::Pt(0.0));
        assert!(parse_box_shorthand("1px 2px 3px 4px 5px").is_none());
    }

    #[test]
    fn test_border_shorthand_any_order() {
        let b = parse_border("2px solid #e1e4e8").unwrap();
        assert_eq!(b.width, Some(Length::Pt(1.5)));
        assert_eq!(b.style, Some(BorderStyle::Solid));
        assert_eq!(b.color, Some(Color::rgb(0xe1, 0xe4, 0xe8)));

        let b = parse_border("#000 dashed thin").unwrap();
        assert_eq!(b.style, Some(BorderStyle::Dashed));
        assert_eq!(b.width, Some(Length::Pt(0.75)));

        let b = parse_border("0").unwrap();
        assert_eq!(b.width, Some(Length::Pt(0.0)));
        assert!(parse_border("solid solid").is_none());
    }

    #[test]
    fn test_split_values_keeps_functions() {
        assert_eq!(
            split_values("1px solid rgb(1, 2, 3)"),
            vec!["1px", "solid", "rgb(1, 2, 3)"]
        );
        assert_eq!(split_values("  'Open Sans'  serif "), vec!["'Open Sans'", "serif"]);
        // Unterminated groups and strings run to the end.
        assert_eq!(split_values("1px rgb(1, 2"), vec!["1px", "rgb(1, 2"]);
        assert_eq!(split_values("\"a b"), vec!["\"a b"]);
        assert!(split_values("").is_empty());
    }

    #[test]
    fn test_font_family_list() {
        assert_eq!(
            parse_font_family("'Segoe UI', Roboto, \"Helvetica Neue\", sans-serif"),
            vec!["Segoe UI", "Roboto", "Helvetica Neue", "sans-serif"]
        );
    }

    #[test]
    fn test_page_sizes() {
        let (w, h) = parse_page_size("A4").unwrap();
        assert!(approx(w, 595.28) && approx(h, 841.89));
        assert_eq!(parse_page_size("letter"), Some((612.0, 792.0)));
        assert_eq!(parse_page_size("letter landscape"), Some((792.0, 612.0)));
        assert_eq!(parse_page_size("100pt 200pt"), Some((100.0, 200.0)));
        assert_eq!(parse_page_size("galactic"), None);
    }
}

#[cfg(test)]
mod proptest_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn parse_color_doesnt_crash(s in "\\PC{0,40}") {
            let _ = parse_color(&s);
        }

        #[test]
        fn parse_length_doesnt_crash(s in "\\PC{0,40}") {
            let _ = parse_length(&s);
        }

        #[test]
        fn px_lengths_scale(v in 0u32..10_000) {
            let parsed = parse_length(&format!("{}px", v));
            prop_assert_eq!(parsed, Some(Length::Pt(v as f32 * PT_PER_PX)));
        }
    }
}
