//! Stylesheet parsing with CSS error recovery.
//!
//! Rules whose selector cannot be parsed and declarations without a
//! `name: value` shape are dropped with a warning; parsing carries on with
//! the next rule or declaration.

use crate::selector::{Selector, parse_selector_list};
use crate::units::{paren_group, quoted, run_parser, ws};
use nom::IResult;
use nom::branch::alt;
use nom::bytes::complete::{is_not, tag, tag_no_case, take_till, take_until, take_while, take_while1, take_while_m_n};
use nom::character::complete::{char, multispace0};
use nom::combinator::{map, opt, recognize, rest, value};
use nom::multi::{fold_many0, many0, many1};
use nom::sequence::{delimited, pair, preceded, terminated, tuple};

#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub property: String,
    pub value: String,
    pub important: bool,
}

#[derive(Debug, Clone)]
pub struct StyleRule {
    pub selectors: Vec<Selector>,
    pub declarations: Vec<Declaration>,
}

#[derive(Debug, Clone, Default)]
pub struct Stylesheet {
    pub rules: Vec<StyleRule>,
    /// Declarations of `@page` rules without a page selector, in order.
    pub page_declarations: Vec<Declaration>,
}

impl Stylesheet {
    pub fn parse(css: &str) -> Self {
        let mut sheet = Stylesheet::default();
        let cleaned = strip_comments(css);
        parse_rules(&cleaned, &mut sheet);
        sheet
    }
}

fn comment(input: &str) -> IResult<&str, &str> {
    preceded(tag("/*"), alt((terminated(take_until("*/"), tag("*/")), rest)))(input)
}

fn strip_comments(css: &str) -> String {
    let piece = alt((quoted, value(" ", comment), is_not("\"'/"), tag("/")));
    fold_many0(piece, || String::with_capacity(css.len()), |mut out, piece| {
        out.push_str(piece);
        out
    })(css)
    .map(|(_, out)| out)
    .unwrap_or_default()
}

/// The contents of a `{ ... }` block, nested blocks included. A block left
/// open at the end of the input runs to the end.
fn block(input: &str) -> IResult<&str, &str> {
    delimited(char('{'), recognize(many0(alt((quoted, recognize(block), is_not("{}\"'"))))), opt(char('}')))(input)
}

/// Everything up to the next top-level `{`, `}` or `;`.
fn prelude(input: &str) -> IResult<&str, &str> {
    recognize(many0(alt((quoted, paren_group, is_not("{};\"'(")))))(input)
}

#[derive(Clone)]
enum Item<'a> {
    Rule { prelude: &'a str, block: &'a str },
    AtRule { name: &'a str, prelude: &'a str, block: Option<&'a str> },
    /// A prelude ended by `;` or the end of input instead of a block.
    Orphan(&'a str),
    /// Stray `}` and CDO/CDC tokens.
    Junk,
}

fn at_rule(input: &str) -> IResult<&str, Item<'_>> {
    map(
        tuple((
            preceded(char('@'), take_while1(|c: char| c.is_alphanumeric() || c == '-')),
            prelude,
            alt((map(block, Some), value(None, opt(char(';'))))),
        )),
        |(name, prelude, block)| Item::AtRule { name, prelude: prelude.trim(), block },
    )(input)
}

fn qualified_rule(input: &str) -> IResult<&str, Item<'_>> {
    let (input, prelude) = prelude(input)?;
    alt((
        map(block, move |block| Item::Rule { prelude: prelude.trim(), block }),
        map(opt(char(';')), move |_| Item::Orphan(prelude.trim())),
    ))(input)
}

fn item(input: &str) -> IResult<&str, Item<'_>> {
    preceded(
        multispace0,
        alt((value(Item::Junk, alt((tag("<!--"), tag("-->"), tag("}")))), at_rule, qualified_rule)),
    )(input)
}

fn parse_rules(input: &str, sheet: &mut Stylesheet) {
    let mut rest = input;
    while !rest.trim_start().is_empty() {
        let Ok((next, parsed)) = item(rest) else {
            break;
        };
        if next.len() == rest.len() {
            break;
        }
        rest = next;
        match parsed {
            Item::Rule { prelude, block } => match parse_selector_list(prelude) {
                Some(selectors) => sheet.rules.push(StyleRule {
                    selectors,
                    declarations: parse_declarations(block),
                }),
                None => log::warn!("dropping CSS rule with unsupported selector '{}'", prelude),
            },
            Item::AtRule { name, prelude, block } => {
                handle_at_rule(&name.to_ascii_lowercase(), prelude, block, sheet)
            }
            Item::Orphan(prelude) if !prelude.is_empty() => {
                log::warn!("ignoring CSS without a block: '{}'", prelude)
            }
            Item::Orphan(_) | Item::Junk => {}
        }
    }
}

fn handle_at_rule(name: &str, prelude: &str, block: Option<&str>, sheet: &mut Stylesheet) {
    let Some(block) = block else {
        if name == "import" {
            log::warn!("@import is not supported: '{}'", prelude);
        }
        return;
    };
    match name {
        "page" => {
            if prelude.is_empty() {
                sheet.page_declarations.extend(parse_declarations(block));
            } else {
                log::debug!("ignoring @page rule with selector '{}'", prelude);
            }
        }
        "media" => {
            if media_applies(prelude) {
                parse_rules(block, sheet);
            } else {
                log::debug!("skipping @media {}", prelude);
            }
        }
        other => log::debug!("skipping unsupported @{} rule", other),
    }
}

/// Whether a media query list selects paged output.
pub fn media_applies(query: &str) -> bool {
    let query = query.to_ascii_lowercase();
    if query.trim().is_empty() {
        return true;
    }
    query.split(',').any(|q| {
        let q = q.trim();
        if q.starts_with("not ") {
            return false;
        }
        let q = q.strip_prefix("only ").unwrap_or(q);
        q.starts_with("print") || q.starts_with("all") || q.starts_with('(')
    })
}

#[derive(Clone)]
enum Entry<'a> {
    Declaration(&'a str),
    Nested(&'a str),
    Empty,
}

fn declaration_text(input: &str) -> IResult<&str, &str> {
    recognize(many1(alt((quoted, paren_group, is_not(";{}\"'(")))))(input)
}

fn entry(input: &str) -> IResult<&str, Entry<'_>> {
    preceded(
        multispace0,
        alt((
            value(Entry::Empty, alt((char(';'), char('}')))),
            map(terminated(opt(declaration_text), block), |prelude| Entry::Nested(prelude.unwrap_or(""))),
            map(terminated(declaration_text, opt(char(';'))), Entry::Declaration),
        )),
    )(input)
}

/// Parse the contents of a declaration block or a `style` attribute.
/// Nested blocks (such as `@page` margin boxes) are skipped.
pub fn parse_declarations(block: &str) -> Vec<Declaration> {
    let mut declarations = Vec::new();
    let mut rest = block;
    while !rest.trim_start().is_empty() {
        let Ok((next, parsed)) = entry(rest) else {
            break;
        };
        if next.len() == rest.len() {
            break;
        }
        rest = next;
        match parsed {
            Entry::Declaration(text) => declarations.extend(parse_declaration(text)),
            Entry::Nested(prelude) => log::debug!("skipping nested block '{}'", prelude.trim()),
            Entry::Empty => {}
        }
    }
    declarations
}

fn property_name(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while_m_n(1, 1, |c: char| c.is_ascii_alphabetic() || c == '-'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_'),
    ))(input)
}

fn important(input: &str) -> IResult<&str, &str> {
    preceded(pair(ws(char('!')), tag_no_case("important")), multispace0)(input)
}

/// The value with a trailing `!important` removed, and whether it was there.
fn split_important(value: &str) -> (&str, bool) {
    for (at, _) in value.rmatch_indices('!') {
        if let Ok(("", _)) = important(&value[at..]) {
            return (value[..at].trim_end(), true);
        }
    }
    (value, false)
}

fn parse_declaration(text: &str) -> Option<Declaration> {
    let text = text.trim();
    let parsed: IResult<&str, &str> = terminated(take_till(|c: char| c == ':'), char(':'))(text);
    let Ok((value, name)) = parsed else {
        log::warn!("dropping malformed CSS declaration '{}'", text);
        return None;
    };
    let Some(property) = run_parser(property_name, name).map(str::to_ascii_lowercase) else {
        log::warn!("dropping CSS declaration with invalid property name '{}'", name.trim());
        return None;
    };

    let (value, important) = split_important(value.trim());
    if value.is_empty() {
        log::warn!("dropping CSS declaration '{}' with empty value", property);
        return None;
    }
    Some(Declaration { property, value: value.to_string(), important })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rules_and_declarations() {
        let sheet = Stylesheet::parse("h1, h2 { color: red; margin: 0 !important }\np{font-size:12pt}");
        assert_eq!(sheet.rules.len(), 2);
        assert_eq!(sheet.rules[0].selectors.len(), 2);
        let decls = &sheet.rules[0].declarations;
        assert_eq!(decls[0], Declaration { property: "color".into(), value: "red".into(), important: false });
        assert_eq!(decls[1].property, "margin");
        assert!(decls[1].important);
        assert_eq!(decls[1].value, "0");
    }

    #[test]
    fn test_comments_are_stripped() {
        let sheet = Stylesheet::parse("/* a { color: red } */ b { /* x */ color: blue }");
        assert_eq!(sheet.rules.len(), 1);
        assert_eq!(sheet.rules[0].declarations[0].value, "blue");
    }

    #[test]
    fn test_comment_markers_inside_strings_survive() {
        let sheet = Stylesheet::parse("p { font-family: \"a/*b\", serif }");
        assert_eq!(sheet.rules[0].declarations[0].value, "\"a/*b\", serif");
    }

    #[test]
    fn test_page_rule() {
        let sheet = Stylesheet::parse("@page { size: A4; margin: 2cm; @top-center { content: 'x' } }");
        assert!(sheet.rules.is_empty());
        let props: Vec<&str> = sheet.page_declarations.iter().map(|d| d.property.as_str()).collect();
        assert_eq!(props, vec!["size", "margin"]);
    }

    #[test]
    fn test_page_rule_with_selector_is_skipped() {
        let sheet = Stylesheet::parse("@page :first { margin: 0 } p { color: red }");
        assert!(sheet.page_declarations.is_empty());
        assert_eq!(sheet.rules.len(), 1);
    }

    #[test]
    fn test_media_rules() {
        let sheet = Stylesheet::parse(
            "@media print { p { color: red } } @media screen { p { color: blue } } @media all { a { color: green } }",
        );
        assert_eq!(sheet.rules.len(), 2);
        assert_eq!(sheet.rules[0].declarations[0].value, "red");
        assert_eq!(sheet.rules[1].declarations[0].value, "green");
    }

    #[test]
    fn test_error_recovery() {
        let sheet = Stylesheet::parse("p { color red; font-size: 10pt } a:unknown { color: red } em { : x; font-style: italic }");
        assert_eq!(sheet.rules.len(), 2);
        assert_eq!(sheet.rules[0].declarations.len(), 1);
        assert_eq!(sheet.rules[0].declarations[0].property, "font-size");
        assert_eq!(sheet.rules[1].declarations.len(), 1);
    }

    #[test]
    fn test_at_statements_skipped() {
        let sheet = Stylesheet::parse("@charset \"utf-8\"; @import url(x.css); p { color: red }");
        assert_eq!(sheet.rules.len(), 1);
    }

    #[test]
    fn test_unclosed_block() {
        let sheet = Stylesheet::parse("p { color: red");
        assert_eq!(sheet.rules.len(), 1);
        assert_eq!(sheet.rules[0].declarations[0].value, "red");
    }

    #[test]
    fn test_blocks_inside_strings_and_functions() {
        let sheet = Stylesheet::parse(
            "a[title=\"{x}\"] { background: url(data:image/png;base64,AAA); content: '}' } p { color: red }",
        );
        assert_eq!(sheet.rules.len(), 2);
        let decls = &sheet.rules[0].declarations;
        assert_eq!(decls[0].value, "url(data:image/png;base64,AAA)");
        assert_eq!(decls[1].value, "'}'");
    }

    #[test]
    fn test_important_spacing() {
        let decls = parse_declarations("color: red ! IMPORTANT; margin: 0!important; content: 'a!b'");
        assert!(decls[0].important && decls[1].important && !decls[2].important);
        assert_eq!(decls[0].value, "red");
        assert_eq!(decls[2].value, "'a!b'");
    }

    #[test]
    fn test_universal_rule_survives() {
        let sheet = Stylesheet::parse("* { color: red } div > * { margin: 0 }");
        assert_eq!(sheet.rules.len(), 2);
    }

    #[test]
    fn test_style_attribute() {
        let decls = parse_declarations("text-align: center; color:#333;");
        assert_eq!(decls.len(), 2);
        assert_eq!(decls[0].value, "center");
    }

    #[test]
    fn test_media_applies() {
        assert!(media_applies(""));
        assert!(media_applies("print"));
        assert!(media_applies("screen, print"));
        assert!(media_applies("only print and (orientation: portrait)"));
        assert!(!media_applies("screen"));
        assert!(!media_applies("not print"));
    }
}

#[cfg(test)]
mod proptest_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn parse_stylesheet_doesnt_crash(s in "\\PC{0,200}") {
            let _ = Stylesheet::parse(&s);
        }

        #[test]
        fn parse_declarations_doesnt_crash(s in "[a-z:;{}!@ 0-9\"'()-]{0,120}") {
            let _ = parse_declarations(&s);
        }
    }
}
