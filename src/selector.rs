//! CSS selectors: parsing, specificity and matching against the DOM.

use crate::dom::{Document, ElementData, NodeId};
use crate::units::{quoted, run_parser, ws};
use nom::IResult;
use nom::branch::alt;
use nom::bytes::complete::{is_not, tag, tag_no_case, take_while1};
use nom::character::complete::{char, digit1, multispace0, multispace1, one_of};
use nom::combinator::{map, map_opt, map_res, opt, recognize, value, verify};
use nom::error::ErrorKind;
use nom::multi::{many0, separated_list1};
use nom::sequence::{delimited, pair, preceded, terminated};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttrOp {
    Exists,
    Equals(String),
    Includes(String),
    DashMatch(String),
    Prefix(String),
    Suffix(String),
    Substring(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttrSelector {
    pub name: String,
    pub op: AttrOp,
}

impl AttrSelector {
    fn matches(&self, element: &ElementData) -> bool {
        let Some(value) = element.attr(&self.name) else {
            return false;
        };
        match &self.op {
            AttrOp::Exists => true,
            AttrOp::Equals(v) => value == v,
            AttrOp::Includes(v) => value.split_whitespace().any(|w| w == v),
            AttrOp::DashMatch(v) => value == v || value.starts_with(&format!("{}-", v)),
            AttrOp::Prefix(v) => !v.is_empty() && value.starts_with(v.as_str()),
            AttrOp::Suffix(v) => !v.is_empty() && value.ends_with(v.as_str()),
            AttrOp::Substring(v) => !v.is_empty() && value.contains(v.as_str()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PseudoClass {
    FirstChild,
    LastChild,
    OnlyChild,
    /// `an+b`
    NthChild(i32, i32),
    NthLastChild(i32, i32),
    Link,
    Root,
    /// Interaction states; a printed page has none.
    Dynamic,
}

/// A sequence of simple selectors with no combinator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Compound {
    /// Written as `*`.
    pub universal: bool,
    pub tag: Option<String>,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub attrs: Vec<AttrSelector>,
    pub pseudos: Vec<PseudoClass>,
    pub pseudo_element: Option<String>,
}

impl Compound {
    fn is_empty(&self) -> bool {
        !self.universal
            && self.tag.is_none()
            && self.id.is_none()
            && self.classes.is_empty()
            && self.attrs.is_empty()
            && self.pseudos.is_empty()
            && self.pseudo_element.is_none()
    }

    fn matches(&self, doc: &Document, node: NodeId) -> bool {
        let Some(element) = doc.element(node) else {
            return false;
        };
        if self.pseudo_element.is_some() {
            return false;
        }
        if let Some(tag) = &self.tag {
            if element.name != *tag {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if element.id() != Some(id.as_str()) {
                return false;
            }
        }
        if !self.classes.iter().all(|c| element.has_class(c)) {
            return false;
        }
        if !self.attrs.iter().all(|a| a.matches(element)) {
            return false;
        }
        self.pseudos.iter().all(|p| match_pseudo(*p, doc, node, element))
    }
}

fn match_pseudo(pseudo: PseudoClass, doc: &Document, node: NodeId, element: &ElementData) -> bool {
    match pseudo {
        PseudoClass::FirstChild => doc.element_position(node).0 == 1,
        PseudoClass::LastChild => {
            let (index, count) = doc.element_position(node);
            index == count
        }
        PseudoClass::OnlyChild => doc.element_position(node).1 == 1,
        PseudoClass::NthChild(a, b) => nth_matches(a, b, doc.element_position(node).0 as i32),
        PseudoClass::NthLastChild(a, b) => {
            let (index, count) = doc.element_position(node);
            nth_matches(a, b, (count - index + 1) as i32)
        }
        PseudoClass::Link => {
            matches!(element.name.as_str(), "a" | "area" | "link") && element.attr("href").is_some()
        }
        PseudoClass::Root => doc.parent_element(node).is_none(),
        PseudoClass::Dynamic => false,
    }
}

/// Whether the 1-based `index` is `a*n + b` for some `n >= 0`.
pub fn nth_matches(a: i32, b: i32, index: i32) -> bool {
    let (a, diff) = (a as i64, index as i64 - b as i64);
    if a == 0 {
        return diff == 0;
    }
    diff % a == 0 && diff / a >= 0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Specificity(pub u16, pub u16, pub u16);

/// A complex selector, stored right to left: the subject compound first.
#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    subject: Compound,
    ancestors: Vec<(Combinator, Compound)>,
}

impl Selector {
    pub fn specificity(&self) -> Specificity {
        let mut spec = Specificity::default();
        for compound in std::iter::once(&self.subject).chain(self.ancestors.iter().map(|(_, c)| c)) {
            if compound.id.is_some() {
                spec.0 += 1;
            }
            spec.1 += (compound.classes.len() + compound.attrs.len() + compound.pseudos.len()) as u16;
            if compound.tag.is_some() {
                spec.2 += 1;
            }
            if compound.pseudo_element.is_some() {
                spec.2 += 1;
            }
        }
        spec
    }

    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        self.subject.matches(doc, node) && self.match_ancestors(doc, node, 0)
    }

    fn match_ancestors(&self, doc: &Document, node: NodeId, step: usize) -> bool {
        let Some((combinator, compound)) = self.ancestors.get(step) else {
            return true;
        };
        match combinator {
            Combinator::Child => match doc.parent_element(node) {
                Some(parent) => compound.matches(doc, parent) && self.match_ancestors(doc, parent, step + 1),
                None => false,
            },
            Combinator::Descendant => {
                let mut current = doc.parent_element(node);
                while let Some(ancestor) = current {
                    if compound.matches(doc, ancestor) && self.match_ancestors(doc, ancestor, step + 1) {
                        return true;
                    }
                    current = doc.parent_element(ancestor);
                }
                false
            }
        }
    }
}

/// Parse a comma-separated selector list. `None` if any member is invalid,
/// in which case the whole rule is dropped.
pub fn parse_selector_list(text: &str) -> Option<Vec<Selector>> {
    run_parser(separated_list1(ws(char(',')), selector), text)
}

pub fn parse_selector(text: &str) -> Option<Selector> {
    run_parser(selector, text)
}

fn selector(input: &str) -> IResult<&str, Selector> {
    map_opt(pair(compound, many0(pair(combinator, compound))), |(first, rest)| {
        let mut compounds = vec![first];
        let mut combinators = Vec::with_capacity(rest.len());
        for (combinator, compound) in rest {
            combinators.push(combinator);
            compounds.push(compound);
        }
        let subject = compounds.pop()?;
        // A pseudo-element is only valid on the subject.
        if compounds.iter().any(|c| c.pseudo_element.is_some()) {
            return None;
        }
        let ancestors = combinators.into_iter().rev().zip(compounds.into_iter().rev()).collect();
        Some(Selector { subject, ancestors })
    })(input)
}

fn combinator(input: &str) -> IResult<&str, Combinator> {
    alt((
        value(Combinator::Child, ws(char('>'))),
        value(Combinator::Descendant, multispace1),
    ))(input)
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_' || !c.is_ascii()
}

fn ident(input: &str) -> IResult<&str, &str> {
    verify(take_while1(is_ident_char), |s: &str| !s.starts_with(|c: char| c.is_ascii_digit()))(input)
}

enum Simple {
    Class(String),
    Id(String),
    Attr(AttrSelector),
    Pseudo(PseudoClass),
    PseudoElement(String),
}

fn compound(input: &str) -> IResult<&str, Compound> {
    let (input, head) = opt(alt((
        value(None, char('*')),
        map(verify(ident, |s: &str| s.starts_with(char::is_alphabetic)), |tag: &str| {
            Some(tag.to_ascii_lowercase())
        }),
    )))(input)?;
    let (input, parts) = many0(simple)(input)?;

    let mut compound = Compound {
        universal: matches!(head, Some(None)),
        tag: head.flatten(),
        ..Compound::default()
    };
    for part in parts {
        match part {
            Simple::Class(class) => compound.classes.push(class),
            Simple::Id(id) => compound.id = Some(id),
            Simple::Attr(attr) => compound.attrs.push(attr),
            Simple::Pseudo(pseudo) => compound.pseudos.push(pseudo),
            Simple::PseudoElement(name) => compound.pseudo_element = Some(name),
        }
    }
    if compound.is_empty() {
        return Err(nom::Err::Error(nom::error::Error::new(input, ErrorKind::Verify)));
    }
    Ok((input, compound))
}

fn simple(input: &str) -> IResult<&str, Simple> {
    alt((
        map(preceded(char('.'), ident), |class: &str| Simple::Class(class.to_string())),
        map(preceded(char('#'), ident), |id: &str| Simple::Id(id.to_string())),
        map(delimited(char('['), attribute, char(']')), Simple::Attr),
        map(preceded(tag("::"), ident), |name: &str| Simple::PseudoElement(name.to_ascii_lowercase())),
        preceded(char(':'), pseudo_class),
    ))(input)
}

fn pseudo_class(input: &str) -> IResult<&str, Simple> {
    alt((
        map_opt(
            pair(ident, delimited(char('('), is_not(")"), char(')'))),
            |(name, arg): (&str, &str)| functional_pseudo(&name.to_ascii_lowercase(), arg).map(Simple::Pseudo),
        ),
        map_opt(ident, |name: &str| keyword_pseudo(&name.to_ascii_lowercase())),
    ))(input)
}

fn keyword_pseudo(name: &str) -> Option<Simple> {
    let pseudo = match name {
        "first-child" => PseudoClass::FirstChild,
        "last-child" => PseudoClass::LastChild,
        "only-child" => PseudoClass::OnlyChild,
        "link" | "any-link" => PseudoClass::Link,
        "root" => PseudoClass::Root,
        "hover" | "active" | "focus" | "visited" | "focus-within" | "focus-visible" | "target" | "checked"
        | "disabled" | "enabled" => PseudoClass::Dynamic,
        "before" | "after" | "first-line" | "first-letter" => {
            return Some(Simple::PseudoElement(name.to_string()));
        }
        _ => return None,
    };
    Some(Simple::Pseudo(pseudo))
}

fn functional_pseudo(name: &str, arg: &str) -> Option<PseudoClass> {
    let (a, b) = parse_nth(arg)?;
    match name {
        "nth-child" => Some(PseudoClass::NthChild(a, b)),
        "nth-last-child" => Some(PseudoClass::NthLastChild(a, b)),
        _ => None,
    }
}

fn integer(input: &str) -> IResult<&str, i32> {
    map_res(recognize(pair(opt(one_of("+-")), digit1)), |s: &str| s.parse::<i32>())(input)
}

fn an_plus_b(input: &str) -> IResult<&str, (i32, i32)> {
    let coefficient = alt((integer, value(-1, char('-')), value(1, opt(char('+')))));
    let offset = map_res(
        pair(ws(one_of("+-")), digit1),
        |(sign, digits): (char, &str)| format!("{}{}", sign, digits).parse::<i32>(),
    );
    map(pair(terminated(coefficient, tag_no_case("n")), opt(preceded(multispace0, offset))), |(a, b)| {
        (a, b.unwrap_or(0))
    })(input)
}

/// Parse the `an+b` micro-syntax, plus `odd` and `even`.
pub fn parse_nth(arg: &str) -> Option<(i32, i32)> {
    run_parser(
        alt((
            value((2, 1), tag_no_case("odd")),
            value((2, 0), tag_no_case("even")),
            an_plus_b,
            map(integer, |b| (0, b)),
        )),
        arg,
    )
}

fn attr_value(input: &str) -> IResult<&str, String> {
    alt((
        map(quoted, |q: &str| q[1..].strip_suffix(&q[..1]).unwrap_or(&q[1..]).to_string()),
        map(take_while1(|c: char| c != ']' && !c.is_whitespace()), str::to_string),
    ))(input)
}

fn attribute(input: &str) -> IResult<&str, AttrSelector> {
    let operator = alt((tag("~="), tag("|="), tag("^="), tag("$="), tag("*="), tag("=")));
    map(pair(ws(ident), opt(pair(operator, ws(attr_value)))), |(name, op)| {
        let op = match op {
            None => AttrOp::Exists,
            Some(("~=", v)) => AttrOp::Includes(v),
            Some(("|=", v)) => AttrOp::DashMatch(v),
            Some(("^=", v)) => AttrOp::Prefix(v),
            Some(("$=", v)) => AttrOp::Suffix(v),
            Some(("*=", v)) => AttrOp::Substring(v),
            Some((_, v)) => AttrOp::Equals(v),
        };
        AttrSelector { name: name.to_ascii_lowercase(), op }
    })(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(selector: &str, html: &str, target: &str) -> bool {
        let doc = Document::parse(html);
        let node = doc.find_first(target).unwrap();
        parse_selector(selector).unwrap().matches(&doc, node)
    }

    #[test]
    fn test_specificity() {
        let spec = |s: &str| parse_selector(s).unwrap().specificity();
        assert_eq!(spec("p"), Specificity(0, 0, 1));
        assert_eq!(spec("table tr:nth-child(2n)"), Specificity(0, 1, 2));
        assert_eq!(spec("#nav .item > a[href]"), Specificity(1, 2, 1));
        assert_eq!(spec("*"), Specificity(0, 0, 0));
        assert!(spec("pre code") > spec("code"));
    }

    #[test]
    fn test_universal_selector() {
        let html = "<div><p class=\"x\">a</p></div>";
        assert_eq!(parse_selector("*").unwrap().specificity(), Specificity(0, 0, 0));
        assert_eq!(parse_selector("*.x").unwrap().specificity(), Specificity(0, 1, 0));
        assert!(matches("*", html, "p"));
        assert!(matches("div > *", html, "p"));
        assert!(matches("*.x", html, "p"));
        assert!(!matches("*.y", html, "p"));
        assert_eq!(parse_selector_list("*, div > *").unwrap().len(), 2);
    }

    #[test]
    fn test_attribute_values() {
        let html = "<a href=\"https://x.org/a.pdf\" title=\"one, two\" lang=\"en-US\">x</a>";
        assert!(matches("a[title=\"one, two\"]", html, "a"));
        assert!(matches("a[ href $= '.pdf' ]", html, "a"));
        assert!(matches("[lang|=en]", html, "a"));
        assert!(matches("a[title~=two]", html, "a"));
        assert!(!matches("a[href*=\"\"]", html, "a"));
    }

    #[test]
    fn test_descendant_and_child() {
        let html = "<div><section><p><em>x</em></p></section></div>";
        assert!(matches("div em", html, "em"));
        assert!(matches("p > em", html, "em"));
        assert!(!matches("div > em", html, "em"));
        assert!(matches("div > section p > em", html, "em"));
    }

    #[test]
    fn test_class_id_attr() {
        let html = "<pre class=\"codehilite\"><code class=\"language-rust\" id=\"c\">x</code></pre>";
        assert!(matches("pre.codehilite code", html, "code"));
        assert!(matches("#c", html, "code"));
        assert!(matches("code[class^=language-]", html, "code"));
        assert!(matches("[id=c]", html, "code"));
        assert!(!matches("code.rust", html, "code"));
    }

    #[test]
    fn test_structural_pseudos() {
        let html = "<table><tr id=a></tr><tr id=b></tr><tr id=c></tr></table>";
        let doc = Document::parse(html);
        let table = doc.find_first("table").unwrap();
        let rows: Vec<NodeId> = doc.element_children(table).collect();
        let even = parse_selector("tr:nth-child(2n)").unwrap();
        let odd = parse_selector("tr:nth-child(odd)").unwrap();
        assert!(!even.matches(&doc, rows[0]));
        assert!(even.matches(&doc, rows[1]));
        assert!(odd.matches(&doc, rows[2]));
        assert!(parse_selector("tr:first-child").unwrap().matches(&doc, rows[0]));
        assert!(parse_selector("tr:last-child").unwrap().matches(&doc, rows[2]));
    }

    #[test]
    fn test_dynamic_and_pseudo_elements_never_match() {
        let html = "<p><a href=\"x\">x</a></p>";
        assert!(matches("a:link", html, "a"));
        assert!(!matches("a:hover", html, "a"));
        assert!(!matches("p::before", html, "p"));
        assert!(!matches("p:first-line", html, "p"));
    }

    #[test]
    fn test_invalid_selectors() {
        assert!(parse_selector("").is_none());
        assert!(parse_selector("p >").is_none());
        assert!(parse_selector("p:not(.x)").is_none());
        assert!(parse_selector("a + b").is_none());
        assert!(parse_selector_list("h1, h2:unknown").is_none());
        assert_eq!(parse_selector_list("h1, h2, h3").unwrap().len(), 3);
    }

    #[test]
    fn test_nth() {
        assert_eq!(parse_nth("2n+1"), Some((2, 1)));
        assert_eq!(parse_nth("-n + 3"), Some((-1, 3)));
        assert_eq!(parse_nth("n"), Some((1, 0)));
        assert_eq!(parse_nth("5"), Some((0, 5)));
        assert_eq!(parse_nth("even"), Some((2, 0)));
        assert_eq!(parse_nth("2x"), None);
        assert_eq!(parse_nth(" +5 "), Some((0, 5)));
        assert_eq!(parse_nth("2n - 1"), Some((2, -1)));
        assert!(nth_matches(-1, 3, 1));
        assert!(!nth_matches(-1, i32::MIN, 2));
        assert!(!nth_matches(-1, 3, 4));
    }
}
