//! The cascade: typed property values, rule matching and computed styles.

use crate::css::{Declaration, Stylesheet, parse_declarations};
use crate::dom::{Document, NodeData, NodeId};
use crate::fonts::{FontFamily, StandardFont};
use crate::selector::{Selector, Specificity};
use crate::units::{
    BorderStyle, Color, Length, parse_border, parse_border_width, parse_box_shorthand, parse_color,
    parse_font_family, parse_length, parse_number, split_values,
};
use std::collections::HashMap;

/// User-agent defaults, beneath every author stylesheet.
pub const UA_STYLESHEET: &str = include_str!("../assets/html.css");

/// `font-size: medium`, in points.
pub const MEDIUM_FONT_SIZE: f32 = 12.0;

/// Multiplier used for `line-height: normal`.
pub const NORMAL_LINE_HEIGHT: f32 = 1.2;

pub const TOP: usize = 0;
pub const RIGHT: usize = 1;
pub const BOTTOM: usize = 2;
pub const LEFT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Display {
    Block,
    Inline,
    ListItem,
    Table,
    TableRowGroup,
    TableHeaderGroup,
    TableFooterGroup,
    TableRow,
    TableCell,
    None,
}

impl Display {
    fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "block" | "flex" | "grid" | "flow-root" | "table-caption" => Display::Block,
            "inline" | "inline-block" | "inline-flex" | "inline-grid" | "inline-table" => Display::Inline,
            "list-item" => Display::ListItem,
            "table" => Display::Table,
            "table-row-group" => Display::TableRowGroup,
            "table-header-group" => Display::TableHeaderGroup,
            "table-footer-group" => Display::TableFooterGroup,
            "table-row" => Display::TableRow,
            "table-cell" => Display::TableCell,
            "none" | "table-column" | "table-column-group" => Display::None,
            _ => return None,
        })
    }

    pub fn is_block_level(&self) -> bool {
        !matches!(self, Display::Inline | Display::None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontStyle {
    Normal,
    Italic,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LineHeight {
    Normal,
    Factor(f32),
    Absolute(f32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Right,
    Center,
    Justify,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextDecoration {
    pub underline: bool,
    pub line_through: bool,
}

impl TextDecoration {
    pub fn is_none(&self) -> bool {
        !self.underline && !self.line_through
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhiteSpace {
    Normal,
    Pre,
    PreWrap,
    PreLine,
    NoWrap,
}

impl WhiteSpace {
    pub fn collapses_spaces(&self) -> bool {
        matches!(self, WhiteSpace::Normal | WhiteSpace::NoWrap | WhiteSpace::PreLine)
    }

    pub fn preserves_newlines(&self) -> bool {
        !matches!(self, WhiteSpace::Normal | WhiteSpace::NoWrap)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListStyleType {
    None,
    Disc,
    Circle,
    Square,
    Decimal,
    DecimalLeadingZero,
    LowerAlpha,
    UpperAlpha,
    LowerRoman,
    UpperRoman,
}

impl ListStyleType {
    fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "none" => ListStyleType::None,
            "disc" => ListStyleType::Disc,
            "circle" => ListStyleType::Circle,
            "square" => ListStyleType::Square,
            "decimal" => ListStyleType::Decimal,
            "decimal-leading-zero" => ListStyleType::DecimalLeadingZero,
            "lower-alpha" | "lower-latin" => ListStyleType::LowerAlpha,
            "upper-alpha" | "upper-latin" => ListStyleType::UpperAlpha,
            "lower-roman" => ListStyleType::LowerRoman,
            "upper-roman" => ListStyleType::UpperRoman,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorderCollapse {
    Separate,
    Collapse,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BorderSide {
    pub width: f32,
    pub style: BorderStyle,
    pub color: Color,
}

impl BorderSide {
    pub const NONE: BorderSide = BorderSide { width: 0.0, style: BorderStyle::None, color: Color::BLACK };

    /// Width that takes up space: zero unless the style is visible.
    pub fn used_width(&self) -> f32 {
        if self.style.is_visible() { self.width } else { 0.0 }
    }
}

/// Fully computed style of one element. Lengths are in points except
/// percentages and `auto`, which need a containing block.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedStyle {
    pub display: Display,
    pub font_family: FontFamily,
    pub font_size: f32,
    pub font_weight: u16,
    pub font_style: FontStyle,
    pub line_height: LineHeight,
    pub color: Color,
    pub background_color: Color,
    pub margin: [Length; 4],
    pub padding: [Length; 4],
    pub border: [BorderSide; 4],
    pub border_radius: f32,
    pub text_align: TextAlign,
    pub text_decoration: TextDecoration,
    pub white_space: WhiteSpace,
    pub list_style_type: ListStyleType,
    pub width: Length,
    pub max_width: Length,
    pub height: Length,
    pub border_collapse: BorderCollapse,
    pub border_spacing: f32,
    pub break_before: bool,
    pub break_after: bool,
}

impl ComputedStyle {
    pub fn initial() -> Self {
        Self {
            display: Display::Inline,
            font_family: FontFamily::Serif,
            font_size: MEDIUM_FONT_SIZE,
            font_weight: 400,
            font_style: FontStyle::Normal,
            line_height: LineHeight::Normal,
            color: Color::BLACK,
            background_color: Color::TRANSPARENT,
            margin: [Length::ZERO; 4],
            padding: [Length::ZERO; 4],
            border: [BorderSide::NONE; 4],
            border_radius: 0.0,
            text_align: TextAlign::Left,
            text_decoration: TextDecoration::default(),
            white_space: WhiteSpace::Normal,
            list_style_type: ListStyleType::Disc,
            width: Length::Auto,
            max_width: Length::Auto,
            height: Length::Auto,
            border_collapse: BorderCollapse::Separate,
            border_spacing: 0.0,
            break_before: false,
            break_after: false,
        }
    }

    /// Inherited properties from `parent`, everything else initial.
    pub fn inherit_from(parent: &ComputedStyle) -> Self {
        Self {
            font_family: parent.font_family,
            font_size: parent.font_size,
            font_weight: parent.font_weight,
            font_style: parent.font_style,
            line_height: parent.line_height,
            color: parent.color,
            text_align: parent.text_align,
            text_decoration: parent.text_decoration,
            white_space: parent.white_space,
            list_style_type: parent.list_style_type,
            border_collapse: parent.border_collapse,
            border_spacing: parent.border_spacing,
            ..Self::initial()
        }
    }

    pub fn font(&self) -> StandardFont {
        StandardFont::select(
            self.font_family,
            self.font_weight >= 600,
            self.font_style == FontStyle::Italic,
        )
    }

    /// Used line height in points.
    pub fn line_height_pt(&self) -> f32 {
        match self.line_height {
            LineHeight::Normal => self.font_size * NORMAL_LINE_HEIGHT,
            LineHeight::Factor(f) => self.font_size * f,
            LineHeight::Absolute(v) => v,
        }
    }

    pub fn border_width(&self, side: usize) -> f32 {
        self.border[side].used_width()
    }

    pub fn has_visible_border(&self) -> bool {
        self.border.iter().any(|b| b.used_width() > 0.0)
    }
}

impl Default for ComputedStyle {
    fn default() -> Self {
        Self::initial()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Property {
    Display,
    Color,
    BackgroundColor,
    FontFamily,
    FontSize,
    FontWeight,
    FontStyle,
    LineHeight,
    Margin(usize),
    Padding(usize),
    BorderWidth(usize),
    BorderStyle(usize),
    BorderColor(usize),
    BorderRadius,
    TextAlign,
    TextDecoration,
    WhiteSpace,
    ListStyleType,
    Width,
    MaxWidth,
    Height,
    BorderCollapse,
    BorderSpacing,
    BreakBefore,
    BreakAfter,
}

impl Property {
    fn is_inherited(&self) -> bool {
        matches!(
            self,
            Property::Color
                | Property::FontFamily
                | Property::FontSize
                | Property::FontWeight
                | Property::FontStyle
                | Property::LineHeight
                | Property::TextAlign
                | Property::WhiteSpace
                | Property::ListStyleType
                | Property::BorderCollapse
                | Property::BorderSpacing
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum FontSizeSpec {
    Length(Length),
    Absolute(f32),
    Relative(f32),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum WeightSpec {
    Absolute(u16),
    Bolder,
    Lighter,
}

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Inherit,
    Initial,
    Unset,
    Display(Display),
    Color(Color),
    CurrentColor,
    FontFamily(FontFamily),
    FontSize(FontSizeSpec),
    FontWeight(WeightSpec),
    FontStyle(FontStyle),
    LineHeight(LineHeight),
    LineHeightLength(Length),
    Length(Length),
    BorderStyle(BorderStyle),
    TextAlign(TextAlign),
    Decoration(TextDecoration),
    WhiteSpace(WhiteSpace),
    ListStyle(ListStyleType),
    Collapse(BorderCollapse),
    Break(bool),
}

const SIDES: [&str; 4] = ["top", "right", "bottom", "left"];

fn side_of(name: &str) -> Option<usize> {
    SIDES.iter().position(|s| *s == name)
}

fn all_sides(f: fn(usize) -> Property) -> Vec<Property> {
    (0..4).map(f).collect()
}

/// Longhands a property name sets, or `None` for an unsupported property.
fn longhands(property: &str) -> Option<Vec<Property>> {
    use Property as P;
    let single = |p| Some(vec![p]);
    match property {
        "display" => single(P::Display),
        "color" => single(P::Color),
        "background" | "background-color" => single(P::BackgroundColor),
        "font-family" => single(P::FontFamily),
        "font-size" => single(P::FontSize),
        "font-weight" => single(P::FontWeight),
        "font-style" => single(P::FontStyle),
        "line-height" => single(P::LineHeight),
        "font" => Some(vec![P::FontStyle, P::FontWeight, P::FontSize, P::LineHeight, P::FontFamily]),
        "margin" => Some(all_sides(P::Margin)),
        "padding" => Some(all_sides(P::Padding)),
        "border" => {
            let mut v = all_sides(P::BorderWidth);
            v.extend(all_sides(P::BorderStyle));
            v.extend(all_sides(P::BorderColor));
            Some(v)
        }
        "border-width" => Some(all_sides(P::BorderWidth)),
        "border-style" => Some(all_sides(P::BorderStyle)),
        "border-color" => Some(all_sides(P::BorderColor)),
        "border-radius" => single(P::BorderRadius),
        "text-align" => single(P::TextAlign),
        "text-decoration" | "text-decoration-line" => single(P::TextDecoration),
        "white-space" => single(P::WhiteSpace),
        "list-style" | "list-style-type" => single(P::ListStyleType),
        "width" => single(P::Width),
        "max-width" => single(P::MaxWidth),
        "height" => single(P::Height),
        "border-collapse" => single(P::BorderCollapse),
        "border-spacing" => single(P::BorderSpacing),
        "page-break-before" | "break-before" => single(P::BreakBefore),
        "page-break-after" | "break-after" => single(P::BreakAfter),
        _ => {
            let rest = property.strip_prefix("margin-").map(|s| (s, P::Margin as fn(usize) -> P))
                .or_else(|| property.strip_prefix("padding-").map(|s| (s, P::Padding as fn(usize) -> P)));
            if let Some((side, make)) = rest {
                return side_of(side).map(|i| vec![make(i)]);
            }
            let side_part = property.strip_prefix("border-")?;
            let (side, component) = match side_part.split_once('-') {
                Some((side, component)) => (side, Some(component)),
                None => (side_part, None),
            };
            let i = side_of(side)?;
            match component {
                None => Some(vec![P::BorderWidth(i), P::BorderStyle(i), P::BorderColor(i)]),
                Some("width") => single(P::BorderWidth(i)),
                Some("style") => single(P::BorderStyle(i)),
                Some("color") => single(P::BorderColor(i)),
                Some(_) => None,
            }
        }
    }
}

fn box_values(value: &str, parse: fn(&str) -> Option<Value>) -> Option<[Value; 4]> {
    let parts: Vec<Value> = split_values(value).into_iter().map(parse).collect::<Option<_>>()?;
    let [t, r, b, l] = match parts.as_slice() {
        [a] => [a, a, a, a],
        [a, b] => [a, b, a, b],
        [a, b, c] => [a, b, c, b],
        [a, b, c, d] => [a, b, c, d],
        _ => return None,
    };
    Some([t.clone(), r.clone(), b.clone(), l.clone()])
}

fn color_value(s: &str) -> Option<Value> {
    if s.eq_ignore_ascii_case("currentcolor") {
        Some(Value::CurrentColor)
    } else {
        parse_color(s).map(Value::Color)
    }
}

fn border_style_value(s: &str) -> Option<Value> {
    BorderStyle::parse(s).map(Value::BorderStyle)
}

fn border_width_value(s: &str) -> Option<Value> {
    parse_border_width(s).map(Value::Length)
}

fn non_negative(length: Length) -> Option<Length> {
    match length {
        Length::Pt(v) | Length::Em(v) | Length::Rem(v) | Length::Percent(v) if v < 0.0 => None,
        other => Some(other),
    }
}

fn font_size_value(s: &str) -> Option<FontSizeSpec> {
    let keyword = match s {
        "xx-small" => Some(0.6),
        "x-small" => Some(0.75),
        "small" => Some(8.0 / 9.0),
        "medium" => Some(1.0),
        "large" => Some(1.2),
        "x-large" => Some(1.5),
        "xx-large" => Some(2.0),
        "xxx-large" => Some(3.0),
        _ => None,
    };
    if let Some(factor) = keyword {
        return Some(FontSizeSpec::Absolute(MEDIUM_FONT_SIZE * factor));
    }
    match s {
        "smaller" => Some(FontSizeSpec::Relative(1.0 / 1.2)),
        "larger" => Some(FontSizeSpec::Relative(1.2)),
        _ => match parse_length(s).and_then(non_negative)? {
            Length::Auto => None,
            length => Some(FontSizeSpec::Length(length)),
        },
    }
}

fn font_weight_value(s: &str) -> Option<WeightSpec> {
    Some(match s {
        "normal" => WeightSpec::Absolute(400),
        "bold" => WeightSpec::Absolute(700),
        "bolder" => WeightSpec::Bolder,
        "lighter" => WeightSpec::Lighter,
        _ => {
            let n = parse_number(s)?;
            if !(1.0..=1000.0).contains(&n) {
                return None;
            }
            WeightSpec::Absolute(n as u16)
        }
    })
}

fn font_style_value(s: &str) -> Option<FontStyle> {
    match s {
        "normal" => Some(FontStyle::Normal),
        "italic" | "oblique" => Some(FontStyle::Italic),
        _ => None,
    }
}

fn line_height_value(s: &str) -> Option<Value> {
    if s == "normal" {
        return Some(Value::LineHeight(LineHeight::Normal));
    }
    if let Some(n) = parse_number(s) {
        return (n >= 0.0).then_some(Value::LineHeight(LineHeight::Factor(n)));
    }
    match parse_length(s).and_then(non_negative)? {
        Length::Auto => None,
        length => Some(Value::LineHeightLength(length)),
    }
}

fn break_value(s: &str) -> Option<Value> {
    match s {
        "always" | "page" | "left" | "right" | "recto" | "verso" => Some(Value::Break(true)),
        "auto" | "avoid" | "avoid-page" | "avoid-column" | "column" => Some(Value::Break(false)),
        _ => None,
    }
}

fn decoration_value(value: &str) -> Option<TextDecoration> {
    let mut decoration = TextDecoration::default();
    let mut recognized = false;
    for part in split_values(value) {
        match part {
            "none" => recognized = true,
            "underline" => {
                decoration.underline = true;
                recognized = true;
            }
            "line-through" => {
                decoration.line_through = true;
                recognized = true;
            }
            // overline, colors and styles are accepted and not drawn
            _ => {}
        }
    }
    recognized.then_some(decoration)
}

/// Expand the `font` shorthand: `[style] [weight] size[/line-height] family`.
fn expand_font(value: &str) -> Option<Vec<(Property, Value)>> {
    let parts = split_values(value);
    let mut style = FontStyle::Normal;
    let mut weight = WeightSpec::Absolute(400);
    let mut index = 0;
    while index < parts.len() {
        let part = parts[index].to_ascii_lowercase();
        let part = part.as_str();
        if let Some(s) = font_style_value(part) {
            style = s;
        } else if let Some(w) = font_weight_value(part).filter(|_| parse_length(part).is_none()) {
            weight = w;
        } else if part == "small-caps" {
            // variant is accepted and ignored
        } else {
            break;
        }
        index += 1;
    }
    let size_part = parts.get(index)?;
    let (size_text, line_text) = match size_part.split_once('/') {
        Some((size, line)) => (size, Some(line)),
        None => (*size_part, None),
    };
    let size = font_size_value(size_text)?;
    let family_text = parts.get(index + 1..)?.join(" ");
    if family_text.is_empty() {
        return None;
    }
    let line = match line_text {
        Some(text) => line_height_value(text)?,
        None => Value::LineHeight(LineHeight::Normal),
    };
    Some(vec![
        (Property::FontStyle, Value::FontStyle(style)),
        (Property::FontWeight, Value::FontWeight(weight)),
        (Property::FontSize, Value::FontSize(size)),
        (Property::LineHeight, line),
        (Property::FontFamily, Value::FontFamily(FontFamily::from_stack(&parse_font_family(&family_text)))),
    ])
}

fn sides(make: fn(usize) -> Property, values: [Value; 4]) -> Vec<(Property, Value)> {
    values.into_iter().enumerate().map(|(i, value)| (make(i), value)).collect()
}

/// Parse a declaration into longhand values. `None` when the value is invalid.
fn expand(property: &str, value: &str, longhands: &[Property]) -> Option<Vec<(Property, Value)>> {
    use Property as P;
    let lower = value.trim().to_ascii_lowercase();
    let keyword = match lower.as_str() {
        "inherit" => Some(Value::Inherit),
        "initial" => Some(Value::Initial),
        "unset" => Some(Value::Unset),
        _ => None,
    };
    if let Some(keyword) = keyword {
        return Some(longhands.iter().map(|p| (*p, keyword.clone())).collect());
    }
    let v = lower.as_str();
    let one = |p: Property, value: Option<Value>| value.map(|value| vec![(p, value)]);

    match property {
        "font" => expand_font(value),
        "margin" => Some(sides(P::Margin, box_values(v, |s| parse_length(s).map(Value::Length))?)),
        "padding" => Some(sides(
            P::Padding,
            box_values(v, |s| parse_length(s).and_then(non_negative).filter(|l| !l.is_auto()).map(Value::Length))?,
        )),
        "border-width" => Some(sides(P::BorderWidth, box_values(v, border_width_value)?)),
        "border-style" => Some(sides(P::BorderStyle, box_values(v, border_style_value)?)),
        "border-color" => Some(sides(P::BorderColor, box_values(v, color_value)?)),
        "background" => {
            if v == "none" {
                return one(P::BackgroundColor, Some(Value::Color(Color::TRANSPARENT)));
            }
            let color = split_values(v).into_iter().find_map(parse_color);
            if color.is_none() {
                log::debug!("background '{}' has no color; only colors are painted", value);
            }
            one(P::BackgroundColor, Some(Value::Color(color.unwrap_or(Color::TRANSPARENT))))
        }
        "list-style" => {
            let parts = split_values(v);
            let kind = parts.iter().find_map(|p| ListStyleType::parse(p));
            match kind {
                Some(kind) => one(P::ListStyleType, Some(Value::ListStyle(kind))),
                None if parts.iter().any(|p| p.starts_with("url(") || *p == "inside" || *p == "outside") => {
                    Some(Vec::new())
                }
                None => None,
            }
        }
        _ => {
            if longhands.len() > 1 {
                // border, border-<side>
                let border = parse_border(v)?;
                let count = longhands.len() / 3;
                let mut out = Vec::with_capacity(longhands.len());
                for i in 0..count {
                    let (width, style, color) = (longhands[i], longhands[i + count], longhands[i + 2 * count]);
                    out.push((width, Value::Length(border.width.unwrap_or(Length::Pt(3.0 * 0.75)))));
                    out.push((style, Value::BorderStyle(border.style.unwrap_or(BorderStyle::None))));
                    out.push((color, border.color.map(Value::Color).unwrap_or(Value::CurrentColor)));
                }
                return Some(out);
            }
            let p = longhands[0];
            let parsed = match p {
                P::Display => Display::parse(v).map(Value::Display),
                P::Color => parse_color(v).map(Value::Color),
                P::BackgroundColor | P::BorderColor(_) => color_value(v),
                P::FontFamily => {
                    let names = parse_font_family(value);
                    (!names.is_empty()).then(|| Value::FontFamily(FontFamily::from_stack(&names)))
                }
                P::FontSize => font_size_value(v).map(Value::FontSize),
                P::FontWeight => font_weight_value(v).map(Value::FontWeight),
                P::FontStyle => font_style_value(v).map(Value::FontStyle),
                P::LineHeight => line_height_value(v),
                P::Margin(_) => parse_length(v).map(Value::Length),
                P::Padding(_) => parse_length(v).and_then(non_negative).filter(|l| !l.is_auto()).map(Value::Length),
                P::BorderWidth(_) => border_width_value(v),
                P::BorderStyle(_) => border_style_value(v),
                P::BorderRadius => split_values(v)
                    .first()
                    .and_then(|s| parse_length(s))
                    .and_then(non_negative)
                    .filter(|l| !l.is_auto())
                    .map(Value::Length),
                P::TextAlign => match v {
                    "left" | "start" => Some(Value::TextAlign(TextAlign::Left)),
                    "right" | "end" => Some(Value::TextAlign(TextAlign::Right)),
                    "center" => Some(Value::TextAlign(TextAlign::Center)),
                    "justify" => Some(Value::TextAlign(TextAlign::Justify)),
                    _ => None,
                },
                P::TextDecoration => decoration_value(v).map(Value::Decoration),
                P::WhiteSpace => match v {
                    "normal" => Some(Value::WhiteSpace(WhiteSpace::Normal)),
                    "pre" => Some(Value::WhiteSpace(WhiteSpace::Pre)),
                    "pre-wrap" | "break-spaces" => Some(Value::WhiteSpace(WhiteSpace::PreWrap)),
                    "pre-line" => Some(Value::WhiteSpace(WhiteSpace::PreLine)),
                    "nowrap" => Some(Value::WhiteSpace(WhiteSpace::NoWrap)),
                    _ => None,
                },
                P::ListStyleType => ListStyleType::parse(v).map(Value::ListStyle),
                P::Width | P::Height => parse_length(v).and_then(non_negative).map(Value::Length),
                P::MaxWidth => match v {
                    "none" => Some(Value::Length(Length::Auto)),
                    _ => parse_length(v).and_then(non_negative).filter(|l| !l.is_auto()).map(Value::Length),
                },
                P::BorderCollapse => match v {
                    "collapse" => Some(Value::Collapse(BorderCollapse::Collapse)),
                    "separate" => Some(Value::Collapse(BorderCollapse::Separate)),
                    _ => None,
                },
                P::BorderSpacing => split_values(v)
                    .first()
                    .and_then(|s| parse_length(s))
                    .and_then(non_negative)
                    .filter(|l| !matches!(l, Length::Auto | Length::Percent(_)))
                    .map(Value::Length),
                P::BreakBefore | P::BreakAfter => break_value(v),
            };
            one(p, parsed)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Origin {
    UserAgent,
    Author,
}

#[derive(Debug)]
struct CompiledRule {
    origin: Origin,
    selectors: Vec<(Selector, Specificity)>,
    declarations: Vec<(Property, Value, bool)>,
}

/// Compile declarations into typed longhands, warning about the ones that
/// are dropped.
fn compile_declarations(declarations: &[Declaration]) -> Vec<(Property, Value, bool)> {
    let mut out = Vec::new();
    for decl in declarations {
        let Some(props) = longhands(&decl.property) else {
            log::debug!("ignoring unsupported CSS property '{}'", decl.property);
            continue;
        };
        match expand(&decl.property, &decl.value, &props) {
            Some(values) => out.extend(values.into_iter().map(|(p, v)| (p, v, decl.important))),
            None => log::warn!("dropping invalid CSS declaration '{}: {}'", decl.property, decl.value),
        }
    }
    out
}

/// Precedence tier: normal UA < normal author < important author < important UA.
fn tier(origin: Origin, important: bool) -> u8 {
    match (important, origin) {
        (false, Origin::UserAgent) => 0,
        (false, Origin::Author) => 1,
        (true, Origin::Author) => 2,
        (true, Origin::UserAgent) => 3,
    }
}

/// Stylesheets in cascade order.
#[derive(Debug, Default)]
pub struct Cascade {
    rules: Vec<CompiledRule>,
}

impl Cascade {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a stylesheet; later sheets win ties.
    pub fn add_stylesheet(&mut self, sheet: &Stylesheet, origin: Origin) {
        for rule in &sheet.rules {
            let declarations = compile_declarations(&rule.declarations);
            if declarations.is_empty() {
                continue;
            }
            let selectors = rule.selectors.iter().map(|s| (s.clone(), s.specificity())).collect();
            self.rules.push(CompiledRule { origin, selectors, declarations });
        }
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Computed style for every element of `doc`, indexed by node id.
    /// Text nodes and the document node have `None`.
    pub fn compute(&self, doc: &Document) -> Vec<Option<ComputedStyle>> {
        let mut styles: Vec<Option<ComputedStyle>> = vec![None; doc.len()];
        let root_default = ComputedStyle::initial();
        let mut root_font_size = MEDIUM_FONT_SIZE;

        // Parents always precede their children in the arena.
        for id in 0..doc.len() {
            if !matches!(doc.node(id).data, NodeData::Element(_)) {
                continue;
            }
            let parent_style = doc
                .parent(id)
                .and_then(|p| styles[p].as_ref())
                .unwrap_or(&root_default);
            let style = self.compute_element(doc, id, parent_style, root_font_size);
            if doc.parent_element(id).is_none() {
                root_font_size = style.font_size;
            }
            styles[id] = Some(style);
        }
        styles
    }

    fn compute_element(
        &self,
        doc: &Document,
        id: NodeId,
        parent: &ComputedStyle,
        root_font_size: f32,
    ) -> ComputedStyle {
        let inline = doc
            .element(id)
            .and_then(|e| e.attr("style"))
            .map(|s| compile_declarations(&parse_declarations(s)))
            .unwrap_or_default();

        let mut matched: Vec<((u8, Specificity, usize), &Property, &Value)> = Vec::new();
        let mut order = 0usize;
        for rule in &self.rules {
            let best = rule
                .selectors
                .iter()
                .filter(|(sel, _)| sel.matches(doc, id))
                .map(|(_, spec)| *spec)
                .max();
            if let Some(spec) = best {
                for (prop, value, important) in &rule.declarations {
                    matched.push(((tier(rule.origin, *important), spec, order), prop, value));
                    order += 1;
                }
            } else {
                order += rule.declarations.len();
            }
        }

        let inline_spec = Specificity(u16::MAX, 0, 0);
        for (prop, value, important) in &inline {
            matched.push(((tier(Origin::Author, *important), inline_spec, order), prop, value));
            order += 1;
        }

        matched.sort_by(|a, b| a.0.cmp(&b.0));
        let mut winners: HashMap<Property, &Value> = HashMap::new();
        for (_, prop, value) in matched {
            winners.insert(*prop, value);
        }
        resolve(&winners, parent, root_font_size)
    }
}

fn resolve(winners: &HashMap<Property, &Value>, parent: &ComputedStyle, root_font_size: f32) -> ComputedStyle {
    let mut style = ComputedStyle::inherit_from(parent);
    let initial = ComputedStyle::initial();
    let mut own_decoration = TextDecoration::default();

    // font-size first: em units elsewhere depend on it.
    if let Some(value) = winners.get(&Property::FontSize) {
        style.font_size = match value {
            Value::FontSize(FontSizeSpec::Absolute(v)) => *v,
            Value::FontSize(FontSizeSpec::Relative(f)) => parent.font_size * f,
            Value::FontSize(FontSizeSpec::Length(l)) => {
                resolve_length(*l, parent.font_size, root_font_size, parent.font_size)
            }
            Value::Initial => MEDIUM_FONT_SIZE,
            _ => parent.font_size,
        };
    }
    let em = style.font_size;
    let to_computed = |l: Length| match l {
        Length::Em(v) => Length::Pt(v * em),
        Length::Rem(v) => Length::Pt(v * root_font_size),
        other => other,
    };

    let mut border_colors: [Option<Color>; 4] = [None; 4];

    for (&prop, &value) in winners {
        if prop == Property::FontSize {
            continue;
        }
        let value = match value {
            Value::Unset if prop.is_inherited() => &Value::Inherit,
            Value::Unset => &Value::Initial,
            other => other,
        };
        match value {
            Value::Inherit => {
                copy_property(&mut style, parent, prop);
                if let Property::BorderColor(i) = prop {
                    border_colors[i] = Some(parent.border[i].color);
                }
                if prop == Property::TextDecoration {
                    own_decoration = TextDecoration::default();
                }
                continue;
            }
            Value::Initial => {
                copy_property(&mut style, &initial, prop);
                if prop == Property::TextDecoration {
                    own_decoration = TextDecoration::default();
                }
                continue;
            }
            _ => {}
        }
        match (prop, value) {
            (Property::Display, Value::Display(d)) => style.display = *d,
            (Property::Color, Value::Color(c)) => style.color = *c,
            (Property::BackgroundColor, Value::Color(c)) => style.background_color = *c,
            (Property::BackgroundColor, Value::CurrentColor) => style.background_color = Color::TRANSPARENT,
            (Property::FontFamily, Value::FontFamily(f)) => style.font_family = *f,
            (Property::FontWeight, Value::FontWeight(w)) => {
                style.font_weight = match w {
                    WeightSpec::Absolute(n) => *n,
                    WeightSpec::Bolder => if parent.font_weight < 600 { 700 } else { 900 },
                    WeightSpec::Lighter => if parent.font_weight > 500 { 400 } else { 100 },
                }
            }
            (Property::FontStyle, Value::FontStyle(s)) => style.font_style = *s,
            (Property::LineHeight, Value::LineHeight(l)) => style.line_height = *l,
            (Property::LineHeight, Value::LineHeightLength(l)) => {
                style.line_height = LineHeight::Absolute(resolve_length(*l, em, root_font_size, em));
            }
            (Property::Margin(i), Value::Length(l)) => style.margin[i] = to_computed(*l),
            (Property::Padding(i), Value::Length(l)) => style.padding[i] = to_computed(*l),
            (Property::BorderWidth(i), Value::Length(l)) => {
                style.border[i].width = to_computed(*l).resolve(0.0)
            }
            (Property::BorderStyle(i), Value::BorderStyle(s)) => style.border[i].style = *s,
            (Property::BorderColor(i), Value::Color(c)) => border_colors[i] = Some(*c),
            (Property::BorderColor(_), Value::CurrentColor) => {}
            (Property::BorderRadius, Value::Length(l)) => {
                style.border_radius = match to_computed(*l) {
                    Length::Pt(v) => v,
                    _ => 0.0,
                }
            }
            (Property::TextAlign, Value::TextAlign(a)) => style.text_align = *a,
            (Property::TextDecoration, Value::Decoration(d)) => own_decoration = *d,
            (Property::WhiteSpace, Value::WhiteSpace(w)) => style.white_space = *w,
            (Property::ListStyleType, Value::ListStyle(l)) => style.list_style_type = *l,
            (Property::Width, Value::Length(l)) => style.width = to_computed(*l),
            (Property::MaxWidth, Value::Length(l)) => style.max_width = to_computed(*l),
            (Property::Height, Value::Length(l)) => style.height = to_computed(*l),
            (Property::BorderCollapse, Value::Collapse(c)) => style.border_collapse = *c,
            (Property::BorderSpacing, Value::Length(l)) => style.border_spacing = to_computed(*l).resolve(0.0),
            (Property::BreakBefore, Value::Break(b)) => style.break_before = *b,
            (Property::BreakAfter, Value::Break(b)) => style.break_after = *b,
            (prop, value) => log::debug!("value {:?} does not apply to {:?}", value, prop),
        }
    }

    for (side, color) in border_colors.iter().enumerate() {
        style.border[side].color = color.unwrap_or(style.color);
    }
    // Decorations propagate to descendants and cannot be removed by them.
    style.text_decoration = TextDecoration {
        underline: parent.text_decoration.underline || own_decoration.underline,
        line_through: parent.text_decoration.line_through || own_decoration.line_through,
    };
    style
}

fn resolve_length(length: Length, em: f32, rem: f32, percent_base: f32) -> f32 {
    match length {
        Length::Pt(v) => v,
        Length::Em(v) => v * em,
        Length::Rem(v) => v * rem,
        Length::Percent(p) => percent_base * p / 100.0,
        Length::Auto => em,
    }
}

fn copy_property(dst: &mut ComputedStyle, src: &ComputedStyle, prop: Property) {
    match prop {
        Property::Display => dst.display = src.display,
        Property::Color => dst.color = src.color,
        Property::BackgroundColor => dst.background_color = src.background_color,
        Property::FontFamily => dst.font_family = src.font_family,
        Property::FontSize => dst.font_size = src.font_size,
        Property::FontWeight => dst.font_weight = src.font_weight,
        Property::FontStyle => dst.font_style = src.font_style,
        Property::LineHeight => dst.line_height = src.line_height,
        Property::Margin(i) => dst.margin[i] = src.margin[i],
        Property::Padding(i) => dst.padding[i] = src.padding[i],
        Property::BorderWidth(i) => dst.border[i].width = src.border[i].width,
        Property::BorderStyle(i) => dst.border[i].style = src.border[i].style,
        Property::BorderColor(i) => dst.border[i].color = src.border[i].color,
        Property::BorderRadius => dst.border_radius = src.border_radius,
        Property::TextAlign => dst.text_align = src.text_align,
        Property::TextDecoration => {}
        Property::WhiteSpace => dst.white_space = src.white_space,
        Property::ListStyleType => dst.list_style_type = src.list_style_type,
        Property::Width => dst.width = src.width,
        Property::MaxWidth => dst.max_width = src.max_width,
        Property::Height => dst.height = src.height,
        Property::BorderCollapse => dst.border_collapse = src.border_collapse,
        Property::BorderSpacing => dst.border_spacing = src.border_spacing,
        Property::BreakBefore => dst.break_before = src.break_before,
        Property::BreakAfter => dst.break_after = src.break_after,
    }
}

/// Page size and margins in points, from `@page` declarations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
    pub margin: [f32; 4],
}

impl PageGeometry {
    /// A4 with the default 75px margins used when no `@page` rule applies.
    pub fn a4() -> Self {
        let m = 75.0 * 0.75;
        Self { width: 595.28, height: 841.89, margin: [m; 4] }
    }

    pub fn content_width(&self) -> f32 {
        self.width - self.margin[RIGHT] - self.margin[LEFT]
    }

    pub fn content_height(&self) -> f32 {
        self.height - self.margin[TOP] - self.margin[BOTTOM]
    }

    /// Apply `@page` declarations in order.
    pub fn apply(&mut self, declarations: &[Declaration]) {
        for decl in declarations {
            let value = decl.value.to_ascii_lowercase();
            let page_length = |s: &str, base: f32| match parse_length(s)? {
                Length::Auto => None,
                l => Some(resolve_length(l, MEDIUM_FONT_SIZE, MEDIUM_FONT_SIZE, base)),
            };
            let ok = match decl.property.as_str() {
                "size" => match crate::units::parse_page_size(&value) {
                    Some((w, h)) => {
                        self.width = w;
                        self.height = h;
                        true
                    }
                    None => false,
                },
                "margin" => {
                    let parts = split_values(&value);
                    let resolved: Option<Vec<f32>> = parts
                        .iter()
                        .enumerate()
                        .map(|(i, p)| page_length(*p, if i % 2 == 0 { self.height } else { self.width }))
                        .collect();
                    match parse_box_shorthand(&value).and(resolved) {
                        Some(values) => {
                            let [t, r, b, l] = match values.as_slice() {
                                [a] => [*a; 4],
                                [a, b] => [*a, *b, *a, *b],
                                [a, b, c] => [*a, *b, *c, *b],
                                [a, b, c, d] => [*a, *b, *c, *d],
                                _ => [self.margin[TOP], self.margin[RIGHT], self.margin[BOTTOM], self.margin[LEFT]],
                            };
                            self.margin = [t, r, b, l];
                            true
                        }
                        None => false,
                    }
                }
                property => match property.strip_prefix("margin-").and_then(side_of) {
                    Some(i) => {
                        let base = if i % 2 == 0 { self.height } else { self.width };
                        match page_length(value.as_str(), base) {
                            Some(v) => {
                                self.margin[i] = v;
                                true
                            }
                            None => false,
                        }
                    }
                    None => {
                        log::debug!("ignoring @page property '{}'", property);
                        true
                    }
                },
            };
            if !ok {
                log::warn!("dropping invalid @page declaration '{}: {}'", decl.property, decl.value);
            }
        }
    }
}
