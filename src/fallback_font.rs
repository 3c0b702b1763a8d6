//! An installed TrueType face for characters the standard fonts cannot
//! show (Greek, Cyrillic, CJK, symbols, emoji with outline glyphs).
//!
//! Faces are discovered with `fontdb` and measured with `ttf-parser`. The
//! chosen face is embedded whole as a CID-keyed font, so only the glyphs a
//! document needs are looked up.

use crate::fonts::is_standard_encodable;
use fontdb::{Database, Family, Query};
use log::debug;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::OnceLock;

/// Families tried before scanning every installed face.
const PREFERRED_FAMILIES: &[&str] = &[
    "Noto Sans",
    "DejaVu Sans",
    "Noto Sans CJK SC",
    "Noto Sans SC",
    "Arial Unicode MS",
    "Segoe UI Symbol",
    "Symbola",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Glyph {
    pub id: u16,
    /// Horizontal advance in font units.
    pub advance: u16,
}

pub struct FallbackFont {
    name: String,
    data: Vec<u8>,
    units_per_em: u16,
    ascent: i16,
    descent: i16,
    cap_height: i16,
    italic_angle: f32,
    bbox: [i16; 4],
    glyphs: HashMap<char, Glyph>,
}

impl fmt::Debug for FallbackFont {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FallbackFont")
            .field("name", &self.name)
            .field("data_len", &self.data.len())
            .field("glyphs", &self.glyphs.len())
            .finish()
    }
}

impl PartialEq for FallbackFont {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.data.len() == other.data.len()
    }
}

fn system_fonts() -> &'static Database {
    static DB: OnceLock<Database> = OnceLock::new();
    DB.get_or_init(|| {
        let mut db = Database::new();
        db.load_system_fonts();
        debug!("found {} installed font faces", db.len());
        db
    })
}

/// Characters of `text` that no standard font can encode.
pub fn uncovered_characters(text: &str) -> BTreeSet<char> {
    text.chars()
        .filter(|c| !c.is_control() && !c.is_whitespace() && !is_standard_encodable(*c))
        .collect()
}

impl FallbackFont {
    /// Parse a TrueType face, keeping the glyphs of `needed` it has.
    /// Collections and faces without `glyf` outlines are rejected.
    pub fn from_data(data: Vec<u8>, index: u32, needed: &BTreeSet<char>) -> Option<Self> {
        if ttf_parser::fonts_in_collection(&data).is_some() {
            return None;
        }
        let (name, units_per_em, ascent, descent, cap_height, italic_angle, bbox, glyphs) = {
            let face = ttf_parser::Face::parse(&data, index).ok()?;
            face.tables().glyf?;
            let glyphs: HashMap<char, Glyph> = needed
                .iter()
                .filter_map(|&c| {
                    let id = face.glyph_index(c).filter(|id| id.0 != 0)?;
                    let advance = face.glyph_hor_advance(id).unwrap_or(0);
                    Some((c, Glyph { id: id.0, advance }))
                })
                .collect();
            let name = face
                .names()
                .into_iter()
                .find(|n| n.name_id == ttf_parser::name_id::POST_SCRIPT_NAME)
                .and_then(|n| n.to_string())
                .unwrap_or_else(|| "Fallback".to_string());
            let rect = face.global_bounding_box();
            (
                name,
                face.units_per_em(),
                face.ascender(),
                face.descender(),
                face.capital_height().unwrap_or_else(|| face.ascender()),
                face.italic_angle(),
                [rect.x_min, rect.y_min, rect.x_max, rect.y_max],
                glyphs,
            )
        };
        if units_per_em == 0 {
            return None;
        }
        Some(Self {
            name: pdf_name(&name),
            data,
            units_per_em,
            ascent,
            descent,
            cap_height,
            italic_angle,
            bbox,
            glyphs,
        })
    }

    /// The installed face covering most of `needed`; ties go to the smaller
    /// file. `None` when nothing installed covers any of it.
    pub fn find_system(needed: &BTreeSet<char>) -> Option<Self> {
        Self::find_in(system_fonts(), needed)
    }

    pub fn find_in(db: &Database, needed: &BTreeSet<char>) -> Option<Self> {
        if needed.is_empty() {
            return None;
        }
        let load = |id| {
            db.with_face_data(id, |data, index| Self::from_data(data.to_vec(), index, needed))
                .flatten()
                .filter(|font| !font.glyphs.is_empty())
        };

        let mut best: Option<Self> = None;
        let consider = |candidate: Self, best: &mut Option<Self>| {
            let better = best.as_ref().is_none_or(|b| {
                (candidate.glyphs.len(), std::cmp::Reverse(candidate.data.len()))
                    > (b.glyphs.len(), std::cmp::Reverse(b.data.len()))
            });
            if better {
                *best = Some(candidate);
            }
        };

        for family in PREFERRED_FAMILIES {
            let query = Query { families: &[Family::Name(family)], ..Query::default() };
            if let Some(font) = db.query(&query).and_then(load) {
                consider(font, &mut best);
            }
            if best.as_ref().is_some_and(|b| b.glyphs.len() == needed.len()) {
                return best;
            }
        }
        for face in db.faces() {
            if let Some(font) = load(face.id) {
                consider(font, &mut best);
            }
            if best.as_ref().is_some_and(|b| b.glyphs.len() == needed.len()) {
                break;
            }
        }
        best
    }

    /// PostScript name, usable as a PDF name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn glyph(&self, c: char) -> Option<Glyph> {
        self.glyphs.get(&c).copied()
    }

    /// Every character of the document the face has a glyph for.
    pub fn glyphs(&self) -> impl Iterator<Item = (char, Glyph)> + '_ {
        self.glyphs.iter().map(|(c, g)| (*c, *g))
    }

    /// Font units scaled to thousandths of an em.
    pub fn to_thousandths(&self, units: f32) -> f32 {
        units * 1000.0 / self.units_per_em as f32
    }

    /// Advance of `glyph` in points at `size`.
    pub fn advance(&self, glyph: Glyph, size: f32) -> f32 {
        glyph.advance as f32 * size / self.units_per_em as f32
    }

    pub fn ascent(&self) -> f32 {
        self.to_thousandths(self.ascent as f32)
    }

    pub fn descent(&self) -> f32 {
        self.to_thousandths(self.descent as f32)
    }

    pub fn cap_height(&self) -> f32 {
        self.to_thousandths(self.cap_height as f32)
    }

    pub fn italic_angle(&self) -> f32 {
        self.italic_angle
    }

    pub fn bbox(&self) -> [f32; 4] {
        self.bbox.map(|v| self.to_thousandths(v as f32))
    }
}

/// Drop characters that are not allowed in a PDF name.
fn pdf_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| c.is_ascii_graphic() && !"()<>[]{}/%#".contains(*c))
        .collect();
    if cleaned.is_empty() { "Fallback".to_string() } else { cleaned }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn needed(text: &str) -> BTreeSet<char> {
        uncovered_characters(text)
    }

    #[test]
    fn test_uncovered_characters() {
        let found = needed("Café — naïve Ωμέγα 中 \u{1F600}\t\n");
        assert!(!found.contains(&'é'));
        assert!(!found.contains(&'—'));
        assert!(found.contains(&'Ω'));
        assert!(found.contains(&'中'));
        assert!(found.contains(&'\u{1F600}'));
        assert!(!found.contains(&'\t'));
        assert!(needed("plain ASCII").is_empty());
    }

    #[test]
    fn test_garbage_is_not_a_font() {
        assert!(FallbackFont::from_data(b"not a font".to_vec(), 0, &needed("Ω")).is_none());
        assert!(FallbackFont::find_in(&Database::new(), &needed("Ω")).is_none());
    }

    #[test]
    fn test_nothing_needed_loads_nothing() {
        assert!(FallbackFont::find_system(&BTreeSet::new()).is_none());
    }

    #[test]
    fn test_pdf_name() {
        assert_eq!(pdf_name("DejaVuSans"), "DejaVuSans");
        assert_eq!(pdf_name("My Font (Bold)/x"), "MyFontBoldx");
        assert_eq!(pdf_name(""), "Fallback");
    }

    #[test]
    fn test_installed_face_metrics() {
        // Only meaningful where some installed face has Greek glyphs.
        let Some(font) = FallbackFont::find_system(&needed("Ωλ")) else {
            return;
        };
        let omega = font.glyph('Ω').or_else(|| font.glyph('λ')).unwrap();
        assert!(omega.id > 0);
        assert!(font.advance(omega, 10.0) > 0.0);
        assert!(font.ascent() > 0.0);
        assert!(font.descent() <= 0.0);
        assert!(!font.name().contains(' '));
        assert!(font.glyphs().count() >= 1);
    }
}
