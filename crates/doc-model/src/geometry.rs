use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in page coordinates.
///
/// Origin at bottom-left, coordinates in points (1/72 inch).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Build a box from two opposite corners in any order.
    pub fn from_corners(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        let left = x0.min(x1);
        let bottom = y0.min(y1);
        Self { x: left, y: bottom, width: (x1 - x0).abs(), height: (y1 - y0).abs() }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn top(&self) -> f32 {
        self.y + self.height
    }

    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Check if this box touches or overlaps another (edges count).
    pub fn overlaps(&self, other: &BoundingBox) -> bool {
        !(self.right() < other.x
            || other.right() < self.x
            || self.top() < other.y
            || other.top() < self.y)
    }

    /// Area shared with another box, zero when they only touch.
    pub fn intersection_area(&self, other: &BoundingBox) -> f32 {
        if !self.overlaps(other) {
            return 0.0;
        }

        let (left, bottom) = (self.x.max(other.x), self.y.max(other.y));
        BoundingBox::new(
            left,
            bottom,
            self.right().min(other.right()) - left,
            self.top().min(other.top()) - bottom,
        )
        .area()
    }

    /// Smallest box containing both boxes.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox::from_corners(
            self.x.min(other.x),
            self.y.min(other.y),
            self.right().max(other.right()),
            self.top().max(other.top()),
        )
    }

    pub fn padded(&self, amount: f32) -> BoundingBox {
        BoundingBox {
            x: self.x - amount,
            y: self.y - amount,
            width: self.width + amount * 2.0,
            height: self.height + amount * 2.0,
        }
    }

    /// PDF rectangle array order: `[llx lly urx ury]`.
    pub fn to_pdf_rect(&self) -> [f32; 4] {
        [self.x, self.y, self.right(), self.top()]
    }

    /// Envelope of a set of boxes, `None` when the set is empty.
    pub fn envelope<'a>(boxes: impl IntoIterator<Item = &'a BoundingBox>) -> Option<BoundingBox> {
        boxes.into_iter().fold(None, |acc, bbox| match acc {
            None => Some(*bbox),
            Some(current) => Some(current.union(bbox)),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

impl Default for PageSize {
    fn default() -> Self {
        Self { width_pt: 612.0, height_pt: 792.0 }
    }
}

/// RGBA colour, 8 bits per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const YELLOW: Color = Color { r: 255, g: 235, b: 59, a: 255 };
    pub const RED: Color = Color { r: 229, g: 57, b: 53, a: 255 };

    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Parse `#RRGGBB` or `RRGGBB`.
    pub fn from_hex(value: &str) -> Option<Self> {
        let hex = value.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }

        let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
        let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
        let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
        Some(Self::rgb(r, g, b))
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    /// Convert to normalized RGB values (0.0 to 1.0) as used by PDF colour operators.
    pub fn to_normalized_rgb(&self) -> [f32; 3] {
        [self.r as f32 / 255.0, self.g as f32 / 255.0, self.b as f32 / 255.0]
    }
}

impl Serialize for Color {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Color::from_hex(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid colour {raw:?}")))
    }
}
