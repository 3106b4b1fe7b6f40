//! Value types shared by the layout engine and its callers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Canvas sizes offered by the tool.
pub const CANVAS_SIZES: [u32; 3] = [256, 512, 1024];

/// Largest canvas edge the layout engine will allocate.
pub const MAX_CANVAS_SIZE: u32 = 8192;

/// Largest stroke radius applied to an outline, in pixels.
pub const MAX_OUTLINE_WIDTH: u32 = 32;

/// Whether `size` is one of the standard [`CANVAS_SIZES`].
pub fn is_standard_canvas(size: u32) -> bool {
    CANVAS_SIZES.contains(&size)
}

/// An 8-bit RGBA color (straight alpha).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);

    /// Create a color from all four channels.
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Create an opaque color.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::rgba(r, g, b, 255)
    }

    /// Parse `#RRGGBB` or `#RRGGBBAA`. The leading `#` is optional.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.trim().trim_start_matches('#');
        if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();
        match digits.len() {
            6 => Some(Self::rgb(channel(0)?, channel(2)?, channel(4)?)),
            8 => Some(Self::rgba(channel(0)?, channel(2)?, channel(4)?, channel(6)?)),
            _ => None,
        }
    }

    /// Format as `#RRGGBB`, or `#RRGGBBAA` when not fully opaque.
    pub fn to_hex(self) -> String {
        if self.a == 255 {
            format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
        } else {
            format!("#{:02X}{:02X}{:02X}{:02X}", self.r, self.g, self.b, self.a)
        }
    }

    #[inline]
    pub fn to_rgba(self) -> image::Rgba<u8> {
        image::Rgba([self.r, self.g, self.b, self.a])
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Color {
    type Err = ParseValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s).ok_or_else(|| ParseValueError::new("color", s))
    }
}

impl TryFrom<String> for Color {
    type Error = ParseValueError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_hex()
    }
}

/// Error returned when a textual value cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind}: {value:?}")]
pub struct ParseValueError {
    kind: &'static str,
    value: String,
}

impl ParseValueError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Horizontal alignment of lines within a multi-line block, and the
/// horizontal component of an [`Anchor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum HorizontalAlign {
    Left,
    #[default]
    Center,
    Right,
}

impl HorizontalAlign {
    pub const ALL: [HorizontalAlign; 3] = [Self::Left, Self::Center, Self::Right];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Left => "Left",
            Self::Center => "Center",
            Self::Right => "Right",
        }
    }
}

impl fmt::Display for HorizontalAlign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HorizontalAlign {
    type Err = ParseValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" => Ok(Self::Left),
            "center" | "centre" => Ok(Self::Center),
            "right" => Ok(Self::Right),
            _ => Err(ParseValueError::new("alignment", s)),
        }
    }
}

impl TryFrom<String> for HorizontalAlign {
    type Error = ParseValueError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HorizontalAlign> for String {
    fn from(align: HorizontalAlign) -> Self {
        align.as_str().to_string()
    }
}

/// Vertical component of an [`Anchor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VerticalAlign {
    Top,
    #[default]
    Middle,
    Bottom,
}

/// One of the nine placements of the text block on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Anchor {
    TopLeft,
    TopCenter,
    TopRight,
    MiddleLeft,
    #[default]
    Center,
    MiddleRight,
    BottomLeft,
    BottomCenter,
    BottomRight,
}

impl Anchor {
    pub const ALL: [Anchor; 9] = [
        Self::TopLeft,
        Self::TopCenter,
        Self::TopRight,
        Self::MiddleLeft,
        Self::Center,
        Self::MiddleRight,
        Self::BottomLeft,
        Self::BottomCenter,
        Self::BottomRight,
    ];

    /// Resolve a position label by keyword.
    ///
    /// A label containing "left" or "right" selects that edge, anything else
    /// is centered; likewise "top"/"bottom" for the vertical edge. Matching is
    /// case-insensitive, so `"Top Left"`, `"top-left"` and `"TopLeft"` agree.
    pub fn from_label(label: &str) -> Self {
        let label = label.to_ascii_lowercase();
        let horizontal = if label.contains("left") {
            HorizontalAlign::Left
        } else if label.contains("right") {
            HorizontalAlign::Right
        } else {
            HorizontalAlign::Center
        };
        let vertical = if label.contains("top") {
            VerticalAlign::Top
        } else if label.contains("bottom") {
            VerticalAlign::Bottom
        } else {
            VerticalAlign::Middle
        };
        Self::from_edges(horizontal, vertical)
    }

    pub fn from_edges(horizontal: HorizontalAlign, vertical: VerticalAlign) -> Self {
        use HorizontalAlign as H;
        use VerticalAlign as V;
        match (vertical, horizontal) {
            (V::Top, H::Left) => Self::TopLeft,
            (V::Top, H::Center) => Self::TopCenter,
            (V::Top, H::Right) => Self::TopRight,
            (V::Middle, H::Left) => Self::MiddleLeft,
            (V::Middle, H::Center) => Self::Center,
            (V::Middle, H::Right) => Self::MiddleRight,
            (V::Bottom, H::Left) => Self::BottomLeft,
            (V::Bottom, H::Center) => Self::BottomCenter,
            (V::Bottom, H::Right) => Self::BottomRight,
        }
    }

    pub fn horizontal(self) -> HorizontalAlign {
        match self {
            Self::TopLeft | Self::MiddleLeft | Self::BottomLeft => HorizontalAlign::Left,
            Self::TopCenter | Self::Center | Self::BottomCenter => HorizontalAlign::Center,
            Self::TopRight | Self::MiddleRight | Self::BottomRight => HorizontalAlign::Right,
        }
    }

    pub fn vertical(self) -> VerticalAlign {
        match self {
            Self::TopLeft | Self::TopCenter | Self::TopRight => VerticalAlign::Top,
            Self::MiddleLeft | Self::Center | Self::MiddleRight => VerticalAlign::Middle,
            Self::BottomLeft | Self::BottomCenter | Self::BottomRight => VerticalAlign::Bottom,
        }
    }

    /// Display label, e.g. `"Bottom Right"`.
    pub fn label(self) -> &'static str {
        match self {
            Self::TopLeft => "Top Left",
            Self::TopCenter => "Top Center",
            Self::TopRight => "Top Right",
            Self::MiddleLeft => "Middle Left",
            Self::Center => "Center",
            Self::MiddleRight => "Middle Right",
            Self::BottomLeft => "Bottom Left",
            Self::BottomCenter => "Bottom Center",
            Self::BottomRight => "Bottom Right",
        }
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<&str> for Anchor {
    fn from(label: &str) -> Self {
        Self::from_label(label)
    }
}

impl From<String> for Anchor {
    fn from(label: String) -> Self {
        Self::from_label(&label)
    }
}

impl From<Anchor> for String {
    fn from(anchor: Anchor) -> Self {
        anchor.label().to_string()
    }
}

/// Everything needed to render one text image.
///
/// A request is a plain value: rendering the same request against the same
/// font always yields the same pixels.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RenderRequest {
    /// Text to draw; may contain `\n`.
    pub text: String,
    /// Width and height of the square output canvas.
    pub canvas_size: u32,
    /// Catalog name of the font.
    pub font_name: String,
    /// Font size in pixels.
    pub font_size: u32,
    /// Alignment of lines relative to each other.
    pub alignment: HorizontalAlign,
    /// Placement of the text block on the canvas.
    pub anchor: Anchor,
    /// Distance from the anchored canvas edges; may be negative.
    pub padding: i32,
    /// Extra pixels between lines; may be negative.
    pub line_spacing: i32,
    pub outline_enabled: bool,
    pub outline_width: u32,
    pub text_color: Color,
    pub outline_color: Color,
}

impl Default for RenderRequest {
    fn default() -> Self {
        Self {
            text: String::new(),
            canvas_size: 512,
            font_name: "calibri".to_string(),
            font_size: 50,
            alignment: HorizontalAlign::Center,
            anchor: Anchor::Center,
            padding: 20,
            line_spacing: 4,
            outline_enabled: false,
            outline_width: 4,
            text_color: Color::WHITE,
            outline_color: Color::BLACK,
        }
    }
}

impl RenderRequest {
    /// Create a request for `text` with default styling.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    #[must_use]
    pub fn with_canvas_size(mut self, size: u32) -> Self {
        self.canvas_size = size;
        self
    }

    #[must_use]
    pub fn with_font(mut self, name: impl Into<String>, size: u32) -> Self {
        self.font_name = name.into();
        self.font_size = size;
        self
    }

    #[must_use]
    pub fn with_alignment(mut self, alignment: HorizontalAlign) -> Self {
        self.alignment = alignment;
        self
    }

    #[must_use]
    pub fn with_anchor(mut self, anchor: Anchor) -> Self {
        self.anchor = anchor;
        self
    }

    #[must_use]
    pub fn with_padding(mut self, padding: i32) -> Self {
        self.padding = padding;
        self
    }

    #[must_use]
    pub fn with_line_spacing(mut self, spacing: i32) -> Self {
        self.line_spacing = spacing;
        self
    }

    #[must_use]
    pub fn with_text_color(mut self, color: Color) -> Self {
        self.text_color = color;
        self
    }

    /// Enable the outline with the given width and color.
    #[must_use]
    pub fn with_outline(mut self, width: u32, color: Color) -> Self {
        self.outline_enabled = true;
        self.outline_width = width;
        self.outline_color = color;
        self
    }

    #[must_use]
    pub fn without_outline(mut self) -> Self {
        self.outline_enabled = false;
        self
    }

    /// The text actually laid out: empty text becomes a single space.
    pub fn effective_text(&self) -> &str {
        if self.text.is_empty() { " " } else { &self.text }
    }

    /// Stroke radius in pixels, zero when the outline is disabled and at
    /// most [`MAX_OUTLINE_WIDTH`].
    #[inline]
    pub fn stroke_width(&self) -> u32 {
        if self.outline_enabled {
            self.outline_width.min(MAX_OUTLINE_WIDTH)
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_hex_parsing() {
        assert_eq!(Color::from_hex("#FFFFFF"), Some(Color::WHITE));
        assert_eq!(Color::from_hex("000000"), Some(Color::BLACK));
        assert_eq!(
            Color::from_hex("#10203040"),
            Some(Color::rgba(0x10, 0x20, 0x30, 0x40))
        );
        assert_eq!(Color::from_hex("#FFF"), None);
        assert_eq!(Color::from_hex("#GG0000"), None);
        assert_eq!(Color::from_hex("#ééé"), None);
        // Signs are not hex digits even where integer parsing allows them.
        assert_eq!(Color::from_hex("#+F+F+F"), None);
        assert_eq!(Color::from_hex("+F+F+F+F"), None);
    }

    #[test]
    fn color_hex_output() {
        assert_eq!(Color::rgb(255, 0, 16).to_hex(), "#FF0010");
        assert_eq!(Color::rgba(1, 2, 3, 4).to_string(), "#01020304");
        assert_eq!("#ff0010".parse::<Color>(), Ok(Color::rgb(255, 0, 16)));
    }

    #[test]
    fn anchor_labels_round_trip() {
        for anchor in Anchor::ALL {
            assert_eq!(Anchor::from_label(anchor.label()), anchor);
        }
    }

    #[test]
    fn anchor_keyword_matching() {
        assert_eq!(Anchor::from_label("top-left"), Anchor::TopLeft);
        assert_eq!(Anchor::from_label("BOTTOM RIGHT"), Anchor::BottomRight);
        assert_eq!(Anchor::from_label("middle"), Anchor::Center);
        assert_eq!(Anchor::from_label("whatever"), Anchor::Center);
        assert_eq!(Anchor::from_label("Top Center").horizontal(), HorizontalAlign::Center);
        assert_eq!(Anchor::from_label("Middle Right").vertical(), VerticalAlign::Middle);
    }

    #[test]
    fn alignment_parsing() {
        assert_eq!("left".parse(), Ok(HorizontalAlign::Left));
        assert_eq!("Center".parse(), Ok(HorizontalAlign::Center));
        assert_eq!("RIGHT".parse(), Ok(HorizontalAlign::Right));
        assert!("justify".parse::<HorizontalAlign>().is_err());
    }

    #[test]
    fn request_defaults() {
        let req = RenderRequest::new("");
        assert_eq!(req.canvas_size, 512);
        assert_eq!(req.font_size, 50);
        assert_eq!(req.padding, 20);
        assert_eq!(req.line_spacing, 4);
        assert_eq!(req.effective_text(), " ");
        assert_eq!(req.stroke_width(), 0);

        let outlined = req.with_outline(6, Color::BLACK);
        assert_eq!(outlined.stroke_width(), 6);
        assert_eq!(outlined.without_outline().stroke_width(), 0);
    }

    #[test]
    fn stroke_width_is_capped() {
        let req = RenderRequest::new("A").with_outline(u32::MAX, Color::BLACK);
        assert_eq!(req.outline_width, u32::MAX);
        assert_eq!(req.stroke_width(), MAX_OUTLINE_WIDTH);
        let req = req.with_outline(MAX_OUTLINE_WIDTH + 1, Color::BLACK);
        assert_eq!(req.stroke_width(), MAX_OUTLINE_WIDTH);
    }

    #[test]
    fn standard_canvas_sizes() {
        assert!(is_standard_canvas(256));
        assert!(is_standard_canvas(1024));
        assert!(!is_standard_canvas(300));
    }
}
