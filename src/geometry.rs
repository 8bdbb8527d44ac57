//! Structures used to map areas on the screen

use std::fmt;

// =============================== Point ==============================

/// A position in window or root coordinates
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Point {
    /// Horizontal coordinate
    pub x: i32,
    /// Vertical coordinate
    pub y: i32,
}

impl Point {
    /// Create a new [`Point`]
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

// ============================= Dimension ============================

/// The width and height of an area
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dimension {
    /// Horizontal extent
    pub width:  i32,
    /// Vertical extent
    pub height: i32,
}

impl Dimension {
    /// Create a new [`Dimension`]
    #[must_use]
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    /// Divide both extents by `scale`, rounding up
    #[must_use]
    pub const fn scale_down(self, scale: i32) -> Self {
        Self {
            width:  ceil_div(self.width, scale),
            height: ceil_div(self.height, scale),
        }
    }
}

// ============================= Rectangle ============================

/// An area on the screen
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rectangle {
    /// Represents the top-left corner of the rectangle
    pub point:     Point,
    /// The width and height of the rectangle
    pub dimension: Dimension,
}

impl Rectangle {
    /// Create a new [`Rectangle`]
    #[must_use]
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            point:     Point::new(x, y),
            dimension: Dimension::new(width, height),
        }
    }

    /// Left edge
    #[must_use]
    pub const fn x(&self) -> i32 {
        self.point.x
    }

    /// Top edge
    #[must_use]
    pub const fn y(&self) -> i32 {
        self.point.y
    }

    /// Horizontal extent
    #[must_use]
    pub const fn width(&self) -> i32 {
        self.dimension.width
    }

    /// Vertical extent
    #[must_use]
    pub const fn height(&self) -> i32 {
        self.dimension.height
    }

    /// Check if the [`Rectangle`]'s area is empty
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.dimension.width <= 0 || self.dimension.height <= 0
    }

    /// Convert an area in device pixels to logical pixels.
    ///
    /// The origin is rounded down and the far edge is rounded up so the result
    /// covers every device pixel of the input.
    #[must_use]
    pub const fn scale_down_covering(self, scale: i32) -> Self {
        let x = self.point.x / scale;
        let y = self.point.y / scale;
        let x2 = (self.point.x + self.dimension.width + scale - 1) / scale;
        let y2 = (self.point.y + self.dimension.height + scale - 1) / scale;

        Self::new(x, y, x2 - x, y2 - y)
    }

    /// Map a damaged area of a composited child (device pixels, relative to
    /// the child) into logical coordinates of the child's parent.
    #[must_use]
    pub const fn damage_in_parent(origin: Point, area: Self, scale: i32) -> Self {
        let x = origin.x + area.point.x / scale;
        let y = origin.y + area.point.y / scale;
        let x2 = (x * scale + area.dimension.width + scale - 1) / scale;
        let y2 = (y * scale + area.dimension.height + scale - 1) / scale;

        Self::new(x, y, x2 - x, y2 - y)
    }
}

impl fmt::Display for Rectangle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{}+{}+{}",
            self.dimension.width, self.dimension.height, self.point.x, self.point.y
        )
    }
}

impl From<x11rb::protocol::xproto::Rectangle> for Rectangle {
    fn from(r: x11rb::protocol::xproto::Rectangle) -> Self {
        Self::new(
            i32::from(r.x),
            i32::from(r.y),
            i32::from(r.width),
            i32::from(r.height),
        )
    }
}

/// Integer division rounding toward positive infinity for positive operands
#[must_use]
pub const fn ceil_div(value: i32, scale: i32) -> i32 {
    (value + scale - 1) / scale
}
