//! Widget rectangles, grid snapping and resize-edge detection.
//!
//! All coordinates are canvas pixels. Positions and sizes are kept on a
//! fixed grid so layouts stay visually aligned no matter how sloppy the
//! pointer gesture was.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Edge length of one grid cell
pub const GRID_SIZE: i32 = 20;

/// Distance from the border (in pixels) that starts a resize instead of a drag
pub const RESIZE_MARGIN: i32 = 8;

/// Largest coordinate or edge length a widget may take
pub const CANVAS_LIMIT: i32 = 100_000;

/// Smallest size any widget may take, three by two cells
pub const GRID_MIN_SIZE: Size = Size {
    width: GRID_SIZE * 3,
    height: GRID_SIZE * 2,
};

/// Rounds a coordinate to the nearest grid line
pub fn snap(value: i32) -> i32 {
    ((value as f64) / (GRID_SIZE as f64)).round() as i32 * GRID_SIZE
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    /// Component-wise maximum with the grid minimum
    pub fn at_least_grid_minimum(self) -> Self {
        Self {
            width: self.width.max(GRID_MIN_SIZE.width),
            height: self.height.max(GRID_MIN_SIZE.height),
        }
    }
}

/// Position and size of a widget on the canvas
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geometry {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Geometry {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> i32 {
        self.x.saturating_add(self.width)
    }

    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(self.height)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Pulls position and size into `0..=CANVAS_LIMIT`, keeping at least `min`
    pub fn bounded(&self, min: Size) -> Geometry {
        Geometry {
            x: self.x.clamp(0, CANVAS_LIMIT),
            y: self.y.clamp(0, CANVAS_LIMIT),
            width: self.width.clamp(min.width.min(CANVAS_LIMIT), CANVAS_LIMIT),
            height: self.height.clamp(min.height.min(CANVAS_LIMIT), CANVAS_LIMIT),
        }
    }

    /// True when the interiors intersect; rectangles sharing an edge do not overlap
    pub fn overlaps(&self, other: &Geometry) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    pub fn contains(&self, px: i32, py: i32) -> bool {
        px >= self.x && px < self.right() && py >= self.y && py < self.bottom()
    }

    /// Moves by a delta and snaps the position, never leaving the canvas origin
    pub fn translated(&self, dx: i32, dy: i32) -> Geometry {
        Geometry {
            x: snap(self.x.saturating_add(dx)).clamp(0, CANVAS_LIMIT),
            y: snap(self.y.saturating_add(dy)).clamp(0, CANVAS_LIMIT),
            ..*self
        }
    }

    /// Changes the size by a delta keeping the top-left corner fixed
    pub fn grown(&self, dw: i32, dh: i32, min: Size) -> Geometry {
        let min = min.at_least_grid_minimum();
        Geometry {
            width: snap(self.width.saturating_add(dw)).clamp(min.width, CANVAS_LIMIT),
            height: snap(self.height.saturating_add(dh)).clamp(min.height, CANVAS_LIMIT),
            ..*self
        }
    }

    /// Snaps position and size in one go
    pub fn snapped(&self, min: Size) -> Geometry {
        let min = min.at_least_grid_minimum();
        Geometry {
            x: snap(self.x).clamp(0, CANVAS_LIMIT),
            y: snap(self.y).clamp(0, CANVAS_LIMIT),
            width: snap(self.width).clamp(min.width, CANVAS_LIMIT),
            height: snap(self.height).clamp(min.height, CANVAS_LIMIT),
        }
    }

    /// Applies a resize gesture that started at `self`.
    ///
    /// Only the edges named by `direction` move; the opposite edges stay put
    /// and the moved edges land on grid lines.
    pub fn resized(&self, direction: ResizeDirection, dx: i32, dy: i32, min: Size) -> Geometry {
        let min = min.at_least_grid_minimum();
        let (mut left, mut top, mut right, mut bottom) = (self.x, self.y, self.right(), self.bottom());

        if direction.moves_west() {
            left = snap(left.saturating_add(dx)).max(0).min(right - min.width);
        }
        if direction.moves_east() {
            right = snap(right.saturating_add(dx)).max(left + min.width);
        }
        if direction.moves_north() {
            top = snap(top.saturating_add(dy)).max(0).min(bottom - min.height);
        }
        if direction.moves_south() {
            bottom = snap(bottom.saturating_add(dy)).max(top + min.height);
        }

        Geometry {
            x: left,
            y: top,
            width: right - left,
            height: bottom - top,
        }
        .bounded(min)
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}

/// Edge or corner grabbed by a resize gesture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResizeDirection {
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
}

impl ResizeDirection {
    pub fn moves_north(self) -> bool {
        matches!(self, Self::North | Self::NorthEast | Self::NorthWest)
    }

    pub fn moves_south(self) -> bool {
        matches!(self, Self::South | Self::SouthEast | Self::SouthWest)
    }

    pub fn moves_east(self) -> bool {
        matches!(self, Self::East | Self::NorthEast | Self::SouthEast)
    }

    pub fn moves_west(self) -> bool {
        matches!(self, Self::West | Self::NorthWest | Self::SouthWest)
    }

    /// Finds the edge under a point given in widget-local coordinates.
    ///
    /// Corners win over plain edges; `None` means the point is in the
    /// interior and a drag should start instead.
    pub fn hit_test(local_x: i32, local_y: i32, width: i32, height: i32) -> Option<Self> {
        let left = local_x <= RESIZE_MARGIN;
        let right = local_x >= width - RESIZE_MARGIN;
        let top = local_y <= RESIZE_MARGIN;
        let bottom = local_y >= height - RESIZE_MARGIN;

        match (left, right, top, bottom) {
            (true, _, true, _) => Some(Self::NorthWest),
            (_, true, true, _) => Some(Self::NorthEast),
            (true, _, _, true) => Some(Self::SouthWest),
            (_, true, _, true) => Some(Self::SouthEast),
            (true, _, _, _) => Some(Self::West),
            (_, true, _, _) => Some(Self::East),
            (_, _, true, _) => Some(Self::North),
            (_, _, _, true) => Some(Self::South),
            _ => None,
        }
    }
}

impl fmt::Display for ResizeDirection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let short = match self {
            Self::North => "n",
            Self::NorthEast => "ne",
            Self::East => "e",
            Self::SouthEast => "se",
            Self::South => "s",
            Self::SouthWest => "sw",
            Self::West => "w",
            Self::NorthWest => "nw",
        };
        write!(f, "{}", short)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIN: Size = Size::new(100, 60);

    #[test]
    fn snapping_rounds_to_nearest_line() {
        assert_eq!(snap(0), 0);
        assert_eq!(snap(9), 0);
        assert_eq!(snap(10), 20);
        assert_eq!(snap(29), 20);
        assert_eq!(snap(31), 40);
    }

    #[test]
    fn snapping_is_idempotent() {
        for value in [-45, -20, 0, 7, 20, 33, 199, 1000] {
            assert_eq!(snap(snap(value)), snap(value));
        }
    }

    #[test]
    fn translate_then_zero_delta_is_noop() {
        let geometry = Geometry::new(20, 20, 200, 160).translated(37, 52);
        assert_eq!(geometry, Geometry::new(60, 80, 200, 160));
        assert_eq!(geometry.translated(0, 0), geometry);
    }

    #[test]
    fn translate_stays_on_canvas() {
        let geometry = Geometry::new(20, 20, 100, 60).translated(-200, -5);
        assert_eq!((geometry.x, geometry.y), (0, 20));
    }

    #[test]
    fn grow_respects_minimum() {
        let geometry = Geometry::new(0, 0, 200, 100).grown(-500, -500, MIN);
        assert_eq!(geometry.size(), MIN);
        let geometry = Geometry::new(0, 0, 200, 100).grown(33, 11, MIN);
        assert_eq!(geometry.size(), Size::new(240, 120));
    }

    #[test]
    fn grid_minimum_applies_to_tiny_kinds() {
        let geometry = Geometry::new(0, 0, 10, 10).snapped(Size::new(0, 0));
        assert_eq!(geometry.size(), GRID_MIN_SIZE);
    }

    #[test]
    fn resize_west_keeps_right_edge() {
        let start = Geometry::new(100, 100, 200, 100);
        let resized = start.resized(ResizeDirection::West, -41, 0, MIN);
        assert_eq!(resized.right(), start.right());
        assert_eq!(resized.x, 60);
        assert_eq!(resized.width, 240);
    }

    #[test]
    fn resize_north_west_clamps_to_minimum() {
        let start = Geometry::new(100, 100, 200, 100);
        let resized = start.resized(ResizeDirection::NorthWest, 500, 500, MIN);
        assert_eq!(resized.size(), MIN);
        assert_eq!(resized.right(), start.right());
        assert_eq!(resized.bottom(), start.bottom());
    }

    #[test]
    fn resize_south_east_snaps() {
        let start = Geometry::new(0, 0, 200, 100);
        let resized = start.resized(ResizeDirection::SouthEast, 27, 13, MIN);
        assert_eq!(resized, Geometry::new(0, 0, 220, 120));
    }

    #[test]
    fn hit_test_prefers_corners() {
        assert_eq!(ResizeDirection::hit_test(2, 2, 200, 100), Some(ResizeDirection::NorthWest));
        assert_eq!(ResizeDirection::hit_test(198, 98, 200, 100), Some(ResizeDirection::SouthEast));
        assert_eq!(ResizeDirection::hit_test(198, 50, 200, 100), Some(ResizeDirection::East));
        assert_eq!(ResizeDirection::hit_test(100, 2, 200, 100), Some(ResizeDirection::North));
        assert_eq!(ResizeDirection::hit_test(100, 50, 200, 100), None);
    }

    #[test]
    fn far_out_geometry_is_pulled_inside_the_canvas() {
        let huge = Geometry::new(i32::MAX - 500, -7, i32::MAX, 10).bounded(MIN);
        assert_eq!(huge, Geometry::new(CANVAS_LIMIT, 0, CANVAS_LIMIT, MIN.height));
        assert_eq!(huge.right(), CANVAS_LIMIT * 2);

        let edge = Geometry::new(i32::MAX - 10, 0, 1000, 100);
        assert_eq!(edge.right(), i32::MAX);
        let moved = Geometry::new(CANVAS_LIMIT, 0, 100, 60).translated(i32::MAX, 0);
        assert_eq!(moved.x, CANVAS_LIMIT);
        let grown = Geometry::new(0, 0, 100, 60).grown(i32::MAX, 0, MIN);
        assert_eq!(grown.width, CANVAS_LIMIT);
    }

    #[test]
    fn touching_rectangles_do_not_overlap() {
        let a = Geometry::new(0, 0, 100, 100);
        let b = Geometry::new(100, 0, 100, 100);
        let c = Geometry::new(99, 99, 10, 10);
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
    }
}
