//! Pointer gesture state of a single widget.
//!
//! ```text
//! Idle ──pointer_down(interior)──► Dragging ──pointer_up──► Idle
//! Idle ──pointer_down(edge)──────► Resizing(direction) ──pointer_up──► Idle
//! ```
//!
//! A gesture always works relative to the geometry it started from, so a
//! long drag does not accumulate rounding from every intermediate snap.

use super::geometry::{Geometry, ResizeDirection, Size};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Interaction {
    #[default]
    Idle,
    Dragging {
        grab: (i32, i32),
        origin: Geometry,
    },
    Resizing {
        direction: ResizeDirection,
        grab: (i32, i32),
        origin: Geometry,
    },
}

impl Interaction {
    pub fn is_idle(&self) -> bool {
        matches!(self, Interaction::Idle)
    }

    pub fn is_resizing(&self) -> bool {
        matches!(self, Interaction::Resizing { .. })
    }

    pub fn resize_direction(&self) -> Option<ResizeDirection> {
        match self {
            Interaction::Resizing { direction, .. } => Some(*direction),
            _ => None,
        }
    }

    /// Starts a gesture for a pointer press at canvas coordinates `(px, py)`.
    ///
    /// Edge proximity wins over dragging unless `allow_resize` is false.
    /// Returns `None` when the press is outside the widget or a gesture is
    /// already running.
    pub fn begin(&self, geometry: Geometry, px: i32, py: i32, allow_resize: bool) -> Option<Interaction> {
        if !self.is_idle() || !geometry.contains(px, py) {
            return None;
        }

        let direction = ResizeDirection::hit_test(
            px - geometry.x,
            py - geometry.y,
            geometry.width,
            geometry.height,
        );

        Some(match direction {
            Some(direction) if allow_resize => Interaction::Resizing {
                direction,
                grab: (px, py),
                origin: geometry,
            },
            _ => Interaction::Dragging {
                grab: (px, py),
                origin: geometry,
            },
        })
    }

    /// Geometry the running gesture produces for the pointer at `(px, py)`
    pub fn track(&self, px: i32, py: i32, min: Size) -> Option<Geometry> {
        match *self {
            Interaction::Idle => None,
            Interaction::Dragging { grab, origin } => {
                Some(origin.translated(px - grab.0, py - grab.1))
            }
            Interaction::Resizing {
                direction,
                grab,
                origin,
            } => Some(origin.resized(direction, px - grab.0, py - grab.1, min)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIN: Size = Size::new(100, 60);
    const START: Geometry = Geometry::new(100, 100, 200, 100);

    #[test]
    fn interior_press_starts_drag() {
        let gesture = Interaction::Idle.begin(START, 200, 150, true).unwrap();
        assert!(matches!(gesture, Interaction::Dragging { .. }));
        assert_eq!(gesture.track(243, 150, MIN), Some(Geometry::new(140, 100, 200, 100)));
    }

    #[test]
    fn edge_press_starts_resize() {
        let gesture = Interaction::Idle.begin(START, 299, 150, true).unwrap();
        assert_eq!(gesture.resize_direction(), Some(ResizeDirection::East));
        let geometry = gesture.track(339, 150, MIN).unwrap();
        assert_eq!(geometry, Geometry::new(100, 100, 240, 100));
    }

    #[test]
    fn edge_press_drags_when_resize_disabled() {
        let gesture = Interaction::Idle.begin(START, 299, 150, false).unwrap();
        assert!(matches!(gesture, Interaction::Dragging { .. }));
    }

    #[test]
    fn gestures_are_exclusive() {
        let gesture = Interaction::Idle.begin(START, 200, 150, true).unwrap();
        assert!(gesture.begin(START, 101, 101, true).is_none());
    }

    #[test]
    fn outside_press_is_ignored() {
        assert!(Interaction::Idle.begin(START, 10, 10, true).is_none());
        assert_eq!(Interaction::Idle.track(5, 5, MIN), None);
    }
}
