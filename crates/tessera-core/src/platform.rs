//! Platform abstraction traits for the engine.
//!
//! These traits define the interface between the pure engine and whatever
//! hosts it (browser DOM, native UI, headless tests). The engine never reads
//! layout, time or user confirmation from ambient scope; it asks through
//! these seams.

use std::cell::Cell;
use std::collections::HashMap;
use std::time::Duration;

use web_time::Instant;

use crate::geometry::{Point, Rect};
use crate::node::NodeId;

/// Read-only access to the rendered layout of the canvas.
pub trait LayoutProbe {
    /// Innermost tree node rendered under `point`.
    ///
    /// Returns `None` when the point is outside the canvas.
    fn node_at(&self, point: Point) -> Option<NodeId>;

    /// On-screen rectangle of a node, if it is rendered.
    fn rect_of(&self, id: NodeId) -> Option<Rect>;
}

/// Layout probe backed by precomputed rectangles.
///
/// Useful for headless hosts and tests. Hit testing picks the smallest
/// rectangle containing the point, which is the innermost node for nested
/// layouts.
#[derive(Clone, Debug, Default)]
pub struct RectLayout {
    rects: HashMap<NodeId, Rect>,
}

impl RectLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, id: NodeId, rect: Rect) -> Self {
        self.rects.insert(id, rect);
        self
    }

    pub fn set(&mut self, id: NodeId, rect: Rect) {
        self.rects.insert(id, rect);
    }
}

impl LayoutProbe for RectLayout {
    fn node_at(&self, point: Point) -> Option<NodeId> {
        self.rects
            .iter()
            .filter(|(_, r)| r.contains(point))
            .min_by(|(a_id, a), (b_id, b)| {
                (a.width * a.height)
                    .total_cmp(&(b.width * b.height))
                    .then(b_id.cmp(a_id))
            })
            .map(|(id, _)| *id)
    }

    fn rect_of(&self, id: NodeId) -> Option<Rect> {
        self.rects.get(&id).copied()
    }
}

/// Source of the current time, used for debouncing.
pub trait Clock {
    fn now(&self) -> Instant;
}

/// Wall clock (`performance.now()` on the web).
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Cell<Instant>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Cell::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.now.get()
    }
}

/// Blocking yes/no prompt shown before destructive actions.
pub trait ConfirmPrompt {
    fn confirm(&self, message: &str) -> bool;
}

impl<F> ConfirmPrompt for F
where
    F: Fn(&str) -> bool,
{
    fn confirm(&self, message: &str) -> bool {
        self(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_layout_picks_innermost() {
        let layout = RectLayout::new()
            .with(NodeId(1), Rect::new(0.0, 0.0, 100.0, 100.0))
            .with(NodeId(2), Rect::new(10.0, 10.0, 50.0, 50.0))
            .with(NodeId(3), Rect::new(20.0, 20.0, 10.0, 10.0));
        assert_eq!(layout.node_at(Point::new(25.0, 25.0)), Some(NodeId(3)));
        assert_eq!(layout.node_at(Point::new(12.0, 12.0)), Some(NodeId(2)));
        assert_eq!(layout.node_at(Point::new(90.0, 90.0)), Some(NodeId(1)));
        assert_eq!(layout.node_at(Point::new(200.0, 5.0)), None);
    }

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::new();
        let start = clock.now();
        clock.advance(Duration::from_millis(300));
        assert_eq!(clock.now() - start, Duration::from_millis(300));
    }

    #[test]
    fn test_closure_prompt() {
        let yes = |_: &str| true;
        assert!(yes.confirm("Delete?"));
    }
}
