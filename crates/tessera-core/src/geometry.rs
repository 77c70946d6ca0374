//! Geometry resolver: maps a pointer position over a container to an
//! insertion point among its direct children.
//!
//! Everything here is a pure function of a [`ContainerLayout`] snapshot and
//! a pointer coordinate, so it can be tested without a drag in flight.
//! Screen coordinates grow downward: "below" means a larger `y`.

use serde::{Deserialize, Serialize};

use crate::node::NodeId;

/// A pointer position in canvas coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Axis-aligned rectangle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn top(&self) -> f64 {
        self.y
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn mid_y(&self) -> f64 {
        self.y + self.height / 2.0
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.mid_y())
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x <= self.x + self.width && p.y >= self.y && p.y <= self.bottom()
    }
}

/// On-screen box of one direct child.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChildBox {
    pub id: NodeId,
    pub rect: Rect,
}

/// Where a dropped item would land among a container's eligible children.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsertionPoint {
    /// Insert before `anchor`, which is the `index`-th eligible child.
    Before { anchor: NodeId, index: usize },
    /// Append after the last of `index` eligible children.
    Append { index: usize },
    /// No eligible children; the whole container is the drop zone.
    Empty,
}

impl InsertionPoint {
    /// Index to pass to `insert`/`move_node`.
    pub fn index(&self) -> usize {
        match *self {
            InsertionPoint::Before { index, .. } | InsertionPoint::Append { index } => index,
            InsertionPoint::Empty => 0,
        }
    }
}

/// Resolve the insertion point for `pointer_y` among `children` (document
/// order, direct children only), skipping `exclude`.
///
/// The first child whose vertical midpoint lies below the pointer becomes the
/// anchor, so equal midpoints resolve to the earlier child.
pub fn resolve_insertion(
    children: &[ChildBox],
    pointer_y: f64,
    exclude: Option<NodeId>,
) -> InsertionPoint {
    let mut index = 0;
    for child in children.iter().filter(|c| Some(c.id) != exclude) {
        if child.rect.mid_y() > pointer_y {
            return InsertionPoint::Before {
                anchor: child.id,
                index,
            };
        }
        index += 1;
    }
    if index == 0 {
        InsertionPoint::Empty
    } else {
        InsertionPoint::Append { index }
    }
}

/// Live visual feedback for the current hover.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Feedback {
    #[default]
    None,
    /// Horizontal insertion line at `y`, spanning the container.
    Line {
        container: NodeId,
        point: InsertionPoint,
        x: f64,
        y: f64,
        width: f64,
    },
    /// Full-area "drop here" overlay over an empty container.
    Overlay { container: NodeId, rect: Rect },
}

impl Feedback {
    pub fn is_none(&self) -> bool {
        matches!(self, Feedback::None)
    }

    pub fn container(&self) -> Option<NodeId> {
        match self {
            Feedback::None => None,
            Feedback::Line { container, .. } | Feedback::Overlay { container, .. } => {
                Some(*container)
            }
        }
    }
}

/// Measured layout of a candidate container.
#[derive(Clone, Debug, PartialEq)]
pub struct ContainerLayout {
    pub id: NodeId,
    pub rect: Rect,
    /// Direct children in document order. Unmeasurable children are absent.
    pub children: Vec<ChildBox>,
}

impl ContainerLayout {
    pub fn resolve(&self, pointer_y: f64, exclude: Option<NodeId>) -> InsertionPoint {
        resolve_insertion(&self.children, pointer_y, exclude)
    }

    /// Feedback to render for a resolved insertion point.
    pub fn feedback(&self, point: InsertionPoint, exclude: Option<NodeId>) -> Feedback {
        let y = match point {
            InsertionPoint::Empty => {
                return Feedback::Overlay {
                    container: self.id,
                    rect: self.rect,
                };
            }
            InsertionPoint::Before { anchor, .. } => self
                .children
                .iter()
                .find(|c| c.id == anchor)
                .map(|c| c.rect.top()),
            InsertionPoint::Append { .. } => self
                .children
                .iter()
                .filter(|c| Some(c.id) != exclude)
                .last()
                .map(|c| c.rect.bottom()),
        };
        Feedback::Line {
            container: self.id,
            point,
            x: self.rect.x,
            y: y.unwrap_or_else(|| self.rect.top()),
            width: self.rect.width,
        }
    }
}
