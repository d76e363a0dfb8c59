//! Split-tree layout.
//!
//! Windows are leaves of a binary tree; inner nodes split their rectangle
//! along one axis. Rectangles are derived from the tree on every layout pass:
//! the first child gets `size / 2`, the second the remainder, so siblings
//! always tile their parent exactly (no separator cells are reserved).
//!
//! Window order is the in-order leaf sequence. Splitting a leaf replaces it
//! by `Split { first: old, second: new }`, which puts the new window directly
//! after the old one; removing a leaf promotes its sibling into the parent's
//! place (and therefore into the parent's rectangle).
//!
//! Coordinates are terminal cells (`u16`).

use crate::WindowId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

impl Rect {
    pub fn new(x: u16, y: u16, width: u16, height: u16) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Extent along the axis a split of kind `axis` divides.
    pub fn extent(&self, axis: SplitAxis) -> u16 {
        match axis {
            SplitAxis::Horizontal => self.height,
            SplitAxis::Vertical => self.width,
        }
    }

    /// Divide into (first, second) halves; second takes any odd remainder.
    pub fn split(&self, axis: SplitAxis) -> (Rect, Rect) {
        match axis {
            SplitAxis::Horizontal => {
                let top = self.height / 2;
                (
                    Rect::new(self.x, self.y, self.width, top),
                    Rect::new(self.x, self.y + top, self.width, self.height - top),
                )
            }
            SplitAxis::Vertical => {
                let left = self.width / 2;
                (
                    Rect::new(self.x, self.y, left, self.height),
                    Rect::new(self.x + left, self.y, self.width - left, self.height),
                )
            }
        }
    }
}

/// `Horizontal` stacks windows top/bottom (divides height); `Vertical`
/// places them side by side (divides width).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitAxis {
    Horizontal,
    Vertical,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutNode {
    Leaf(WindowId),
    Split {
        axis: SplitAxis,
        first: Box<LayoutNode>,
        second: Box<LayoutNode>,
    },
}

impl LayoutNode {
    /// Window ids in window order.
    pub fn leaves(&self) -> Vec<WindowId> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves(&self, out: &mut Vec<WindowId>) {
        match self {
            Self::Leaf(id) => out.push(*id),
            Self::Split { first, second, .. } => {
                first.collect_leaves(out);
                second.collect_leaves(out);
            }
        }
    }

    pub fn window_count(&self) -> usize {
        match self {
            Self::Leaf(_) => 1,
            Self::Split { first, second, .. } => first.window_count() + second.window_count(),
        }
    }

    pub fn contains(&self, id: WindowId) -> bool {
        match self {
            Self::Leaf(w) => *w == id,
            Self::Split { first, second, .. } => first.contains(id) || second.contains(id),
        }
    }

    /// Rectangles for every leaf, in window order.
    pub fn layout(&self, area: Rect) -> Vec<(WindowId, Rect)> {
        let mut out = Vec::new();
        self.layout_into(area, &mut out);
        out
    }

    fn layout_into(&self, area: Rect, out: &mut Vec<(WindowId, Rect)>) {
        match self {
            Self::Leaf(id) => out.push((*id, area)),
            Self::Split {
                axis,
                first,
                second,
            } => {
                let (a, b) = area.split(*axis);
                first.layout_into(a, out);
                second.layout_into(b, out);
            }
        }
    }

    /// Replace leaf `target` by a split whose second half is `new_id`.
    pub fn split(&mut self, target: WindowId, axis: SplitAxis, new_id: WindowId) -> bool {
        match self {
            Self::Leaf(id) if *id == target => {
                *self = Self::Split {
                    axis,
                    first: Box::new(Self::Leaf(target)),
                    second: Box::new(Self::Leaf(new_id)),
                };
                true
            }
            Self::Leaf(_) => false,
            Self::Split { first, second, .. } => {
                first.split(target, axis, new_id) || second.split(target, axis, new_id)
            }
        }
    }

    /// Remove leaf `target`, promoting its sibling. The root leaf cannot be removed.
    pub fn remove(&mut self, target: WindowId) -> bool {
        match self {
            Self::Leaf(_) => false,
            Self::Split { first, second, .. } => {
                if matches!(first.as_ref(), Self::Leaf(id) if *id == target) {
                    let sibling = std::mem::replace(second.as_mut(), Self::Leaf(target));
                    *self = sibling;
                    return true;
                }
                if matches!(second.as_ref(), Self::Leaf(id) if *id == target) {
                    let sibling = std::mem::replace(first.as_mut(), Self::Leaf(target));
                    *self = sibling;
                    return true;
                }
                first.remove(target) || second.remove(target)
            }
        }
    }
}
