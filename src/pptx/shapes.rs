//! Shape geometry and the placeholder ordering resolver.
//!
//! Slides carry no explicit evaluation order, so one is inferred from the
//! two-dimensional layout: shapes form a containment forest (strict
//! axis-aligned bounding-box containment), roots and children are read
//! top-to-bottom then left-to-right, and the flattened traversal keeps only
//! placeholder shapes.

use crate::xml::Element;
use smallvec::SmallVec;

/// An axis-aligned bounding box in EMUs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i64,
    pub y: i64,
    pub cx: i64,
    pub cy: i64,
}

impl Rect {
    pub fn new(x: i64, y: i64, cx: i64, cy: i64) -> Self {
        Self { x, y, cx, cy }
    }

    #[inline]
    pub fn center_x(&self) -> i64 {
        self.x + self.cx / 2
    }

    #[inline]
    pub fn center_y(&self) -> i64 {
        self.y + self.cy / 2
    }

    /// Strict bounding-box containment: `other` lies entirely within self on
    /// both axes. Coincident edges count as contained; mere overlap does not.
    pub fn contains(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.x + other.cx <= self.x + self.cx
            && other.y >= self.y
            && other.y + other.cy <= self.y + self.cy
    }
}

/// Read a shape's own geometry from its `a:xfrm`, if it has one.
pub fn shape_rect(shape: &Element) -> Option<Rect> {
    let xfrm = shape.find_descendant("xfrm")?;
    let off = xfrm.find_child("off")?;
    let ext = xfrm.find_child("ext")?;
    Some(Rect {
        x: off.attr("x")?.parse().ok()?,
        y: off.attr("y")?.parse().ok()?,
        cx: ext.attr("cx")?.parse().ok()?,
        cy: ext.attr("cy")?.parse().ok()?,
    })
}

/// One shape entering the ordering resolver.
#[derive(Debug, Clone)]
pub struct ShapeNode {
    pub rect: Rect,
    pub is_placeholder: bool,
}

/// Resolve the evaluation order over a slide's shapes.
///
/// Returns indices into `shapes` for the placeholder shapes only, in visual
/// reading order. Non-placeholder shapes participate as structural groupers
/// but are not emitted. The result is independent of the input enumeration
/// order.
pub fn resolve_order(shapes: &[ShapeNode]) -> Vec<usize> {
    let n = shapes.len();

    // Largest-first processing order: (width, height) descending. A shape
    // can only become the child of one processed earlier, so the forest is
    // acyclic by construction.
    let mut processing: Vec<usize> = (0..n).collect();
    processing.sort_by(|&a, &b| {
        (shapes[b].rect.cx, shapes[b].rect.cy).cmp(&(shapes[a].rect.cx, shapes[a].rect.cy))
    });

    let mut children: Vec<SmallVec<[usize; 4]>> = vec![SmallVec::new(); n];
    let mut has_parent = vec![false; n];
    for (pos, &shape) in processing.iter().enumerate() {
        for &candidate in &processing[pos + 1..] {
            if shapes[shape].rect.contains(&shapes[candidate].rect) {
                children[shape].push(candidate);
                has_parent[candidate] = true;
            }
        }
    }

    let by_center = |&a: &usize, &b: &usize| {
        (shapes[a].rect.center_y(), shapes[a].rect.center_x())
            .cmp(&(shapes[b].rect.center_y(), shapes[b].rect.center_x()))
    };

    let mut roots: Vec<usize> = (0..n).filter(|&i| !has_parent[i]).collect();
    roots.sort_by(by_center);
    for kids in &mut children {
        kids.sort_by(by_center);
    }

    // Depth-first flatten; a shape attached under several ancestors is
    // emitted at its first visit only.
    let mut order = Vec::with_capacity(n);
    let mut seen = vec![false; n];
    let mut stack: Vec<usize> = roots.into_iter().rev().collect();
    while let Some(shape) = stack.pop() {
        if seen[shape] {
            continue;
        }
        seen[shape] = true;
        if shapes[shape].is_placeholder {
            order.push(shape);
        }
        for &child in children[shape].iter().rev() {
            stack.push(child);
        }
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ph(rect: Rect) -> ShapeNode {
        ShapeNode {
            rect,
            is_placeholder: true,
        }
    }

    fn grouper(rect: Rect) -> ShapeNode {
        ShapeNode {
            rect,
            is_placeholder: false,
        }
    }

    #[test]
    fn containment_is_strict_not_overlap() {
        let big = Rect::new(0, 0, 100, 100);
        assert!(big.contains(&Rect::new(10, 10, 50, 50)));
        assert!(big.contains(&Rect::new(0, 0, 100, 100)));
        assert!(!big.contains(&Rect::new(50, 50, 100, 100)));
        assert!(!big.contains(&Rect::new(-10, 10, 50, 50)));
    }

    #[test]
    fn nested_order_is_independent_of_enumeration() {
        // A 800x600 at origin; B and C 200x100 inside A, B's center above C's
        let a = grouper(Rect::new(0, 0, 800, 600));
        let b = ph(Rect::new(100, 100, 200, 100));
        let c = ph(Rect::new(100, 400, 200, 100));

        let forward = vec![a.clone(), b.clone(), c.clone()];
        let shuffled = vec![c.clone(), a.clone(), b.clone()];

        let order = resolve_order(&forward);
        assert_eq!(order, vec![1, 2]); // B then C

        let order = resolve_order(&shuffled);
        // indices differ, geometry order must not: B (idx 2) before C (idx 0)
        assert_eq!(order, vec![2, 0]);
    }

    #[test]
    fn roots_read_top_to_bottom_left_to_right() {
        let top_right = ph(Rect::new(500, 0, 100, 100));
        let top_left = ph(Rect::new(0, 0, 100, 100));
        let bottom = ph(Rect::new(0, 500, 100, 100));

        let order = resolve_order(&[bottom, top_right, top_left]);
        assert_eq!(order, vec![2, 1, 0]);
    }

    #[test]
    fn shape_under_two_ancestors_emitted_once() {
        // two identical groupers both contain the placeholder
        let g1 = grouper(Rect::new(0, 0, 400, 400));
        let g2 = grouper(Rect::new(0, 0, 400, 400));
        let inner = ph(Rect::new(100, 100, 50, 50));

        let order = resolve_order(&[g1, g2, inner]);
        assert_eq!(order, vec![2]);
    }

    #[test]
    fn non_placeholders_never_emitted() {
        let order = resolve_order(&[grouper(Rect::new(0, 0, 10, 10))]);
        assert!(order.is_empty());
    }

    #[test]
    fn parses_xfrm_geometry() {
        let xml = br#"<p:sp><p:spPr><a:xfrm><a:off x="914400" y="457200"/><a:ext cx="1828800" cy="914400"/></a:xfrm></p:spPr></p:sp>"#;
        let sp = Element::parse(xml).unwrap();
        assert_eq!(
            shape_rect(&sp),
            Some(Rect::new(914400, 457200, 1828800, 914400))
        );

        let bare = Element::parse(b"<p:sp><p:spPr/></p:sp>").unwrap();
        assert_eq!(shape_rect(&bare), None);
    }
}
