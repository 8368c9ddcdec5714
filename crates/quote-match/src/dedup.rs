//! Folding overlapping hits into drawable regions.
//!
//! Hits whose rectangles intersect (by more than the tolerance) end up in
//! the same [`DrawRegion`], transitively. Counting is not affected.

use doc_model::{BoundingBox, DrawRegion, HitRegion};
use std::collections::BTreeMap;

struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(len: usize) -> Self {
        Self { parent: (0..len).collect() }
    }

    fn find(&mut self, item: usize) -> usize {
        let mut root = item;
        while self.parent[root] != root {
            root = self.parent[root];
        }

        let mut current = item;
        while self.parent[current] != root {
            let next = self.parent[current];
            self.parent[current] = root;
            current = next;
        }
        root
    }

    fn union(&mut self, left: usize, right: usize) {
        let (left, right) = (self.find(left), self.find(right));
        if left != right {
            // Lower index wins so group roots are stable.
            let (keep, merge) = if left < right { (left, right) } else { (right, left) };
            self.parent[merge] = keep;
        }
    }
}

/// Merge hits into drawable regions, page by page.
///
/// Regions come back ordered by page, then by the first hit they contain.
pub fn deduplicate(hits: &[HitRegion], overlap_tolerance: f32) -> Vec<DrawRegion> {
    let tolerance = if overlap_tolerance.is_finite() { overlap_tolerance.max(0.0) } else { 0.0 };

    let mut by_page: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
    for (index, hit) in hits.iter().enumerate() {
        if !hit.rects.is_empty() {
            by_page.entry(hit.page_index).or_default().push(index);
        }
    }

    let mut regions = Vec::new();
    for (page_index, members) in by_page {
        regions.extend(merge_page(hits, page_index, &members, tolerance));
    }

    tracing::debug!(hits = hits.len(), regions = regions.len(), "deduplicated hits");
    regions
}

fn merge_page(
    hits: &[HitRegion],
    page_index: u32,
    members: &[usize],
    tolerance: f32,
) -> Vec<DrawRegion> {
    let envelopes: Vec<BoundingBox> = members
        .iter()
        .map(|index| hits[*index].envelope().unwrap_or_default())
        .collect();

    let mut by_left: Vec<usize> = (0..members.len()).collect();
    by_left.sort_by(|left, right| {
        envelopes[*left].x.total_cmp(&envelopes[*right].x).then(left.cmp(right))
    });

    let mut sets = DisjointSet::new(members.len());
    let mut active: Vec<usize> = Vec::new();

    for &current in &by_left {
        let left_edge = envelopes[current].x;
        active.retain(|other| envelopes[*other].right() >= left_edge);

        for &other in &active {
            if envelopes[current].overlaps(&envelopes[other])
                && rects_intersect(&hits[members[current]].rects, &hits[members[other]].rects, tolerance)
            {
                sets.union(current, other);
            }
        }
        active.push(current);
    }

    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for local in 0..members.len() {
        let root = sets.find(local);
        groups.entry(root).or_default().push(local);
    }

    groups
        .into_values()
        .map(|group| {
            let mut quote_indices: Vec<usize> =
                group.iter().map(|local| hits[members[*local]].quote_index).collect();
            quote_indices.sort_unstable();
            quote_indices.dedup();

            let rects = fold_rects(group.iter().flat_map(|local| hits[members[*local]].rects.iter()));
            DrawRegion { page_index, rects, quote_indices }
        })
        .collect()
}

fn rects_intersect(left: &[BoundingBox], right: &[BoundingBox], tolerance: f32) -> bool {
    left.iter().any(|a| right.iter().any(|b| a.intersection_area(b) > tolerance))
}

/// Replace overlapping rectangles by their union until none overlap.
fn fold_rects<'a>(rects: impl IntoIterator<Item = &'a BoundingBox>) -> Vec<BoundingBox> {
    let mut folded: Vec<BoundingBox> = Vec::new();

    for rect in rects {
        let mut merged = *rect;
        loop {
            let position = folded
                .iter()
                .position(|existing| *existing == merged || existing.intersection_area(&merged) > 0.0);
            match position {
                Some(position) => {
                    merged = merged.union(&folded.remove(position));
                }
                None => break,
            }
        }
        folded.push(merged);
    }

    folded.sort_by(|left, right| right.top().total_cmp(&left.top()).then(left.x.total_cmp(&right.x)));
    folded
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(page_index: u32, quote_index: usize, rects: &[(f32, f32, f32, f32)]) -> HitRegion {
        HitRegion {
            page_index,
            rects: rects.iter().map(|(x, y, w, h)| BoundingBox::new(*x, *y, *w, *h)).collect(),
            quote_index,
            quote: format!("quote {quote_index}"),
        }
    }

    #[test]
    fn nested_phrases_become_one_region() {
        let hits = vec![
            hit(0, 0, &[(72.0, 700.0, 200.0, 12.0)]),
            hit(0, 1, &[(112.0, 700.0, 76.0, 12.0)]),
        ];

        let regions = deduplicate(&hits, 0.0);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].quote_indices, vec![0, 1]);
        assert_eq!(regions[0].rects, vec![BoundingBox::new(72.0, 700.0, 200.0, 12.0)]);
    }

    #[test]
    fn merging_is_transitive() {
        let hits = vec![
            hit(0, 0, &[(0.0, 0.0, 10.0, 10.0)]),
            hit(0, 1, &[(8.0, 0.0, 10.0, 10.0)]),
            hit(0, 2, &[(16.0, 0.0, 10.0, 10.0)]),
        ];

        let regions = deduplicate(&hits, 0.0);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].rects, vec![BoundingBox::new(0.0, 0.0, 26.0, 10.0)]);
    }

    #[test]
    fn touching_or_separate_hits_stay_apart() {
        let hits = vec![
            hit(0, 0, &[(0.0, 0.0, 10.0, 10.0)]),
            hit(0, 1, &[(10.0, 0.0, 10.0, 10.0)]),
            hit(0, 2, &[(50.0, 50.0, 10.0, 10.0)]),
        ];

        assert_eq!(deduplicate(&hits, 0.0).len(), 3);
    }

    #[test]
    fn tolerance_ignores_small_intersections() {
        let hits = vec![
            hit(0, 0, &[(0.0, 0.0, 10.0, 10.0)]),
            hit(0, 1, &[(9.0, 0.0, 10.0, 10.0)]),
        ];

        assert_eq!(deduplicate(&hits, 0.0).len(), 1);
        assert_eq!(deduplicate(&hits, 10.0).len(), 2);
    }

    #[test]
    fn pages_never_merge() {
        let hits = vec![
            hit(1, 0, &[(0.0, 0.0, 10.0, 10.0)]),
            hit(0, 0, &[(0.0, 0.0, 10.0, 10.0)]),
        ];

        let regions = deduplicate(&hits, 0.0);
        let pages: Vec<u32> = regions.iter().map(|region| region.page_index).collect();
        assert_eq!(pages, vec![0, 1]);
    }

    #[test]
    fn envelopes_overlapping_without_rect_overlap_stay_apart() {
        // Two-line hit whose envelope covers the second hit, but no rect does.
        let hits = vec![
            hit(0, 0, &[(100.0, 700.0, 100.0, 12.0), (0.0, 686.0, 40.0, 12.0)]),
            hit(0, 1, &[(50.0, 686.0, 40.0, 12.0)]),
        ];

        assert_eq!(deduplicate(&hits, 0.0).len(), 2);
    }

    #[test]
    fn identical_hits_collapse_to_one_rect() {
        let hits = vec![
            hit(0, 0, &[(0.0, 0.0, 10.0, 10.0)]),
            hit(0, 0, &[(0.0, 0.0, 10.0, 10.0)]),
        ];

        let regions = deduplicate(&hits, 0.0);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].rects.len(), 1);
        assert_eq!(regions[0].quote_indices, vec![0]);
    }
}
