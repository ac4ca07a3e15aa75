//! Parallel quadtree builder.
//!
//! One tree is built per timestep; building it is also the collision pass.
//! Segments that cannot be confined to a single child quadrant stay in the
//! node's own overflow bucket and are cross-checked against every bucket
//! formed below them, so no pair can hide behind a partition boundary.

mod report;

pub use report::{CollisionReport, IntersectionEvent};

use crate::{Intersector, Rect, Segment, Vec2};
use rayon::prelude::*;
use std::collections::TryReserveError;
use thiserror::Error;

pub const BUCKET_THRESHOLD: usize = 50;
pub const MAX_DEPTH: u32 = 75;
pub const NUM_CHILDREN: usize = 4;

/// Construction-time tuning knobs. A node splits only when its incoming
/// bucket strictly exceeds `bucket_threshold` and `max_depth` has not been
/// reached yet.
#[derive(Debug, Clone, Copy)]
pub struct TreeConfig {
    pub bucket_threshold: usize,
    pub max_depth: u32,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            bucket_threshold: BUCKET_THRESHOLD,
            max_depth: MAX_DEPTH,
        }
    }
}

/// Failure while building a subtree. Everything allocated for the subtree is
/// released before this propagates; the report must be considered incomplete.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("could not grow a segment bucket: {0}")]
    Alloc(#[from] TryReserveError),
}

type Children<'a> = Option<Box<[Node<'a>; NUM_CHILDREN]>>;

#[derive(Debug)]
pub struct Node<'a> {
    rect: Rect,
    depth: u32,
    children: Children<'a>,
    // overflow bucket for internal nodes, the whole population for leaves
    bucket: Vec<&'a Segment>,
}

impl<'a> Node<'a> {
    pub fn rect(&self) -> &Rect {
        &self.rect
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn bucket(&self) -> &[&'a Segment] {
        &self.bucket
    }

    pub fn children(&self) -> Option<&[Node<'a>; NUM_CHILDREN]> {
        self.children.as_deref()
    }

    /// Number of segments reachable from this subtree.
    pub fn len(&self) -> usize {
        let mut n = self.bucket.len();
        if let Some(children) = &self.children {
            for child in children.iter() {
                n += child.len();
            }
        }
        n
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn dump(&self) {
        tracing::debug!(
            depth = self.depth,
            tl = ?(self.rect.tl.x, self.rect.tl.y),
            br = ?(self.rect.br.x, self.rect.br.y),
            bucket = self.bucket.len(),
            "node"
        );
        if let Some(children) = &self.children {
            for child in children.iter() {
                child.dump();
            }
        }
    }
}

impl Drop for Node<'_> {
    fn drop(&mut self) {
        // Tear the subtree down with the same fan-out the build used.
        if let Some(children) = self.children.take() {
            let [a, b, c, d] = *children;
            rayon::join(|| drop([a, b]), || drop([c, d]));
        }
    }
}

/// One timestep's spatial partition. Dropping it releases every node; the
/// segments themselves stay with the world.
#[derive(Debug)]
pub struct QuadTree<'a> {
    root: Node<'a>,
}

impl<'a> QuadTree<'a> {
    /// Build the tree over `segments` and, as a side effect, record every
    /// intersecting pair into `report` exactly once.
    ///
    /// `bounds` must contain all segments. On error the caller gets no tree
    /// and must treat `report` as incomplete.
    pub fn build<I: Intersector>(
        segments: &'a [Segment],
        bounds: Rect,
        time_step: f64,
        intersector: &I,
        config: TreeConfig,
        report: &CollisionReport<'a>,
    ) -> Result<Self, BuildError> {
        let ctx = BuildCtx {
            intersector,
            time_step,
            config,
            report,
        };
        let mut refs: Vec<&'a Segment> = Vec::new();
        refs.try_reserve(segments.len())?;
        refs.extend(segments.iter());
        let root = build_node(&ctx, refs, bounds, None, 0)?;
        tracing::debug!(
            segments = segments.len(),
            collisions = report.count(),
            "collision pass complete"
        );
        Ok(Self { root })
    }

    pub fn root(&self) -> &Node<'a> {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.root.len()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Log every node's rectangle and bucket size at debug level.
    /// Diagnostic aid only.
    pub fn dump(&self) {
        self.root.dump();
    }
}

struct BuildCtx<'e, 'a, I> {
    intersector: &'e I,
    time_step: f64,
    config: TreeConfig,
    report: &'e CollisionReport<'a>,
}

/// Whether the segment's bounding box, both now and after advancing by half
/// the velocity, lies inside the half-open rectangle on both axes. The
/// margin keeps a segment that is about to cross a partition boundary out of
/// either adjacent quadrant, so the boundary collision stays visible to the
/// cross-level check. The margin is applied to the near and far bound alike,
/// matching the motion model of the surrounding simulation.
pub fn fits(segment: &Segment, rect: &Rect) -> bool {
    let (min, max) = segment.aabb();
    let shift = segment.velocity * 0.5;
    min.x >= rect.tl.x
        && max.x < rect.br.x
        && min.y >= rect.br.y
        && max.y < rect.tl.y
        && min.x + shift.x >= rect.tl.x
        && max.x + shift.x < rect.br.x
        && min.y + shift.y >= rect.br.y
        && max.y + shift.y < rect.tl.y
}

/// Split a rectangle along its midlines. The 3x3 corner grid yields four
/// quadrants in the fixed order top-left, top-right, bottom-left,
/// bottom-right; classification and recursion both rely on that order. As
/// half-open regions the quadrants tile the parent exactly.
pub fn quadrants(rect: &Rect) -> [Rect; NUM_CHILDREN] {
    let xs = [rect.tl.x, (rect.tl.x + rect.br.x) * 0.5, rect.br.x];
    let ys = [rect.tl.y, (rect.tl.y + rect.br.y) * 0.5, rect.br.y];
    let corner = |col: usize, row: usize| Vec2::new(xs[col], ys[row]);
    [
        Rect::new(corner(0, 0), corner(1, 1)),
        Rect::new(corner(1, 0), corner(2, 1)),
        Rect::new(corner(0, 1), corner(1, 2)),
        Rect::new(corner(1, 1), corner(2, 2)),
    ]
}

/// Push with explicit growth so a failed reallocation surfaces as an error
/// instead of a truncated bucket. Doubles from the bucket threshold up.
fn push_checked<'a>(
    bucket: &mut Vec<&'a Segment>,
    segment: &'a Segment,
) -> Result<(), BuildError> {
    if bucket.len() == bucket.capacity() {
        bucket.try_reserve(bucket.capacity().max(BUCKET_THRESHOLD))?;
    }
    bucket.push(segment);
    Ok(())
}

/// Canonicalize the pair, consult the intersection primitive, and record a
/// hit into the shared report. Sole point of contact with shared state.
fn register<'a, I: Intersector>(a: &'a Segment, b: &'a Segment, ctx: &BuildCtx<'_, 'a, I>) {
    // The primitive expects the lower id first.
    let (first, second) = if a.id < b.id { (a, b) } else { (b, a) };
    if let Some(kind) = ctx.intersector.intersect(first, second, ctx.time_step) {
        ctx.report.record(IntersectionEvent {
            first,
            second,
            kind,
        });
    }
}

/// Test every i < j pair within one bucket, the outer index data-parallel.
fn pairwise<'a, I: Intersector>(bucket: &[&'a Segment], ctx: &BuildCtx<'_, 'a, I>) {
    bucket.par_iter().enumerate().for_each(|(i, &first)| {
        for &second in &bucket[i + 1..] {
            register(first, second, ctx);
        }
    });
}

/// Pair a freshly formed bucket against the segments the immediate parent
/// retained. A segment that fit no quadrant at the parent level was never
/// placed next to the segments that did, so this is the only scan that can
/// see those pairs.
fn cross_check<'a, I: Intersector>(
    bucket: &[&'a Segment],
    retained: &[&'a Segment],
    ctx: &BuildCtx<'_, 'a, I>,
) {
    bucket.par_iter().for_each(|&first| {
        for &second in retained {
            register(first, second, ctx);
        }
    });
}

fn build_node<'a, I: Intersector>(
    ctx: &BuildCtx<'_, 'a, I>,
    segments: Vec<&'a Segment>,
    rect: Rect,
    parent_overflow: Option<&[&'a Segment]>,
    depth: u32,
) -> Result<Node<'a>, BuildError> {
    // The parent's overflow bucket is final by the time it recurses, so this
    // runs exactly once per segment-ancestor pair.
    if let Some(retained) = parent_overflow {
        cross_check(&segments, retained, ctx);
    }

    if segments.len() <= ctx.config.bucket_threshold || depth >= ctx.config.max_depth {
        pairwise(&segments, ctx);
        return Ok(Node {
            rect,
            depth,
            children: None,
            bucket: segments,
        });
    }

    let rects = quadrants(&rect);
    let mut candidates: [Vec<&'a Segment>; NUM_CHILDREN] = Default::default();
    let mut overflow: Vec<&'a Segment> = Vec::new();
    for &segment in &segments {
        // First fit is authoritative; the half-open tiling means at most one
        // quadrant can match anyway.
        match rects.iter().position(|r| fits(segment, r)) {
            Some(i) => push_checked(&mut candidates[i], segment)?,
            None => push_checked(&mut overflow, segment)?,
        }
    }
    debug_assert_eq!(
        candidates.iter().map(Vec::len).sum::<usize>() + overflow.len(),
        segments.len(),
        "classification must conserve the incoming bucket"
    );

    pairwise(&overflow, ctx);

    let child = |bucket: Vec<&'a Segment>, rect: Rect| {
        if bucket.is_empty() {
            // An empty quadrant needs no task, no cross-check and no scan.
            return Ok(Node {
                rect,
                depth: depth + 1,
                children: None,
                bucket,
            });
        }
        build_node(ctx, bucket, rect, Some(&overflow), depth + 1)
    };
    let [c0, c1, c2, c3] = candidates;
    let [r0, r1, r2, r3] = rects;
    let ((n0, n1), (n2, n3)) = rayon::join(
        || rayon::join(|| child(c0, r0), || child(c1, r1)),
        || rayon::join(|| child(c2, r2), || child(c3, r3)),
    );

    Ok(Node {
        rect,
        depth,
        children: Some(Box::new([n0?, n1?, n2?, n3?])),
        bucket: overflow,
    })
}
