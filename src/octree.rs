//! The frontier index: a fixed-depth octree over RGB space answering
//! "which open position's candidate color is closest to this one?".
//!
//! Every node on a color's root-to-leaf path carries that color's
//! frontier entry, grouped per grid position into buckets, so a single
//! scan of any node covers its whole subtree. Nodes live in an arena and
//! point at each other by index, which keeps the parent back-links needed
//! by the climbing search free of ownership cycles.

use anyhow::{bail, Context, Result};
use fnv::FnvHashMap;

use crate::bounds::ColorBounds;
use crate::points::{ColorPoint, FrontierPoint, SpacePoint};
use crate::pool::Pool;

/// Tree depth; leaves sit on sub-cubes of side 256 >> MAX_DEPTH.
const MAX_DEPTH: u8 = 4;

/// Nodes holding at most this many positions are scanned linearly
/// instead of descending further.
const SCAN_THRESHOLD: usize = 64;

const ROOT: usize = 0;

type NodeId = usize;

/// All frontier entries one node holds for one grid position. Entries
/// share the position, not the color; the position collects one entry per
/// written neighbor until it is chosen itself.
struct Bucket {
    space: SpacePoint,
    colors: Vec<ColorPoint>,
}

struct Node {
    depth: u8,
    /// Packed 3-bits-per-level path from the root, for diagnostics.
    coord: u32,
    parent: Option<NodeId>,
    children: [Option<NodeId>; 8],
    bounds: ColorBounds,
    /// Half the sub-cube side: 128 >> depth.
    radius: i32,
    buckets: Vec<Bucket>,
    by_space: FnvHashMap<u32, usize>,
}

impl Node {
    fn new(parent: Option<NodeId>, depth: u8, coord: u32, bounds: ColorBounds) -> Node {
        Node {
            depth,
            coord,
            parent,
            children: [None; 8],
            bounds,
            radius: 128 >> depth,
            buckets: Vec::new(),
            by_space: FnvHashMap::default(),
        }
    }
}

/// The 3-bit child address of a color at a depth: the bit of each channel
/// that splits the depth's sub-cube, packed as red, green, blue.
#[inline]
fn octant_addr(depth: u8, color: ColorPoint) -> usize {
    let mask = 128u8 >> depth;
    let over = 7 - depth;

    let r = (color.r & mask) >> over;
    let g = (color.g & mask) >> over;
    let b = (color.b & mask) >> over;

    usize::from(r << 2 | g << 1 | b)
}

#[inline]
fn search_radius(dist_sq: i32) -> i32 {
    f64::from(dist_sq).sqrt().floor() as i32
}

/// Mutable state threaded through the out-of-subcube completion.
struct Search {
    source: ColorPoint,
    candidate: FrontierPoint,
    best_dist_sq: i32,
    bounds: ColorBounds,
}

pub struct Octree {
    nodes: Vec<Node>,
    bucket_pool: Pool<Vec<ColorPoint>>,
}

impl Default for Octree {
    fn default() -> Octree {
        Octree::new()
    }
}

impl Octree {
    pub fn new() -> Octree {
        Octree {
            nodes: vec![Node::new(None, 0, 0, ColorBounds::full())],
            bucket_pool: Pool::new(),
        }
    }

    /// Open positions currently tracked, i.e. distinct grid positions
    /// with at least one candidate color.
    pub fn open_positions(&self) -> usize {
        self.nodes[ROOT].buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes[ROOT].buckets.is_empty()
    }

    pub fn has_position(&self, hash: u32) -> bool {
        self.nodes[ROOT].by_space.contains_key(&hash)
    }

    /// Inserts a frontier point at every node along its color's path.
    pub fn add(&mut self, point: FrontierPoint) {
        let mut id = ROOT;
        loop {
            self.insert_local(id, point);
            if self.nodes[id].depth == MAX_DEPTH {
                break;
            }
            id = self.get_or_create_child(id, point.color);
        }
    }

    fn insert_local(&mut self, id: NodeId, point: FrontierPoint) {
        if let Some(&idx) = self.nodes[id].by_space.get(&point.space.hash) {
            self.nodes[id].buckets[idx].colors.push(point.color);
            return;
        }

        let mut colors = self.bucket_pool.acquire();
        colors.push(point.color);
        let node = &mut self.nodes[id];
        node.by_space.insert(point.space.hash, node.buckets.len());
        node.buckets.push(Bucket { space: point.space, colors });
    }

    fn get_or_create_child(&mut self, id: NodeId, color: ColorPoint) -> NodeId {
        let addr = octant_addr(self.nodes[id].depth, color);
        if let Some(child) = self.nodes[id].children[addr] {
            return child;
        }

        let (depth, coord, radius, bounds) = {
            let node = &self.nodes[id];
            (node.depth, node.coord, node.radius, node.bounds)
        };
        let child = Node::new(
            Some(id),
            depth + 1,
            coord | (addr as u32) << (18 - 3 * u32::from(depth)),
            bounds.octant(addr, radius),
        );

        let child_id = self.nodes.len();
        self.nodes.push(child);
        self.nodes[id].children[addr] = Some(child_id);
        child_id
    }

    /// Removes every candidate the index holds for the point's position.
    /// The position must be present.
    pub fn remove(&mut self, point: &FrontierPoint) -> Result<()> {
        self.remove_at(ROOT, point)
    }

    fn remove_at(&mut self, id: NodeId, point: &FrontierPoint) -> Result<()> {
        let hash = point.space.hash;
        let node = &self.nodes[id];
        let (depth, coord) = (node.depth, node.coord);

        let Some(&idx) = node.by_space.get(&hash) else {
            bail!("removed missing position {hash} at node {coord}@{depth}");
        };
        if node.buckets.is_empty() {
            bail!("removed position {hash} from empty node {coord}@{depth}");
        }

        // A position may have arrived several times with colors that route
        // to different children; tell each affected child exactly once.
        if depth < MAX_DEPTH {
            let mut seen = 0u8;
            for &color in &node.buckets[idx].colors {
                seen |= 1 << octant_addr(depth, color);
            }
            for addr in 0..8usize {
                if seen & (1 << addr) == 0 {
                    continue;
                }
                let child = self.nodes[id].children[addr]
                    .with_context(|| format!("position {hash} routed to missing child {addr} of {coord}@{depth}"))?;
                self.remove_at(child, point)?;
            }
        }

        let node = &mut self.nodes[id];
        let last = node.buckets.len() - 1;
        if idx != last {
            node.buckets.swap(idx, last);
            let moved = node.buckets[idx].space.hash;
            node.by_space.insert(moved, idx);
        }

        let Some(bucket) = node.buckets.pop() else {
            bail!("removed position {hash} from empty node {coord}@{depth}");
        };
        if bucket.colors.is_empty() {
            bail!("empty bucket for position {hash} at node {coord}@{depth}");
        }
        node.by_space.remove(&hash);
        self.bucket_pool.release(bucket.colors);

        Ok(())
    }

    /// Returns a frontier point whose candidate color minimizes the
    /// squared distance to `color` over the whole index.
    pub fn find_nearest(&self, color: ColorPoint) -> Result<FrontierPoint> {
        if self.is_empty() {
            bail!("nearest lookup on an empty index");
        }

        // Follow the color down while the node is still crowded and the
        // routed child has anything to offer.
        let mut id = ROOT;
        loop {
            let node = &self.nodes[id];
            if node.buckets.len() <= SCAN_THRESHOLD {
                break;
            }
            let Some(child) = node.children[octant_addr(node.depth, color)] else {
                break;
            };
            if self.nodes[child].buckets.is_empty() {
                break;
            }
            id = child;
        }

        let node = &self.nodes[id];
        let candidate = self
            .nearest_in_node(id, color)
            .with_context(|| format!("nearest scan on empty node {}@{}", node.coord, node.depth))?;
        let dist_sq = color.distance_to(candidate.color);

        // The best match so far bounds the search to a ball around the
        // query. If that ball is not wholly inside this sub-cube a sibling
        // may still hold something closer, so climb and re-descend.
        let bounds = ColorBounds::around(color, search_radius(dist_sq));
        if node.depth > 0 && !node.bounds.contains(&bounds) {
            let mut search = Search { source: color, candidate, best_dist_sq: dist_sq, bounds };
            let parent = node.parent.context("node above the root must have a parent")?;
            self.nn_search_up(parent, &mut search, id)?;
            return Ok(search.candidate);
        }

        Ok(candidate)
    }

    /// Best entry across every bucket of one node, scanning all candidate
    /// colors. First find wins ties.
    fn nearest_in_node(&self, id: NodeId, color: ColorPoint) -> Option<FrontierPoint> {
        let mut best: Option<(i32, FrontierPoint)> = None;

        for bucket in &self.nodes[id].buckets {
            for &candidate in &bucket.colors {
                let dist_sq = color.distance_to(candidate);
                if best.map_or(true, |(b, _)| dist_sq < b) {
                    best = Some((dist_sq, FrontierPoint { space: bucket.space, color: candidate }));
                }
            }
        }

        best.map(|(_, point)| point)
    }

    fn nn_search_down(&self, id: NodeId, search: &mut Search) {
        let node = &self.nodes[id];
        if !node.bounds.intersects(&search.bounds) {
            return;
        }
        if node.buckets.is_empty() {
            return;
        }

        if node.buckets.len() <= SCAN_THRESHOLD || node.depth == MAX_DEPTH {
            let Some(ours) = self.nearest_in_node(id, search.source) else {
                return;
            };
            let dist_sq = search.source.distance_to(ours.color);
            if dist_sq < search.best_dist_sq {
                search.candidate = ours;
                search.best_dist_sq = dist_sq;
                search.bounds.set_around(search.source, search_radius(dist_sq));
            }
        } else {
            for addr in 0..8usize {
                if let Some(child) = self.nodes[id].children[addr] {
                    self.nn_search_down(child, search);
                }
            }
        }
    }

    fn nn_search_up(&self, id: NodeId, search: &mut Search, from: NodeId) -> Result<()> {
        let node = &self.nodes[id];
        if !search.bounds.intersects(&node.bounds) {
            bail!(
                "climbed into node {}@{} outside the search bounds",
                node.coord,
                node.depth
            );
        }

        for addr in 0..8usize {
            match self.nodes[id].children[addr] {
                Some(child) if child != from => self.nn_search_down(child, search),
                _ => {}
            }
        }

        // Keep climbing until the search ball fits inside this sub-cube.
        let node = &self.nodes[id];
        if node.depth > 0 && !node.bounds.contains(&search.bounds) {
            let parent = node.parent.context("node above the root must have a parent")?;
            self.nn_search_up(parent, search, id)?;
        }

        Ok(())
    }
}
