//! Mid-phase collision detection with a chunk-of-chunks k-DOP tree.
//!
//! The tree sits between the broad phase (which pairs up bodies) and the
//! tetrahedron tests (which produce contacts). It is built once per mesh
//! and refit every step from the mesh's world-space vertices.
//!
//! # Layout
//!
//! Nodes live in small flat arrays, [`SubTree`]s, each a perfect binary tree
//! in pre-order: an internal node at index `i` of a subtree of height `h`
//! has its left child at `i + 1` and its right child right after the left
//! child's `2^h - 1` nodes. Missing leaves are padded with
//! [`NodeKind::Empty`].
//!
//! The tree is a list of *levels*, coarsest first. Leaves of the last level
//! (the *branches*) reference mesh elements; leaves of every other level
//! (the *super-chunks*) reference a subtree of the next level.
//!
//! # Algorithm
//!
//! Build:
//! 1. Order elements by recursive median split along the longest centroid axis
//! 2. Cut the ordering into branches of at most `2^chunk_height` elements
//! 3. Group subtrees into super-chunks of at most `2^chunk_height`, until one remains
//!
//! Refit walks levels finest first. Inside a subtree, nodes are visited in
//! reverse so children are done before their parent; a super-chunk leaf
//! copies the root volume of the subtree it references. Work per level is
//! proportional to the number of chunks at that level.
//!
//! # Example
//!
//! ```
//! use prox_core::{KdopTree, TetMesh};
//! use prox_core::kdop::Kdop18;
//! use nalgebra::Vector3;
//!
//! let mesh = TetMesh::cuboid(Vector3::repeat(1.0)).unwrap();
//! let tree = KdopTree::<9>::build(&mesh, 2);
//!
//! let mut hits = Vec::new();
//! tree.query(&Kdop18::from_points(&[nalgebra::Point3::new(0.9, 0.9, 0.9)]), |element, _| {
//!     hits.push(element);
//! });
//! assert!(!hits.is_empty());
//! ```

use nalgebra::Point3;

use crate::geometry::Ray;
use crate::kdop::KDop;
use crate::mesh::TetMesh;

/// Default height of a subtree; each chunk holds up to 16 leaves.
pub const DEFAULT_CHUNK_HEIGHT: usize = 4;

/// Slab widening used by ray pruning.
const RAY_THRESHOLD: f64 = 1e-9;

/// What a node is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// References a mesh element (branches) or a subtree of the next level (super-chunks).
    Leaf {
        /// Element or subtree index.
        index: usize,
    },
    /// Has two children inside the same subtree.
    Internal {
        /// Index of the left child.
        left: usize,
        /// Index of the right child.
        right: usize,
    },
    /// Padding; bounds nothing.
    Empty,
}

/// A node of a [`SubTree`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeNode<const N: usize> {
    volume: KDop<N>,
    parent: Option<usize>,
    kind: NodeKind,
}

impl<const N: usize> TreeNode<N> {
    /// Bounding volume.
    #[must_use]
    pub fn volume(&self) -> &KDop<N> {
        &self.volume
    }

    /// Parent index inside the subtree; `None` for the subtree root.
    #[must_use]
    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    /// Node kind.
    #[must_use]
    pub fn kind(&self) -> NodeKind {
        self.kind
    }
}

/// A flat, self-contained branch of the tree.
#[derive(Debug, Clone, PartialEq)]
pub struct SubTree<const N: usize> {
    nodes: Vec<TreeNode<N>>,
    height: usize,
}

impl<const N: usize> SubTree<N> {
    /// Perfect tree of the smallest height holding `items`, padded with empty nodes.
    fn new(items: &[usize]) -> Self {
        let height = items.len().max(1).next_power_of_two().trailing_zeros() as usize;
        let mut nodes = Vec::with_capacity((1 << (height + 1)) - 1);
        Self::layout(&mut nodes, None, height, items);
        Self { nodes, height }
    }

    fn layout(nodes: &mut Vec<TreeNode<N>>, parent: Option<usize>, height: usize, items: &[usize]) {
        let here = nodes.len();
        let kind = match (height, items) {
            (_, []) => NodeKind::Empty,
            (0, [index]) => NodeKind::Leaf { index: *index },
            _ => NodeKind::Internal {
                left: here + 1,
                right: here + (1 << height),
            },
        };
        nodes.push(TreeNode {
            volume: KDop::empty(),
            parent,
            kind,
        });
        if height == 0 {
            return;
        }
        let half = 1 << (height - 1);
        let (left, right) = items.split_at(items.len().min(half));
        if items.is_empty() {
            // Keep the perfect shape so child offsets stay valid.
            Self::layout(nodes, Some(here), height - 1, &[]);
            Self::layout(nodes, Some(here), height - 1, &[]);
        } else {
            Self::layout(nodes, Some(here), height - 1, left);
            Self::layout(nodes, Some(here), height - 1, right);
        }
    }

    /// Nodes in pre-order.
    #[must_use]
    pub fn nodes(&self) -> &[TreeNode<N>] {
        &self.nodes
    }

    /// Height of the subtree (0 for a single leaf).
    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Volume of the subtree root.
    #[must_use]
    pub fn root_volume(&self) -> KDop<N> {
        self.nodes.first().map_or_else(KDop::empty, |n| n.volume)
    }

    /// Recompute every volume bottom-up; `leaf` gives the volume of a leaf index.
    fn refit(&mut self, leaf: impl Fn(usize) -> KDop<N>) {
        for i in (0..self.nodes.len()).rev() {
            let volume = match self.nodes[i].kind {
                NodeKind::Leaf { index } => leaf(index),
                NodeKind::Internal { left, right } => {
                    self.nodes[left].volume.union(&self.nodes[right].volume)
                }
                NodeKind::Empty => KDop::empty(),
            };
            self.nodes[i].volume = volume;
        }
    }
}

/// A k-DOP tree over the elements of one tetrahedral mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct KdopTree<const N: usize> {
    root: KDop<N>,
    levels: Vec<Vec<SubTree<N>>>,
    chunk_height: usize,
    element_count: usize,
}

impl<const N: usize> KdopTree<N> {
    /// Build the tree over `mesh` and refit it to the mesh's world vertices.
    ///
    /// `chunk_height` bounds every subtree to `2^chunk_height` leaves; it is
    /// clamped to at least 1.
    #[must_use]
    pub fn build(mesh: &TetMesh, chunk_height: usize) -> Self {
        let chunk_height = chunk_height.max(1);
        let capacity = 1 << chunk_height;

        let centroids: Vec<Point3<f64>> = (0..mesh.len())
            .map(|t| mesh.local_tetrahedron(t).centroid())
            .collect();
        let mut order: Vec<usize> = (0..mesh.len()).collect();
        median_split(&mut order, &centroids);

        let mut levels = Vec::new();
        if !order.is_empty() {
            let mut current: Vec<SubTree<N>> = order.chunks(capacity).map(SubTree::new).collect();
            loop {
                let count = current.len();
                levels.push(current);
                if count == 1 {
                    break;
                }
                let children: Vec<usize> = (0..count).collect();
                current = children.chunks(capacity).map(SubTree::new).collect();
            }
            levels.reverse();
        }

        let mut tree = Self {
            root: KDop::empty(),
            levels,
            chunk_height,
            element_count: mesh.len(),
        };
        tree.refit(mesh);
        tree
    }

    /// Recompute every volume from the mesh's current world vertices.
    pub fn refit(&mut self, mesh: &TetMesh) {
        let world = mesh.world_vertices();
        let tetrahedra = mesh.tetrahedra();
        for level in (0..self.levels.len()).rev() {
            let (coarse, fine) = self.levels.split_at_mut(level + 1);
            let current = &mut coarse[level];
            match fine.first() {
                None => {
                    for subtree in current.iter_mut() {
                        subtree.refit(|element| {
                            KDop::from_points(tetrahedra[element].iter().map(|&v| &world[v]))
                        });
                    }
                }
                Some(children) => {
                    for subtree in current.iter_mut() {
                        subtree.refit(|child| children[child].root_volume());
                    }
                }
            }
        }
        self.root = self
            .levels
            .first()
            .map_or_else(KDop::empty, |top| {
                top.iter()
                    .fold(KDop::empty(), |acc, s| acc.union(&s.root_volume()))
            });
    }

    /// Volume bounding the whole mesh.
    #[must_use]
    pub fn root(&self) -> &KDop<N> {
        &self.root
    }

    /// Levels, coarsest first.
    #[must_use]
    pub fn levels(&self) -> &[Vec<SubTree<N>>] {
        &self.levels
    }

    /// Maximum subtree height.
    #[must_use]
    pub fn chunk_height(&self) -> usize {
        self.chunk_height
    }

    /// Number of mesh elements.
    #[must_use]
    pub fn element_count(&self) -> usize {
        self.element_count
    }

    /// Total number of nodes, padding included.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.levels.iter().flatten().map(|s| s.nodes.len()).sum()
    }

    /// Visit every element whose leaf volume overlaps `volume`.
    ///
    /// Elements are visited in tree order, with their leaf volume.
    pub fn query<F>(&self, volume: &KDop<N>, mut visit: F)
    where
        F: FnMut(usize, &KDop<N>),
    {
        if self.root.overlaps(volume) {
            self.query_subtree(0, 0, 0, volume, &mut visit);
        }
    }

    fn query_subtree<F>(&self, level: usize, subtree: usize, node: usize, volume: &KDop<N>, visit: &mut F)
    where
        F: FnMut(usize, &KDop<N>),
    {
        let current = &self.levels[level][subtree].nodes[node];
        if !current.volume.overlaps(volume) {
            return;
        }
        match current.kind {
            NodeKind::Empty => {}
            NodeKind::Internal { left, right } => {
                self.query_subtree(level, subtree, left, volume, visit);
                self.query_subtree(level, subtree, right, volume, visit);
            }
            NodeKind::Leaf { index } if level + 1 == self.levels.len() => {
                visit(index, &current.volume);
            }
            NodeKind::Leaf { index } => {
                self.query_subtree(level + 1, index, 0, volume, visit);
            }
        }
    }

    /// Every pair of elements `(mine, theirs)` whose leaf volumes overlap.
    #[must_use]
    pub fn overlapping_pairs(&self, other: &Self) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        self.query(&other.root, |mine, leaf| {
            other.query(leaf, |theirs, _| pairs.push((mine, theirs)));
        });
        pairs
    }

    /// Nearest element hit by `ray`.
    ///
    /// `hit` is the exact leaf test and returns the distance along the ray.
    /// Subtrees that cannot beat the best distance so far are pruned.
    pub fn raycast<F>(&self, ray: &Ray, mut hit: F) -> Option<(usize, f64)>
    where
        F: FnMut(usize) -> Option<f64>,
    {
        let mut best = None;
        let mut best_length = f64::INFINITY;
        if !self.levels.is_empty() {
            self.raycast_subtree(0, 0, 0, ray, &mut hit, &mut best, &mut best_length);
        }
        best
    }

    #[allow(clippy::too_many_arguments)]
    fn raycast_subtree<F>(
        &self,
        level: usize,
        subtree: usize,
        node: usize,
        ray: &Ray,
        hit: &mut F,
        best: &mut Option<(usize, f64)>,
        best_length: &mut f64,
    ) where
        F: FnMut(usize) -> Option<f64>,
    {
        let current = &self.levels[level][subtree].nodes[node];
        if !current
            .volume
            .intersects_ray(ray, *best_length, RAY_THRESHOLD)
        {
            return;
        }
        match current.kind {
            NodeKind::Empty => {}
            NodeKind::Internal { left, right } => {
                self.raycast_subtree(level, subtree, left, ray, hit, best, best_length);
                self.raycast_subtree(level, subtree, right, ray, hit, best, best_length);
            }
            NodeKind::Leaf { index } if level + 1 == self.levels.len() => {
                if let Some(t) = hit(index) {
                    if t < *best_length {
                        *best_length = t;
                        *best = Some((index, t));
                    }
                }
            }
            NodeKind::Leaf { index } => {
                self.raycast_subtree(level + 1, index, 0, ray, hit, best, best_length);
            }
        }
    }
}

/// Reorder `items` by recursive median split on the longest centroid axis.
fn median_split(items: &mut [usize], centroids: &[Point3<f64>]) {
    if items.len() <= 2 {
        return;
    }
    let (lo, hi) = items.iter().fold(
        (centroids[items[0]], centroids[items[0]]),
        |(lo, hi), &i| (lo.inf(&centroids[i]), hi.sup(&centroids[i])),
    );
    let extent = hi - lo;
    let axis = extent.imax();
    items.sort_by(|&a, &b| centroids[a][axis].total_cmp(&centroids[b][axis]));
    let mid = items.len() / 2;
    let (left, right) = items.split_at_mut(mid);
    median_split(left, centroids);
    median_split(right, centroids);
}
