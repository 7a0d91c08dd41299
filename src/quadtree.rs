use ultraviolet::DVec2;

use crate::body::BodyStore;
use crate::config::MIN_QUAD_SIZE;

/// Axis-aligned rectangle in world units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub origin: DVec2,
    pub size: DVec2,
}

impl Rect {
    pub fn center(&self) -> DVec2 {
        self.origin + self.size * 0.5
    }

    fn child_rect(&self, quadrant: Quadrant) -> Rect {
        let half = self.size * 0.5;
        let origin = match quadrant {
            Quadrant::Nw => self.origin,
            Quadrant::Ne => DVec2::new(self.origin.x + half.x, self.origin.y),
            Quadrant::Sw => DVec2::new(self.origin.x, self.origin.y + half.y),
            Quadrant::Se => self.origin + half,
        };
        Rect { origin, size: half }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quadrant {
    Nw,
    Ne,
    Sw,
    Se,
}

/// One node of the flat quadtree. `children_base == 0` marks a leaf
/// (the root can never be its own child, so 0 is an unambiguous
/// sentinel). Non-leaf children occupy the four contiguous slots
/// `[children_base, children_base + 4)` in NW, NE, SW, SE order.
#[derive(Debug, Clone)]
pub struct Quad {
    pub rect: Rect,
    pub children_base: usize,
    pub body_count: usize,
    body_idxs: Vec<usize>,
    pub total_mass: f64,
    pub center_of_mass: DVec2,
    pub momentum: DVec2,
}

impl Quad {
    fn new(rect: Rect) -> Self {
        Self {
            rect,
            children_base: 0,
            body_count: 0,
            body_idxs: Vec::new(),
            total_mass: 0.0,
            center_of_mass: DVec2::zero(),
            momentum: DVec2::zero(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children_base == 0
    }
}

/// Flat, reusable Barnes-Hut quadtree. Rebuilt every iteration over
/// the current body positions; the backing `Vec` is cleared and
/// reserved rather than dropped so repeated builds reuse allocation.
#[derive(Debug, Default, Clone)]
pub struct Quadtree {
    quads: Vec<Quad>,
}

impl Quadtree {
    pub const ROOT: usize = 0;

    pub fn new() -> Self {
        Self { quads: Vec::new() }
    }

    pub fn quads(&self) -> &[Quad] {
        &self.quads
    }

    pub fn root(&self) -> &Quad {
        &self.quads[Self::ROOT]
    }

    pub fn is_empty(&self) -> bool {
        self.quads.is_empty()
    }

    /// Rebuilds the tree from scratch over `bodies`. Clears the
    /// previous tree, reserves headroom at 1.1x the previous node
    /// count, then recursively partitions.
    pub fn build(&mut self, bodies: &BodyStore) {
        let reserve = ((self.quads.len() as f64) * 1.1) as usize;
        self.quads.clear();
        self.quads.reserve(reserve);

        if bodies.is_empty() {
            return;
        }

        let rect = bounding_rect(bodies);
        let mut root = Quad::new(rect);
        root.body_idxs = (0..bodies.len()).collect();
        root.total_mass = bodies.masses().iter().sum();
        self.quads.push(root);

        self.refine(Self::ROOT, bodies);
    }

    fn refine(&mut self, idx: usize, bodies: &BodyStore) {
        let body_idxs = std::mem::take(&mut self.quads[idx].body_idxs);
        self.quads[idx].body_count = body_idxs.len();

        match body_idxs.len() {
            0 => {}
            1 => {
                let i = body_idxs[0];
                let quad = &mut self.quads[idx];
                quad.total_mass = bodies.mass(i);
                quad.center_of_mass = bodies.pos(i);
                quad.momentum = bodies.vel(i) * bodies.mass(i);
            }
            _ => {
                let rect = self.quads[idx].rect;
                if rect.size.x.min(rect.size.y) < MIN_QUAD_SIZE {
                    // Degenerate input: coincident (or near-coincident)
                    // bodies that subdivision cannot separate.
                    // Coalesce into a single settled leaf.
                    let mut total_mass = 0.0;
                    let mut weighted = DVec2::zero();
                    let mut momentum = DVec2::zero();
                    for &i in &body_idxs {
                        let m = bodies.mass(i);
                        total_mass += m;
                        weighted += bodies.pos(i) * m;
                        momentum += bodies.vel(i) * m;
                    }
                    let quad = &mut self.quads[idx];
                    quad.total_mass = total_mass;
                    quad.center_of_mass = if total_mass > 0.0 {
                        weighted / total_mass
                    } else {
                        rect.center()
                    };
                    quad.momentum = momentum;
                    return;
                }

                let center = rect.center();
                let mut buckets: [Vec<usize>; 4] = Default::default();
                for i in body_idxs {
                    let pos = bodies.pos(i);
                    let quadrant = if pos.x < center.x && pos.y < center.y {
                        0
                    } else if pos.x >= center.x && pos.y < center.y {
                        1
                    } else if pos.x < center.x && pos.y >= center.y {
                        2
                    } else {
                        3
                    };
                    buckets[quadrant].push(i);
                }

                let base = self.quads.len();
                self.quads[idx].children_base = base;
                let order = [Quadrant::Nw, Quadrant::Ne, Quadrant::Sw, Quadrant::Se];
                for q in order {
                    let mut child = Quad::new(rect.child_rect(q));
                    child.body_idxs = std::mem::take(&mut buckets[quadrant_index(q)]);
                    self.quads.push(child);
                }

                for child in base..base + 4 {
                    self.refine(child, bodies);
                }

                let mut total_mass = 0.0;
                let mut weighted = DVec2::zero();
                let mut momentum = DVec2::zero();
                for child in base..base + 4 {
                    total_mass += self.quads[child].total_mass;
                    weighted += self.quads[child].center_of_mass * self.quads[child].total_mass;
                    momentum += self.quads[child].momentum;
                }
                let quad = &mut self.quads[idx];
                quad.total_mass = total_mass;
                quad.center_of_mass = if total_mass > 0.0 {
                    weighted / total_mass
                } else {
                    rect.center()
                };
                quad.momentum = momentum;
            }
        }
    }
}

fn quadrant_index(q: Quadrant) -> usize {
    match q {
        Quadrant::Nw => 0,
        Quadrant::Ne => 1,
        Quadrant::Sw => 2,
        Quadrant::Se => 3,
    }
}

fn bounding_rect(bodies: &BodyStore) -> Rect {
    let mut min = bodies.pos(0);
    let mut max = bodies.pos(0);
    for pos in bodies.positions() {
        min.x = min.x.min(pos.x);
        min.y = min.y.min(pos.y);
        max.x = max.x.max(pos.x);
        max.y = max.y.max(pos.y);
    }
    let raw = max - min;
    let size = DVec2::new(raw.x.max(MIN_QUAD_SIZE), raw.y.max(MIN_QUAD_SIZE));
    Rect { origin: min, size }
}
