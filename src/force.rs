use ultraviolet::DVec2;

use crate::body::BodyStore;
use crate::config::{G, MAX_SOFTENING_SAMPLES};
use crate::quadtree::Quadtree;

/// Softening length squared, derived once from `softening_factor`
/// and reused for every force evaluation. Factor 0 means ε = 0.
pub fn softening_squared(factor: f64, bodies: &BodyStore) -> f64 {
    if factor <= 0.0 || bodies.len() < 2 {
        return 0.0;
    }
    let avg = average_pairwise_distance(bodies);
    (factor * avg).powi(2)
}

fn average_pairwise_distance(bodies: &BodyStore) -> f64 {
    let n = bodies.len() as u64;
    let pair_count = n * (n - 1) / 2;

    if pair_count <= MAX_SOFTENING_SAMPLES {
        let mut sum = 0.0;
        let mut count = 0u64;
        for i in 0..bodies.len() {
            for j in (i + 1)..bodies.len() {
                sum += (bodies.pos(j) - bodies.pos(i)).mag();
                count += 1;
            }
        }
        if count == 0 { 0.0 } else { sum / count as f64 }
    } else {
        let mut sum = 0.0;
        for _ in 0..MAX_SOFTENING_SAMPLES {
            let i = fastrand::usize(0..bodies.len());
            let mut j = fastrand::usize(0..bodies.len());
            while j == i {
                j = fastrand::usize(0..bodies.len());
            }
            sum += (bodies.pos(j) - bodies.pos(i)).mag();
        }
        sum / MAX_SOFTENING_SAMPLES as f64
    }
}

/// Net gravitational force on body `i`, computed by Barnes-Hut tree
/// traversal. `theta` is the (un-squared) opening-angle criterion.
pub fn force_on_body_bh(
    i: usize,
    bodies: &BodyStore,
    tree: &Quadtree,
    theta: f64,
    eps_sq: f64,
) -> DVec2 {
    if tree.is_empty() {
        return DVec2::zero();
    }

    let pos = bodies.pos(i);
    let mass = bodies.mass(i);
    let mut force = DVec2::zero();
    let mut stack = vec![Quadtree::ROOT];

    while let Some(idx) = stack.pop() {
        let quad = &tree.quads()[idx];
        if quad.total_mass <= 0.0 {
            continue;
        }

        if quad.is_leaf() {
            if quad.center_of_mass == pos {
                continue;
            }
            force += pairwise_force(mass, pos, quad.total_mass, quad.center_of_mass, eps_sq);
            continue;
        }

        let d = quad.center_of_mass - pos;
        let dist_sq = d.mag_sq();
        let size_len_sq = quad.rect.size.x * quad.rect.size.x + quad.rect.size.y * quad.rect.size.y;

        if size_len_sq / dist_sq < theta {
            force += pairwise_force(mass, pos, quad.total_mass, quad.center_of_mass, eps_sq);
        } else {
            let base = quad.children_base;
            // Push in reverse declaration order so NW pops first.
            stack.push(base + 3);
            stack.push(base + 2);
            stack.push(base + 1);
            stack.push(base);
        }
    }

    force
}

#[inline]
fn pairwise_force(mass_i: f64, pos_i: DVec2, mass_j: f64, pos_j: DVec2, eps_sq: f64) -> DVec2 {
    let d = pos_j - pos_i;
    let dist_sq = d.mag_sq();
    if dist_sq == 0.0 {
        return DVec2::zero();
    }
    let dist = dist_sq.sqrt();
    let amp = G * mass_i * mass_j / (dist_sq + eps_sq);
    d * (amp / dist)
}

/// All-pairs force accumulation. Symmetric: body `j`'s velocity is
/// advanced inline for each `i` so only the upper triangle of pairs
/// is visited, halving the arithmetic at the cost of serializing
/// across `i`.
pub fn apply_all_pairs(bodies: &mut BodyStore, eps_sq: f64, dt: f64) {
    let n = bodies.len();
    for i in 0..n {
        let mut force_i = DVec2::zero();
        let pos_i = bodies.pos(i);
        let mass_i = bodies.mass(i);
        for j in (i + 1)..n {
            let pos_j = bodies.pos(j);
            let mass_j = bodies.mass(j);
            let f = pairwise_force(mass_i, pos_i, mass_j, pos_j, eps_sq);
            force_i += f;
            *bodies.vel_mut(j) -= f * (dt / mass_j);
        }
        *bodies.vel_mut(i) += force_i * (dt / mass_i);
    }
}
