use std::collections::HashSet;

use ultraviolet::DVec2;

/// Structure-of-arrays storage for every body in the simulation.
/// All four sequences share the same length; index `i` refers to
/// the same body across `id`, `mass`, `pos` and `vel`.
#[derive(Debug, Clone)]
pub struct BodyStore {
    id: Vec<String>,
    mass: Vec<f64>,
    pos: Vec<DVec2>,
    vel: Vec<DVec2>,
}

impl BodyStore {
    /// Builds a store from four parallel sequences. Panics if the
    /// lengths disagree — this is a programmer error at every call
    /// site (the loader always builds all four together).
    pub fn new(id: Vec<String>, mass: Vec<f64>, pos: Vec<DVec2>, vel: Vec<DVec2>) -> Self {
        assert_eq!(id.len(), mass.len());
        assert_eq!(id.len(), pos.len());
        assert_eq!(id.len(), vel.len());
        Self { id, mass, pos, vel }
    }

    pub fn len(&self) -> usize {
        self.id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id.is_empty()
    }

    pub fn id(&self, i: usize) -> &str {
        &self.id[i]
    }

    pub fn mass(&self, i: usize) -> f64 {
        self.mass[i]
    }

    pub fn pos(&self, i: usize) -> DVec2 {
        self.pos[i]
    }

    pub fn vel(&self, i: usize) -> DVec2 {
        self.vel[i]
    }

    pub fn pos_mut(&mut self, i: usize) -> &mut DVec2 {
        &mut self.pos[i]
    }

    pub fn vel_mut(&mut self, i: usize) -> &mut DVec2 {
        &mut self.vel[i]
    }

    pub fn positions(&self) -> &[DVec2] {
        &self.pos
    }

    pub fn velocities(&self) -> &[DVec2] {
        &self.vel
    }

    pub fn masses(&self) -> &[f64] {
        &self.mass
    }

    /// Raw pointer to the position array. Exists so the Barnes-Hut
    /// engine can hand disjoint, index-partitioned write access to
    /// its worker threads without a per-element mutex; see
    /// `engine::barnes_hut` for the safety argument (threads only
    /// ever touch indices in their own, non-overlapping chunk).
    pub(crate) fn pos_ptr(&mut self) -> *mut DVec2 {
        self.pos.as_mut_ptr()
    }

    /// Raw pointer to the velocity array; same contract as `pos_ptr`.
    pub(crate) fn vel_ptr(&mut self) -> *mut DVec2 {
        self.vel.as_mut_ptr()
    }

    /// Raw pointer to the (read-only) mass array, shared across
    /// worker threads during force evaluation.
    pub(crate) fn mass_ptr(&self) -> *const f64 {
        self.mass.as_ptr()
    }

    /// Checks that every id is unique. Soft-failing: returns false
    /// and lets the caller decide whether that is fatal (it is, at
    /// load time) rather than panicking itself.
    pub fn validate_unique_ids(&self) -> bool {
        let mut seen = HashSet::with_capacity(self.id.len());
        for id in &self.id {
            if !seen.insert(id.as_str()) {
                tracing::warn!(id = %id, "duplicate body id");
                return false;
            }
        }
        true
    }

    /// Checks that every mass is finite and non-negative, and every
    /// position/velocity component is finite.
    pub fn validate_physical(&self) -> bool {
        for i in 0..self.len() {
            if !self.mass[i].is_finite() || self.mass[i] < 0.0 {
                tracing::warn!(id = %self.id[i], mass = self.mass[i], "invalid mass");
                return false;
            }
            if !self.pos[i].x.is_finite() || !self.pos[i].y.is_finite() {
                tracing::warn!(id = %self.id[i], "non-finite position");
                return false;
            }
            if !self.vel[i].x.is_finite() || !self.vel[i].y.is_finite() {
                tracing::warn!(id = %self.id[i], "non-finite velocity");
                return false;
            }
        }
        true
    }

    /// Total momentum `sum(m_i * v_i)`, used by tests checking
    /// conservation under the all-pairs kernel.
    pub fn total_momentum(&self) -> DVec2 {
        let mut total = DVec2::zero();
        for i in 0..self.len() {
            total += self.vel[i] * self.mass[i];
        }
        total
    }
}
