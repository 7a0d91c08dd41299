//! Simulation engine: the run/pause state machine and statistics
//! shared by both force-evaluation kernels, plus the two concrete
//! engines (`barnes_hut`, `all_pairs`) that implement it.
//!
//! Grounded on `orig/Simulation/include/Simulation/Simulation.hpp` +
//! `src/Simulation.cpp` (the common base class both kernels derive
//! from in the original); the Rust rework expresses the shared base
//! as a trait plus a small struct of atomics/mutexes each engine
//! embeds, since Rust has no protected-member inheritance to lean on.

pub mod all_pairs;
pub mod barnes_hut;

pub use all_pairs::AllPairsEngine;
pub use barnes_hut::BarnesHutEngine;

use crate::body::BodyStore;
use crate::config::{Algorithm, Config};
use crate::error::Result;
use crate::mean_buffer::MeanBuffer;

/// Run/pause/finished state machine. `Finished` is terminal; pause
/// during `Finished` is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimState {
    Paused,
    Running,
}

/// A snapshot of the engine's progress, safe to read from any
/// thread. Mirrors the original's `Simulation::Stats`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Stats {
    pub iteration: u64,
    pub ips: f64,
    pub real_elapsed_s: f64,
    pub simulated_elapsed_s: f64,
}

/// The operations the Coordinator drives, common to both kernels.
/// Modeled after the original's `Simulation` base class public
/// interface.
pub trait Engine {
    /// Transitions Paused -> Running. Idempotent: logs a warning and
    /// does nothing if already Running.
    fn run(&mut self);

    /// Transitions Running -> Paused, blocking until every worker
    /// thread has quiesced. Idempotent: logs a warning and does
    /// nothing if already Paused. A no-op (without warning) once
    /// `is_finished()`.
    fn pause(&mut self);

    /// Requests a new timestep, applied at the start of the next
    /// iteration. Lock-free: a single relaxed atomic.
    fn set_timestep(&self, dt: f64);

    fn get_state(&self) -> SimState;

    fn get_stats(&self) -> Stats;

    fn is_finished(&self) -> bool;

    /// Unsynchronized read access to the body store, for the
    /// renderer. A body's (x, y) may tear across a concurrent write;
    /// this is accepted as cosmetically harmless rather than
    /// paying for a mutex on the hot path.
    fn bodies(&self) -> &BodyStore;
}

/// Folds one completed iteration into `stats`, the way both kernels'
/// `post_iteration` do: bump the iteration count, fold the latest
/// instantaneous iterations-per-second into the rolling mean, and
/// accumulate simulated time by `iterations_since_last_update * dt`.
pub(super) fn record_iteration_stats(
    stats: &mut Stats,
    ips: &mut MeanBuffer,
    iter_now: u64,
    elapsed_s: f64,
    dt: f64,
) {
    let iter_delta = iter_now - stats.iteration;
    let dt_real = elapsed_s - stats.real_elapsed_s;
    if dt_real > 0.0 {
        ips.register(iter_delta as f64 / dt_real);
    }
    stats.iteration = iter_now;
    stats.ips = ips.mean();
    stats.real_elapsed_s = elapsed_s;
    stats.simulated_elapsed_s += iter_delta as f64 * dt;
}

/// Picks the kernel named by `config.simulation.algorithm`. The only
/// place that knows both concrete engine types exist; everything else
/// (Coordinator, main) talks to `dyn Engine`.
pub fn build_engine(config: &Config, bodies: BodyStore) -> Result<Box<dyn Engine>> {
    match config.simulation.algorithm {
        Algorithm::BarnesHut => Ok(Box::new(BarnesHutEngine::new(&config.simulation, bodies)?)),
        Algorithm::Naive => Ok(Box::new(AllPairsEngine::new(&config.simulation, bodies)?)),
    }
}
