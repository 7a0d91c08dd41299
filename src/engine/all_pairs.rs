//! Single-worker-thread all-pairs O(N^2) kernel.
//!
//! Grounded on `orig/Simulation/src/AllPairs.cpp` +
//! `include/Simulation/AllPairs.hpp`: one background thread runs
//! `update_positions` / `update_velocities` in a loop; `pause` sets
//! `stop` and joins. The force pass itself lives in `crate::force`
//! (`apply_all_pairs`), shared with the benches and the momentum-
//! conservation test.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::body::BodyStore;
use crate::config::{Algorithm, SimulationConfig, STATS_WINDOW};
use crate::error::{AppError, Result};
use crate::force::{apply_all_pairs, softening_squared};
use crate::mean_buffer::MeanBuffer;
use crate::rate_limiter::RateLimiter;
use crate::stopwatch::StopWatch;

use super::{record_iteration_stats, Engine, SimState, Stats};

/// Gate on how often `post_iteration` recomputes the published
/// statistics, mirroring `RLCaller stats_update_rate_limiter` in the
/// original's `Simulation` base class.
const STATS_UPDATE_INTERVAL: Duration = Duration::from_micros(50);

pub struct AllPairsEngine {
    bodies: BodyStore,
    max_iterations: u64,
    eps_sq: f64,
    requested_timestep_bits: Arc<AtomicU64>,
    iteration: Arc<AtomicU64>,
    finished: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
    state: SimState,
    stats: Arc<Mutex<Stats>>,
    sw: Arc<Mutex<StopWatch>>,
    worker: Option<JoinHandle<()>>,
}

impl AllPairsEngine {
    pub fn new(sim_cfg: &SimulationConfig, bodies: BodyStore) -> Result<Self> {
        debug_assert_eq!(sim_cfg.algorithm, Algorithm::Naive);
        let n = bodies.len();
        let threads = sim_cfg.threads as usize;
        if threads == 0 {
            return Err(AppError::RuntimeMisconfig(
                "threads must be at least 1".to_string(),
            ));
        }
        if threads > n.min(256) {
            return Err(AppError::RuntimeMisconfig(format!(
                "threads ({threads}) must not exceed min(256, body count ({n}))"
            )));
        }
        let eps_sq = softening_squared(sim_cfg.softening_factor, &bodies);
        Ok(Self {
            bodies,
            max_iterations: sim_cfg.iterations,
            eps_sq,
            requested_timestep_bits: Arc::new(AtomicU64::new(sim_cfg.timestep.to_bits())),
            iteration: Arc::new(AtomicU64::new(0)),
            finished: Arc::new(AtomicBool::new(false)),
            stop: Arc::new(AtomicBool::new(true)),
            state: SimState::Paused,
            stats: Arc::new(Mutex::new(Stats::default())),
            sw: Arc::new(Mutex::new(StopWatch::new())),
            worker: None,
        })
    }
}

impl Engine for AllPairsEngine {
    fn run(&mut self) {
        if self.state != SimState::Paused {
            tracing::warn!("cannot run: engine is not paused");
            return;
        }
        self.state = SimState::Running;
        self.stop.store(false, Ordering::Relaxed);
        self.sw.lock().unwrap().resume();

        let n = self.bodies.len();
        let pos_ptr = self.bodies.pos_ptr() as usize;
        let vel_ptr = self.bodies.vel_ptr() as usize;
        let mass_ptr = self.bodies.mass_ptr() as usize;

        let max_iterations = self.max_iterations;
        let eps_sq = self.eps_sq;
        let requested_timestep_bits = self.requested_timestep_bits.clone();
        let iteration = self.iteration.clone();
        let finished = self.finished.clone();
        let stop = self.stop.clone();
        let stats = self.stats.clone();
        let sw = self.sw.clone();

        self.worker = Some(std::thread::spawn(move || {
            // Reconstruct a private BodyStore view over the shared
            // backing arrays. Only this thread (between run() and
            // pause()) writes through it; the owning engine's copy
            // and this view alias the very same heap allocation by
            // construction, which is what lets the renderer read
            // concurrently without synchronization (see Engine::bodies).
            let mut view = unsafe {
                RawBodies {
                    pos: pos_ptr as *mut ultraviolet::DVec2,
                    vel: vel_ptr as *mut ultraviolet::DVec2,
                    mass: mass_ptr as *const f64,
                    n,
                }
            };

            let mut rate_limiter = RateLimiter::new(STATS_UPDATE_INTERVAL);
            let mut ips = MeanBuffer::new(STATS_WINDOW);

            loop {
                if iteration.load(Ordering::Relaxed) >= max_iterations {
                    finished.store(true, Ordering::Relaxed);
                    break;
                }
                if stop.load(Ordering::Relaxed) {
                    break;
                }

                let dt = f64::from_bits(requested_timestep_bits.load(Ordering::Relaxed));
                view.apply_iteration(dt, eps_sq);

                let iter_now = iteration.fetch_add(1, Ordering::Relaxed) + 1;
                rate_limiter.try_call(|| {
                    let elapsed_s = sw.lock().unwrap().elapsed().as_secs_f64();
                    let mut stats = stats.lock().unwrap();
                    record_iteration_stats(&mut stats, &mut ips, iter_now, elapsed_s, dt);
                });
            }
        }));
    }

    fn pause(&mut self) {
        if self.state != SimState::Running {
            tracing::warn!("cannot pause: engine is not running");
            return;
        }
        self.state = SimState::Paused;
        self.stop.store(true, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            worker.join().expect("all-pairs worker thread panicked");
        }
        self.sw.lock().unwrap().pause();
    }

    fn set_timestep(&self, dt: f64) {
        self.requested_timestep_bits
            .store(dt.to_bits(), Ordering::Relaxed);
    }

    fn get_state(&self) -> SimState {
        self.state
    }

    fn get_stats(&self) -> Stats {
        *self.stats.lock().unwrap()
    }

    fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Relaxed)
    }

    fn bodies(&self) -> &BodyStore {
        &self.bodies
    }
}

impl Drop for AllPairsEngine {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.pause();
        }
    }
}

/// Raw-pointer view over the shared body arrays, used by the worker
/// thread spawned in `run()`. A thin re-derivation of `apply_all_pairs`
/// that writes directly through the pointers rather than an owned
/// `BodyStore`, since the engine keeps the real `BodyStore` for
/// `Engine::bodies()` and this thread must not hold a second owning
/// copy.
struct RawBodies {
    pos: *mut ultraviolet::DVec2,
    vel: *mut ultraviolet::DVec2,
    mass: *const f64,
    n: usize,
}

unsafe impl Send for RawBodies {}

impl RawBodies {
    fn apply_iteration(&mut self, dt: f64, eps_sq: f64) {
        use crate::config::G;
        use ultraviolet::DVec2;

        // Mirrors `force::apply_all_pairs` / `AllPairsSim::update_velocities`:
        // one symmetric pass accumulating both bodies' contributions,
        // followed by a separate position-advance pass.
        for i in 0..self.n {
            let pos_i = unsafe { *self.pos.add(i) };
            let mass_i = unsafe { *self.mass.add(i) };
            let mut force_i = DVec2::zero();
            for j in (i + 1)..self.n {
                let pos_j = unsafe { *self.pos.add(j) };
                let mass_j = unsafe { *self.mass.add(j) };
                let d = pos_j - pos_i;
                let dist_sq = d.mag_sq();
                if dist_sq == 0.0 {
                    continue;
                }
                let dist = dist_sq.sqrt();
                let amp = G * mass_i * mass_j / (dist_sq + eps_sq);
                let f = d * (amp / dist);
                force_i += f;
                unsafe {
                    *self.vel.add(j) -= f * (dt / mass_j);
                }
            }
            unsafe {
                *self.vel.add(i) += force_i * (dt / mass_i);
            }
        }

        for i in 0..self.n {
            let vel_i = unsafe { *self.vel.add(i) };
            unsafe {
                *self.pos.add(i) += vel_i * dt;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ultraviolet::DVec2;

    fn two_body_config(iterations: u64) -> SimulationConfig {
        SimulationConfig {
            timestep: 1.0,
            iterations,
            algorithm: Algorithm::Naive,
            threads: 1,
            softening_factor: 0.0,
        }
    }

    fn two_bodies() -> BodyStore {
        BodyStore::new(
            vec!["a".into(), "b".into()],
            vec![1e24, 1e10],
            vec![DVec2::new(0.0, 0.0), DVec2::new(1e8, 0.0)],
            vec![DVec2::new(0.0, 0.0), DVec2::new(0.0, 0.0258)],
        )
    }

    #[test]
    fn run_then_pause_advances_iteration_count() {
        let mut engine = AllPairsEngine::new(&two_body_config(50), two_bodies()).unwrap();
        engine.run();
        std::thread::sleep(std::time::Duration::from_millis(50));
        engine.pause();
        assert!(engine.get_stats().iteration > 0);
        assert_eq!(engine.get_state(), SimState::Paused);
    }

    #[test]
    fn run_while_running_is_idempotent() {
        let mut engine = AllPairsEngine::new(&two_body_config(10_000), two_bodies()).unwrap();
        engine.run();
        engine.run();
        assert_eq!(engine.get_state(), SimState::Running);
        engine.pause();
    }

    #[test]
    fn pause_while_paused_is_idempotent() {
        let mut engine = AllPairsEngine::new(&two_body_config(10), two_bodies()).unwrap();
        assert_eq!(engine.get_state(), SimState::Paused);
        engine.pause();
        assert_eq!(engine.get_state(), SimState::Paused);
    }

    #[test]
    fn zero_threads_is_a_runtime_misconfig() {
        let mut cfg = two_body_config(10);
        cfg.threads = 0;
        let err = AllPairsEngine::new(&cfg, two_bodies()).unwrap_err();
        assert!(matches!(err, AppError::RuntimeMisconfig(_)));
    }

    #[test]
    fn threads_exceeding_body_count_is_rejected() {
        let mut cfg = two_body_config(10);
        cfg.threads = 8;
        let err = AllPairsEngine::new(&cfg, two_bodies()).unwrap_err();
        assert!(matches!(err, AppError::RuntimeMisconfig(_)));
    }

    #[test]
    fn finishes_after_max_iterations() {
        let mut engine = AllPairsEngine::new(&two_body_config(5), two_bodies()).unwrap();
        engine.run();
        for _ in 0..200 {
            if engine.is_finished() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        assert!(engine.is_finished());
        engine.pause();
    }

    fn run_to_completion(engine: &mut AllPairsEngine) {
        engine.run();
        for _ in 0..500 {
            if engine.is_finished() {
                return;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        panic!("engine did not finish within the polling budget");
    }

    fn collinear_symmetric_bodies() -> BodyStore {
        BodyStore::new(
            vec!["a".into(), "b".into(), "c".into()],
            vec![1e10, 1e10, 1e10],
            vec![
                DVec2::new(-1e8, 0.0),
                DVec2::new(0.0, 0.0),
                DVec2::new(1e8, 0.0),
            ],
            vec![DVec2::zero(); 3],
        )
    }

    // Scenario B: three collinear bodies at rest with mirror symmetry
    // about the origin. The force law and integrator treat `-x` and
    // `+x` identically, so B never moves off the axis and A/C stay
    // mirror images of each other at every iteration.
    #[test]
    fn collinear_symmetric_bodies_preserve_mirror_symmetry() {
        let mut cfg = two_body_config(200);
        cfg.threads = 1;
        let mut engine = AllPairsEngine::new(&cfg, collinear_symmetric_bodies()).unwrap();
        run_to_completion(&mut engine);
        engine.pause();

        let bodies = engine.bodies();
        assert!(bodies.pos(1).x.abs() < 1e-6);
        assert!(bodies.pos(1).y.abs() < 1e-6);
        assert!((bodies.pos(0).x + bodies.pos(2).x).abs() < 1e-6);
        assert!((bodies.pos(0).y - bodies.pos(2).y).abs() < 1e-9);
    }

    // Scenario D: pausing partway through and resuming must produce
    // the same bodies as running straight through, since the
    // single-threaded kernel's arithmetic order never depends on
    // where a pause lands.
    #[test]
    fn pause_resume_replay_matches_uninterrupted_run() {
        let mut straight = AllPairsEngine::new(&two_body_config(1_000), two_bodies()).unwrap();
        run_to_completion(&mut straight);
        straight.pause();

        let mut interrupted = AllPairsEngine::new(&two_body_config(1_000), two_bodies()).unwrap();
        interrupted.run();
        loop {
            if interrupted.get_stats().iteration >= 500 || interrupted.is_finished() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        interrupted.pause();
        run_to_completion(&mut interrupted);
        interrupted.pause();

        let a = straight.bodies();
        let b = interrupted.bodies();
        for i in 0..a.len() {
            assert!((a.pos(i) - b.pos(i)).mag() < 1e-6);
            assert!((a.vel(i) - b.vel(i)).mag() < 1e-9);
        }
    }
}
