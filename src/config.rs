use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{AppError, Result};

/// Gravitational constant, m^3 kg^-1 s^-2.
pub const G: f64 = 6.674_30e-11;
/// Barnes-Hut opening angle.
pub const DEFAULT_THETA: f64 = 0.7;
/// Per-step zoom multiplier applied by the coordinator.
pub const DEFAULT_ZOOM_FACTOR: f64 = 0.99;
/// Base of the adaptive grid-spacing power ladder.
pub const GRID_SPACING_FACTOR: f64 = 4.0;
/// Quadtree refuses to subdivide a node whose shorter side falls
/// below this, coalescing any remaining bodies into one leaf.
pub const MIN_QUAD_SIZE: f64 = 1e-6;
/// Above this many ordered pairs, softening estimation samples
/// instead of computing the exact average.
pub const MAX_SOFTENING_SAMPLES: u64 = 1_000_000;
/// Moving-average window size for the iterations/second stat.
pub const STATS_WINDOW: usize = 60;
/// Factor applied to the timestep on each left/right keypress.
pub const TIMESTEP_CHANGE_FACTOR: f64 = 1.1;
/// Inclusive bounds the timestep may be scaled into.
pub const TIMESTEP_RANGE: (f64, f64) = (1e-12, 3.155_69e16);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Algorithm {
    #[serde(alias = "Barnes-Hut", alias = "barnes_hut")]
    BarnesHut,
    #[serde(alias = "All Pairs", alias = "all_pairs", alias = "naive")]
    Naive,
}

#[derive(Debug, Deserialize)]
struct RawIo {
    universe_infile: PathBuf,
    universe_outfile: PathBuf,
    #[serde(default)]
    echo_config: bool,
    #[serde(default)]
    echo_bodies: bool,
}

#[derive(Debug, Deserialize)]
struct RawSimulation {
    timestep: f64,
    iterations: u64,
    algorithm: Algorithm,
    threads: u32,
    softening_factor: f64,
}

#[derive(Debug, Deserialize)]
struct RawGraphics {
    enabled: bool,
    resolution: [u32; 2],
    vsync: bool,
    fps: u32,
    pixel_scale: f64,
    grid_enabled: bool,
    show_panel: bool,
    panel_update_hz: f64,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(rename = "IO")]
    io: RawIo,
    #[serde(rename = "Simulation")]
    simulation: RawSimulation,
    #[serde(rename = "Graphics")]
    graphics: RawGraphics,
}

#[derive(Debug, Clone)]
pub struct IoConfig {
    pub universe_infile: PathBuf,
    pub universe_outfile: PathBuf,
    pub echo_config: bool,
    pub echo_bodies: bool,
}

#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub timestep: f64,
    pub iterations: u64,
    pub algorithm: Algorithm,
    pub threads: u32,
    pub softening_factor: f64,
}

#[derive(Debug, Clone)]
pub struct GraphicsConfig {
    pub enabled: bool,
    pub resolution: (u32, u32),
    pub vsync: bool,
    pub fps: u32,
    pub pixel_scale: f64,
    pub grid_enabled: bool,
    pub show_panel: bool,
    pub panel_update_hz: f64,
}

/// A fully parsed and range-checked configuration. Every field has
/// already passed the validation described in the external JSON
/// schema; nothing downstream needs to re-check ranges.
#[derive(Debug, Clone)]
pub struct Config {
    pub io: IoConfig,
    pub simulation: SimulationConfig,
    pub graphics: GraphicsConfig,
}

fn check_range<T: PartialOrd + std::fmt::Display>(
    field: &str,
    value: T,
    lo: T,
    hi: T,
) -> Result<()> {
    if value < lo || value > hi {
        return Err(AppError::ConfigInvalid(format!(
            "{field} = {value} is out of range [{lo}, {hi}]"
        )));
    }
    Ok(())
}

impl Config {
    /// Parses and validates a configuration document from its raw
    /// JSON text. Every out-of-range field is reported by name and
    /// received value, matching the original's per-field diagnostics.
    pub fn from_json(text: &str) -> Result<Self> {
        let raw: RawConfig = serde_json::from_str(text)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> Result<Self> {
        check_range(
            "Simulation.timestep",
            raw.simulation.timestep,
            TIMESTEP_RANGE.0,
            TIMESTEP_RANGE.1,
        )?;
        check_range("Simulation.threads", raw.simulation.threads, 1, 256)?;
        check_range(
            "Simulation.softening_factor",
            raw.simulation.softening_factor,
            0.0,
            0.2,
        )?;
        check_range("Graphics.resolution[0]", raw.graphics.resolution[0], 240, 7680)?;
        check_range("Graphics.resolution[1]", raw.graphics.resolution[1], 135, 4320)?;
        check_range("Graphics.fps", raw.graphics.fps, 1, 512)?;
        check_range(
            "Graphics.pixel_scale",
            raw.graphics.pixel_scale,
            1e-12,
            8.8e50,
        )?;
        check_range(
            "Graphics.panel_update_hz",
            raw.graphics.panel_update_hz,
            0.1,
            30.0,
        )?;

        Ok(Config {
            io: IoConfig {
                universe_infile: raw.io.universe_infile,
                universe_outfile: raw.io.universe_outfile,
                echo_config: raw.io.echo_config,
                echo_bodies: raw.io.echo_bodies,
            },
            simulation: SimulationConfig {
                timestep: raw.simulation.timestep,
                iterations: raw.simulation.iterations,
                algorithm: raw.simulation.algorithm,
                threads: raw.simulation.threads,
                softening_factor: raw.simulation.softening_factor,
            },
            graphics: GraphicsConfig {
                enabled: raw.graphics.enabled,
                resolution: (raw.graphics.resolution[0], raw.graphics.resolution[1]),
                vsync: raw.graphics.vsync,
                fps: raw.graphics.fps,
                pixel_scale: raw.graphics.pixel_scale,
                grid_enabled: raw.graphics.grid_enabled,
                show_panel: raw.graphics.show_panel,
                panel_update_hz: raw.graphics.panel_update_hz,
            },
        })
    }

    /// Logs the resolved configuration at INFO, mirroring the
    /// original's `Config::print()` echo-on-startup behavior.
    pub fn echo(&self) {
        tracing::info!(
            infile = %self.io.universe_infile.display(),
            outfile = %self.io.universe_outfile.display(),
            timestep = self.simulation.timestep,
            iterations = self.simulation.iterations,
            algorithm = ?self.simulation.algorithm,
            threads = self.simulation.threads,
            softening_factor = self.simulation.softening_factor,
            "resolved configuration"
        );
    }
}
