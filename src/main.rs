//! Process entry point: parse arguments, load configuration and
//! bodies, build the requested engine, then hand off to either the
//! windowed `Coordinator` or a headless poll loop.
//!
//! Grounded on `orig/main.cpp`'s `main()`, which does the same five
//! steps (parse args, load config, load universe, construct
//! `Simulation`, run, write universe) around an SFML window that's
//! only opened when graphics are enabled.

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Parser;

use nbody2d::cli::CliArgs;
use nbody2d::config::Config;
use nbody2d::error::{AppError, Result};
use nbody2d::{coordinator::Coordinator, engine, io, signal};

fn main() {
    let cli = CliArgs::parse();
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity.to_level_filter())
        .init();

    if let Err(err) = run(cli) {
        tracing::error!(%err, "fatal");
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run(cli: CliArgs) -> Result<()> {
    let config_text = std::fs::read_to_string(&cli.config)
        .map_err(|e| AppError::IoFailure(format!("{}: {e}", cli.config.display())))?;
    let config = Config::from_json(&config_text)?;
    if config.io.echo_config {
        config.echo();
    }

    let bodies = io::read_bodies(&config.io.universe_infile)?;
    if config.io.echo_bodies {
        io::echo_bodies(&bodies);
    }

    let stop = signal::install()?;
    let engine = engine::build_engine(&config, bodies)?;
    let outfile = config.io.universe_outfile.clone();

    if config.graphics.enabled {
        run_windowed(config, engine, stop, &outfile)
    } else {
        run_headless(engine, stop, &outfile)
    }
}

/// Opens a window and drives the frame loop to completion.
///
/// Uses `Window::from_config` rather than the `#[macroquad::main]`
/// attribute, since the attribute always opens a window and this path
/// is only reached once `Graphics.enabled` is already known to be
/// true.
fn run_windowed(
    config: Config,
    engine: Box<dyn engine::Engine>,
    stop: Arc<std::sync::atomic::AtomicBool>,
    outfile: &std::path::Path,
) -> Result<()> {
    let conf = macroquad::window::Conf {
        window_title: "n-body-2d".to_string(),
        window_width: config.graphics.resolution.0 as i32,
        window_height: config.graphics.resolution.1 as i32,
        fullscreen: false,
        window_resizable: true,
        ..Default::default()
    };

    let write_result: Arc<Mutex<Option<Result<()>>>> = Arc::new(Mutex::new(None));
    let write_result_inner = write_result.clone();
    let outfile = outfile.to_path_buf();

    macroquad::Window::from_config(conf, async move {
        let mut coordinator = Coordinator::new(config, engine, stop);
        coordinator.run().await;
        let result = io::write_bodies(&outfile, coordinator.bodies());
        *write_result_inner.lock().unwrap() = Some(result);
    });

    write_result
        .lock()
        .unwrap()
        .take()
        .unwrap_or_else(|| Err(AppError::RuntimeMisconfig(
            "window closed without completing a run".to_string(),
        )))
}

/// Runs to completion (or SIGINT) without opening a window, polling
/// the engine's finished flag the way a batch run under the original
/// would between `Simulation::run()` and the blocking wait on it.
fn run_headless(
    mut engine: Box<dyn engine::Engine>,
    stop: Arc<std::sync::atomic::AtomicBool>,
    outfile: &std::path::Path,
) -> Result<()> {
    engine.run();
    loop {
        if engine.is_finished() {
            break;
        }
        if stop.load(Ordering::Relaxed) {
            engine.pause();
            break;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    io::write_bodies(outfile, engine.bodies())
}
