//! Owns the window-facing half of a run: translates `macroquad` input
//! into Viewport/Engine/Renderer calls and drives the frame loop.
//!
//! Grounded on `orig/main.cpp`'s SFML event loop (`pollEvent` switch
//! over Closed/Resized/MouseWheelScrolled/MouseButtonPressed/
//! MouseButtonReleased/MouseMoved/KeyPressed) and `orig/Controller`'s
//! pause/timestep/grid/panel keybindings; `macroquad::input` polling
//! replaces the explicit SFML event queue.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use macroquad::prelude::*;
use ultraviolet::Vec2;

use crate::config::{Config, TIMESTEP_CHANGE_FACTOR, TIMESTEP_RANGE};
use crate::engine::{Engine, Stats};
use crate::rate_limiter::RateLimiter;
use crate::renderer::{algorithm_label, Renderer};
use crate::viewport::{Viewport, ZoomDirection};

pub struct Coordinator {
    config: Config,
    engine: Box<dyn Engine>,
    viewport: Viewport,
    renderer: Renderer,
    stats_limiter: RateLimiter,
    cached_stats: Stats,
    dragging: bool,
    last_mouse: Vec2,
    external_stop: Arc<AtomicBool>,
}

impl Coordinator {
    pub fn new(config: Config, engine: Box<dyn Engine>, external_stop: Arc<AtomicBool>) -> Self {
        let viewport = Viewport::new(
            Vec2::new(
                config.graphics.resolution.0 as f32,
                config.graphics.resolution.1 as f32,
            ),
            config.graphics.pixel_scale,
        );
        let renderer = Renderer::new(config.graphics.grid_enabled, config.graphics.show_panel);
        let panel_interval = Duration::from_secs_f64(1.0 / config.graphics.panel_update_hz);
        Self {
            config,
            engine,
            viewport,
            renderer,
            stats_limiter: RateLimiter::new(panel_interval),
            cached_stats: Stats::default(),
            dragging: false,
            last_mouse: Vec2::zero(),
            external_stop,
        }
    }

    /// Runs until the engine finishes, the window closes, or the
    /// external stop flag (SIGINT) is set. Pauses the engine before
    /// returning in the latter two cases so the caller can safely
    /// write the body store back out.
    pub async fn run(&mut self) {
        prevent_quit();
        self.engine.run();

        loop {
            if self.engine.is_finished() {
                break;
            }
            if self.external_stop.load(Ordering::Relaxed) {
                self.engine.pause();
                break;
            }
            if is_quit_requested() {
                self.engine.pause();
                break;
            }

            self.handle_input();

            if let Some(fresh) = self.stats_limiter.try_call(|| self.engine.get_stats()) {
                self.cached_stats = fresh;
            }
            let bodies = self.engine.bodies();
            self.renderer.draw(
                bodies,
                &self.viewport,
                self.cached_stats,
                algorithm_label(&self.config.simulation.algorithm),
                crate::config::DEFAULT_THETA,
                self.config.simulation.threads,
                self.config.simulation.timestep,
            );

            next_frame().await;
        }
    }

    fn handle_input(&mut self) {
        let window_px = Vec2::new(screen_width(), screen_height());
        if window_px != self.viewport.window_px() {
            self.viewport.resize(window_px);
        }

        let (mouse_x, mouse_y) = mouse_position();
        let mouse_px = Vec2::new(mouse_x, mouse_y);

        let (_, wheel_y) = mouse_wheel();
        if wheel_y > 0.0 {
            self.viewport.zoom(ZoomDirection::In, mouse_px);
        } else if wheel_y < 0.0 {
            self.viewport.zoom(ZoomDirection::Out, mouse_px);
        }

        if is_mouse_button_pressed(MouseButton::Left) {
            self.dragging = true;
            self.last_mouse = mouse_px;
        }
        if is_mouse_button_released(MouseButton::Left) {
            self.dragging = false;
        }
        if self.dragging {
            let delta = mouse_px - self.last_mouse;
            self.viewport.pan(delta);
            self.last_mouse = mouse_px;
        }

        if is_key_pressed(KeyCode::Space) {
            match self.engine.get_state() {
                crate::engine::SimState::Running => self.engine.pause(),
                crate::engine::SimState::Paused => self.engine.run(),
            }
        }
        if is_key_pressed(KeyCode::G) {
            self.renderer.grid_enabled = !self.renderer.grid_enabled;
        }
        if is_key_pressed(KeyCode::S) {
            self.renderer.show_panel = !self.renderer.show_panel;
        }
        if is_key_pressed(KeyCode::Left) {
            self.adjust_timestep(1.0 / TIMESTEP_CHANGE_FACTOR);
        }
        if is_key_pressed(KeyCode::Right) {
            self.adjust_timestep(TIMESTEP_CHANGE_FACTOR);
        }
        if is_key_pressed(KeyCode::Up) {
            self.renderer.grow_body_radius();
        }
        if is_key_pressed(KeyCode::Down) {
            self.renderer.shrink_body_radius();
        }
    }

    fn adjust_timestep(&mut self, factor: f64) {
        let next = (self.config.simulation.timestep * factor)
            .clamp(TIMESTEP_RANGE.0, TIMESTEP_RANGE.1);
        self.config.simulation.timestep = next;
        self.engine.set_timestep(next);
    }

    /// Final body positions, for the caller to write out once `run()`
    /// returns.
    pub fn bodies(&self) -> &crate::body::BodyStore {
        self.engine.bodies()
    }
}
