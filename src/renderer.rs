//! Frame drawing: clear, optional grid, bodies, optional stats panel.
//!
//! Grounded on `orig/main.cpp`'s SFML render loop (`window.clear()` /
//! draw grid / draw bodies / `window.display()`) and the original
//! `Renderer`'s adaptive grid-spacing formula; `macroquad` is the
//! ecosystem's closest equivalent to SFML's immediate-mode window,
//! picked over `ggez`/`winit`+`wgpu` for the same reason the original
//! reached for SFML — a single crate covering window, input and 2D
//! drawing with no further assembly required.

use macroquad::prelude::*;

use crate::body::BodyStore;
use crate::config::GRID_SPACING_FACTOR;
use crate::engine::Stats;
use crate::viewport::Viewport;

const GRID_COLOR: Color = Color::new(1.0, 1.0, 1.0, 0.15);
const BODY_COLOR: Color = Color::new(0.9, 0.9, 1.0, 1.0);

pub struct Renderer {
    pub grid_enabled: bool,
    pub show_panel: bool,
    pub body_radius: f32,
}

impl Renderer {
    pub fn new(grid_enabled: bool, show_panel: bool) -> Self {
        Self {
            grid_enabled,
            show_panel,
            body_radius: 1.5,
        }
    }

    pub fn grow_body_radius(&mut self) {
        self.body_radius = (self.body_radius + 1.0).min(64.0);
    }

    pub fn shrink_body_radius(&mut self) {
        self.body_radius = (self.body_radius - 1.0).max(1.0);
    }

    /// Draws one full frame. Does not call `next_frame().await` — the
    /// Coordinator's loop owns that, since it also needs to run after
    /// input handling that has nothing to do with drawing.
    pub fn draw(&self, bodies: &BodyStore, viewport: &Viewport, stats: Stats, algorithm_label: &str, theta: f64, threads: u32, timestep: f64) {
        clear_background(BLACK);

        if self.grid_enabled {
            self.draw_grid(viewport);
        }

        for i in 0..bodies.len() {
            let px = viewport.project(bodies.pos(i));
            draw_circle(px.x, px.y, self.body_radius, BODY_COLOR);
        }

        if self.show_panel {
            self.draw_panel(stats, algorithm_label, theta, threads, timestep);
        }
    }

    /// Grid lines at `G^(floor(log_G(min(size.x,size.y))) - 1)`
    /// spacing, so between `G` and `G^2` lines cross the shorter
    /// viewport dimension regardless of zoom level.
    fn draw_grid(&self, viewport: &Viewport) {
        let (origin, size) = viewport.rect();
        let short_side = size.x.min(size.y);
        if short_side <= 0.0 {
            return;
        }
        let exponent = (short_side.ln() / GRID_SPACING_FACTOR.ln()).floor() - 1.0;
        let spacing = GRID_SPACING_FACTOR.powf(exponent);
        if !spacing.is_finite() || spacing <= 0.0 {
            return;
        }

        let window_px = viewport.window_px();

        let first_x = (origin.x / spacing).floor() * spacing;
        let mut x = first_x;
        while x < origin.x + size.x {
            let px = viewport.project(ultraviolet::DVec2::new(x, origin.y));
            draw_line(px.x, 0.0, px.x, window_px.y, 1.0, GRID_COLOR);
            x += spacing;
        }

        let first_y = (origin.y / spacing).floor() * spacing;
        let mut y = first_y;
        while y < origin.y + size.y {
            let px = viewport.project(ultraviolet::DVec2::new(origin.x, y));
            draw_line(0.0, px.y, window_px.x, px.y, 1.0, GRID_COLOR);
            y += spacing;
        }
    }

    fn draw_panel(&self, stats: Stats, algorithm_label: &str, theta: f64, threads: u32, timestep: f64) {
        let text = format!(
            "iteration {} | {:.3} ips | real {:.3}s | sim {:.3}s | {} | theta {:.3} | threads {} | dt {:.3}",
            stats.iteration,
            stats.ips,
            stats.real_elapsed_s,
            stats.simulated_elapsed_s,
            algorithm_label,
            theta,
            threads,
            timestep,
        );
        draw_text(&text, 10.0, 20.0, 18.0, WHITE);
    }
}

/// `dyn Engine` implementors never need the panel text to know their
/// own algorithm/theta; the Coordinator supplies those from `Config`
/// since the trait itself stays kernel-agnostic.
pub fn algorithm_label(algorithm: &crate::config::Algorithm) -> &'static str {
    match algorithm {
        crate::config::Algorithm::BarnesHut => "Barnes-Hut",
        crate::config::Algorithm::Naive => "All Pairs",
    }
}

