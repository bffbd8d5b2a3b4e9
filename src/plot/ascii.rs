//! ASCII plotting for terminal output.
//!
//! This is intentionally "dumb" (fixed-size grid), optimized for:
//! - quick visual sanity checks in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! Plot elements:
//! - observed points: `o`
//! - fitted curve: `-` line
//! - change points: `|` columns (only where nothing else is drawn)

use crate::domain::{ModelFile, ModelParameters, Observation, ObservationResidual};
use crate::models::predict;

/// Render a plot for an in-memory fit.
pub fn render_ascii_plot(
    residuals: &[ObservationResidual],
    params: &ModelParameters,
    width: usize,
    height: usize,
) -> String {
    let points: Vec<(f64, f64)> = residuals
        .iter()
        .map(|r| (r.observation.temperature, r.observation.energy))
        .collect();
    let (t_min, t_max) = x_range(points.iter().map(|p| p.0)).unwrap_or((0.0, 100.0));
    let curve = sample_curve(params, t_min, t_max, width.max(2));
    render_plot(&points, &curve, &params.change_points(), t_min, t_max, width, height)
}

/// Render a plot from a saved model file, optionally overlaying observations.
pub fn render_ascii_plot_from_model_file(
    model: &ModelFile,
    overlay: &[Observation],
    width: usize,
    height: usize,
) -> String {
    let curve: Vec<(f64, f64)> = model
        .grid
        .temperature
        .iter()
        .zip(model.grid.energy.iter())
        .map(|(&t, &e)| (t, e))
        .collect();
    let points: Vec<(f64, f64)> = overlay.iter().map(|o| (o.temperature, o.energy)).collect();

    let xs = curve.iter().chain(points.iter()).map(|p| p.0);
    let (t_min, t_max) = x_range(xs).unwrap_or((0.0, 100.0));
    render_plot(
        &points,
        &curve,
        &model.parameters.change_points(),
        t_min,
        t_max,
        width,
        height,
    )
}

fn render_plot(
    points: &[(f64, f64)],
    curve: &[(f64, f64)],
    change_points: &[f64],
    t_min: f64,
    t_max: f64,
    width: usize,
    height: usize,
) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let (e_min, e_max) = y_range(points, curve).unwrap_or((0.0, 1.0));
    let (e_min, e_max) = pad_range(e_min, e_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];

    // Curve first, then markers in the gaps, then points on top.
    draw_curve(&mut grid, curve, t_min, t_max, e_min, e_max);

    for &cp in change_points {
        if cp < t_min || cp > t_max {
            continue;
        }
        let x = map_x(cp, t_min, t_max, width);
        for row in grid.iter_mut() {
            if row[x] == ' ' {
                row[x] = '|';
            }
        }
    }

    for &(t, e) in points {
        let x = map_x(t, t_min, t_max, width);
        let y = map_y(e, e_min, e_max, height);
        grid[y][x] = 'o';
    }

    let mut out = String::new();
    out.push_str(&format!(
        "Plot: temperature=[{t_min:.2}, {t_max:.2}] | energy=[{e_min:.2}, {e_max:.2}]\n"
    ));

    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }

    out
}

fn x_range(xs: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let mut min_t = f64::INFINITY;
    let mut max_t = f64::NEG_INFINITY;
    for t in xs {
        min_t = min_t.min(t);
        max_t = max_t.max(t);
    }
    if min_t.is_finite() && max_t.is_finite() && max_t > min_t {
        Some((min_t, max_t))
    } else {
        None
    }
}

fn sample_curve(params: &ModelParameters, t_min: f64, t_max: f64, n: usize) -> Vec<(f64, f64)> {
    let n = n.max(2);
    (0..n)
        .map(|i| {
            let u = i as f64 / (n as f64 - 1.0);
            let t = t_min + u * (t_max - t_min);
            (t, predict(params, t))
        })
        .collect()
}

fn y_range(points: &[(f64, f64)], curve: &[(f64, f64)]) -> Option<(f64, f64)> {
    let mut min_y = f64::INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for &(_, y) in points.iter().chain(curve.iter()) {
        min_y = min_y.min(y);
        max_y = max_y.max(y);
    }
    if min_y.is_finite() && max_y.is_finite() && max_y > min_y {
        Some((min_y, max_y))
    } else {
        None
    }
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(t: f64, t_min: f64, t_max: f64, width: usize) -> usize {
    let width = width.max(2);
    let u = ((t - t_min) / (t_max - t_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // Highest energy on row 0.
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

fn draw_curve(grid: &mut [Vec<char>], curve: &[(f64, f64)], t_min: f64, t_max: f64, y_min: f64, y_max: f64) {
    if curve.len() < 2 {
        return;
    }
    let height = grid.len();
    let width = grid[0].len();

    let mut prev = None;
    for &(t, y) in curve {
        let x = map_x(t, t_min, t_max, width);
        let yy = map_y(y, y_min, y_max, height);
        if let Some((x0, y0)) = prev {
            draw_line(grid, x0, y0, x, yy, '-');
        } else {
            grid[yy][x] = '-';
        }
        prev = Some((x, yy));
    }
}

/// Integer line drawing (Bresenham-ish).
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if y0 >= 0
            && (y0 as usize) < grid.len()
            && x0 >= 0
            && (x0 as usize) < grid[0].len()
            && grid[y0 as usize][x0 as usize] == ' '
        {
            grid[y0 as usize][x0 as usize] = ch;
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}
