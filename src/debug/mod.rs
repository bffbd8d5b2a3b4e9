//! Debug bundle writer for inspecting the input data and the grid-search surface.
//!
//! The bundle is a markdown file under `debug/` listing the observations, the
//! fitted models, and the SSE of every admissible change-point candidate per
//! model kind (best first), so a flat or multi-modal SSE surface is easy to spot.

use std::fs::{File, create_dir_all};
use std::io::Write;
use std::path::PathBuf;

use chrono::Local;

use crate::domain::{FitConfig, Observation};
use crate::error::AppError;
use crate::fit::fitter::scan_model;
use crate::fit::selection::FitSelection;

fn write_err(e: std::io::Error) -> AppError {
    AppError::new(4, format!("Failed to write debug bundle: {e}"))
}

/// Write the bundle to `debug/mvb_debug_<timestamp>.md` and return its path.
pub fn write_debug_bundle(
    observations: &[Observation],
    selection: &FitSelection,
    config: &FitConfig,
) -> Result<PathBuf, AppError> {
    let dir = PathBuf::from("debug");
    create_dir_all(&dir).map_err(|e| AppError::new(4, format!("Failed to create debug dir: {e}")))?;

    let ts = Local::now().format("%Y%m%d_%H%M%S");
    let path = dir.join(format!("mvb_debug_{ts}.md"));
    let mut file = File::create(&path)
        .map_err(|e| AppError::new(4, format!("Failed to create debug file: {e}")))?;

    render_debug_bundle(&mut file, observations, selection, config)?;
    Ok(path)
}

/// Render the bundle into any writer.
pub fn render_debug_bundle<W: Write>(
    out: &mut W,
    observations: &[Observation],
    selection: &FitSelection,
    config: &FitConfig,
) -> Result<(), AppError> {
    writeln!(out, "# mvb debug bundle").map_err(write_err)?;
    writeln!(out, "- generated: {}", Local::now().to_rfc3339()).map_err(write_err)?;
    writeln!(out, "- baseline: {}", config.baseline_path.display()).map_err(write_err)?;
    writeln!(out, "- model_spec: {:?}", config.model_spec).map_err(write_err)?;
    writeln!(
        out,
        "- grid: start_offset={} end_offset={} heat_end_offset_5p={} min_separation={} step_3p={} step_5p={}",
        config.grid.start_offset,
        config.grid.end_offset,
        config.grid.heat_end_offset_5p,
        config.grid.min_separation,
        config.grid.step_3p,
        config.grid.step_5p
    )
    .map_err(write_err)?;

    writeln!(out, "\n## Observations").map_err(write_err)?;
    writeln!(out, "| # | label | temperature | energy |").map_err(write_err)?;
    writeln!(out, "| - | - | - | - |").map_err(write_err)?;
    for (i, o) in observations.iter().enumerate() {
        writeln!(
            out,
            "| {} | {} | {:.3} | {:.3} |",
            i + 1,
            o.label.as_deref().unwrap_or("-"),
            o.temperature,
            o.energy
        )
        .map_err(write_err)?;
    }

    writeln!(out, "\n## Fits").map_err(write_err)?;
    writeln!(out, "| model | sse | rmse | bic | nmbe | cvrmse | r2 | change_points |").map_err(write_err)?;
    writeln!(out, "| - | - | - | - | - | - | - | - |").map_err(write_err)?;
    for fit in &selection.fits {
        writeln!(
            out,
            "| {} | {:.6} | {:.6} | {:.3} | {:.3} | {:.3} | {:.4} | {} |",
            fit.kind().display_name(),
            fit.quality.sse,
            fit.quality.rmse,
            fit.quality.bic,
            fit.validation.nmbe,
            fit.validation.cvrmse,
            fit.validation.r_squared,
            fmt_vec(&fit.parameters().change_points())
        )
        .map_err(write_err)?;
    }
    for (kind, reason) in &selection.skipped {
        writeln!(out, "- skipped {}: {}", kind.display_name(), reason).map_err(write_err)?;
    }
    writeln!(out, "- selected: {}", selection.best.kind().display_name()).map_err(write_err)?;

    for &kind in config.model_spec.kinds() {
        let Some(scan) = scan_model(kind, observations, &config.grid) else {
            continue;
        };
        writeln!(out, "\n## Grid surface: {}", kind.display_name()).map_err(write_err)?;
        writeln!(
            out,
            "grid_size={} admissible={} rejected={}",
            scan.grid_size,
            scan.candidates.len(),
            scan.rejected()
        )
        .map_err(write_err)?;
        writeln!(out, "\n| rank | change_points | sse |").map_err(write_err)?;
        writeln!(out, "| - | - | - |").map_err(write_err)?;

        let mut ranked: Vec<_> = scan.candidates.iter().collect();
        ranked.sort_by(|a, b| a.sse.total_cmp(&b.sse).then(a.idx.cmp(&b.idx)));
        for (rank, c) in ranked.iter().enumerate() {
            writeln!(out, "| {} | {} | {:.6} |", rank + 1, fmt_vec(&c.change_points), c.sse)
                .map_err(write_err)?;
        }
    }

    Ok(())
}

fn fmt_vec(values: &[f64]) -> String {
    let parts: Vec<String> = values.iter().map(|v| format!("{v:.2}")).collect();
    format!("[{}]", parts.join(", "))
}
