//! Probability bar chart rendering
//!
//! Renders one bar per label in distribution order, y range [0, 1]. The
//! bitmap backend is used without text rendering so the crate carries no
//! system font dependency; the bar order is the label order of the result
//! (the model's training order for real classifications).

use crate::models::Classification;
use anyhow::{anyhow, Context, Result};
use plotters::prelude::*;
use std::path::Path;

const CHART_SIZE: (u32, u32) = (1000, 600);
const MARGIN: u32 = 24;
const BAR_COLOR: RGBColor = RGBColor(135, 206, 235);
const AXIS_COLOR: RGBColor = RGBColor(60, 60, 60);

/// Render `result` as a bar chart PNG at `path`, creating parent
/// directories as needed.
pub fn render_probability_chart(result: &Classification, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating chart directory {}", parent.display()))?;
    }

    let bars = result.probabilities.len().max(1);

    let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE)
        .map_err(|e| anyhow!("chart fill failed: {e}"))?;

    let mut chart = ChartBuilder::on(&root)
        .margin(MARGIN)
        .build_cartesian_2d(0f64..bars as f64, 0f64..1f64)
        .map_err(|e| anyhow!("chart layout failed: {e}"))?;

    chart
        .draw_series(result.probabilities.iter().enumerate().map(|(i, score)| {
            let p = f64::from(score.probability).clamp(0.0, 1.0);
            Rectangle::new(
                [(i as f64 + 0.1, 0.0), (i as f64 + 0.9, p)],
                BAR_COLOR.filled(),
            )
        }))
        .map_err(|e| anyhow!("chart bars failed: {e}"))?;

    // Baseline along y = 0.
    chart
        .draw_series(std::iter::once(PathElement::new(
            vec![(0.0, 0.0), (bars as f64, 0.0)],
            AXIS_COLOR.stroke_width(2),
        )))
        .map_err(|e| anyhow!("chart axis failed: {e}"))?;

    root.present()
        .map_err(|e| anyhow!("writing chart {} failed: {e}", path.display()))?;
    Ok(())
}
