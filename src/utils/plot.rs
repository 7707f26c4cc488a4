use ndarray::ArrayView1;
use plotters::prelude::*;
use std::path::Path;

use crate::error::{Co2Error, Result};
use crate::training::history::TrainingHistory;

fn plot_err<E: std::fmt::Display>(e: E) -> Co2Error {
    Co2Error::Plot(e.to_string())
}

/// Scatter of predictions against actual values, with the y = x reference line.
pub fn prediction_scatter(
    predicted: &ArrayView1<f64>,
    actual: &ArrayView1<f64>,
    title: &str,
    path: &Path,
) -> Result<()> {
    let points: Vec<(f64, f64)> = predicted
        .iter()
        .zip(actual.iter())
        .map(|(&p, &a)| (p, a))
        .filter(|(p, a)| p.is_finite() && a.is_finite())
        .collect();
    let upper = points
        .iter()
        .map(|(p, a)| p.max(*a))
        .fold(1.0_f64, f64::max)
        * 1.05;

    let root = BitMapBackend::new(path, (800, 600)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(0f64..upper, 0f64..upper)
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .x_desc("Prédictions")
        .y_desc("Valeurs réelles")
        .draw()
        .map_err(plot_err)?;

    chart
        .draw_series(points.iter().map(|&(p, a)| Circle::new((p, a), 2, GREEN.filled())))
        .map_err(plot_err)?;

    chart
        .draw_series(LineSeries::new(vec![(0.0, 0.0), (upper, upper)], &BLUE))
        .map_err(plot_err)?;

    root.present().map_err(plot_err)?;
    tracing::info!(path = %path.display(), points = points.len(), "scatter plot written");
    Ok(())
}

/// Loss and MAE over epochs, each scaled to its own maximum.
pub fn training_curve(history: &TrainingHistory, title: &str, path: &Path) -> Result<()> {
    let root = BitMapBackend::new(path, (800, 600)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    let max_epoch = (*history.epochs.last().unwrap_or(&1)).max(1) as u32;
    let max_loss = history.losses.iter().cloned().fold(f64::NAN, f64::max);
    let max_mae = history.maes.iter().cloned().fold(f64::NAN, f64::max);

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(40)
        .build_cartesian_2d(0u32..max_epoch, 0f64..1f64)
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .disable_y_mesh()
        .x_desc("Epoch")
        .y_desc("Value (scaled)")
        .draw()
        .map_err(plot_err)?;

    let loss_scale = 1.0 / max_loss;
    chart
        .draw_series(LineSeries::new(
            history.epochs.iter().zip(history.losses.iter()).map(|(&x, &y)| (x as u32, y * loss_scale)),
            &RED,
        ))
        .map_err(plot_err)?
        .label("MSE (scaled)")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &RED));

    let mae_scale = 1.0 / max_mae;
    chart
        .draw_series(LineSeries::new(
            history.epochs.iter().zip(history.maes.iter()).map(|(&x, &y)| (x as u32, y * mae_scale)),
            &BLUE,
        ))
        .map_err(plot_err)?
        .label("MAE (scaled)")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &BLUE));

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()
        .map_err(plot_err)?;

    root.present().map_err(plot_err)?;
    tracing::info!(path = %path.display(), "training curve written");
    Ok(())
}
