//! SVG diagnostics written next to the artifact bundle

use crate::training::evaluate::{ConfusionMatrix, RankedFeature, CLASS_NAMES};
use anyhow::Result;
use plotters::prelude::*;
use std::path::Path;

pub const CONFUSION_MATRIX_FILE: &str = "confusion_matrix.svg";
pub const FEATURE_IMPORTANCE_FILE: &str = "feature_importance.svg";

/// Heatmap of the confusion matrix with the count in every cell
pub fn render_confusion_matrix(path: &Path, matrix: &ConfusionMatrix) -> Result<()> {
    let root = SVGBackend::new(path, (640, 560)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Confusion Matrix", ("sans-serif", 22).into_font())
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(90)
        .build_cartesian_2d((0i32..2).into_segmented(), (0i32..2).into_segmented())?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_desc("Predicted")
        .y_desc("Actual")
        .x_label_formatter(&|v| class_label(v, false))
        .y_label_formatter(&|v| class_label(v, true))
        .draw()?;

    let peak = matrix.counts.iter().flatten().copied().max().unwrap_or(0).max(1) as f64;

    for actual in 0..2i32 {
        for predicted in 0..2i32 {
            let count = matrix.get(actual as u8, predicted as u8);
            let shade = heat(count as f64 / peak);
            // Actual class 0 sits on the top row
            let row = 1 - actual;

            chart.draw_series(std::iter::once(Rectangle::new(
                [
                    (SegmentValue::Exact(predicted), SegmentValue::Exact(row)),
                    (SegmentValue::Exact(predicted + 1), SegmentValue::Exact(row + 1)),
                ],
                shade.filled(),
            )))?;

            let ink = if count as f64 / peak > 0.5 { WHITE } else { BLACK };
            chart.draw_series(std::iter::once(Text::new(
                count.to_string(),
                (SegmentValue::CenterOf(predicted), SegmentValue::CenterOf(row)),
                ("sans-serif", 28).into_font().color(&ink),
            )))?;
        }
    }

    root.present()?;
    Ok(())
}

/// Horizontal bar chart of the ranked features, most important on top
pub fn render_feature_importance(path: &Path, ranked: &[RankedFeature]) -> Result<()> {
    let n = ranked.len().max(1) as i32;
    let height = 120 + 36 * n as u32;
    let root = SVGBackend::new(path, (900, height)).into_drawing_area();
    root.fill(&WHITE)?;

    let max_importance = ranked
        .iter()
        .map(|f| f.importance)
        .fold(0.0f64, f64::max)
        .max(f64::EPSILON)
        * 1.1;

    let names: Vec<&str> = ranked.iter().map(|f| f.name.as_str()).collect();
    let label = |v: &SegmentValue<i32>| match v {
        SegmentValue::CenterOf(i) => names
            .get((n - 1 - *i) as usize)
            .map(|s| s.to_string())
            .unwrap_or_default(),
        _ => String::new(),
    };

    let mut chart = ChartBuilder::on(&root)
        .caption(
            format!("Top {} Feature Importances", ranked.len()),
            ("sans-serif", 22).into_font(),
        )
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(220)
        .build_cartesian_2d(0f64..max_importance, (0i32..n).into_segmented())?;

    chart
        .configure_mesh()
        .disable_y_mesh()
        .y_labels(n as usize)
        .y_label_formatter(&label)
        .x_desc("Importance")
        .draw()?;

    chart.draw_series(ranked.iter().enumerate().map(|(rank, feature)| {
        let slot = n - 1 - rank as i32;
        Rectangle::new(
            [
                (0.0, SegmentValue::Exact(slot)),
                (feature.importance, SegmentValue::Exact(slot + 1)),
            ],
            BLUE.mix(0.7).filled(),
        )
    }))?;

    root.present()?;
    Ok(())
}

fn class_label(value: &SegmentValue<i32>, flipped: bool) -> String {
    match value {
        SegmentValue::CenterOf(i) => {
            let class = if flipped { 1 - *i } else { *i };
            CLASS_NAMES
                .get(class as usize)
                .map(|s| s.to_string())
                .unwrap_or_default()
        }
        _ => String::new(),
    }
}

/// White-to-blue ramp for `intensity` in [0, 1]
fn heat(intensity: f64) -> RGBColor {
    let t = intensity.clamp(0.0, 1.0);
    let channel = |from: f64, to: f64| (from + (to - from) * t).round() as u8;
    RGBColor(channel(247.0, 8.0), channel(251.0, 48.0), channel(255.0, 107.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confusion_matrix_svg_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFUSION_MATRIX_FILE);
        let matrix = ConfusionMatrix {
            counts: [[40, 3], [5, 22]],
        };

        render_confusion_matrix(&path, &matrix).unwrap();

        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("22"));
    }

    #[test]
    fn test_feature_importance_svg_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(FEATURE_IMPORTANCE_FILE);
        let ranked = vec![
            RankedFeature {
                name: "GFR".to_string(),
                importance: 0.4,
            },
            RankedFeature {
                name: "SerumCreatinine".to_string(),
                importance: 0.2,
            },
        ];

        render_feature_importance(&path, &ranked).unwrap();

        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.contains("GFR"));
    }

    #[test]
    fn test_heat_ramp_endpoints() {
        assert_eq!(heat(0.0), RGBColor(247, 251, 255));
        assert_eq!(heat(1.0), RGBColor(8, 48, 107));
    }
}
