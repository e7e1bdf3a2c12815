use crate::tasks::experiments::{
    baselines::{SandboxBaseline, latency_label},
    color::{FONT_SIZE, STROKE_WIDTH, get_color_for_index},
    data::{BreakdownTable, TidyTable, std_dev},
};
use anyhow::Result;
use log::debug;
use plotters::{
    coord::{CoordTranslate, Shift},
    prelude::*,
    style::text_anchor::{HPos, Pos, VPos},
};

type Root<'a> = DrawingArea<SVGBackend<'a>, Shift>;

/// 5.5x3 inches at 100 dpi.
pub const FIGURE_SIZE: (u32, u32) = (550, 300);
pub const BREAKDOWN_FIGURE_SIZE: (u32, u32) = (1000, 600);

static GRID_COLOR: RGBColor = RGBColor(176, 176, 176);
static DASH_PX: i32 = 4;
static CAPSIZE: f64 = 0.2;

static COLD_START_Y_MIN: f64 = 1e2;
static COLD_START_Y_MAX: f64 = 1e7;
static COLD_START_TICKS: [(f64, &str); 5] = [
    (1e3, "1ms"),
    (1e4, "10ms"),
    (1e5, "100ms"),
    (1e6, "1s"),
    (1e7, "10s"),
];

static DENSITY_Y_RANGE: (f64, f64) = (10.0, 10000.0);

/// Pixel bounds of a chart's plotting area.
#[derive(Debug)]
struct Frame {
    left: i32,
    right: i32,
    top: i32,
    bottom: i32,
}

impl Frame {
    fn of<CT: CoordTranslate>(area: &DrawingArea<SVGBackend<'_>, CT>) -> Frame {
        let (x_range, y_range) = area.get_pixel_range();
        Frame {
            left: x_range.start,
            right: x_range.end - 1,
            top: y_range.start,
            bottom: y_range.end - 1,
        }
    }
}

fn text_style(size: i32, pos: Pos) -> TextStyle<'static> {
    TextStyle::from(("sans-serif", size).into_font())
        .pos(pos)
        .color(&BLACK)
}

/// Formats a power of ten the way the density chart labels its axis: plain
/// digits up to 1000, superscript exponents above.
pub fn pow10_label(exp: i32) -> String {
    if (0..=3).contains(&exp) {
        return format!("{}", 10u64.pow(exp as u32));
    }

    let superscript: String = exp
        .to_string()
        .chars()
        .map(|c| match c {
            '-' => '⁻',
            '0' => '⁰',
            '1' => '¹',
            '2' => '²',
            '3' => '³',
            '4' => '⁴',
            '5' => '⁵',
            '6' => '⁶',
            '7' => '⁷',
            '8' => '⁸',
            _ => '⁹',
        })
        .collect();
    format!("10{superscript}")
}

/// Evenly spaced ticks from zero, with a 1/2/5 step.
pub fn linear_ticks(y_max: f64, target: usize) -> Vec<f64> {
    if y_max <= 0.0 {
        return vec![0.0];
    }

    let raw = y_max / target as f64;
    let mag = 10f64.powf(raw.log10().floor());
    let step = [1.0, 2.0, 5.0, 10.0]
        .iter()
        .map(|m| m * mag)
        .find(|s| *s >= raw)
        .unwrap_or(10.0 * mag);

    (0..)
        .map(|i| i as f64 * step)
        .take_while(|v| *v <= y_max)
        .collect()
}

/// Bar colors: a baseline keeps its own color, anything else takes the
/// palette color of its position.
fn bar_colors(labels: &[&str]) -> Result<Vec<RGBColor>> {
    labels
        .iter()
        .enumerate()
        .map(|(idx, label)| match SandboxBaseline::from_label(label) {
            Some(baseline) => baseline.get_color(),
            None => get_color_for_index(idx),
        })
        .collect()
}

fn draw_dashed_hline(root: &Root, y: i32, x_start: i32, x_end: i32) -> Result<()> {
    let mut x = x_start;
    while x < x_end {
        let end = (x + DASH_PX).min(x_end);
        root.draw(&PathElement::new(
            vec![(x, y), (end, y)],
            GRID_COLOR.stroke_width(1),
        ))?;
        x += 2 * DASH_PX;
    }

    Ok(())
}

/// Draws the left and bottom axes, the y ticks (with a dashed grid line each)
/// and the rotated y-axis description. `ticks` are pixel rows.
fn draw_axes(root: &Root, frame: &Frame, y_desc: &str, ticks: &[(i32, String)]) -> Result<()> {
    for (y, label) in ticks {
        if *y < frame.top || *y > frame.bottom {
            continue;
        }
        draw_dashed_hline(root, *y, frame.left, frame.right)?;
        root.draw(&PathElement::new(
            vec![(frame.left - 4, *y), (frame.left, *y)],
            BLACK,
        ))?;
        root.draw(&Text::new(
            label.clone(),
            (frame.left - 6, *y),
            text_style(FONT_SIZE - 2, Pos::new(HPos::Right, VPos::Center)),
        ))?;
    }

    root.draw(&PathElement::new(
        vec![(frame.left, frame.top), (frame.left, frame.bottom)],
        BLACK,
    ))?;
    root.draw(&PathElement::new(
        vec![(frame.left, frame.bottom), (frame.right, frame.bottom)],
        BLACK,
    ))?;

    root.draw(&Text::new(
        y_desc.to_string(),
        (12, (frame.top + frame.bottom) / 2),
        ("sans-serif", FONT_SIZE)
            .into_font()
            .transform(FontTransform::Rotate270)
            .color(&BLACK)
            .pos(Pos::new(HPos::Center, VPos::Center)),
    ))?;

    Ok(())
}

/// Writes each label under its bar, one text line per `\n`-separated line.
fn draw_x_labels(root: &Root, frame: &Frame, labels: &[(i32, &str)]) -> Result<()> {
    let line_height = FONT_SIZE + 2;
    for (x, label) in labels {
        for (line_idx, line) in label.split('\n').enumerate() {
            root.draw(&Text::new(
                line.to_string(),
                (*x, frame.bottom + 5 + line_idx as i32 * line_height),
                text_style(FONT_SIZE, Pos::new(HPos::Center, VPos::Top)),
            ))?;
        }
    }

    Ok(())
}

/// Mean cold-start latency per system on a log axis labeled in time units.
pub fn render_cold_start(table: &TidyTable) -> Result<String> {
    let labels = table.labels();
    let values = table.means();
    let colors = bar_colors(&labels)?;
    let y_min = COLD_START_Y_MIN;
    let y_max = values
        .iter()
        .map(|v| v * 2.0)
        .fold(COLD_START_Y_MAX, f64::max);
    let x_max = labels.len().max(1) as f64;

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, FIGURE_SIZE).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .x_label_area_size(45)
            .y_label_area_size(75)
            .margin(10)
            .build_cartesian_2d(0f64..x_max, (y_min..y_max).log_scale())?;

        let margin_px = 6;
        chart.draw_series((0..).zip(values.iter()).map(|(x, y)| {
            let mut bar = Rectangle::new(
                [(x as f64, y_min), (x as f64 + 1.0, (*y).max(y_min))],
                colors[x].filled(),
            );
            bar.set_margin(0, 0, margin_px, margin_px);
            bar
        }))?;

        let area = chart.plotting_area();
        let frame = Frame::of(area);
        let ticks: Vec<(i32, String)> = COLD_START_TICKS
            .iter()
            .filter(|(v, _)| *v >= y_min && *v <= y_max)
            .map(|(v, label)| (area.map_coordinate(&(0.0, *v)).1, label.to_string()))
            .collect();
        draw_axes(&root, &frame, "Cold Start", &ticks)?;

        let x_labels: Vec<(i32, &str)> = labels
            .iter()
            .enumerate()
            .map(|(x, label)| (area.map_coordinate(&(x as f64 + 0.5, y_min)).0, *label))
            .collect();
        draw_x_labels(&root, &frame, &x_labels)?;

        root.present()?;
    }
    debug!("rendered cold start chart ({} bars)", labels.len());

    Ok(svg)
}

/// Warm-start latency per system: mean bar with a standard deviation whisker.
pub fn render_warm_start(table: &TidyTable) -> Result<String> {
    let labels = table.labels();
    let values = table.means();
    let spreads: Vec<f64> = table.rows.iter().map(|(_, v)| std_dev(v)).collect();
    let colors = bar_colors(&labels)?;
    let top = values
        .iter()
        .zip(spreads.iter())
        .map(|(m, s)| m + s)
        .fold(0.0, f64::max);
    let y_max = if top > 0.0 { top * 1.1 } else { 1.0 };
    let x_max = labels.len().max(1) as f64;

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, FIGURE_SIZE).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .x_label_area_size(45)
            .y_label_area_size(75)
            .margin(10)
            .build_cartesian_2d(0f64..x_max, 0f64..y_max)?;

        let margin_px = 6;
        chart.draw_series((0..).zip(values.iter()).map(|(x, y)| {
            let mut bar = Rectangle::new(
                [(x as f64, 0.0), (x as f64 + 1.0, *y)],
                colors[x].filled(),
            );
            bar.set_margin(0, 0, margin_px, margin_px);
            bar
        }))?;

        // Whiskers with caps
        for (x, (m, s)) in values.iter().zip(spreads.iter()).enumerate() {
            let center = x as f64 + 0.5;
            let low = (m - s).max(0.0);
            let high = m + s;
            let style = BLACK.stroke_width(STROKE_WIDTH);
            chart.draw_series(
                [
                    vec![(center, low), (center, high)],
                    vec![(center - CAPSIZE / 2.0, low), (center + CAPSIZE / 2.0, low)],
                    vec![(center - CAPSIZE / 2.0, high), (center + CAPSIZE / 2.0, high)],
                ]
                .into_iter()
                .map(|points| PathElement::new(points, style)),
            )?;
        }

        let area = chart.plotting_area();
        let frame = Frame::of(area);
        let step_is_whole = linear_ticks(y_max, 5).get(1).is_none_or(|s| *s >= 1.0);
        let ticks: Vec<(i32, String)> = linear_ticks(y_max, 5)
            .into_iter()
            .map(|v| {
                let label = if step_is_whole {
                    format!("{v:.0}")
                } else {
                    format!("{v:.2}")
                };
                (area.map_coordinate(&(0.0, v)).1, label)
            })
            .collect();
        draw_axes(&root, &frame, "Warm Start (Microseconds)", &ticks)?;

        let x_labels: Vec<(i32, &str)> = labels
            .iter()
            .enumerate()
            .map(|(x, label)| (area.map_coordinate(&(x as f64 + 0.5, 0.0)).0, *label))
            .collect();
        draw_x_labels(&root, &frame, &x_labels)?;

        root.present()?;
    }
    debug!("rendered warm start chart ({} bars)", labels.len());

    Ok(svg)
}

/// Max instances per system on a fixed log axis, every bar in one color.
pub fn render_density(table: &TidyTable) -> Result<String> {
    let labels = table.labels();
    let values = table.means();
    let color = get_color_for_index(0)?;
    let (y_min, y_max) = DENSITY_Y_RANGE;
    let x_max = labels.len().max(1) as f64;

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, FIGURE_SIZE).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .x_label_area_size(45)
            .y_label_area_size(75)
            .margin(10)
            .build_cartesian_2d(0f64..x_max, (y_min..y_max).log_scale())?;

        let margin_px = 6;
        chart.draw_series((0..).zip(values.iter()).map(|(x, y)| {
            let mut bar = Rectangle::new(
                [(x as f64, y_min), (x as f64 + 1.0, (*y).clamp(y_min, y_max))],
                color.filled(),
            );
            bar.set_margin(0, 0, margin_px, margin_px);
            bar
        }))?;

        let area = chart.plotting_area();
        let frame = Frame::of(area);
        let ticks: Vec<(i32, String)> = (1..=5)
            .map(|exp| (10f64.powi(exp), pow10_label(exp)))
            .filter(|(v, _)| *v >= y_min && *v <= y_max)
            .map(|(v, label)| (area.map_coordinate(&(0.0, v)).1, label))
            .collect();
        draw_axes(&root, &frame, "Max Number of Instances", &ticks)?;

        let x_labels: Vec<(i32, &str)> = labels
            .iter()
            .enumerate()
            .map(|(x, label)| (area.map_coordinate(&(x as f64 + 0.5, y_min)).0, *label))
            .collect();
        draw_x_labels(&root, &frame, &x_labels)?;

        root.present()?;
    }
    debug!("rendered density chart ({} bars)", labels.len());

    Ok(svg)
}

/// Mean latency of every op type, grouped by system, on a log axis.
pub fn render_latency_breakdown(table: &BreakdownTable) -> Result<String> {
    let num_ops = table.op_types.len().max(1);
    let colors: Vec<RGBColor> = (0..num_ops)
        .map(get_color_for_index)
        .collect::<Result<_>>()?;
    let present: Vec<f64> = table
        .values
        .iter()
        .flatten()
        .flatten()
        .copied()
        .filter(|v| *v > 0.0)
        .collect();
    let min_exp = present
        .iter()
        .map(|v| v.log10().floor() as i32)
        .min()
        .unwrap_or(0);
    let max_exp = present
        .iter()
        .map(|v| v.log10().ceil() as i32)
        .max()
        .unwrap_or(1)
        .max(min_exp + 1);
    let y_min = 10f64.powi(min_exp);
    let y_max = 10f64.powi(max_exp);
    let x_max = table.systems.len().max(1) as f64;
    let bar_width = 0.8 / num_ops as f64;

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, BREAKDOWN_FIGURE_SIZE).into_drawing_area();
        root.fill(&WHITE)?;

        root.draw(&Text::new(
            "Latency Microseconds by System and Operation Type",
            (BREAKDOWN_FIGURE_SIZE.0 as i32 / 2, 8),
            text_style(FONT_SIZE + 4, Pos::new(HPos::Center, VPos::Top)),
        ))?;

        // Legend above the chart
        for (op_idx, op_type) in table.op_types.iter().enumerate() {
            let x_pos = 90 + op_idx as i32 * 180;
            let y_pos = 40;
            root.draw(&Rectangle::new(
                [(x_pos, y_pos), (x_pos + 20, y_pos + 20)],
                colors[op_idx].filled(),
            ))?;
            root.draw(&Rectangle::new(
                [(x_pos, y_pos), (x_pos + 20, y_pos + 20)],
                BLACK.stroke_width(1),
            ))?;
            root.draw(&Text::new(
                op_type.clone(),
                (x_pos + 30, y_pos + 10),
                text_style(FONT_SIZE - 2, Pos::new(HPos::Left, VPos::Center)),
            ))?;
        }

        let mut chart = ChartBuilder::on(&root)
            .x_label_area_size(70)
            .y_label_area_size(90)
            .margin(10)
            .margin_top(75)
            .build_cartesian_2d(0f64..x_max, (y_min..y_max).log_scale())?;

        for (system_idx, system_values) in table.values.iter().enumerate() {
            chart.draw_series(system_values.iter().enumerate().filter_map(|(op_idx, value)| {
                let value = (*value)?;
                let x_start = system_idx as f64 + 0.1 + op_idx as f64 * bar_width;
                let mut bar = Rectangle::new(
                    [(x_start, y_min), (x_start + bar_width, value.max(y_min))],
                    colors[op_idx].filled(),
                );
                bar.set_margin(0, 0, 1, 1);
                Some(bar)
            }))?;
        }

        let area = chart.plotting_area();
        let frame = Frame::of(area);
        let ticks: Vec<(i32, String)> = (min_exp..=max_exp)
            .map(|exp| (area.map_coordinate(&(0.0, 10f64.powi(exp))).1, pow10_label(exp)))
            .collect();
        draw_axes(&root, &frame, "Latency (Microseconds)", &ticks)?;

        let system_labels: Vec<String> = table.systems.iter().map(|s| latency_label(s)).collect();
        let x_labels: Vec<(i32, &str)> = system_labels
            .iter()
            .enumerate()
            .map(|(x, label)| {
                (
                    area.map_coordinate(&(x as f64 + 0.5, y_min)).0,
                    label.as_str(),
                )
            })
            .collect();
        draw_x_labels(&root, &frame, &x_labels)?;

        root.draw(&Text::new(
            "System",
            ((frame.left + frame.right) / 2, frame.bottom + 50),
            text_style(FONT_SIZE, Pos::new(HPos::Center, VPos::Top)),
        ))?;

        root.present()?;
    }
    debug!(
        "rendered latency breakdown chart ({} systems, {} op types)",
        table.systems.len(),
        table.op_types.len()
    );

    Ok(svg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pow10_label() {
        assert_eq!(pow10_label(1), "10");
        assert_eq!(pow10_label(3), "1000");
        assert_eq!(pow10_label(4), "10⁴");
        assert_eq!(pow10_label(12), "10¹²");
        assert_eq!(pow10_label(-2), "10⁻²");
    }

    #[test]
    fn test_linear_ticks() {
        assert_eq!(linear_ticks(110.0, 5), vec![0.0, 50.0, 100.0]);
        assert_eq!(linear_ticks(10.0, 5), vec![0.0, 2.0, 4.0, 6.0, 8.0, 10.0]);
        assert_eq!(linear_ticks(0.0, 5), vec![0.0]);
    }

    #[test]
    fn test_snapshot_renders_on_two_lines() {
        let table = TidyTable {
            rows: vec![
                ("Firecracker\nSnapshot".to_string(), vec![2500.0]),
                ("Process".to_string(), vec![900.0]),
            ],
        };
        let svg = render_cold_start(&table).unwrap();
        assert!(svg.contains("Snapshot"));
        assert!(!svg.contains("Firecracker\nSnapshot"));
        assert!(svg.contains("100ms"));
        assert!(svg.contains("Cold Start"));
    }

    #[test]
    fn test_density_renders_qemu_suffix() {
        let table = TidyTable {
            rows: vec![("Unikraft\n+ QEMU".to_string(), vec![120.0])],
        };
        let svg = render_density(&table).unwrap();
        assert!(svg.contains("+ QEMU"));
        assert!(!svg.contains("Unikraft\n+ QEMU"));
        assert!(svg.contains("10⁴"));
    }
}
