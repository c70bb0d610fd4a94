#![cfg(feature = "web")]
use crate::aggregate::{AgeGenderTable, Aggregates, RateMeans, VehicleCounts};
use crate::error::{DashboardError, Result};
use crate::record::Metric;
use log::debug;
use plotters::coord::Shift;
use plotters::element::Pie;
use plotters::prelude::*;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;

const FONT_FAMILY: &str = "sans-serif";

/// Colour sets the charts draw from, in series order
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Palette {
    #[default]
    Classic,
    Pastel,
    Muted,
}

impl Palette {
    pub fn colors(&self) -> Vec<RGBColor> {
        match self {
            Palette::Classic => vec![
                RGBColor(31, 119, 180),
                RGBColor(214, 39, 40),
                RGBColor(255, 127, 14),
                RGBColor(44, 160, 44),
                RGBColor(148, 103, 189),
                RGBColor(140, 86, 75),
                RGBColor(227, 119, 194),
                RGBColor(127, 127, 127),
            ],
            Palette::Pastel => vec![
                RGBColor(161, 201, 244),
                RGBColor(255, 159, 155),
                RGBColor(255, 180, 130),
                RGBColor(141, 229, 161),
                RGBColor(208, 187, 255),
                RGBColor(222, 187, 155),
                RGBColor(250, 176, 228),
                RGBColor(207, 207, 207),
            ],
            Palette::Muted => vec![
                RGBColor(72, 120, 208),
                RGBColor(214, 95, 95),
                RGBColor(238, 133, 74),
                RGBColor(106, 204, 100),
                RGBColor(149, 108, 180),
                RGBColor(140, 97, 60),
                RGBColor(220, 126, 192),
                RGBColor(121, 121, 121),
            ],
        }
    }

    fn color(&self, index: usize) -> RGBColor {
        let colors = self.colors();
        colors[index % colors.len()]
    }
}

/// Corner of each chart where the series legend is drawn
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LegendPosition {
    UpperLeft,
    #[default]
    UpperRight,
    LowerLeft,
    LowerRight,
}

impl From<LegendPosition> for SeriesLabelPosition {
    fn from(pos: LegendPosition) -> Self {
        match pos {
            LegendPosition::UpperLeft => SeriesLabelPosition::UpperLeft,
            LegendPosition::UpperRight => SeriesLabelPosition::UpperRight,
            LegendPosition::LowerLeft => SeriesLabelPosition::LowerLeft,
            LegendPosition::LowerRight => SeriesLabelPosition::LowerRight,
        }
    }
}

/// Cosmetic options for the dashboard figure
#[derive(Clone, Debug)]
pub struct ChartStyle {
    /// Width of the whole 2×2 figure in pixels
    pub width: u32,

    /// Height of the whole 2×2 figure in pixels
    pub height: u32,

    /// Base font size; captions are drawn a little larger
    pub font_size: u32,

    pub palette: Palette,

    pub legend: LegendPosition,
}

impl Default for ChartStyle {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 900,
            font_size: 14,
            palette: Palette::Classic,
            legend: LegendPosition::UpperRight,
        }
    }
}

impl ChartStyle {
    fn font(&self) -> FontDesc<'static> {
        (FONT_FAMILY, f64::from(self.font_size)).into_font()
    }

    fn caption_font(&self) -> FontDesc<'static> {
        (FONT_FAMILY, f64::from(self.font_size) * 1.4).into_font()
    }
}

/// Draw the four charts into one 2×2 PNG
///
/// Top-left: stacked bar of mean rates by gender. Top-right: mean rates by
/// year. Bottom-left: vehicle type shares. Bottom-right: mean rates by age
/// group, one bar per gender and metric.
///
/// # Returns
/// * PNG bytes of the whole figure
pub fn render_dashboard(aggregates: &Aggregates, style: &ChartStyle) -> Result<Vec<u8>> {
    let started = Instant::now();
    let (width, height) = (style.width, style.height);
    if width == 0 || height == 0 {
        return Err(DashboardError::Render("figure size must be non-zero".to_string()));
    }

    let mut buffer = vec![0u8; width as usize * height as usize * 3];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
        draw_dashboard(&root, aggregates, style)?;
        root.present()?;
    }

    let png = encode_png(buffer, width, height)?;
    debug!(
        "rendered {}x{} dashboard ({} bytes) in {:?}",
        width,
        height,
        png.len(),
        started.elapsed()
    );
    Ok(png)
}

/// Render the dashboard and write it to `path`
pub fn save_dashboard(
    aggregates: &Aggregates,
    style: &ChartStyle,
    path: impl AsRef<Path>,
) -> Result<()> {
    let png = render_dashboard(aggregates, style)?;
    std::fs::write(path, png)?;
    Ok(())
}

fn draw_dashboard<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    aggregates: &Aggregates,
    style: &ChartStyle,
) -> Result<()> {
    root.fill(&WHITE)?;
    let panels = root.split_evenly((2, 2));

    draw_gender_bars(&panels[0], &aggregates.gender, style)?;
    draw_yearly_lines(&panels[1], &aggregates.yearly, style)?;
    draw_vehicle_pie(&panels[2], &aggregates.vehicles, style)?;
    draw_age_gender_bars(&panels[3], &aggregates.age_gender, style)?;
    Ok(())
}

fn draw_gender_bars<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    gender: &BTreeMap<String, RateMeans>,
    style: &ChartStyle,
) -> Result<()> {
    let names: Vec<&str> = gender.keys().map(String::as_str).collect();
    let tallest = gender
        .values()
        .map(|m| m.injury.unwrap_or(0.0) + m.death.unwrap_or(0.0))
        .fold(0.0, f64::max);

    let mut chart = ChartBuilder::on(area)
        .caption("Average Rates by Gender", style.caption_font())
        .margin(10)
        .x_label_area_size(35)
        .y_label_area_size(50)
        .build_cartesian_2d(-0.5..(names.len() as f64 - 0.5), 0.0..value_ceiling(tallest))?;

    let label = |x: &f64| category_label(&names, *x);
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(names.len())
        .x_label_formatter(&label)
        .y_desc("Rate per 100k")
        .label_style(style.font())
        .draw()?;

    // Injury is the bottom segment, death sits on top of it
    let half = 0.35;
    let injury_color = style.palette.color(0);
    let death_color = style.palette.color(1);

    chart
        .draw_series(gender.values().enumerate().filter_map(|(i, m)| {
            let x = i as f64;
            m.injury
                .map(|v| Rectangle::new([(x - half, 0.0), (x + half, v)], injury_color.filled()))
        }))?
        .label("Injury")
        .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], injury_color.filled()));

    chart
        .draw_series(gender.values().enumerate().filter_map(|(i, m)| {
            let x = i as f64;
            let base = m.injury.unwrap_or(0.0);
            m.death.map(|v| {
                Rectangle::new([(x - half, base), (x + half, base + v)], death_color.filled())
            })
        }))?
        .label("Death")
        .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], death_color.filled()));

    chart
        .configure_series_labels()
        .position(style.legend.into())
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .label_font(style.font())
        .draw()?;

    Ok(())
}

fn draw_yearly_lines<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    yearly: &BTreeMap<i32, RateMeans>,
    style: &ChartStyle,
) -> Result<()> {
    let years: Vec<i32> = yearly.keys().copied().collect();
    let (first, last) = year_span(&years);
    let highest = yearly
        .values()
        .flat_map(|m| [m.death, m.injury])
        .flatten()
        .fold(0.0, f64::max);

    let mut chart = ChartBuilder::on(area)
        .caption("Yearly Trends", style.caption_font())
        .margin(10)
        .x_label_area_size(35)
        .y_label_area_size(50)
        .build_cartesian_2d(first..last, 0.0..value_ceiling(highest))?;

    chart
        .configure_mesh()
        .x_labels((last - first + 1).clamp(2, 12) as usize)
        .x_desc("Year")
        .y_desc("Rate per 100k")
        .label_style(style.font())
        .draw()?;

    for (i, metric) in Metric::ALL.iter().enumerate() {
        let color = style.palette.color(i);
        let points: Vec<(i32, f64)> = yearly
            .iter()
            .filter_map(|(&year, m)| m.get(*metric).map(|v| (year, v)))
            .collect();

        chart
            .draw_series(LineSeries::new(points.iter().copied(), color.stroke_width(2)))?
            .label(metric.label())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));

        chart.draw_series(
            points
                .iter()
                .map(|&(year, v)| Circle::new((year, v), 4, color.filled())),
        )?;
    }

    chart
        .configure_series_labels()
        .position(style.legend.into())
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .label_font(style.font())
        .draw()?;

    Ok(())
}

fn draw_vehicle_pie<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    vehicles: &VehicleCounts,
    style: &ChartStyle,
) -> Result<()> {
    let area = area.titled("Vehicle Type Distribution", style.caption_font())?;
    if vehicles.total() == 0 {
        return Ok(());
    }

    let (w, h) = area.dim_in_pixel();
    let center = (w as i32 / 2, h as i32 / 2);
    let radius = f64::from(w.min(h)) * 0.35;

    let sizes: Vec<f64> = vehicles.entries.iter().map(|e| e.count as f64).collect();
    let colors: Vec<RGBColor> = (0..sizes.len()).map(|i| style.palette.color(i)).collect();
    let labels: Vec<&str> = vehicles
        .entries
        .iter()
        .map(|e| e.vehicle_type.as_str())
        .collect();

    let mut pie = Pie::new(&center, &radius, &sizes, &colors, &labels);
    pie.start_angle(90.0);
    pie.label_style(style.font());
    pie.percentages(style.font().color(&BLACK));
    area.draw(&pie)?;

    Ok(())
}

fn draw_age_gender_bars<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    table: &AgeGenderTable,
    style: &ChartStyle,
) -> Result<()> {
    let ages: Vec<&str> = table.rows.iter().map(|r| r.age_group.as_str()).collect();
    let columns = table.columns();
    let highest = table
        .rows
        .iter()
        .flat_map(|row| row.by_gender.values())
        .flat_map(|m| [m.death, m.injury])
        .flatten()
        .fold(0.0, f64::max);

    let mut chart = ChartBuilder::on(area)
        .caption("Average Rates by Age Group and Gender", style.caption_font())
        .margin(10)
        .x_label_area_size(35)
        .y_label_area_size(50)
        .build_cartesian_2d(-0.5..(ages.len() as f64 - 0.5), 0.0..value_ceiling(highest))?;

    let label = |x: &f64| category_label(&ages, *x);
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(ages.len())
        .x_label_formatter(&label)
        .x_desc("Age Group")
        .y_desc("Rate per 100k")
        .label_style(style.font())
        .draw()?;

    let (bar_width, offsets) = cluster_offsets(columns.len());
    for (j, (&(metric, gender), offset)) in columns.iter().zip(offsets).enumerate() {
        let color = style.palette.color(j);
        chart
            .draw_series(table.rows.iter().enumerate().filter_map(|(i, row)| {
                let left = i as f64 + offset - bar_width / 2.0;
                row.by_gender
                    .get(gender)
                    .and_then(|m| m.get(metric))
                    .map(|v| Rectangle::new([(left, 0.0), (left + bar_width, v)], color.filled()))
            }))?
            .label(format!("{}-{}", metric.label(), gender))
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
    }

    chart
        .configure_series_labels()
        .position(style.legend.into())
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .label_font(style.font())
        .draw()?;

    Ok(())
}

/// Upper bound of a value axis: 10% headroom above the tallest value
fn value_ceiling(max: f64) -> f64 {
    if max.is_finite() && max > 0.0 {
        max * 1.1
    } else {
        1.0
    }
}

/// Year axis bounds; a single year is padded so the axis has width
fn year_span(years: &[i32]) -> (i32, i32) {
    match (years.iter().min(), years.iter().max()) {
        (Some(&lo), Some(&hi)) if lo < hi => (lo, hi),
        (Some(&year), _) => (year - 1, year + 1),
        _ => (0, 1),
    }
}

/// Bar width and per-bar centre offsets for `bars` bars sharing one cluster
///
/// A cluster spans 0.8 of a category slot, centred on the category.
fn cluster_offsets(bars: usize) -> (f64, Vec<f64>) {
    if bars == 0 {
        return (0.0, Vec::new());
    }
    let width = 0.8 / bars as f64;
    let offsets = (0..bars)
        .map(|j| -0.4 + width * (j as f64 + 0.5))
        .collect();
    (width, offsets)
}

/// Category name for an axis tick; ticks between categories stay blank
fn category_label(names: &[&str], x: f64) -> String {
    let nearest = x.round();
    if (x - nearest).abs() > 1e-6 || nearest < 0.0 {
        return String::new();
    }
    names
        .get(nearest as usize)
        .map(|s| s.to_string())
        .unwrap_or_default()
}

fn encode_png(buffer: Vec<u8>, width: u32, height: u32) -> Result<Vec<u8>> {
    let img = image::RgbImage::from_raw(width, height, buffer)
        .ok_or_else(|| DashboardError::Render("bitmap buffer size mismatch".to_string()))?;
    let mut out = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img).write_to(&mut out, image::ImageOutputFormat::Png)?;
    Ok(out.into_inner())
}
