use plotters::{coord::ranged1d::SegmentValue, prelude::*};
use shared::protocol::UsageStats;
use tracing::warn;

use crate::error::Result;

pub const SERIES_LABEL: &str = "Distance";
pub const CHART_HEIGHT: u32 = 180;
/// Raw distances are reported in thousands.
const VALUE_SCALE: f64 = 1000.0;

pub const MIN_SVG_WIDTH: u32 = 200;
const MAX_X_LABELS: usize = 12;
const BAR_COLOR: RGBColor = RGBColor(0x1f, 0x77, 0xb4);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatPeriod {
    Day,
    Month,
    Year,
}

impl StatPeriod {
    pub const ALL: [StatPeriod; 3] = [StatPeriod::Day, StatPeriod::Month, StatPeriod::Year];

    /// Element id of the chart on the statistics page.
    pub fn chart_id(self) -> &'static str {
        match self {
            Self::Day => "statdistday",
            Self::Month => "statdistmonth",
            Self::Year => "statdistyear",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::Day => "Distance per day",
            Self::Month => "Distance per month",
            Self::Year => "Distance per year",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UsageHistogram {
    pub period: StatPeriod,
    pub series_label: &'static str,
    pub categories: Vec<String>,
    pub values: Vec<f64>,
}

impl UsageHistogram {
    pub fn from_stats(stats: &UsageStats, period: StatPeriod) -> Self {
        let (labels, distances) = match period {
            StatPeriod::Day => (&stats.days, &stats.distdays),
            StatPeriod::Month => (&stats.months, &stats.distmonths),
            StatPeriod::Year => (&stats.years, &stats.distyears),
        };
        if labels.len() != distances.len() {
            warn!(
                chart = period.chart_id(),
                labels = labels.len(),
                values = distances.len(),
                "statistics labels and values differ in length; extra entries dropped"
            );
        }
        let (categories, values) = labels
            .iter()
            .zip(distances)
            .map(|(label, distance)| (label.clone(), distance / VALUE_SCALE))
            .unzip();
        Self {
            period,
            series_label: SERIES_LABEL,
            categories,
            values,
        }
    }

    pub fn all(stats: &UsageStats) -> Vec<Self> {
        StatPeriod::ALL
            .iter()
            .map(|period| Self::from_stats(stats, *period))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn max_value(&self) -> f64 {
        self.values.iter().copied().fold(0.0, f64::max)
    }

    /// Bar chart, one bar per category, `CHART_HEIGHT` pixels high. Widths
    /// below `MIN_SVG_WIDTH` are raised to it.
    pub fn to_svg(&self, width: u32) -> Result<String> {
        let mut svg = String::new();
        {
            let root = SVGBackend::with_string(&mut svg, (width.max(MIN_SVG_WIDTH), CHART_HEIGHT))
                .into_drawing_area();
            root.fill(&WHITE)?;

            let bins = self.values.len().max(1) as u32;
            let y_max = (self.max_value() * 1.1).max(1.0);
            let categories = &self.categories;
            let mut chart = ChartBuilder::on(&root)
                .caption(
                    format!("{} ({})", self.period.title(), self.series_label),
                    ("sans-serif", 14),
                )
                .margin(5)
                .x_label_area_size(24)
                .y_label_area_size(44)
                .build_cartesian_2d((0u32..bins).into_segmented(), 0f64..y_max)?;

            chart
                .configure_mesh()
                .disable_x_mesh()
                .x_labels(categories.len().clamp(1, MAX_X_LABELS))
                .x_label_formatter(&|segment| match segment {
                    SegmentValue::Exact(index) | SegmentValue::CenterOf(index) => categories
                        .get(*index as usize)
                        .cloned()
                        .unwrap_or_default(),
                    SegmentValue::Last => String::new(),
                })
                .y_desc(self.series_label)
                .draw()?;

            chart.draw_series(
                Histogram::vertical(&chart)
                    .style(BAR_COLOR.filled())
                    .margin(2)
                    .data(
                        self.values
                            .iter()
                            .enumerate()
                            .map(|(index, value)| (index as u32, *value)),
                    ),
            )?;
            root.present()?;
        }
        Ok(svg)
    }

    /// Horizontal bars for a terminal, `width` characters for the longest one.
    pub fn to_text(&self, width: usize) -> String {
        let mut out = format!("{} ({})\n", self.period.title(), self.series_label);
        if self.is_empty() {
            out.push_str("  (no data)\n");
            return out;
        }
        let max = self.max_value();
        let label_width = self.categories.iter().map(|c| c.chars().count()).max().unwrap_or(0);
        for (category, value) in self.categories.iter().zip(&self.values) {
            let len = if max > 0.0 {
                (value / max * width as f64).round() as usize
            } else {
                0
            };
            out.push_str(&format!(
                "  {category:>label_width$} | {} {}\n",
                "#".repeat(len),
                format_value(*value)
            ));
        }
        out
    }
}

fn format_value(value: f64) -> String {
    let rounded = (value * 1000.0).round() / 1000.0;
    if rounded.fract() == 0.0 {
        format!("{rounded:.0}")
    } else {
        rounded.to_string()
    }
}
