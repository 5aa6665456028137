//! Donut chart of the gender split.
//!
//! Drawing is split in two: [`donut_commands`] turns a [`SelectionStats`]
//! into a flat list of [`DrawCommand`]s without touching any surface, and
//! [`ChartSurface::render`] replaces whatever the surface held with that
//! list. Layout follows d3's `pie()` and `arc()` defaults so the ring looks
//! the same as the browser-drawn one.

use crate::config::ChartConfig;
use crate::stats::{round_percent, SelectionStats};
use serde::Serialize;
use std::f64::consts::{PI, TAU};
use std::fmt::Write;

const EPSILON: f64 = 1e-12;
const STROKE: &str = "white";
const STROKE_WIDTH: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DonutSlice {
    pub label: &'static str,
    pub value: f64,
}

/// The two slices, valued by the rounded percentages.
pub fn donut_slices(stats: &SelectionStats) -> [DonutSlice; 2] {
    [
        DonutSlice { label: "female", value: round_percent(stats.female_percent) },
        DonutSlice { label: "male", value: round_percent(stats.male_percent) },
    ]
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PieArc {
    pub start_angle: f64,
    pub end_angle: f64,
}

/// Angles for each value, in input order.
///
/// Angles start at 12 o'clock and run clockwise. Larger values are laid out
/// first. Non-positive and NaN values get a zero-width arc, and when nothing
/// is positive every arc is zero-width.
pub fn pie_layout(values: &[f64]) -> Vec<PieArc> {
    let sum: f64 = values.iter().filter(|v| **v > 0.0).sum();
    let k = if sum > 0.0 && sum.is_finite() { TAU / sum } else { 0.0 };

    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| {
        values[b]
            .partial_cmp(&values[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut arcs = vec![PieArc { start_angle: 0.0, end_angle: 0.0 }; values.len()];
    let mut angle = 0.0;
    for index in order {
        let value = values[index];
        let span = if value > 0.0 { value * k } else { 0.0 };
        arcs[index] = PieArc { start_angle: angle, end_angle: angle + span };
        angle += span;
    }
    arcs
}

/// SVG path data for an annular sector centred on the origin.
pub fn arc_path(arc: &PieArc, inner_radius: f64, outer_radius: f64) -> String {
    let (r0, r1) = if outer_radius < inner_radius {
        (outer_radius.max(0.0), inner_radius)
    } else {
        (inner_radius.max(0.0), outer_radius)
    };
    let (a0, a1) = (arc.start_angle, arc.end_angle);
    let span = (a1 - a0).abs();
    let mut d = String::new();

    if r1 <= EPSILON {
        d.push_str("M0,0Z");
        return d;
    }

    if span > TAU - EPSILON {
        // Full ring: an SVG arc cannot start and end on the same point,
        // so each circle is drawn as two half turns.
        let (x, y) = polar(r1, a0);
        let (hx, hy) = polar(r1, a0 + PI);
        let _ = write!(
            d,
            "M{},{}A{r},{r},0,1,1,{},{}A{r},{r},0,1,1,{},{}",
            num(x), num(y), num(hx), num(hy), num(x), num(y),
            r = num(r1)
        );
        if r0 > EPSILON {
            let (x, y) = polar(r0, a1);
            let (hx, hy) = polar(r0, a1 - PI);
            let _ = write!(
                d,
                "M{},{}A{r},{r},0,1,0,{},{}A{r},{r},0,1,0,{},{}",
                num(x), num(y), num(hx), num(hy), num(x), num(y),
                r = num(r0)
            );
        }
        d.push('Z');
        return d;
    }

    let large = if span > PI { 1 } else { 0 };
    let (ox0, oy0) = polar(r1, a0);
    let (ox1, oy1) = polar(r1, a1);
    let _ = write!(
        d,
        "M{},{}A{r},{r},0,{large},1,{},{}",
        num(ox0), num(oy0), num(ox1), num(oy1),
        r = num(r1)
    );
    if r0 > EPSILON {
        let (ix1, iy1) = polar(r0, a1);
        let (ix0, iy0) = polar(r0, a0);
        let _ = write!(
            d,
            "L{},{}A{r},{r},0,{large},0,{},{}",
            num(ix1), num(iy1), num(ix0), num(iy0),
            r = num(r0)
        );
    } else {
        d.push_str("L0,0");
    }
    d.push('Z');
    d
}

fn polar(radius: f64, angle: f64) -> (f64, f64) {
    (radius * angle.sin(), -radius * angle.cos())
}

fn num(value: f64) -> String {
    let rounded = (value * 1000.0).round() / 1000.0;
    // avoid "-0"
    let rounded = if rounded == 0.0 { 0.0 } else { rounded };
    format!("{}", rounded)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DrawCommand {
    Surface { width: f64, height: f64 },
    /// Moves the origin for every later command.
    Translate { x: f64, y: f64 },
    Path { key: String, d: String, fill: String, stroke: String, stroke_width: f64 },
    Text { text: String, anchor: String },
}

/// Everything needed to draw the donut for `stats`.
pub fn donut_commands(stats: &SelectionStats, config: &ChartConfig) -> Vec<DrawCommand> {
    let slices = donut_slices(stats);
    let values: Vec<f64> = slices.iter().map(|s| s.value).collect();
    let arcs = pie_layout(&values);

    let mut commands = Vec::with_capacity(slices.len() + 3);
    commands.push(DrawCommand::Surface { width: config.width, height: config.height });
    commands.push(DrawCommand::Translate { x: config.width / 2.0, y: config.height / 2.0 });

    for (i, (slice, arc)) in slices.iter().zip(&arcs).enumerate() {
        commands.push(DrawCommand::Path {
            key: slice.label.to_string(),
            d: arc_path(arc, config.inner_radius, config.outer_radius()),
            fill: config.palette[i % config.palette.len()].clone(),
            stroke: STROKE.to_string(),
            stroke_width: STROKE_WIDTH,
        });
    }

    commands.push(DrawCommand::Text {
        text: format!("{}%", round_percent(stats.female_percent)),
        anchor: "middle".to_string(),
    });
    commands
}

pub fn to_svg(commands: &[DrawCommand]) -> String {
    let mut svg = String::new();
    let mut open_groups = 0;
    let mut open_svg = false;

    for command in commands {
        match command {
            DrawCommand::Surface { width, height } => {
                let _ = write!(
                    svg,
                    r#"<svg xmlns="http://www.w3.org/2000/svg" width="{}" height="{}">"#,
                    num(*width),
                    num(*height)
                );
                open_svg = true;
            }
            DrawCommand::Translate { x, y } => {
                let _ = write!(svg, r#"<g transform="translate({},{})">"#, num(*x), num(*y));
                open_groups += 1;
            }
            DrawCommand::Path { key, d, fill, stroke, stroke_width } => {
                let _ = write!(
                    svg,
                    r#"<path class="{}" d="{}" fill="{}" stroke="{}" style="stroke-width: {}px"/>"#,
                    escape(key),
                    d,
                    escape(fill),
                    escape(stroke),
                    num(*stroke_width)
                );
            }
            DrawCommand::Text { text, anchor } => {
                let _ = write!(
                    svg,
                    r#"<text text-anchor="{}">{}</text>"#,
                    escape(anchor),
                    escape(text)
                );
            }
        }
    }

    for _ in 0..open_groups {
        svg.push_str("</g>");
    }
    if open_svg {
        svg.push_str("</svg>");
    }
    svg
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// The drawing area of the chart container. Rendering always wipes it
/// first, so it holds at most one chart.
#[derive(Debug, Default)]
pub struct ChartSurface {
    commands: Vec<DrawCommand>,
}

impl ChartSurface {
    pub fn render(&mut self, commands: Vec<DrawCommand>) {
        self.commands.clear();
        self.commands.extend(commands);
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn is_blank(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn to_svg(&self) -> Option<String> {
        if self.is_blank() {
            None
        } else {
            Some(to_svg(&self.commands))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn ohio_stats() -> SelectionStats {
        SelectionStats::from_counts(5800000.0, 5553140.0)
    }

    fn paths(commands: &[DrawCommand]) -> Vec<&DrawCommand> {
        commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::Path { .. }))
            .collect()
    }

    #[test]
    fn ohio_slices_and_label() {
        let stats = ohio_stats();
        let slices = donut_slices(&stats);
        assert_eq!(slices[0].value, 51.0);
        assert_eq!(slices[1].value, 49.0);
        assert_eq!(slices[0].value + slices[1].value, 100.0);

        let commands = donut_commands(&stats, &ChartConfig::default());
        assert_eq!(commands[0], DrawCommand::Surface { width: 300.0, height: 300.0 });
        assert_eq!(commands[1], DrawCommand::Translate { x: 150.0, y: 150.0 });
        assert_eq!(paths(&commands).len(), 2);
        assert_eq!(
            commands.last(),
            Some(&DrawCommand::Text { text: "51%".to_string(), anchor: "middle".to_string() })
        );

        match &commands[2] {
            DrawCommand::Path { key, fill, stroke, .. } => {
                assert_eq!(key, "female");
                assert_eq!(fill, "#0eede9");
                assert_eq!(stroke, "white");
            }
            other => panic!("unexpected command {other:?}"),
        }
        match &commands[3] {
            DrawCommand::Path { key, fill, .. } => {
                assert_eq!(key, "male");
                assert_eq!(fill, "#11fc92");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn pie_sorts_descending_but_keeps_input_order() {
        let arcs = pie_layout(&[25.0, 75.0]);
        assert_abs_diff_eq!(arcs[1].start_angle, 0.0);
        assert_abs_diff_eq!(arcs[1].end_angle, TAU * 0.75, epsilon = 1e-12);
        assert_abs_diff_eq!(arcs[0].start_angle, TAU * 0.75, epsilon = 1e-12);
        assert_abs_diff_eq!(arcs[0].end_angle, TAU, epsilon = 1e-12);
    }

    #[test]
    fn degenerate_values_give_zero_width_arcs() {
        for values in [[0.0, 0.0], [f64::NAN, f64::NAN]] {
            let arcs = pie_layout(&values);
            for arc in arcs {
                assert_eq!(arc.start_angle, 0.0);
                assert_eq!(arc.end_angle, 0.0);
            }
        }
    }

    #[test]
    fn zero_total_renders_without_panicking() {
        let stats = SelectionStats::from_counts(0.0, 0.0);
        let commands = donut_commands(&stats, &ChartConfig::default());
        assert_eq!(paths(&commands).len(), 2);
        assert_eq!(
            commands.last(),
            Some(&DrawCommand::Text { text: "NaN%".to_string(), anchor: "middle".to_string() })
        );
        let svg = to_svg(&commands);
        assert!(svg.contains("NaN%"));
        assert!(!svg.contains("NaN,"));
    }

    #[test]
    fn radii_are_swapped_when_hole_is_larger() {
        // 130 inner against 90 outer draws the ring between 90 and 130.
        let arc = PieArc { start_angle: 0.0, end_angle: PI / 2.0 };
        let d = arc_path(&arc, 130.0, 90.0);
        assert_eq!(d, "M0,-130A130,130,0,0,1,130,0L90,0A90,90,0,0,0,0,-90Z");
    }

    #[test]
    fn full_turn_is_two_half_arcs() {
        let arc = PieArc { start_angle: 0.0, end_angle: TAU };
        let d = arc_path(&arc, 50.0, 100.0);
        assert_eq!(d.matches('A').count(), 4);
        assert!(d.starts_with("M0,-100A100,100,0,1,1,0,100"));
    }

    #[test]
    fn surface_replaces_previous_chart() {
        let mut surface = ChartSurface::default();
        assert!(surface.to_svg().is_none());

        let commands = donut_commands(&ohio_stats(), &ChartConfig::default());
        surface.render(commands.clone());
        let first = surface.to_svg();
        surface.render(commands.clone());

        assert_eq!(surface.commands(), commands.as_slice());
        assert_eq!(surface.to_svg(), first);
        let svg = surface.to_svg().unwrap();
        assert_eq!(svg.matches("<svg").count(), 1);
        assert_eq!(svg.matches("<path").count(), 2);
        assert!(svg.ends_with("</text></g></svg>"));
    }
}
