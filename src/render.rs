//! Rendering of composed dv/v panels.
//!
//! Drawing goes through an explicit [`Panel`] handle returned by
//! [`Renderer::create_panel`]. [`FigureRenderer`] collects everything into a
//! serialisable [`Figure`] that can be saved as JSON or long-format CSV.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use csv::WriterBuilder;
use serde::Serialize;
use std::fs::File;
use std::path::Path;
use tracing::{debug, info};

use crate::composer::types::Composition;

pub const Y_LABEL: &str = "dv/v (%)";
pub const X_TICK_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Handle to one panel of a figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Panel {
    slot: usize,
}

pub trait Renderer {
    fn create_panel(&mut self, index: usize, title: &str) -> Panel;
    fn draw_line(&mut self, panel: &Panel, label: &str, dates: &[NaiveDateTime], values: &[f64]);
    fn set_x_range(&mut self, panel: &Panel, left: NaiveDateTime, right: NaiveDateTime);
    fn finish(&mut self, title: &str);
}

/// Draws every panel of `composition` in order.
pub fn render<R: Renderer>(composition: &Composition, renderer: &mut R) {
    for series in &composition.panels {
        let panel = renderer.create_panel(series.index, &series.title);
        for line in &series.lines {
            renderer.draw_line(&panel, &line.label, &line.dates, &line.values);
        }
        if let Some((left, right)) = series.x_range {
            renderer.set_x_range(&panel, left, right);
        }
    }
    renderer.finish(&composition.title);
}

#[derive(Debug, Clone, Serialize)]
pub struct FigureLine {
    pub label: String,
    pub dates: Vec<NaiveDateTime>,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FigurePanel {
    pub index: usize,
    pub title: String,
    pub y_label: &'static str,
    pub x_range: Option<(NaiveDateTime, NaiveDateTime)>,
    pub lines: Vec<FigureLine>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Figure {
    pub title: String,
    pub panels: Vec<FigurePanel>,
}

/// One CSV row of a saved figure.
#[derive(Serialize)]
struct FigureRow<'a> {
    panel: usize,
    panel_title: &'a str,
    label: &'a str,
    date: String,
    dvv: f64,
}

#[derive(Debug, Default)]
pub struct FigureRenderer {
    figure: Figure,
}

impl FigureRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn figure(&self) -> &Figure {
        &self.figure
    }

    /// Writes the figure to `path`: JSON for a `.json` extension, CSV otherwise.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;

        if path.extension().and_then(|e| e.to_str()) == Some("json") {
            serde_json::to_writer_pretty(file, &self.figure)?;
        } else {
            let mut writer = WriterBuilder::new().from_writer(file);
            for panel in &self.figure.panels {
                for line in &panel.lines {
                    for (date, value) in line.dates.iter().zip(&line.values) {
                        writer.serialize(FigureRow {
                            panel: panel.index,
                            panel_title: &panel.title,
                            label: &line.label,
                            date: date.format(X_TICK_FORMAT).to_string(),
                            dvv: *value,
                        })?;
                    }
                }
            }
            writer.flush()?;
        }

        info!(path = %path.display(), "Figure written");
        Ok(())
    }

    /// Logs a per-panel overview of the figure.
    pub fn show(&self) {
        info!(title = %self.figure.title, "dv/v figure");
        for panel in &self.figure.panels {
            let range = panel.x_range.map(|(l, r)| {
                format!("{} .. {}", l.format(X_TICK_FORMAT), r.format(X_TICK_FORMAT))
            });
            info!(
                panel = panel.index,
                title = %panel.title,
                lines = panel.lines.len(),
                x_range = range.as_deref().unwrap_or("auto"),
                "Panel"
            );
            for line in &panel.lines {
                let last = line.values.last().copied().unwrap_or(f64::NAN);
                info!(label = %line.label, points = line.values.len(), last_dvv = last, "  Line");
            }
        }
    }
}

impl Renderer for FigureRenderer {
    fn create_panel(&mut self, index: usize, title: &str) -> Panel {
        self.figure.panels.push(FigurePanel {
            index,
            title: title.to_string(),
            y_label: Y_LABEL,
            x_range: None,
            lines: Vec::new(),
        });
        Panel {
            slot: self.figure.panels.len() - 1,
        }
    }

    fn draw_line(&mut self, panel: &Panel, label: &str, dates: &[NaiveDateTime], values: &[f64]) {
        if let Some(p) = self.figure.panels.get_mut(panel.slot) {
            debug!(panel = p.index, label, points = values.len(), "Drawing line");
            p.lines.push(FigureLine {
                label: label.to_string(),
                dates: dates.to_vec(),
                values: values.to_vec(),
            });
        }
    }

    fn set_x_range(&mut self, panel: &Panel, left: NaiveDateTime, right: NaiveDateTime) {
        if let Some(p) = self.figure.panels.get_mut(panel.slot) {
            p.x_range = Some((left, right));
        }
    }

    fn finish(&mut self, title: &str) {
        self.figure.title = title.to_string();
    }
}
