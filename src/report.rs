use crate::flow::FlowController;
use chrono::{DateTime, Local};
use std::fmt;

pub const REPORT_TITLE: &str = "TANK LEVEL REPORT";

#[derive(Clone, Debug, PartialEq)]
pub struct ReportLine {
    pub label: String,
    pub quantity: f64,
    pub capacity: f64,
    pub fill_fraction: f64,
}

impl fmt::Display for ReportLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {:.1} / {:.1} ({:.0}%)",
            self.label,
            self.quantity,
            self.capacity,
            self.fill_fraction * 100.0
        )
    }
}

/// Point-in-time listing of every tank's level.
#[derive(Clone, Debug)]
pub struct Report {
    pub generated_at: DateTime<Local>,
    pub lines: Vec<ReportLine>,
}

impl Report {
    pub fn capture(controller: &FlowController) -> Self {
        Self::capture_at(controller, Local::now())
    }

    pub fn capture_at(controller: &FlowController, generated_at: DateTime<Local>) -> Self {
        let lines = controller
            .tanks()
            .iter()
            .map(|t| ReportLine {
                label: t.label().to_string(),
                quantity: t.quantity(),
                capacity: t.capacity(),
                fill_fraction: t.fill_fraction(),
            })
            .collect();
        Self {
            generated_at,
            lines,
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}  ({})", REPORT_TITLE, self.generated_at.format("%H:%M:%S"))?;
        for line in &self.lines {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}
