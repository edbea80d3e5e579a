//! Terminal colors for status lines and reports.

use console::{style, Style};

pub fn success() -> Style {
    Style::new().green().bold()
}

pub fn error() -> Style {
    Style::new().red().bold()
}

pub fn warning() -> Style {
    Style::new().yellow()
}

pub fn info() -> Style {
    Style::new().cyan()
}

pub fn dim() -> Style {
    Style::new().dim()
}

/// Predicted size against a byte budget: green within, red over.
pub fn fmt_budget(estimated: &str, within_budget: bool) -> String {
    if within_budget {
        format!("{}", style(estimated).green().bold())
    } else {
        format!("{}", style(estimated).red())
    }
}

/// Signed size change; negative (smaller) is good.
pub fn fmt_size_pct(pct: f64) -> String {
    if pct < 0.0 {
        format!("{}", style(format!("{:+.1}%", pct)).green().bold())
    } else if pct < 5.0 {
        format!("{}", style(format!("{:+.1}%", pct)).yellow())
    } else {
        format!("{}", style(format!("{:+.1}%", pct)).red())
    }
}
