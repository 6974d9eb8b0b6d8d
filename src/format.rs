use std::fmt::Write;

use crate::app::TickReport;

pub fn format_percent(fraction: Option<f64>) -> String {
    match fraction {
        Some(f) => format!("{:5.1}%", f * 100.0),
        None => "  n/a ".to_string(),
    }
}

/// One-line summary of a tick, e.g. `Total:  12.5% CPU 0:  20.0% Mem:  60.0%`.
pub fn status_line(report: &TickReport) -> String {
    let mut out = format!("Total: {}", format_percent(report.total));
    for (core, busy) in report.cores.iter().enumerate() {
        let _ = write!(out, " CPU {core}: {}", format_percent(Some(*busy)));
    }
    let _ = write!(out, " Mem: {}", format_percent(report.memory));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_formatting() {
        assert_eq!(format_percent(Some(0.0)), "  0.0%");
        assert_eq!(format_percent(Some(1.0)), "100.0%");
        assert_eq!(format_percent(Some(1.0 / 3.0)), " 33.3%");
        assert_eq!(format_percent(None), "  n/a ");
    }
}
