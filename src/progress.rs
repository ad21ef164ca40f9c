//! Bounded-width textual progress bar for the frame conversion phase.

use std::io::Write;

use anyhow::{Context, Result};

/// Bar width used by the CLI.
pub const DEFAULT_BAR_WIDTH: usize = 50;

/// Render a progress bar like `[#####-----] 50%`.
///
/// `percentage = floor(current / total * 100)`, with `total == 0` defined as
/// 0% rather than a division by zero. Values past 100% clamp.
pub fn render_bar(current: usize, total: usize, bar_width: usize) -> String {
    let percentage = if total == 0 {
        0
    } else {
        (current * 100 / total).min(100)
    };
    let filled = (percentage * bar_width / 100).min(bar_width);
    format!(
        "[{}{}] {}%",
        "#".repeat(filled),
        "-".repeat(bar_width - filled),
        percentage
    )
}

/// Redraw the bar in place on the current line of `out`.
pub fn draw_bar(
    out: &mut impl Write,
    label: &str,
    current: usize,
    total: usize,
    bar_width: usize,
) -> Result<()> {
    write!(out, "\r{} {}", label, render_bar(current, total, bar_width))
        .context("writing progress bar")?;
    out.flush().context("flushing progress bar")
}
