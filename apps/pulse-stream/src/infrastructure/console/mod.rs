//! Console Renderer
//!
//! Prints debounced price updates to stdout, coloured by direction.

use std::io::Write;

use crate::application::ports::{Direction, RenderedTick, TickRenderer};

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const WHITE: &str = "\x1b[37m";
const RESET: &str = "\x1b[0m";

/// ANSI colour and arrow for a price direction.
#[must_use]
pub const fn style(direction: Direction) -> (&'static str, char) {
    match direction {
        Direction::Up => (GREEN, '↑'),
        Direction::Down => (RED, '↓'),
        Direction::Unchanged => (WHITE, '→'),
    }
}

/// Format a rendered tick as a single coloured line, without newline.
#[must_use]
pub fn format_line(tick: &RenderedTick) -> String {
    let (color, arrow) = style(tick.direction);
    format!("{color}[{}] {:.2} {arrow}{RESET}", tick.symbol, tick.price)
}

/// [`TickRenderer`] writing to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleRenderer;

impl ConsoleRenderer {
    /// Create a console renderer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl TickRenderer for ConsoleRenderer {
    fn render(&self, tick: &RenderedTick) {
        let mut stdout = std::io::stdout().lock();
        if let Err(e) = writeln!(stdout, "{}", format_line(tick)) {
            tracing::debug!(error = %e, "Failed to write price line");
        }
    }
}
