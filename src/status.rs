//! Operator-facing status: a two-line live display plus an event log
//! printed above it.
//!
//! [`Status`] owns the cached "current activity / sub-activity" pair and a
//! [`Surface`] that does the actual drawing.  Drawing never fails from the
//! caller's point of view: the first I/O error swaps the surface for a
//! [`PlainSurface`] and processing carries on.
//!
//! There is exactly one writer.  The run loop owns the `Status` and lends
//! `&mut Status` down the call stack.

use std::io::{self, Write};

use chrono::Local;

/// Second line of the live display.
pub const HINT: &str = "To stop the bot properly, press Control+C";

/// Something that can show the status lines and print events above them.
pub trait Surface {
    /// Replace the live display with `status_line` and `hint`.
    fn render(&mut self, status_line: &str, hint: &str) -> io::Result<()>;

    /// Print an already-timestamped event line above the live display.
    fn print_above(&mut self, line: &str, is_error: bool) -> io::Result<()>;

    /// Tear the live display down.
    fn close(&mut self) -> io::Result<()>;
}

/// Fallback surface: no live display, events as plain lines on stdout.
#[derive(Debug, Default)]
pub struct PlainSurface;

impl Surface for PlainSurface {
    fn render(&mut self, _status_line: &str, _hint: &str) -> io::Result<()> {
        Ok(())
    }

    fn print_above(&mut self, line: &str, _is_error: bool) -> io::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "{line}")?;
        out.flush()
    }

    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub struct Status {
    primary: String,
    secondary: String,
    surface: Box<dyn Surface>,
}

impl Status {
    pub fn new(surface: Box<dyn Surface>) -> Self {
        Self {
            primary: String::new(),
            secondary: String::new(),
            surface,
        }
    }

    pub fn plain() -> Self {
        Self::new(Box::new(PlainSurface))
    }

    /// Replace both lines of the display.
    pub fn set_status(&mut self, primary: &str, secondary: &str) {
        self.primary = primary.to_string();
        self.secondary = secondary.to_string();
        tracing::trace!(primary, secondary, "status");
        self.redraw();
    }

    /// Replace the sub-activity, keeping the current activity.
    pub fn set_sub_status(&mut self, secondary: &str) {
        self.secondary = secondary.to_string();
        tracing::trace!(secondary, "sub-status");
        self.redraw();
    }

    /// Show `primary` without remembering it; [`restore`](Self::restore)
    /// brings back the cached lines.
    pub fn show_transient(&mut self, primary: &str) {
        let line = status_line(primary, "");
        self.draw(&line);
    }

    pub fn restore(&mut self) {
        self.redraw();
    }

    /// Print a timestamped event above the live display.
    pub fn log_event(&mut self, message: &str, is_error: bool) {
        if is_error {
            tracing::error!("{message}");
        } else {
            tracing::info!("{message}");
        }
        let line = format!("[{}] {message}", Local::now().format("%m/%d %H:%M:%S"));
        if let Err(e) = self.surface.print_above(&line, is_error) {
            self.degrade(e);
            let _ = self.surface.print_above(&line, is_error);
        }
    }

    /// Close the live display.  Later events are printed as plain lines.
    pub fn finish(&mut self) {
        if let Err(e) = self.surface.close() {
            tracing::warn!(error = %e, "failed to close the status display");
        }
        self.surface = Box::new(PlainSurface);
    }

    fn redraw(&mut self) {
        let line = status_line(&self.primary, &self.secondary);
        self.draw(&line);
    }

    fn draw(&mut self, line: &str) {
        if let Err(e) = self.surface.render(line, HINT) {
            self.degrade(e);
        }
    }

    fn degrade(&mut self, err: io::Error) {
        tracing::warn!(error = %err, "status display failed, falling back to plain output");
        let _ = self.surface.close();
        self.surface = Box::new(PlainSurface);
    }
}

/// `>> primary : secondary ...`, the secondary part omitted when empty.
pub fn status_line(primary: &str, secondary: &str) -> String {
    if secondary.is_empty() {
        format!(">> {primary} ...")
    } else {
        format!(">> {primary} : {secondary} ...")
    }
}
