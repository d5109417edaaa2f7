//! Live terminal rendering of the status display.
//!
//! Uses a two-row ratatui inline viewport at the bottom of the normal
//! terminal scrollback, so events printed with
//! [`Terminal::insert_before`] scroll up above it like ordinary output.
//!
//! ## For contributors
//!
//! * [`draw`] is pure rendering and is what the tests exercise.
//! * Colours are inline; the palette is small enough not to need a theme.

use std::io::{self, IsTerminal, Stdout};

use chrono::Local;
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Constraint, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget, Wrap},
    Frame, Terminal, TerminalOptions, Viewport,
};

use crate::status::Surface;

/// Render the two status rows for one frame.
pub fn draw(frame: &mut Frame, status_line: &str, hint: &str) {
    let [status_area, hint_area] =
        Layout::vertical([Constraint::Length(1), Constraint::Length(1)]).areas(frame.area());

    frame.render_widget(
        Paragraph::new(Line::from(Span::styled(
            status_line.to_string(),
            Style::default().fg(Color::Yellow),
        ))),
        status_area,
    );
    frame.render_widget(
        Paragraph::new(Line::from(Span::styled(
            hint.to_string(),
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
        ))),
        hint_area,
    );
}

/// Styled event line; errors are red.
pub fn event_line(line: &str, is_error: bool) -> Line<'static> {
    let style = if is_error {
        Style::default().fg(Color::Red)
    } else {
        Style::default()
    };
    Line::from(Span::styled(line.to_string(), style))
}

/// Rows needed to show `line` wrapped at `width` columns.
fn rows_for(line: &str, width: u16) -> u16 {
    let width = usize::from(width.max(1));
    let chars = line.chars().count().max(1);
    u16::try_from(chars.div_ceil(width)).unwrap_or(u16::MAX)
}

/// The live display.  Dropping it clears the viewport.
pub struct LiveSurface<B: Backend> {
    terminal: Terminal<B>,
    closed: bool,
}

impl LiveSurface<CrosstermBackend<Stdout>> {
    /// Attach to stdout.  Fails when stdout is not a terminal, in which case
    /// the caller should fall back to plain output.
    pub fn stdout() -> io::Result<Self> {
        let stdout = io::stdout();
        if !stdout.is_terminal() {
            return Err(io::Error::new(io::ErrorKind::Unsupported, "stdout is not a terminal"));
        }
        Self::with_backend(CrosstermBackend::new(stdout))
    }
}

impl<B: Backend> LiveSurface<B> {
    pub fn with_backend(backend: B) -> io::Result<Self> {
        let terminal = Terminal::with_options(
            backend,
            TerminalOptions {
                viewport: Viewport::Inline(2),
            },
        )?;
        Ok(Self {
            terminal,
            closed: false,
        })
    }
}

impl<B: Backend> Surface for LiveSurface<B> {
    fn render(&mut self, status_line: &str, hint: &str) -> io::Result<()> {
        self.terminal.draw(|f| draw(f, status_line, hint))?;
        Ok(())
    }

    fn print_above(&mut self, line: &str, is_error: bool) -> io::Result<()> {
        let width = self.terminal.size()?.width;
        let rows = rows_for(line, width);
        let styled = event_line(line, is_error);
        self.terminal.insert_before(rows, |buf| {
            let area = buf.area;
            Paragraph::new(styled)
                .wrap(Wrap { trim: false })
                .render(area, buf);
        })
    }

    fn close(&mut self) -> io::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.terminal.clear()?;
        self.terminal.show_cursor()
    }
}

impl<B: Backend> Drop for LiveSurface<B> {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Print the start-of-run banner.
pub fn banner(name: &str, version: &str) -> String {
    format!(
        "──── {} v{version} ──── started {}",
        name,
        Local::now().format("%Y/%m/%d %H:%M:%S")
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
