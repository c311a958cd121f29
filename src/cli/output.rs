//! Terminal output for the command line tool.
//!
//! Everything goes to stderr. Colors are used only when stderr is a
//! terminal and `NO_COLOR` is unset.

use crate::bundler::pipeline::{ProgressEvent, ProgressKind, StepStatus};
use std::io::{self, IsTerminal, Write};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Column the step status is printed at.
const STATUS_COLUMN: usize = 45;

/// Colored, verbosity-aware writer for user facing messages.
#[derive(Debug, Clone, Copy)]
pub struct OutputManager {
    verbose: bool,
    quiet: bool,
    color: ColorChoice,
}

impl OutputManager {
    /// Creates an output manager writing to stderr.
    pub fn new(verbose: bool, quiet: bool) -> Self {
        let color = if io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none() {
            ColorChoice::Auto
        } else {
            ColorChoice::Never
        };
        Self {
            verbose,
            quiet,
            color,
        }
    }

    /// Whether diagnostics beyond the error message are shown.
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    fn stream(&self) -> StandardStream {
        StandardStream::stderr(self.color)
    }

    fn write_colored(&self, color: Color, bold: bool, text: &str) -> io::Result<()> {
        let mut stream = self.stream();
        stream.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(bold))?;
        write!(stream, "{text}")?;
        stream.reset()
    }

    /// Prints a progress event as one line per step:
    /// `[ 3/21] Title...` padded, then the colored status.
    pub fn progress(&self, event: &ProgressEvent) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        match &event.kind {
            ProgressKind::StepBegin { .. } => {
                let line = event.to_string();
                let padding = STATUS_COLUMN.saturating_sub(line.chars().count());
                let mut stream = self.stream();
                write!(stream, "{line}{}", " ".repeat(padding))?;
                stream.flush()
            }
            ProgressKind::StepEnd { status } => {
                let color = match status {
                    StepStatus::Ok => Color::Green,
                    StepStatus::Skip => Color::Yellow,
                    StepStatus::Error => Color::Red,
                };
                let mut stream = self.stream();
                write!(stream, "[")?;
                stream.set_color(ColorSpec::new().set_fg(Some(color)))?;
                write!(stream, "{}", status.label())?;
                stream.reset()?;
                writeln!(stream, "]")
            }
        }
    }

    /// Print success message if not in quiet mode
    pub fn success(&self, message: &str) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        self.write_colored(Color::Green, true, message)?;
        writeln!(self.stream())
    }

    /// Print indented text if not in quiet mode
    pub fn indent(&self, message: &str) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        writeln!(self.stream(), "  {message}")
    }

    /// Print verbose message if in verbose mode
    pub fn verbose(&self, message: &str) -> io::Result<()> {
        if !self.verbose || self.quiet {
            return Ok(());
        }
        writeln!(self.stream(), "{message}")
    }

    /// Print an error. Always shown, even in quiet mode.
    pub fn error(&self, message: &str) -> io::Result<()> {
        self.write_colored(Color::Red, true, "error")?;
        writeln!(self.stream(), ": {message}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_column_fits_longest_title() {
        let line = ProgressEvent {
            kind: ProgressKind::StepBegin {
                title: "Validating JSON Specification".into(),
            },
            current: 4,
            total: 21,
        }
        .to_string();
        assert!(line.len() < STATUS_COLUMN);
    }

    #[test]
    fn quiet_suppresses_progress() {
        let output = OutputManager::new(false, true);
        let event = ProgressEvent {
            kind: ProgressKind::StepEnd {
                status: StepStatus::Ok,
            },
            current: 1,
            total: 1,
        };
        assert!(output.progress(&event).is_ok());
        assert!(!output.is_verbose());
    }
}
