//! Terminal Surface (UI): styled output and the three interactive prompt
//! primitives from spec.md §4.12. Styling is suppressed whenever stderr is
//! not a terminal, mirroring `cross`'s `atty`-gated coloring in `docker.rs`.

use std::io::{self, BufRead, Write};

use owo_colors::OwoColorize;

use crate::errors::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
}

/// The Terminal Surface. One instance per process; cheap to construct.
#[derive(Debug, Clone)]
pub struct MessageInfo {
    pub verbosity: Verbosity,
    color: bool,
}

impl Default for MessageInfo {
    fn default() -> Self {
        Self::new(Verbosity::Normal)
    }
}

impl MessageInfo {
    pub fn new(verbosity: Verbosity) -> Self {
        MessageInfo {
            verbosity,
            color: atty::is(atty::Stream::Stderr),
        }
    }

    pub fn is_verbose(&self) -> bool {
        matches!(self.verbosity, Verbosity::Verbose)
    }

    pub fn is_interactive(&self) -> bool {
        atty::is(atty::Stream::Stdin) && atty::is(atty::Stream::Stderr)
    }

    fn emit(&self, glyph: &str, styled: String, plain: String) {
        if matches!(self.verbosity, Verbosity::Quiet) {
            return;
        }
        if self.color {
            eprintln!("{glyph} {styled}");
        } else {
            eprintln!("{plain}");
        }
    }

    pub fn info(&self, msg: impl AsRef<str>) {
        let msg = msg.as_ref();
        self.emit("info:", msg.blue().to_string(), format!("info: {msg}"));
    }

    pub fn success(&self, msg: impl AsRef<str>) {
        let msg = msg.as_ref();
        self.emit(
            "\u{2713}",
            msg.green().to_string(),
            format!("done: {msg}"),
        );
    }

    pub fn warn(&self, msg: impl AsRef<str>) {
        let msg = msg.as_ref();
        self.emit(
            "warning:",
            msg.yellow().to_string(),
            format!("warning: {msg}"),
        );
    }

    pub fn fail(&self, msg: impl AsRef<str>) {
        let msg = msg.as_ref();
        // failures are never suppressed, even in quiet mode.
        if self.color {
            eprintln!("{} {}", "error:".red().bold(), msg.red());
        } else {
            eprintln!("error: {msg}");
        }
    }

    pub fn dim(&self, msg: impl AsRef<str>) {
        let msg = msg.as_ref();
        self.emit("", msg.dimmed().to_string(), format!("  {msg}"));
    }

    pub fn blank(&self) {
        if !matches!(self.verbosity, Verbosity::Quiet) {
            eprintln!();
        }
    }

    pub fn header(&self, title: impl AsRef<str>) {
        let title = title.as_ref();
        self.blank();
        self.emit(
            "==",
            format!("== {title} ==").bold().to_string(),
            format!("== {title} =="),
        );
    }

    pub fn footer(&self) {
        self.emit("--", "--".dimmed().to_string(), "--".to_string());
    }

    pub fn print(&self, line: impl AsRef<str>) -> Result<()> {
        let mut out = io::stdout();
        writeln!(out, "{}", line.as_ref())?;
        Ok(())
    }

    /// Yes/no prompt with a default applied when input is non-interactive.
    pub fn confirm(&self, question: &str, default: bool) -> Result<bool> {
        if !self.is_interactive() {
            return Ok(default);
        }
        let suffix = if default { "[Y/n]" } else { "[y/N]" };
        eprint!("{question} {suffix} ");
        io::stderr().flush().ok();
        let line = read_line()?;
        let trimmed = line.trim().to_lowercase();
        Ok(match trimmed.as_str() {
            "" => default,
            "y" | "yes" => true,
            "n" | "no" => false,
            _ => default,
        })
    }

    /// Numbered choice from `1..=options.len()`, `default` is a 1-based
    /// index. Returns `None` if the user left the menu without choosing
    /// (blank line) when there is no default.
    pub fn choose(
        &self,
        prompt: &str,
        options: &[String],
        default: Option<usize>,
    ) -> Result<Option<usize>> {
        if !self.is_interactive() {
            return Ok(default);
        }
        eprintln!("{prompt}");
        for (i, opt) in options.iter().enumerate() {
            eprintln!("  {}) {}", i + 1, opt);
        }
        loop {
            match default {
                Some(d) => eprint!("Enter a number [{}]: ", d),
                None => eprint!("Enter a number: "),
            }
            io::stderr().flush().ok();
            let line = read_line()?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                return Ok(default);
            }
            if let Ok(n) = trimmed.parse::<usize>() {
                if n >= 1 && n <= options.len() {
                    return Ok(Some(n));
                }
            }
            self.warn("please enter a number from the list");
        }
    }

    /// Three-way "view-or-apply" prompt used by the Overlay Trust Store.
    /// `view` is invoked (possibly repeatedly) when the user picks "view".
    pub fn view_or_apply(
        &self,
        prompt: &str,
        mut view: impl FnMut() -> Result<()>,
    ) -> Result<ViewOrApply> {
        if !self.is_interactive() {
            return Ok(ViewOrApply::Cancel);
        }
        loop {
            eprintln!("{prompt}");
            eprint!("[A]pply, [V]iew, [C]ancel? ");
            io::stderr().flush().ok();
            let line = read_line()?;
            match line.trim().to_lowercase().as_str() {
                "a" | "apply" | "" => return Ok(ViewOrApply::Apply),
                "v" | "view" => {
                    view()?;
                    continue;
                }
                "c" | "cancel" => return Ok(ViewOrApply::Cancel),
                _ => self.warn("please enter A, V, or C"),
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewOrApply {
    Apply,
    Cancel,
}

fn read_line() -> Result<String> {
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line)
}

/// Indent every line of `text` by `prefix`, mirroring `cross`'s
/// `shell::indent`/`default_ident` used to nest subprocess stderr under a
/// failure message.
pub fn indent(text: &str, prefix: &str) -> String {
    text.lines()
        .map(|l| format!("{prefix}{l}"))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn default_indent() -> &'static str {
    "  "
}
