use std::ffi::OsStr;
use std::fmt;
use std::process::{Command, ExitStatus, Output};

use crate::errors::*;

/// A [`Command`] that prints its invocation (shell-escaped) when running
/// verbosely, and turns non-zero exits / spawn failures into `Result`s
/// instead of silent unit-returning panics.
pub trait CommandExt {
    fn print_verbose(&self, verbose: bool);
    fn run(&mut self, verbose: bool) -> Result<()>;
    fn run_and_get_status(&mut self, verbose: bool) -> Result<ExitStatus>;
    fn run_and_get_output(&mut self, verbose: bool) -> Result<Output>;
    fn run_and_get_stdout(&mut self, verbose: bool) -> Result<String>;
}

fn format_command(command: &Command) -> String {
    let program = shell_escape::escape(command.get_program().to_string_lossy()).into_owned();
    let args: Vec<String> = command
        .get_args()
        .map(|a| shell_escape::escape(a.to_string_lossy()).into_owned())
        .collect();
    std::iter::once(program)
        .chain(args)
        .collect::<Vec<_>>()
        .join(" ")
}

impl CommandExt for Command {
    fn print_verbose(&self, verbose: bool) {
        if verbose {
            eprintln!("+ {}", format_command(self));
        }
    }

    fn run(&mut self, verbose: bool) -> Result<()> {
        self.run_and_get_status(verbose)?;
        Ok(())
    }

    fn run_and_get_status(&mut self, verbose: bool) -> Result<ExitStatus> {
        self.print_verbose(verbose);
        let program = self.get_program().to_string_lossy().into_owned();
        let status = self.status().map_err(|e| {
            CommandError::CouldNotExecute(Box::new(e), format_command(self))
        })?;
        if !status.success() {
            return Err(CommandError::NonZeroExitCode(status, program).into());
        }
        Ok(status)
    }

    fn run_and_get_output(&mut self, verbose: bool) -> Result<Output> {
        self.print_verbose(verbose);
        self.output()
            .map_err(|e| CommandError::CouldNotExecute(Box::new(e), format_command(self)).into())
    }

    fn run_and_get_stdout(&mut self, verbose: bool) -> Result<String> {
        let output = self.run_and_get_output(verbose)?;
        if !output.status.success() {
            let program = self.get_program().to_string_lossy().into_owned();
            return Err(CommandError::NonZeroExitCode(output.status, program).into());
        }
        output.stdout()
    }
}

/// Extension for [`Output`] mirroring `cross`'s `OutputExt`: turn raw bytes
/// into a checked UTF-8 `String`, keeping the original `Output` around for
/// error reporting if decoding fails.
pub trait OutputExt {
    fn stdout(self) -> Result<String>;
    fn stderr_string(&self) -> String;
}

impl OutputExt for Output {
    fn stdout(self) -> Result<String> {
        String::from_utf8(self.stdout.clone())
            .map_err(|e| CommandError::Utf8Error(e, self).into())
    }

    fn stderr_string(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// A [`Command`] wrapper that never forwards raw shell metacharacters: all
/// arguments are passed as-is to `exec`, never interpolated into a shell
/// string. Named after `cross`'s `SafeCommand` (`cargo_cmd`/`xargo` use).
#[derive(Debug)]
pub struct SafeCommand(Command);

impl SafeCommand {
    pub fn new<S: AsRef<OsStr>>(program: S) -> Self {
        SafeCommand(Command::new(program))
    }

    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.0.args(args);
        self
    }

    pub fn arg<S: AsRef<OsStr>>(&mut self, arg: S) -> &mut Self {
        self.0.arg(arg);
        self
    }

    pub fn command(&mut self) -> &mut Command {
        &mut self.0
    }
}

impl fmt::Display for SafeCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", format_command(&self.0))
    }
}
