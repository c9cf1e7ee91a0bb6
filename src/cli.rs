//! Hand-rolled flag parser. Unlike `yolo-util` (the companion admin binary,
//! which uses `clap`), the main `yolo` binary can't use a derive-based
//! parser: any flag it doesn't recognize must be forwarded verbatim to the
//! agent running inside the sandbox, and a strict parser would reject
//! those instead of passing them through.

use std::env;
use std::path::PathBuf;

use crate::errors::Result;
use crate::file::absolute_path;

#[derive(Debug, Default)]
pub struct Args {
    pub yolo: bool,
    pub strategy: Option<String>,
    pub force_build: bool,
    pub reset: bool,
    pub chrome: bool,
    /// `--detect <path>`: a standalone diagnostic mode (spec.md §6), not a
    /// flag on the normal run. When set, `main` prints the best-detected
    /// strategy name for this path and exits without touching containers.
    pub detect: Option<PathBuf>,
    pub print: bool,
    pub env: Vec<(String, String)>,
    pub env_file: Vec<PathBuf>,
    pub trust_credential: bool,
    pub trust_overlay: bool,
    pub setup_token: bool,
    pub verbose: bool,
    pub help: bool,
    pub version: bool,
    /// Everything this parser doesn't recognize, in original order,
    /// forwarded to the agent entrypoint unmodified.
    pub passthrough: Vec<String>,
}

enum ArgKind {
    Next,
    Equal,
}

fn is_value_arg(arg: &str, field: &str) -> Option<ArgKind> {
    if arg == field {
        Some(ArgKind::Next)
    } else if arg
        .strip_prefix(field)
        .map(|rest| rest.starts_with('='))
        .unwrap_or_default()
    {
        Some(ArgKind::Equal)
    } else {
        None
    }
}

fn parse_next_arg(
    kind: ArgKind,
    arg: String,
    iter: &mut impl Iterator<Item = String>,
) -> Option<String> {
    match kind {
        ArgKind::Equal => arg.split_once('=').map(|(_, v)| v.to_string()),
        ArgKind::Next => iter.next(),
    }
}

fn parse_env_pair(value: &str) -> Option<(String, String)> {
    value.split_once('=').map(|(k, v)| (k.to_string(), v.to_string()))
}

pub fn parse() -> Result<Args> {
    parse_from(env::args().skip(1))
}

pub fn parse_from(input: impl Iterator<Item = String>) -> Result<Args> {
    let mut out = Args::default();
    let mut args = input;

    while let Some(arg) = args.next() {
        if arg.is_empty() {
            continue;
        }

        if arg == "--" {
            out.passthrough.extend(args.by_ref());
        } else if matches!(arg.as_str(), "--help" | "-h") {
            out.help = true;
        } else if matches!(arg.as_str(), "--version" | "-V") {
            out.version = true;
        } else if matches!(arg.as_str(), "--verbose" | "-v") {
            out.verbose = true;
        } else if matches!(arg.as_str(), "--build" | "--force-build") {
            out.force_build = true;
        } else if arg == "--yolo" {
            out.yolo = true;
        } else if arg == "--reset" {
            out.reset = true;
        } else if arg == "--chrome" {
            out.chrome = true;
        } else if matches!(arg.as_str(), "--print" | "-p") {
            out.print = true;
        } else if arg == "--trust-credential" {
            out.trust_credential = true;
        } else if arg == "--trust-overlay" {
            out.trust_overlay = true;
        } else if arg == "--setup-token" {
            out.setup_token = true;
        } else if let Some(kind) = is_value_arg(&arg, "--strategy") {
            out.strategy = parse_next_arg(kind, arg, &mut args);
        } else if let Some(kind) = is_value_arg(&arg, "--detect") {
            if let Some(value) = parse_next_arg(kind, arg, &mut args) {
                out.detect = Some(absolute_path(PathBuf::from(value))?);
            }
        } else if let Some(kind) = is_value_arg(&arg, "--env") {
            if let Some(value) = parse_next_arg(kind, arg, &mut args) {
                if let Some(pair) = parse_env_pair(&value) {
                    out.env.push(pair);
                }
            }
        } else if let Some(kind) = is_value_arg(&arg, "--env-file") {
            if let Some(value) = parse_next_arg(kind, arg, &mut args) {
                out.env_file.push(absolute_path(PathBuf::from(value))?);
            }
        } else {
            out.passthrough.push(arg);
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_args(args: &[&str]) -> Args {
        parse_from(args.iter().map(|s| s.to_string())).unwrap()
    }

    #[test]
    fn recognizes_known_flags() {
        let args = parse_args(&["--yolo", "--build", "--reset", "--chrome", "--verbose"]);
        assert!(args.yolo);
        assert!(args.force_build);
        assert!(args.reset);
        assert!(args.chrome);
        assert!(args.verbose);
    }

    #[test]
    fn yolo_flag_defaults_to_false() {
        assert!(!parse_args(&["--model", "opus"]).yolo);
    }

    #[test]
    fn strategy_accepts_space_and_equal_forms() {
        assert_eq!(parse_args(&["--strategy", "node"]).strategy, Some("node".to_string()));
        assert_eq!(parse_args(&["--strategy=rust"]).strategy, Some("rust".to_string()));
    }

    #[test]
    fn unrecognized_flags_are_forwarded_as_passthrough() {
        let args = parse_args(&["--model", "opus", "--foo-bar"]);
        assert_eq!(args.passthrough, vec!["--model", "opus", "--foo-bar"]);
    }

    #[test]
    fn double_dash_forwards_everything_after_it_verbatim() {
        let args = parse_args(&["--verbose", "--", "--strategy", "not-a-flag-here"]);
        assert!(args.verbose);
        assert_eq!(args.passthrough, vec!["--strategy", "not-a-flag-here"]);
    }

    #[test]
    fn env_pairs_are_parsed_from_key_equals_value() {
        let args = parse_args(&["--env", "FOO=bar", "--env=BAZ=qux"]);
        assert_eq!(
            args.env,
            vec![("FOO".to_string(), "bar".to_string()), ("BAZ".to_string(), "qux".to_string())]
        );
    }

    #[test]
    fn detect_takes_a_path_argument() {
        let args = parse_args(&["--detect", "."]);
        assert!(args.detect.is_some());
    }

    #[test]
    fn force_build_accepts_both_spellings() {
        assert!(parse_args(&["--build"]).force_build);
        assert!(parse_args(&["--force-build"]).force_build);
    }
}
