#![forbid(unsafe_code)]

//! Command-line argument parsing for the walkthrough player.
//!
//! Parses args manually to keep the binary lean. Supports environment
//! variable overrides via the `STAGEHAND_DEMO_*` prefix; explicit flags win.

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use stagehand_runtime::Variant;

const VERSION: &str = env!("CARGO_PKG_VERSION");

const HELP_TEXT: &str = "\
Stagehand Demo: plays the abuse detection/prevention walkthrough headless

USAGE:
    stagehand-demo [OPTIONS]

OPTIONS:
    --variant=NAME         Start with 'detection' (default) or 'prevention'
    --duration-ms=N        Stop after N milliseconds (default: 25000)
    --switch-at-ms=N       Switch to the other variant at N milliseconds
    --continue-at-ms=N     Start the feature-unlock reveal at N milliseconds
    --completed            Treat the session as completed (instant reveal)
    --config=PATH          Load engine settings from a JSON file
    --realtime             Pace output with the wall clock
    --log-json             Emit engine logs as JSON on stderr
    --help, -h             Show this help message
    --version, -V          Show version

ENVIRONMENT VARIABLES:
    STAGEHAND_DEMO_VARIANT       Override --variant
    STAGEHAND_DEMO_DURATION_MS   Override --duration-ms
    STAGEHAND_DEMO_CONFIG        Override --config
    STAGEHAND_*                  Engine settings, see EngineConfig::from_env
    RUST_LOG                     Log filter (default: warn)";

const DEFAULT_DURATION: Duration = Duration::from_millis(25_000);

/// Parsed command-line options.
#[derive(Debug, Clone, PartialEq)]
pub struct Opts {
    pub variant: Variant,
    /// Total virtual (or wall) time to play.
    pub duration: Duration,
    pub switch_at: Option<Duration>,
    pub continue_at: Option<Duration>,
    pub completed: bool,
    pub config: Option<PathBuf>,
    pub realtime: bool,
    pub log_json: bool,
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            variant: Variant::Detection,
            duration: DEFAULT_DURATION,
            switch_at: None,
            continue_at: None,
            completed: false,
            config: None,
            realtime: false,
            log_json: false,
        }
    }
}

/// What the command line asked for.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Run(Opts),
    Help,
    Version,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliError {
    InvalidValue { flag: &'static str, value: String },
    UnknownArgument(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::InvalidValue { flag, value } => write!(f, "Invalid {flag} value: {value}"),
            CliError::UnknownArgument(arg) => write!(f, "Unknown argument: {arg}"),
        }
    }
}

impl std::error::Error for CliError {}

impl Opts {
    /// Parse process arguments and environment, exiting on `--help`,
    /// `--version`, or bad input.
    pub fn parse() -> Self {
        let args = env::args().skip(1);
        match Self::parse_from(args, |key| env::var(key).ok()) {
            Ok(Command::Run(opts)) => opts,
            Ok(Command::Help) => {
                println!("{HELP_TEXT}");
                process::exit(0);
            }
            Ok(Command::Version) => {
                println!("stagehand-demo {VERSION}");
                process::exit(0);
            }
            Err(e) => {
                eprintln!("{e}");
                eprintln!("Run with --help for usage information.");
                process::exit(1);
            }
        }
    }

    /// Parse `args` with environment lookups through `env_var`.
    ///
    /// Environment variables take precedence over defaults but are overridden
    /// by explicit command-line flags.
    pub fn parse_from<I, S>(
        args: I,
        env_var: impl Fn(&str) -> Option<String>,
    ) -> Result<Command, CliError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut opts = Self::default();

        if let Some(val) = env_var("STAGEHAND_DEMO_VARIANT")
            && let Ok(v) = val.parse()
        {
            opts.variant = v;
        }
        if let Some(val) = env_var("STAGEHAND_DEMO_DURATION_MS")
            && let Ok(n) = val.parse()
        {
            opts.duration = Duration::from_millis(n);
        }
        if let Some(val) = env_var("STAGEHAND_DEMO_CONFIG") {
            opts.config = Some(PathBuf::from(val));
        }

        for arg in args {
            match arg.as_ref() {
                "--help" | "-h" => return Ok(Command::Help),
                "--version" | "-V" => return Ok(Command::Version),
                "--completed" => opts.completed = true,
                "--realtime" => opts.realtime = true,
                "--log-json" => opts.log_json = true,
                other => {
                    if let Some(val) = other.strip_prefix("--variant=") {
                        opts.variant = val.parse().map_err(|_| invalid("--variant", val))?;
                    } else if let Some(val) = other.strip_prefix("--duration-ms=") {
                        opts.duration = millis("--duration-ms", val)?;
                    } else if let Some(val) = other.strip_prefix("--switch-at-ms=") {
                        opts.switch_at = Some(millis("--switch-at-ms", val)?);
                    } else if let Some(val) = other.strip_prefix("--continue-at-ms=") {
                        opts.continue_at = Some(millis("--continue-at-ms", val)?);
                    } else if let Some(val) = other.strip_prefix("--config=") {
                        opts.config = Some(PathBuf::from(val));
                    } else {
                        return Err(CliError::UnknownArgument(other.to_string()));
                    }
                }
            }
        }

        Ok(Command::Run(opts))
    }
}

fn invalid(flag: &'static str, value: &str) -> CliError {
    CliError::InvalidValue {
        flag,
        value: value.to_string(),
    }
}

fn millis(flag: &'static str, value: &str) -> Result<Duration, CliError> {
    value
        .parse()
        .map(Duration::from_millis)
        .map_err(|_| invalid(flag, value))
}
