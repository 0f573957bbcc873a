mod exit;
mod logging;

use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser, ValueEnum};
use t3_engine::{
    run_session, ColorScheme, EngineConfig, Palette, SessionConfig, TimestampMode,
    DEFAULT_POLL_INTERVAL,
};
use t3_frame::DEFAULT_MAX_LINE_LENGTH;

use crate::exit::{engine_error, exit_code, CliError, CliResult, INTERNAL};
use crate::logging::{init_logging, LogFormat, LogLevel};

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum TsMode {
    /// Local time of day.
    Absolute,
    /// Time since t3 started.
    Relative,
}

impl From<TsMode> for TimestampMode {
    fn from(mode: TsMode) -> Self {
        match mode {
            TsMode::Absolute => TimestampMode::Absolute,
            TsMode::Relative => TimestampMode::Relative,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "t3",
    version,
    disable_version_flag = true,
    about = "Run a command and write its colorized, timestamped stdout and stderr to a log file and the terminal"
)]
struct Cli {
    /// Color scheme for light backgrounds.
    #[arg(short = 'l', long, conflicts_with_all = ["dark", "bold"])]
    light: bool,

    /// Color scheme for dark backgrounds.
    #[arg(short = 'd', long, conflicts_with = "bold")]
    dark: bool,

    /// Highlight stderr in bold, without color.
    #[arg(short = 'b', long)]
    bold: bool,

    /// Disable all timestamps, color and highlighting.
    #[arg(
        short = 'p',
        long,
        conflicts_with_all = ["light", "dark", "bold", "forcecolor", "outcolor", "errcolor", "ts", "debug"]
    )]
    plain: bool,

    /// Color terminal output even when it is not a terminal.
    #[arg(short = 'f', long)]
    forcecolor: bool,

    /// Escape sequence used for stdout lines.
    #[arg(short = 'o', long, value_name = "ESC")]
    outcolor: Option<String>,

    /// Escape sequence used for stderr lines.
    #[arg(short = 'e', long, value_name = "ESC")]
    errcolor: Option<String>,

    /// Prefix every line with a timestamp.
    #[arg(
        short = 't',
        long,
        value_name = "MODE",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "absolute"
    )]
    ts: Option<TsMode>,

    /// Print diagnostics to stderr (repeat for more detail).
    #[arg(long, action = ArgAction::Count)]
    debug: u8,

    /// Print version.
    #[arg(short = 'v', long, action = ArgAction::Version)]
    #[allow(dead_code)]
    version: Option<bool>,

    /// Diagnostic output format.
    #[arg(long, value_name = "FORMAT", default_value = "text", env = "T3_LOG_FORMAT")]
    log_format: LogFormat,

    /// How long a line is held back waiting for older lines from the other stream.
    #[arg(long, value_name = "MS", default_value_t = 100)]
    holdback_ms: u64,

    /// Longer lines are split into pieces of at most this many bytes.
    #[arg(
        long,
        value_name = "BYTES",
        default_value_t = DEFAULT_MAX_LINE_LENGTH as u64,
        value_parser = clap::value_parser!(u64).range(16..)
    )]
    max_line_length: u64,

    /// File that receives the merged, fully marked-up output.
    #[arg(value_name = "LOGFILE")]
    log_file: PathBuf,

    /// Command to run, followed by its arguments.
    #[arg(
        value_name = "COMMAND",
        required = true,
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    command: Vec<OsString>,
}

impl Cli {
    fn scheme(&self) -> ColorScheme {
        if self.plain {
            ColorScheme::Plain
        } else if self.light {
            ColorScheme::Light
        } else if self.dark {
            ColorScheme::Dark
        } else if self.bold {
            ColorScheme::Bold
        } else {
            ColorScheme::Default
        }
    }

    fn palette(&self) -> Palette {
        let mut palette = Palette::for_scheme(self.scheme());
        if let Some(out) = &self.outcolor {
            palette = palette.with_out(out.clone());
        }
        if let Some(err) = &self.errcolor {
            palette = palette.with_err(err.clone());
        }
        palette
    }

    fn session_config(self) -> CliResult<SessionConfig> {
        let max_line_length = usize::try_from(self.max_line_length).map_err(|_| {
            CliError::new(
                INTERNAL,
                format!("--max-line-length {} is too large", self.max_line_length),
            )
        })?;
        let engine = EngineConfig {
            holdback: Duration::from_millis(self.holdback_ms),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_line_length,
        };

        let colored = |is_terminal: bool| !self.plain && (self.forcecolor || is_terminal);
        let color_stdout = colored(std::io::stdout().is_terminal());
        let color_stderr = colored(std::io::stderr().is_terminal());

        Ok(SessionConfig {
            palette: self.palette(),
            timestamps: self.ts.map_or(TimestampMode::Off, TimestampMode::from),
            color_stdout,
            color_stderr,
            engine,
            log_file: self.log_file,
            command: self.command,
        })
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, LogLevel::from_debug_count(cli.debug));

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("t3: {err}");
            std::process::exit(err.code);
        }
    }
}

fn run(cli: Cli) -> CliResult<i32> {
    let config = cli.session_config()?;
    install_ctrlc_handler()?;
    tracing::debug!(?config, "starting session");

    let status = run_session(&config).map_err(engine_error)?;
    Ok(exit_code(status))
}

/// Ctrl-C reaches the command too; t3 stays up to log whatever it prints
/// on its way out and exits once both streams close.
fn install_ctrlc_handler() -> CliResult<()> {
    ctrlc::set_handler(|| {
        tracing::info!("interrupt received; waiting for command output to close");
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
