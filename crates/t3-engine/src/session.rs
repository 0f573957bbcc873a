use std::ffi::OsString;
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};

use t3_frame::{FrameReader, Stream, Timestamp};
use t3_transport::{pipe, PipeReader};
use tracing::{debug, error, info};

use crate::config::EngineConfig;
use crate::engine::{MergeEngine, Source};
use crate::error::{EngineError, Result};
use crate::palette::Palette;
use crate::render::{RenderStyle, TimestampMode};
use crate::sink::TeeSink;
use crate::worker::spawn_worker;

/// Everything one capture session needs, fixed before it starts.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub log_file: PathBuf,
    /// Program followed by its arguments.
    pub command: Vec<OsString>,
    pub engine: EngineConfig,
    pub palette: Palette,
    pub timestamps: TimestampMode,
    /// Whether lines mirrored to our own stdout carry escape sequences.
    pub color_stdout: bool,
    /// Whether lines mirrored to our own stderr carry escape sequences.
    pub color_stderr: bool,
}

/// Run the command with both output streams captured, merged and logged.
///
/// Returns the command's exit status once it has exited and every line it
/// printed has been written out.
pub fn run_session(config: &SessionConfig) -> Result<ExitStatus> {
    let start = Timestamp::now();
    let (program, args) = config
        .command
        .split_first()
        .ok_or(EngineError::EmptyCommand)?;

    let log = File::create(&config.log_file).map_err(|source| EngineError::LogOpen {
        path: config.log_file.clone(),
        source,
    })?;
    debug!(path = %config.log_file.display(), "opened log file");

    let (out_read, out_write) = pipe()?;
    let (err_read, err_write) = pipe()?;

    let stdout = start_capture(Stream::Stdout, out_read, &config.engine)?;
    let stderr = start_capture(Stream::Stderr, err_read, &config.engine)?;

    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::from(out_write))
        .stderr(Stdio::from(err_write));
    let spawned = command.spawn();
    // The command holds our copies of the write ends; they must be closed
    // for the workers to ever see end-of-file.
    drop(command);
    let mut child = spawned.map_err(|source| EngineError::Spawn {
        command: program.to_string_lossy().into_owned(),
        source,
    })?;
    info!(pid = child.id(), command = %program.to_string_lossy(), "command started");

    let mut engine = match MergeEngine::new(stdout, stderr, &config.engine) {
        Ok(engine) => engine,
        Err(err) => {
            terminate(&mut child);
            return Err(err);
        }
    };

    let style = RenderStyle::new(config.palette.clone(), config.timestamps, start);
    let mut sink = TeeSink::new(
        style,
        BufWriter::new(log),
        io::stdout(),
        config.color_stdout,
        io::stderr(),
        config.color_stderr,
    );

    let summary = match engine.run(&mut sink) {
        Ok(summary) => summary,
        Err(err) => {
            error!(error = %err, "merge failed; stopping command");
            terminate(&mut child);
            return Err(err);
        }
    };

    let status = child.wait().map_err(EngineError::Wait)?;
    engine.reap_lingering();
    info!(
        %status,
        stdout_lines = summary.lines(Stream::Stdout),
        stderr_lines = summary.lines(Stream::Stderr),
        "command finished"
    );
    Ok(status)
}

/// Start the worker for one stream and wait until it reports in.
fn start_capture(
    stream: Stream,
    raw: PipeReader,
    config: &EngineConfig,
) -> Result<Source<PipeReader>> {
    let (message_read, message_write) = pipe()?;
    let worker = spawn_worker(stream, raw, message_write, config)?;
    let mut source = Source::new(
        stream,
        FrameReader::with_config(message_read, config.frame_config()),
        Some(worker),
    );
    source.confirm_ready()?;
    Ok(source)
}

fn terminate(child: &mut Child) {
    if let Err(err) = child.kill() {
        debug!(error = %err, "kill failed; command may have exited already");
    }
    if let Err(err) = child.wait() {
        error!(error = %err, "failed to wait for stopped command");
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::*;
    use crate::palette::ColorScheme;

    fn unique_temp_dir(prefix: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("{prefix}-{}-{nanos}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn config(log_file: &Path, script: &str, scheme: ColorScheme) -> SessionConfig {
        SessionConfig {
            log_file: log_file.to_path_buf(),
            command: vec!["sh".into(), "-c".into(), script.into()],
            engine: EngineConfig::default(),
            palette: Palette::for_scheme(scheme),
            timestamps: TimestampMode::Off,
            color_stdout: false,
            color_stderr: false,
        }
    }

    #[test]
    fn captures_both_streams_into_log() {
        let dir = unique_temp_dir("t3-session-both");
        let log = dir.join("out.log");

        let status = run_session(&config(
            &log,
            "echo to-out; sleep 0.2; echo to-err >&2",
            ColorScheme::Plain,
        ))
        .unwrap();

        assert!(status.success());
        assert_eq!(std::fs::read_to_string(&log).unwrap(), "to-out\nto-err\n");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn log_carries_markup_for_default_scheme() {
        let dir = unique_temp_dir("t3-session-markup");
        let log = dir.join("out.log");

        run_session(&config(&log, "echo colored >&2", ColorScheme::Default)).unwrap();

        let contents = std::fs::read_to_string(&log).unwrap();
        assert!(contents.contains("\x1b["));
        assert!(contents.contains("colored"));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn exit_status_is_returned() {
        let dir = unique_temp_dir("t3-session-status");
        let status =
            run_session(&config(&dir.join("out.log"), "exit 3", ColorScheme::Plain)).unwrap();

        assert_eq!(status.code(), Some(3));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let dir = unique_temp_dir("t3-session-missing");
        let mut cfg = config(&dir.join("out.log"), "", ColorScheme::Plain);
        cfg.command = vec!["t3-definitely-not-a-real-program".into()];

        let err = run_session(&cfg).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Spawn { ref source, .. } if source.kind() == io::ErrorKind::NotFound
        ));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn unwritable_log_fails_before_running_anything() {
        let dir = unique_temp_dir("t3-session-nolog");
        let marker = dir.join("ran");
        let mut cfg = config(
            &dir.join("missing-dir").join("out.log"),
            "",
            ColorScheme::Plain,
        );
        cfg.command = vec![
            "sh".into(),
            "-c".into(),
            format!("touch {}", marker.display()).into(),
        ];

        assert!(matches!(run_session(&cfg), Err(EngineError::LogOpen { .. })));
        assert!(!marker.exists());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn empty_command_is_rejected() {
        let dir = unique_temp_dir("t3-session-empty");
        let mut cfg = config(&dir.join("out.log"), "", ColorScheme::Plain);
        cfg.command.clear();

        assert!(matches!(run_session(&cfg), Err(EngineError::EmptyCommand)));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
