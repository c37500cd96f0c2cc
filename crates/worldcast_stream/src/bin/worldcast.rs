//! # WORLDCAST Recorder
//!
//! Records a scripted walk through the test-pattern world to a file, a
//! live stream or a frame socket.
//!
//! ## Usage
//!
//! ```bash
//! worldcast configs/recording.toml
//! worldcast --output /output/recording.mp4 --frames 600 --fps 30
//! worldcast --output 127.0.0.1:8089 --width 640 --height 360
//! ```

use std::fmt::Display;
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Duration;

use tracing_subscriber::EnvFilter;
use worldcast_core::{FrameBudget, PipelineConfig, SinkConfig};
use worldcast_session::{session_channel, ScriptedWalk, TestPatternRenderer, WalkScript};
use worldcast_stream::{open_sink, Pipeline, Recorder};

struct Args {
    config_path: Option<String>,
    output: Option<String>,
    frames: Option<i64>,
    fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
    duration_secs: u64,
    follow: Option<String>,
}

fn print_usage() {
    println!("Usage: worldcast <CONFIG.toml>");
    println!("       worldcast --output <DEST> [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -o, --output <DEST>        .mp4/.mkv file, rtmp:// URL, or host:port");
    println!("  -n, --frames <N>           Frames to record, negative = unbounded (default: -1)");
    println!("  -f, --fps <FPS>            Target frame rate (default: 60)");
    println!("      --width <W>            Frame width (default: 512)");
    println!("      --height <H>           Frame height (default: 512)");
    println!("  -d, --duration-secs <S>    Length of the scripted walk (default: 25)");
    println!("      --follow <NAME>        Player name to note in the logs");
    println!("  -h, --help                 Show this help");
}

/// Parses a flag's value, rejecting a missing or malformed one.
fn parse_value<T: FromStr>(flag: &str, value: Option<&String>) -> Result<T, String>
where
    T::Err: Display,
{
    let value = value.ok_or_else(|| format!("{flag} needs a value"))?;
    value.parse().map_err(|e| format!("invalid value {value:?} for {flag}: {e}"))
}

/// `Ok(None)` means help was requested.
fn parse_args(args: &[String]) -> Result<Option<Args>, String> {
    let mut parsed = Args {
        config_path: None,
        output: None,
        frames: None,
        fps: None,
        width: None,
        height: None,
        duration_secs: 25,
        follow: None,
    };

    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        let value = args.get(i + 1);
        match flag {
            "--output" | "-o" => {
                parsed.output = Some(parse_value(flag, value)?);
                i += 1;
            }
            "--frames" | "-n" => {
                parsed.frames = Some(parse_value(flag, value)?);
                i += 1;
            }
            "--fps" | "-f" => {
                parsed.fps = Some(parse_value(flag, value)?);
                i += 1;
            }
            "--width" => {
                parsed.width = Some(parse_value(flag, value)?);
                i += 1;
            }
            "--height" => {
                parsed.height = Some(parse_value(flag, value)?);
                i += 1;
            }
            "--duration-secs" | "-d" => {
                parsed.duration_secs = parse_value(flag, value)?;
                i += 1;
            }
            "--follow" => {
                parsed.follow = Some(parse_value(flag, value)?);
                i += 1;
            }
            "--help" | "-h" => return Ok(None),
            other if !other.starts_with('-') && parsed.config_path.is_none() => {
                parsed.config_path = Some(other.to_string());
            }
            other => eprintln!("Ignoring unknown argument {other}"),
        }
        i += 1;
    }
    Ok(Some(parsed))
}

fn build_config(args: &Args) -> Result<PipelineConfig, String> {
    let mut config = match (&args.config_path, &args.output) {
        (Some(path), _) => PipelineConfig::load(path).map_err(|e| e.to_string())?,
        (None, Some(output)) => PipelineConfig::new(SinkConfig::infer(output)),
        (None, None) => return Err("no config file or --output given".into()),
    };
    if let Some(frames) = args.frames {
        config.budget = FrameBudget::from(frames);
    }
    if let Some(fps) = args.fps {
        config.fps = fps;
    }
    if let Some(width) = args.width {
        config.width = width;
    }
    if let Some(height) = args.height {
        config.height = height;
    }
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let argv: Vec<String> = std::env::args().collect();
    let args = match parse_args(&argv) {
        Ok(Some(args)) => args,
        Ok(None) => {
            print_usage();
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            eprintln!("worldcast: {e}");
            print_usage();
            return ExitCode::from(2);
        }
    };
    let config = match build_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("worldcast: {e}");
            print_usage();
            return ExitCode::from(2);
        }
    };

    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║         WORLDCAST RECORDER                                       ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();
    println!("┌─ CONFIGURATION ─────────────────────────────────────────────────┐");
    println!("│ Sink:         {} → {}", config.sink.kind(), config.sink.destination());
    println!("│ Frame rate:   {} fps", config.fps);
    println!("│ Resolution:   {}x{}", config.width, config.height);
    println!("│ Frames:       {}", config.budget);
    println!("│ Script:       {} s", args.duration_secs);
    println!("└──────────────────────────────────────────────────────────────────┘");
    println!();

    let sink = match open_sink(&config) {
        Ok(sink) => sink,
        Err(e) => {
            eprintln!("worldcast: {e}");
            return ExitCode::FAILURE;
        }
    };

    let (feed, events) = session_channel();
    let renderer = TestPatternRenderer::new(config.width, config.height);
    let pipeline = Pipeline::new(config, renderer, sink);

    let script = WalkScript {
        duration: Duration::from_secs(args.duration_secs),
        ..WalkScript::default()
    };
    let walk = match ScriptedWalk::spawn(script, feed) {
        Ok(walk) => walk,
        Err(e) => {
            eprintln!("worldcast: failed to start session script: {e}");
            return ExitCode::FAILURE;
        }
    };

    let recorder = Recorder::new();
    let report = match recorder
        .start(pipeline, events, args.follow.as_deref())
        .and_then(worldcast_stream::RecordingHandle::wait)
    {
        Ok(report) => report,
        Err(e) => {
            eprintln!("worldcast: {e}");
            return ExitCode::FAILURE;
        }
    };
    let steps = walk.stop();

    println!();
    println!("┌─ RESULT ────────────────────────────────────────────────────────┐");
    println!("│ Outcome:          {}", report.outcome);
    println!("│ Ticks:            {}", report.stats.ticks);
    println!("│ Skipped renders:  {}", report.stats.render_failures);
    println!("│ Blocked writes:   {}", report.stats.blocked_writes);
    println!("│ Avg work:         {} µs", report.pacing.avg_work_us);
    println!("│ Late ticks:       {}", report.pacing.late_ticks);
    println!("│ Effective rate:   {:.1} fps", report.effective_fps);
    println!("│ Poses applied:    {} ({} script steps)", report.sync.poses_applied, steps);
    println!("└──────────────────────────────────────────────────────────────────┘");

    if report.outcome.is_defect() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        std::iter::once("worldcast").chain(args.iter().copied()).map(String::from).collect()
    }

    #[test]
    fn test_parses_numeric_flags() {
        let args = parse_args(&argv(&["-o", "out.mp4", "--frames", "-1", "--fps", "30", "-d", "5"]))
            .unwrap()
            .unwrap();
        assert_eq!(args.output.as_deref(), Some("out.mp4"));
        assert_eq!(args.frames, Some(-1));
        assert_eq!(args.fps, Some(30));
        assert_eq!(args.duration_secs, 5);
        assert!(build_config(&args).is_ok());
    }

    #[test]
    fn test_malformed_number_is_an_error() {
        let err = parse_args(&argv(&["-o", "out.mp4", "--fps", "thirty"])).err().unwrap();
        assert!(err.contains("--fps"), "{err}");
        assert!(parse_args(&argv(&["--frames", "1.5"])).is_err());
        assert!(parse_args(&argv(&["--width", "-640"])).is_err());
    }

    #[test]
    fn test_missing_value_is_an_error() {
        let err = parse_args(&argv(&["--output", "out.mp4", "--height"])).err().unwrap();
        assert!(err.contains("--height needs a value"), "{err}");
    }

    #[test]
    fn test_help_short_circuits() {
        assert!(parse_args(&argv(&["--fps", "30", "--help"])).unwrap().is_none());
    }
}
