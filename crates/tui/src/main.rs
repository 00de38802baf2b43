mod renderer;

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result, bail};
use stepreel_core::model::{Scenario, parse_scenario};
use stepreel_core::scenarios::{BUILTIN_NAMES, builtin_for};
use stepreel_core::svg::render_svg;
use stepreel_core::{CommandSink, Config, ResumeSignal, Stage, Timeline};
use stepreel_protocol::TimedCommand;
use tracing_subscriber::EnvFilter;

const USAGE: &str =
    "Usage: stepreel [SCENARIO|FILE.json] [--independent] [--config FILE] [--svg OUT] [--list]";

#[derive(Debug, Default)]
struct Args {
    scenario: Option<String>,
    independent: bool,
    config: Option<PathBuf>,
    svg: Option<PathBuf>,
    list: bool,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args> {
    let mut parsed = Args::default();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--independent" => parsed.independent = true,
            "--list" => parsed.list = true,
            "--config" => {
                let path = args.next().context("--config needs a file")?;
                parsed.config = Some(PathBuf::from(path));
            }
            "--svg" => {
                let path = args.next().context("--svg needs an output file")?;
                parsed.svg = Some(PathBuf::from(path));
            }
            "-h" | "--help" => bail!("{USAGE}"),
            flag if flag.starts_with("--") => bail!("unknown flag {flag}\n{USAGE}"),
            _ if parsed.scenario.is_some() => bail!("more than one scenario given\n{USAGE}"),
            _ => parsed.scenario = Some(arg),
        }
    }
    Ok(parsed)
}

fn load_config(args: &Args) -> Result<Config> {
    match &args.config {
        Some(path) => {
            let data = std::fs::read(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            Config::from_json(&data).with_context(|| format!("parsing config {}", path.display()))
        }
        None => Ok(Config::default()),
    }
}

fn load_scenario(name: &str, config: &Config) -> Result<Scenario> {
    if name.ends_with(".json") {
        let data = std::fs::read(name).with_context(|| format!("reading scenario {name}"))?;
        return parse_scenario(&data).with_context(|| format!("parsing scenario {name}"));
    }
    Ok(builtin_for(name, config)?)
}

fn init_logging() -> Result<PathBuf> {
    let path = std::env::temp_dir().join("stepreel.log");
    let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(path)
}

fn export_svg(timeline: &Timeline, out: &Path) -> Result<()> {
    let mut stage = Stage::new();
    for command in timeline.setup_commands() {
        stage.apply(&TimedCommand { at_ms: 0.0, command });
    }
    let config = timeline.config();
    let svg = render_svg(&stage.snapshot(0.0), config.window_width, config.window_height);
    std::fs::write(out, svg).with_context(|| format!("writing {}", out.display()))?;
    tracing::info!(path = %out.display(), "snapshot written");
    Ok(())
}

fn main() -> Result<()> {
    let args = parse_args(std::env::args().skip(1))?;

    if args.list {
        let mut out = std::io::stdout().lock();
        for name in BUILTIN_NAMES {
            writeln!(out, "{name}")?;
        }
        return Ok(());
    }

    let log_path = init_logging()?;
    let config = load_config(&args)?;
    let name = args.scenario.as_deref().unwrap_or("simple_one_thread");
    let mut scenario = load_scenario(name, &config)?;
    if args.independent {
        scenario = scenario.independent();
    }
    let timeline = Timeline::prepare(&scenario, config.clone())
        .with_context(|| format!("preparing scenario {}", scenario.name))?;

    if let Some(out) = &args.svg {
        return export_svg(&timeline, out);
    }

    let (sink, rx) = CommandSink::channel();
    let resume = ResumeSignal::new();
    let scheduler_resume = resume.clone();
    // The scheduler owns its own single-threaded runtime; the UI thread only
    // drains the command channel.
    let scheduler = thread::Builder::new()
        .name("scheduler".into())
        .spawn(move || -> Result<()> {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .context("building scheduler runtime")?;
            let report = runtime
                .block_on(timeline.run(&sink, Some(scheduler_resume)))
                .inspect_err(|err| tracing::error!(%err, "scheduler failed"))?;
            tracing::info!(
                events = report.consumed.len(),
                elapsed_ms = report.elapsed_ms,
                "scheduler done"
            );
            Ok(())
        })
        .context("spawning scheduler thread")?;

    tracing::info!(scenario = %scenario.name, log = %log_path.display(), "playing");
    renderer::play(rx, &resume, &config, &scenario.name)?;
    scheduler_outcome(scheduler)
}

/// Result of the scheduler thread, if it already stopped. A run the user
/// quit early is left to end with the process.
fn scheduler_outcome(handle: JoinHandle<Result<()>>) -> Result<()> {
    if !handle.is_finished() {
        return Ok(());
    }
    match handle.join() {
        Ok(result) => result.context("scheduler failed"),
        Err(_) => bail!("scheduler thread panicked"),
    }
}
