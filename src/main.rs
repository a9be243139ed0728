mod app;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tracing::{error, info};

use probe_config::{load_config, ConfigFile};
use probe_core::{Debugger, DebuggerHandle};

use app::console::StdConsole;
use app::{commands, descriptor_from_preset, Repl};

struct CliArgs {
    config_path: Option<PathBuf>,
    preset: Option<String>,
}

fn parse_args(args: &[String]) -> Result<CliArgs> {
    let mut parsed = CliArgs {
        config_path: None,
        preset: None,
    };
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                let value = iter.next().context("--config needs a path")?;
                parsed.config_path = Some(PathBuf::from(value));
            }
            "--help" | "-h" => {
                bail!("usage: probe [--config PATH] [PRESET]");
            }
            name if !name.starts_with('-') => {
                if parsed.preset.is_some() {
                    bail!("unexpected argument: {name}");
                }
                parsed.preset = Some(name.to_string());
            }
            other => bail!("unknown option: {other}"),
        }
    }
    Ok(parsed)
}

fn choose_preset<'a>(config: &'a ConfigFile, requested: Option<&str>) -> Result<(&'a str, &'a probe_config::Preset)> {
    if let Some(name) = requested {
        let (name, preset) = config
            .preset
            .get_key_value(name)
            .with_context(|| format!("no such preset: {name}"))?;
        return Ok((name.as_str(), preset));
    }
    match config.preset.len() {
        0 => bail!("no presets configured; add a [preset.<name>] table to the config file"),
        1 => {
            let (name, preset) = config.preset.iter().next().unwrap();
            Ok((name, preset))
        }
        _ => bail!(
            "several presets configured, pick one: {}",
            config.preset_names().join(", ")
        ),
    }
}

fn init_logging(config: &ConfigFile) {
    // Logs go to a file, never stdout: the REPL owns the terminal.
    let path = config.log.file.clone().unwrap_or_else(|| {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(".local/state/probe/probe.log");
        }
        PathBuf::from("probe.log")
    });
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let file = std::fs::File::create(&path)
        .unwrap_or_else(|_| std::fs::File::create("/dev/null").expect("cannot open /dev/null"));
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(config.log.level.clone()))
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .init();
}

#[tokio::main]
async fn run(args: CliArgs) -> Result<()> {
    let config_path = args
        .config_path
        .unwrap_or_else(probe_config::default_config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("failed to load config: {}", config_path.display()))?;
    init_logging(&config);

    let (preset_name, preset) = choose_preset(&config, args.preset.as_deref())?;
    let descriptor = descriptor_from_preset(preset_name, preset);
    info!("starting preset '{preset_name}' ({})", descriptor.command);

    let (console, gate) = StdConsole::new();
    let mut debugger = Debugger::new(descriptor, console.clone());
    let commands = commands::all_commands();
    for command in &commands {
        debugger.register_command(command.clone());
    }
    let (handle, mut shutdown_rx) = DebuggerHandle::new(debugger);

    if let Err(e) = handle.launch().await {
        // A fatal adapter failure at launch writes a diagnostic and
        // terminates with status 0 (legacy behavior).
        error!("launch failed: {e}");
        eprintln!("probe: failed to launch debug adapter: {e}");
        std::process::exit(0);
    }

    let repl = Repl::new(handle.clone(), commands, gate);
    let repl_task = tokio::spawn(repl.run());

    tokio::select! {
        result = repl_task => {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("repl failed: {e}"),
                Err(e) => error!("repl task panicked: {e}"),
            }
            handle.close().await;
        }
        status = shutdown_rx.recv() => {
            let status = status.unwrap_or(0);
            info!("host exit requested with status {status}");
            handle.close().await;
            std::process::exit(status);
        }
    }
    info!("probe exited cleanly");
    Ok(())
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let parsed = match parse_args(&args) {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("probe: {e}");
            std::process::exit(2);
        }
    };
    if let Err(e) = run(parsed) {
        eprintln!("probe: {e:#}");
        std::process::exit(1);
    }
}
