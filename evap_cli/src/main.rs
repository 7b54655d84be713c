mod cli;
mod commands;
mod error_fmt;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use eyre::WrapErr;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn init_tracing(
    json: bool,
    level: Option<&str>,
    logging: &evap_config::Logging,
) -> eyre::Result<()> {
    let level = level.or(logging.level.as_deref()).unwrap_or("info");
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .wrap_err_with(|| format!("invalid log level {level:?}"))?;

    let console = if json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .boxed()
    };

    let file_layer = match logging.file.as_deref() {
        Some(file) => {
            let path = std::path::Path::new(file);
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| eyre::eyre!("logging.file has no file name: {file}"))?;
            let appender = match logging.rotation.as_deref() {
                Some("daily") => tracing_appender::rolling::daily(dir, name),
                Some("hourly") => tracing_appender::rolling::hourly(dir, name),
                _ => tracing_appender::rolling::never(dir, name),
            };
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            Some(fmt::layer().json().with_ansi(false).with_writer(writer))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .try_init()
        .wrap_err("failed to install tracing subscriber")
}

fn run(cli: Cli, shutdown: Arc<AtomicBool>) -> eyre::Result<i32> {
    let mut cfg = evap_config::load_file(&cli.config)?;
    if let Some(port) = cli.port {
        cfg.link.port = port;
        cfg.validate()?;
    }
    init_tracing(cli.json, cli.log_level.as_deref(), &cfg.logging)?;

    let handler_flag = Arc::clone(&shutdown);
    ctrlc::set_handler(move || handler_flag.store(true, Ordering::Relaxed))
        .wrap_err("failed to install Ctrl-C handler")?;

    let link = commands::open_link(&cfg)?;
    let json = cli.json;
    match cli.cmd {
        Commands::Status => commands::run_status(&cfg, link, json).map(|()| 0),
        Commands::Monitor { ticks, log } => {
            commands::run_monitor(&cfg, link, ticks, log, json, &shutdown).map(|()| 0)
        }
        Commands::Set { param, target } => {
            commands::run_set(&cfg, link, param.into(), target, json).map(|()| 0)
        }
        Commands::Degas {
            target,
            duration_s,
            param,
            log,
        } => commands::run_degas(
            &cfg,
            link,
            param.into(),
            target,
            duration_s,
            log,
            json,
            &shutdown,
        ),
        Commands::SelfCheck => commands::run_self_check(&cfg, link, json).map(|()| 0),
    }
}

fn main() {
    let _ = color_eyre::install();
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    let shutdown = Arc::new(AtomicBool::new(false));
    let code = match run(cli, shutdown) {
        Ok(code) => code,
        Err(err) => {
            tracing::error!(error = %err, "command failed");
            if JSON_MODE.get().copied().unwrap_or(false) {
                eprintln!("{}", format_error_json(&err));
            } else {
                eprintln!("{}", humanize(&err));
            }
            exit_code_for_error(&err)
        }
    };
    std::process::exit(code);
}
