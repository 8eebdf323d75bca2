use std::env;
use std::fs::OpenOptions;
use std::process;
use std::sync::Mutex;

use cinder_server::{run, Config};
use tokio::net::TcpListener;
use tracing::info;

/// The whole server stays on one thread: connections and the store are
/// cooperative tasks, and only snapshot serialization leaves it.
#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args: Vec<String> = env::args().skip(1).collect();

    let config = match args.len() {
        0 => Config::default(),
        1 => Config::load(&args[0]).unwrap_or_else(|e| {
            eprintln!("fatal config file error: {e}");
            process::exit(1);
        }),
        _ => {
            eprintln!("usage: cinder-server [/path/to/cinder.conf]");
            process::exit(1);
        }
    };

    init_logging(&config);
    ignore_sighup();

    let addr = format!("{}:{}", config.bind, config.port);
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("can't listen on {addr}: {e}");
            process::exit(1);
        }
    };

    info!("server started, listening on {addr}");

    if let Err(e) = run(listener, config).await {
        eprintln!("fatal error: {e}");
        process::exit(1);
    }
}

/// SIGPIPE is already ignored by the Rust runtime; registering a
/// SIGHUP stream (and never acting on it) replaces the default
/// terminate disposition.
fn ignore_sighup() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        if let Ok(mut hangup) = signal(SignalKind::hangup()) {
            tokio::spawn(async move {
                loop {
                    hangup.recv().await;
                }
            });
        }
    }
}

/// Installs the tracing subscriber per the `loglevel` / `logfile`
/// directives. The log file was already validated by the config parser.
fn init_logging(config: &Config) {
    let level = config.log_level.as_tracing();
    match &config.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .unwrap_or_else(|e| {
                    eprintln!("can't open the log file: {e}");
                    process::exit(1);
                });
            tracing_subscriber::fmt()
                .with_max_level(level)
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .init();
        }
        None => {
            tracing_subscriber::fmt().with_max_level(level).init();
        }
    }
}
