//! Fake Lepton CLI
//!
//! Streams emulated thermal frames to a recorder's Unix socket and serves
//! the HTTP control API that queues playback jobs.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use crossbeam::channel;
use fake_lepton::{
    camera::FileConfig,
    control::JobController,
    metrics::StreamMetrics,
    source::RawDumpFactory,
    stream::{Streamer, StreamerConfig},
};
use tracing::{error, info, warn};

/// How long to wait for the streamer to finish its frame after Ctrl-C.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Parser)]
#[command(name = "fake-lepton", version, about = "Emulated Lepton thermal camera")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory recorded captures are read from
    #[arg(long)]
    cptv_dir: Option<PathBuf>,

    /// Unix socket to stream frames to
    #[arg(long)]
    socket: Option<PathBuf>,

    /// HTTP control server port
    #[arg(short, long)]
    port: Option<u16>,

    /// Disable the HTTP control server
    #[arg(long)]
    no_server: bool,
}

fn load_config(args: &Args) -> Result<FileConfig, fake_lepton::camera::ConfigError> {
    let mut config = match &args.config {
        Some(path) => FileConfig::from_file(path)?,
        None => FileConfig::default(),
    };
    if let Some(dir) = &args.cptv_dir {
        config.stream.cptv_dir = dir.clone();
    }
    if let Some(socket) = &args.socket {
        config.stream.socket_path = socket.clone();
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if args.no_server {
        config.server.enabled = false;
    }
    config.validate()?;
    Ok(config)
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();
    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!("Fake Lepton v{}", fake_lepton::VERSION);
    info!(
        model = %config.camera.model,
        res_x = config.camera.res_x,
        res_y = config.camera.res_y,
        fps = config.camera.fps,
        "Emulating camera"
    );

    let metrics = match StreamMetrics::new() {
        Ok(metrics) => metrics,
        Err(e) => {
            eprintln!("Failed to create metrics registry: {}", e);
            std::process::exit(1);
        }
    };
    let controller = Arc::new(JobController::new());

    let (interrupt_tx, interrupt_rx) = channel::bounded::<()>(1);
    {
        let controller = Arc::clone(&controller);
        if let Err(e) = ctrlc::set_handler(move || {
            controller.shutdown();
            let _ = interrupt_tx.try_send(());
        }) {
            eprintln!("Could not install Ctrl-C handler: {}", e);
            std::process::exit(1);
        }
    }

    let (done_tx, done_rx) = channel::bounded::<()>(1);
    let mut streamer = Streamer::new(
        StreamerConfig::from(&config.stream),
        config.camera.clone(),
        Arc::clone(&controller),
        Arc::new(RawDumpFactory::new(&config.stream.cptv_dir).expecting(config.camera.clone())),
        metrics.clone(),
    );
    let streamer_thread = thread::Builder::new()
        .name("streamer".into())
        .spawn(move || {
            streamer.run();
            let _ = done_tx.send(());
        });
    if let Err(e) = streamer_thread {
        error!(error = %e, "Could not start streamer thread");
        std::process::exit(1);
    }

    if config.server.enabled {
        start_server(config.server.port, Arc::clone(&controller), metrics);
    }

    let _ = interrupt_rx.recv();
    info!("Shutting down");
    if done_rx.recv_timeout(SHUTDOWN_GRACE).is_err() {
        warn!("Streamer did not stop in time");
    }
}

#[cfg(feature = "server")]
fn start_server(port: u16, controller: Arc<JobController>, metrics: StreamMetrics) {
    use fake_lepton::server::{ControlServer, ControlServerConfig};

    let server = ControlServer::new(ControlServerConfig::with_port(port), controller, metrics);
    let spawned = thread::Builder::new()
        .name("http".into())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    error!(error = %e, "Could not start HTTP runtime");
                    return;
                }
            };
            if let Err(e) = runtime.block_on(server.run()) {
                error!(error = %e, "Control server stopped");
            }
        });
    if let Err(e) = spawned {
        error!(error = %e, "Could not start HTTP thread");
    }
}

#[cfg(not(feature = "server"))]
fn start_server(port: u16, _controller: Arc<JobController>, _metrics: StreamMetrics) {
    warn!(port, "Built without the server feature; control API disabled");
}
