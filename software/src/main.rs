use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use env_logger::Env;
use log::{error, info};
use webgpio_common::header::{PinCategory, PinRegistry};
use webgpio_server::config::Config;
use webgpio_server::controller::PinController;
use webgpio_server::drivers::{self, DriverKind};
use webgpio_server::{api, blink};

#[derive(Parser)]
#[command(author, version, about = "Web controller for the Jetson 40-pin GPIO header", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serves the HTTP API and web page (default)
    Serve(ServeArgs),
    /// Toggles one pin a few times, then releases the hardware
    Blink {
        /// Physical header position
        #[arg(short, long)]
        pin: u8,

        #[arg(long, default_value_t = 500)]
        period_ms: u64,

        #[arg(short, long, default_value_t = 10)]
        count: u32,

        #[command(flatten)]
        board: BoardArgs,
    },
    /// Prints the header table and exits
    Pins {
        #[command(flatten)]
        board: BoardArgs,
    },
}

#[derive(Args, Default)]
struct BoardArgs {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Use in-memory GPIO lines instead of sysfs
    #[arg(long)]
    simulate: bool,
}

#[derive(Args, Default)]
struct ServeArgs {
    /// Listen address, overrides the configuration file
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    #[command(flatten)]
    board: BoardArgs,
}

impl BoardArgs {
    fn config(&self) -> anyhow::Result<Config> {
        let mut config = Config::load_or_default(self.config.as_deref())
            .context("loading configuration")?;
        if self.simulate {
            config.driver = DriverKind::Simulated;
        }
        Ok(config)
    }
}

fn open_controller(config: &Config) -> PinController {
    info!("Initializing GPIO controller ({:?} driver)", config.driver);
    PinController::init(config.registry(), drivers::open(config.driver))
}

fn release(controller: &PinController) {
    if let Err(e) = controller.shutdown() {
        error!("GPIO cleanup failed: {}", e);
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                error!("failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutting down");
}

async fn serve(controller: Arc<PinController>, bind: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await
        .with_context(|| format!("binding {}", bind))?;
    info!("Starting Jetson Orin GPIO Web Controller on http://{}", bind);

    axum::serve(listener, api::router(controller))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")
}

fn run_server(args: ServeArgs) -> anyhow::Result<()> {
    let config = args.board.config()?;
    let bind = args.bind.unwrap_or(config.bind);
    let controller = Arc::new(open_controller(&config));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting async runtime")?;
    let served = runtime.block_on(serve(controller.clone(), bind));

    release(&controller);
    served
}

fn run_blink(pin: u8, period: Duration, count: u32, board: BoardArgs) -> anyhow::Result<()> {
    let config = board.config()?;
    let controller = open_controller(&config);

    let blinked = blink::blink(&controller, pin, period, count)
        .with_context(|| format!("blinking pin {}", pin));
    release(&controller);
    blinked
}

fn print_pins(registry: &PinRegistry) {
    for pin in registry {
        let category = match pin.category {
            PinCategory::Power => "power",
            PinCategory::Ground => "ground",
            PinCategory::Gpio => "gpio",
        };
        let line = pin.line.map(|l| l.to_string()).unwrap_or_else(|| "-".to_string());
        let marker = if pin.is_controllable() { "*" } else { " " };
        println!("{} {:>2}  {:<6} {:>4}  {}", marker, pin.position, category, line, pin.description);
    }
    println!("* controllable");
}

fn main() -> anyhow::Result<()> {
    let env = Env::default().filter_or("WEBGPIO_LOG", "info");
    env_logger::init_from_env(env);

    let cli = Cli::parse();
    match cli.command.unwrap_or_else(|| Command::Serve(ServeArgs::default())) {
        Command::Serve(args) => run_server(args),
        Command::Blink { pin, period_ms, count, board } => {
            run_blink(pin, Duration::from_millis(period_ms), count, board)
        },
        Command::Pins { board } => {
            print_pins(&board.config()?.registry());
            Ok(())
        },
    }
}
