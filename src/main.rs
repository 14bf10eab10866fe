mod boards;
mod bus;
mod config;
mod display;
mod error;
mod models;
mod sensors;
mod server;
mod smoothing;
mod utils;

use std::env;
use std::error::Error;
use std::process;
use std::sync::Mutex;
use std::time::Duration;

use embedded_hal_bus::i2c::MutexDevice;
use log::{error, info, warn};
use rppal::i2c::I2c;
use tokio::task;
use tokio::time::{interval, MissedTickBehavior};

use boards::{Board, BoardKind};
use bus::ThreadDelay;
use config::{parse_args, usage, Command, MonitorConfig};
use display::{Display, TextPanel};
use smoothing::SysfsThermalZone;
use utils::{format_datetime, local_now};

type PiBoard = Board<MutexDevice<'static, I2c>, ThreadDelay, SysfsThermalZone>;

async fn main_loop(mut board: PiBoard, period: Duration) -> Result<(), Box<dyn Error>> {
    let kind = board.kind();
    info!(
        "Sampling {} every {} ms, starting at {}",
        kind,
        period.as_millis(),
        format_datetime(&local_now())
    );

    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut failures: u64 = 0;
    loop {
        ticker.tick().await;

        // Bus I/O blocks, so the pass runs off the runtime and hands the board back
        let (returned, result) = task::spawn_blocking(move || {
            let result = board.update();
            (board, result)
        })
        .await?;
        board = returned;

        match result {
            Ok(()) => {
                if failures > 0 {
                    info!("{} recovered after {} failed passes", kind, failures);
                    failures = 0;
                }
            }
            Err(e) => {
                failures += 1;
                error!("{} update failed: {}", kind, e);
            }
        }
    }
}

fn open_board(
    kind: BoardKind,
    config: &MonitorConfig,
) -> Result<PiBoard, Box<dyn Error + Send + Sync>> {
    let i2c = I2c::with_bus(config.i2c_bus)?;
    info!("Opened I2C bus {}", config.i2c_bus);
    // Every driver holds a device on this bus for the rest of the process
    let bus: &'static Mutex<I2c> = Box::leak(Box::new(Mutex::new(i2c)));

    let display: Option<Box<dyn Display>> = match (kind, config.display) {
        (BoardKind::EnviroPlus, true) => Some(Box::new(TextPanel::new())),
        _ => None,
    };

    let thermal_zone = SysfsThermalZone::new(config.thermal_zone.clone());
    info!("CPU temperature from {}", thermal_zone.path().display());

    let board = Board::open(
        kind,
        || MutexDevice::new(bus),
        ThreadDelay,
        thermal_zone,
        &config.board_settings(),
        display,
    )?;
    Ok(board)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let program = env::args().next().unwrap_or_else(|| "sensor-monitor".into());
    let kind = match parse_args(env::args().skip(1)) {
        Ok(Command::Run(kind)) => kind,
        Ok(Command::ListBoards) => {
            for kind in BoardKind::ALL {
                println!("{}", kind);
            }
            return Ok(());
        }
        Ok(Command::Help) => {
            println!("{}", usage(&program));
            return Ok(());
        }
        Err(e) => {
            eprintln!("{}\n\n{}", e, usage(&program));
            process::exit(2);
        }
    };

    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_secs()
        .init();

    // Load configuration
    let config = match MonitorConfig::new() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // Driver setup includes multi-second warm-ups
    let board = {
        let config = config.clone();
        match task::spawn_blocking(move || open_board(kind, &config)).await? {
            Ok(board) => board,
            Err(e) => {
                error!("Failed to open {}: {}", kind, e);
                let e: Box<dyn Error> = e;
                return Err(e);
            }
        }
    };

    let listener = server::bind(config.listen_addr).await?;
    let snapshot = board.snapshot();
    tokio::spawn(async move {
        if let Err(e) = server::serve(listener, snapshot).await {
            error!("HTTP server stopped: {}", e);
        }
    });

    // Handle Ctrl+C gracefully
    let (tx, mut rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        let _ = tx.send(());
    });

    // Run main loop or wait for shutdown signal
    tokio::select! {
        result = main_loop(board, config.update_interval) => {
            match result {
                Ok(_) => info!("Sampling stopped"),
                Err(e) => error!("Fatal error: {}", e),
            }
        }
        _ = &mut rx => {
            info!("Program terminated by user. Exiting gracefully.");
        }
    }

    Ok(())
}
