use clap::Parser;
use log::{error, info};

use huddle::configuration::{CommandLine, Config};
use huddle::demo;

#[tokio::main]
async fn main() {
    // https://docs.rs/env_logger/latest/env_logger/
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .init();

    println!(
        "
==============================================================================
            huddle: shared group activities over a loopback platform
==============================================================================
"
    );

    info!("Importing configuration");

    let args = CommandLine::parse();

    let config = Config::load(&args).unwrap_or_else(|e| {
        error!("Unable to import configuration: {}", e);
        std::process::exit(1);
    });

    info!(
        "Configuration imported successfully: {} with {} device(s)",
        config.demo.activity, config.demo.participants
    );

    match demo::run(&config).await {
        Ok(report) => print!("{}", report),
        Err(e) => {
            error!("Simulation failed: {}", e);
            std::process::exit(1);
        }
    }
}
