use std::sync::Arc;

use dumbometrics::config::{load_config, print_schema};
use dumbometrics::hooks::Hooks;
use dumbometrics::startup::run;
use dumbometrics::utils::logger::init_logging;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    if std::env::args().nth(1).as_deref() == Some("schema") {
        if let Err(e) = print_schema() {
            eprintln!("Error printing configuration schema: {}", e);
            std::process::exit(1);
        }
        return;
    }

    let config = match load_config() {
        Ok(config) => Arc::new(config),
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = init_logging(&config.logging) {
        eprintln!("Error initializing logging: {}", e);
        std::process::exit(1);
    }

    let hooks = Hooks::new().on_start(|| info!("Serving metrics"));

    if let Err(e) = run(config, hooks).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}
