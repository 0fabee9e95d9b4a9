// bus-daemon: hosts the star-topology dispatcher that routes frames
// between every module process attached to this bus.

use std::path::Path;
use std::sync::Arc;

use bus_core::{BusConfig, Dispatcher};
use tracing::info;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "bus-daemon starting");

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "/etc/bus/daemon.toml".to_string());
    let config = match BusConfig::load_from_file(Path::new(&config_path)) {
        Ok(cfg) => {
            info!(
                memory_size = cfg.memory_size,
                max_frame_length = cfg.max_frame_length,
                known_endpoints = cfg.known_endpoints.len(),
                "config loaded"
            );
            cfg
        }
        Err(e) => {
            eprintln!("FATAL: failed to load config from {config_path}: {e}");
            std::process::exit(1);
        }
    };

    if let Some(catalog_path) = std::env::args().nth(2) {
        if let Err(e) = bus_schema::Catalog::load_from_file(Path::new(&catalog_path)) {
            eprintln!("FATAL: catalog at {catalog_path} failed to load: {e}");
            std::process::exit(1);
        }
        info!(catalog_path, "catalog validated");
    }

    let dispatcher = Arc::new(Dispatcher::new(config.clone()));
    info!(instance_id = dispatcher.instance_id(), "dispatcher instance id assigned");

    for key in &config.known_endpoints {
        match dispatcher.get_bus_data(key) {
            Ok(data) => info!(key, endpoint_id = data.endpoint_id, "pre-allocated known endpoint"),
            Err(e) => {
                eprintln!("FATAL: could not pre-allocate endpoint {key:?}: {e}");
                std::process::exit(1);
            }
        }
    }

    let shutdown_dispatcher = dispatcher.clone();
    ctrlc::set_handler(move || {
        info!("received shutdown signal");
        shutdown_dispatcher.stop();
    })
    .expect("failed to install signal handler");

    dispatcher.mainloop();
    info!("bus-daemon exiting");
}
