// bus-module-example: a minimal module process, standing in for the
// real supervisor/UI processes that would otherwise attach to this
// bus. Registers a `server.ping` responder and announces itself via
// `server.created`.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use bus_codec::Value;
use bus_core::{Bus, BusConfig, Callback, CallbackDescriptor};
use chrono::Utc;
use tracing::{error, info};

fn usage() -> ! {
    eprintln!("usage: bus-module-example <instance-id> <endpoint-key> [config-path] [catalog-path]");
    std::process::exit(2);
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let instance_id = args.next().unwrap_or_else(|| usage());
    let key = args.next().unwrap_or_else(|| usage());
    let config_path = args.next().unwrap_or_else(|| "/etc/bus/daemon.toml".to_string());
    let catalog_path = args.next().unwrap_or_else(|| "/etc/bus/catalog.toml".to_string());

    info!(instance_id, key, "bus-module-example starting");

    let config = match BusConfig::load_from_file(Path::new(&config_path)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("FATAL: failed to load config from {config_path}: {e}");
            std::process::exit(1);
        }
    };
    let catalog = match bus_schema::Catalog::load_from_file(Path::new(&catalog_path)) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            eprintln!("FATAL: failed to load catalog from {catalog_path}: {e}");
            std::process::exit(1);
        }
    };

    let bus = match Bus::attach(&instance_id, &key, config, catalog.clone()) {
        Ok(b) => Arc::new(b),
        Err(e) => {
            eprintln!("FATAL: failed to attach to bus instance {instance_id:?}: {e}");
            std::process::exit(1);
        }
    };
    info!(endpoint_id = bus.endpoint_id(), "attached to bus");

    if let Ok(ping) = catalog.lookup_by_name("server.ping") {
        let key_for_reply = key.clone();
        let responder: Callback = Arc::new(move |args: &HashMap<String, Value>| {
            let requested = match args.get("server_name") {
                Some(Value::Str(s)) => s.clone(),
                _ => return None,
            };
            if requested != key_for_reply && requested != "*" {
                return None;
            }
            Some(Value::Str(format!("{key_for_reply} pong")))
        });
        let descriptor = CallbackDescriptor::new(
            responder,
            vec![("server_name".to_string(), "string".to_string())],
            "string",
        );
        if let Err(e) = bus.register(&ping, descriptor) {
            error!(error = %e, "failed to register server.ping responder");
        }
    }

    bus.start();

    if let Ok(created) = catalog.lookup_by_name("server.created") {
        let mut kwargs = HashMap::new();
        kwargs.insert("timestamp".to_string(), Value::DateTime(Utc::now()));
        kwargs.insert("server_name".to_string(), Value::Str(key.clone()));
        kwargs.insert("flavor".to_string(), Value::Str("survival".to_string()));
        if let Err(e) = bus.trigger(&created, kwargs, None) {
            error!(error = %e, "failed to announce server.created");
        }
    }

    let shutdown_bus = bus.clone();
    ctrlc::set_handler(move || {
        info!("received shutdown signal");
        shutdown_bus.stop();
        std::process::exit(0);
    })
    .expect("failed to install signal handler");

    loop {
        std::thread::sleep(Duration::from_secs(30));
        if !bus.is_listening() {
            break;
        }
    }
}
