use std::io::BufRead;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use clap::Subcommand;
use tracing_subscriber::filter::LevelFilter;

use emberd::Config;
use emberd::Engine;
use emberd::integrations::airquality;
use emberd::integrations::airquality::flow;

#[derive(Parser)]
#[command(name = "emberd", version, about = "Home daemon for polled vendor integrations")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the daemon
    Run {
        /// Path to the TOML configuration file
        #[arg(long, default_value = "emberd.toml")]
        config: PathBuf,
    },

    /// Interactive setup flows that emit config snippets
    Flow {
        #[command(subcommand)]
        flow: FlowCommand,
    },
}

#[derive(Subcommand)]
enum FlowCommand {
    /// Set up an air-quality station entry
    AirQuality {
        /// Update the named existing entry's token/interval instead of
        /// creating a new one
        #[arg(long, value_name = "ENTRY_ID")]
        update: Option<String>,

        /// Config file to read the existing entry from (with --update)
        #[arg(long, default_value = "emberd.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run { config } => run(config).await,
        Command::Flow {
            flow:
                FlowCommand::AirQuality {
                    update: Some(entry_id),
                    config,
                },
        } => flow_air_quality_update(config, entry_id).await,
        Command::Flow {
            flow: FlowCommand::AirQuality { update: None, .. },
        } => flow_air_quality().await,
    }
}

async fn run(config_path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_file(&config_path)?;

    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::from(config.logging.level))
        .init();

    tracing::info!("emberd starting");
    tracing::info!("Loaded config from: {}", config_path.display());

    let mut engine = Engine::new();
    engine.register_integrations_from_config(&config);
    let engine = Arc::new(engine);

    // Engine event loop
    let engine_task = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.run().await })
    };

    // Optional HTTP API
    let mut api_shutdown = None;
    if let Some(api_config) = &config.api {
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
        api_shutdown = Some(shutdown_tx);

        let engine = engine.clone();
        let listen = api_config.listen.clone();
        let port = api_config.port;
        tokio::spawn(async move {
            if let Err(e) = emberd::api::serve(engine, listen, port, shutdown_rx).await {
                tracing::error!("HTTP API server failed: {}", e);
            }
        });
    }

    tracing::info!("All integrations started, entering main loop");
    tracing::info!("Press Ctrl+C to exit");

    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received shutdown signal"),
        Err(e) => tracing::error!("Failed to listen for shutdown signal: {}", e),
    }

    if let Some(shutdown_tx) = api_shutdown {
        let _ = shutdown_tx.send(());
    }

    // Dropping the command channels lets every integration task run its
    // shutdown path (stopping its poller).
    engine.stop_integrations();
    engine_task.abort();

    tracing::info!("emberd shutdown complete");
    Ok(())
}

/// Drive the air-quality config-flow FSM interactively and print a config
/// snippet for the chosen station.
async fn flow_air_quality() -> Result<(), Box<dyn std::error::Error>> {
    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();

    let pick_state = loop {
        let token = prompt(&mut lines, "API token")?;
        let keyword = prompt(&mut lines, "Station search keyword")?;
        let interval = prompt(&mut lines, "Update interval in seconds [900]")?;
        let update_interval = if interval.is_empty() {
            emberd::config::DEFAULT_UPDATE_INTERVAL
        } else {
            interval.parse()?
        };

        let client = airquality::WaqiClient::new(token.clone());
        let input = flow::CredentialsInput {
            token,
            keyword,
            update_interval,
        };

        match flow::submit_credentials(&client, &input).await {
            Ok(flow::FlowState::PickStation(state)) => break state,
            Ok(other) => {
                eprintln!("unexpected flow state: {:?}", other);
                return Ok(());
            }
            Err(flow::FlowError::Field { field, code }) => {
                // Field errors are re-promptable.
                eprintln!("{:?}: {}", field, code);
                continue;
            }
            Err(flow::FlowError::Aborted(message)) => {
                eprintln!("setup aborted: {}", message);
                return Ok(());
            }
        }
    };

    println!("Matching stations:");
    for station in &pick_state.candidates {
        println!("  {:>8}  {}", station.uid, station.name);
    }

    let spec = loop {
        let uid: i64 = prompt(&mut lines, "Station uid")?.parse()?;
        match flow::pick_station(pick_state.clone(), uid) {
            Ok(flow::FlowState::Complete(spec)) => break spec,
            Ok(other) => {
                eprintln!("unexpected flow state: {:?}", other);
                return Ok(());
            }
            Err(flow::FlowError::Field { code, .. }) => {
                eprintln!("{}", code);
                continue;
            }
            Err(flow::FlowError::Aborted(message)) => {
                eprintln!("setup aborted: {}", message);
                return Ok(());
            }
        }
    };

    println!();
    println!("Add this to your emberd.toml:");
    println!();
    println!("[integrations.airquality.station_{}]", spec.station_id);
    println!("token = \"{}\"", spec.token);
    println!("station_id = {}", spec.station_id);
    println!("name = \"{}\"", spec.title.replace('"', "\\\""));
    println!("update_interval = {}", spec.update_interval);

    Ok(())
}

/// Update an existing entry's token and polling interval and print the
/// replacement config snippet. The token is not re-validated against the
/// vendor; a rejected one surfaces as poll failures on the next cycle.
async fn flow_air_quality_update(
    config_path: PathBuf,
    entry_id: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_file(&config_path)?;
    let Some(entry) = config.integrations.airquality.get(&entry_id) else {
        eprintln!(
            "no air-quality entry '{}' in {}",
            entry_id,
            config_path.display()
        );
        return Ok(());
    };
    let mut entry = entry.clone();

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();

    let token = prompt(&mut lines, "API token [keep current]")?;
    let interval = prompt(
        &mut lines,
        &format!("Update interval in seconds [{}]", entry.update_interval),
    )?;

    let update = flow::OptionsUpdate::merged(
        &entry,
        (!token.is_empty()).then_some(token),
        if interval.is_empty() {
            None
        } else {
            Some(interval.parse()?)
        },
    );
    update.apply(&mut entry);

    println!();
    println!("Replace the entry in your emberd.toml with:");
    println!();
    println!("[integrations.airquality.{}]", entry_id);
    println!("token = \"{}\"", entry.token);
    println!("station_id = {}", entry.station_id);
    if let Some(name) = &entry.name {
        println!("name = \"{}\"", name.replace('"', "\\\""));
    }
    println!("update_interval = {}", entry.update_interval);

    Ok(())
}

fn prompt(
    lines: &mut std::io::Lines<std::io::StdinLock<'_>>,
    label: &str,
) -> Result<String, Box<dyn std::error::Error>> {
    print!("{}: ", label);
    std::io::stdout().flush()?;
    match lines.next() {
        Some(line) => Ok(line?.trim().to_string()),
        None => Err("stdin closed".into()),
    }
}
