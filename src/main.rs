//! Binary entrypoint for the Duvan Beacon CLI.
//!
//! Commands:
//! - `start [--port <path>] [--baud <n>]` - run the beacon, connecting to a device if one
//!   is configured
//! - `init` - write starter `config.json` and `commands.json` into the config directory
//! - `status` - load both files and print a summary with any command-table warnings
//! - `probe --port <path> [-b <baud>] [--timeout <s>]` - check the device link and print
//!   its identity
//!
//! See the library crate docs for module-level details: `duvan_beacon::`.
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{error, info, warn};
use std::path::{Path, PathBuf};

use duvan_beacon::beacon::{BeaconContext, BeaconServer, CommandTable, SettingsOutcome};
use duvan_beacon::config::{Config, ConfigPaths};
use duvan_beacon::meshtastic::{MeshtasticTransport, SerialSettings, Transport};
use duvan_beacon::validation::lint_commands;

const BANNER: &str = r#"
    ______
    |  _  \
    | | | |_   ___   ____ _ _ __
    | | | | | | \ \ / / _` | '_ \
    | |/ /| |_| |\ V / (_| | | | |
    |___/  \__,_| \_/ \__,_|_| |_|
    ______
    | ___ \
    | |_/ / ___  __ _  ___ ___  _ __
    | ___ \/ _ \/ _` |/ __/ _ \| '_ \
    | |_/ /  __/ (_| | (_| (_) | | | |
    \____/ \___|\__,_|\___\___/|_| |_|
"#;

#[derive(Parser)]
#[command(name = "duvan-beacon")]
#[command(about = "A command responder for Meshtastic mesh networks")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory holding config.json and commands.json
    #[arg(long, default_value = "config", global = true)]
    config_dir: PathBuf,

    /// Directory for timestamped log files
    #[arg(long, default_value = "logs", global = true)]
    log_dir: PathBuf,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the beacon
    Start {
        /// Meshtastic device port (e.g., /dev/ttyUSB0); overrides config.json
        #[arg(short, long)]
        port: Option<String>,

        /// Baud rate; overrides config.json
        #[arg(short = 'b', long)]
        baud: Option<u32>,
    },
    /// Write starter configuration files (existing files are kept)
    Init,
    /// Show configuration summary and command-table warnings
    Status,
    /// Connect to a device, print its identity as JSON and exit
    Probe {
        /// Device serial port
        #[arg(short, long)]
        port: String,
        /// Baud rate
        #[arg(short = 'b', long, default_value_t = 115200)]
        baud: u32,
        /// Seconds to wait for the config handshake
        #[arg(short, long, default_value_t = 10)]
        timeout: u64,
    },
}

fn step_ok(msg: &str) {
    println!("✔  {}", msg);
}

fn step_failed(msg: &str) {
    println!("❌  {}", msg);
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let paths = ConfigPaths::new(&cli.config_dir);

    match cli.command {
        Commands::Start { port, baud } => {
            println!("{}", BANNER);
            println!("    System Boot Sequence - v{}\n", env!("CARGO_PKG_VERSION"));
            match init_logging(&cli.log_dir, cli.verbose) {
                Some(path) => {
                    info!("Initialized logging to {}", path.display());
                    step_ok("Initialized logging...");
                }
                None => step_failed("Initialized logging (console only)..."),
            }
            info!("Starting Duvan Beacon v{}", env!("CARGO_PKG_VERSION"));
            run_beacon(&paths, port, baud).await;
        }
        Commands::Init => {
            init_logging(&cli.log_dir, cli.verbose);
            init_config(&paths).await?;
        }
        Commands::Status => {
            init_logging(&cli.log_dir, cli.verbose);
            show_status(&paths).await;
        }
        Commands::Probe {
            port,
            baud,
            timeout,
        } => {
            init_logging(&cli.log_dir, cli.verbose);
            let ok = probe(&port, baud, timeout).await;
            std::process::exit(if ok { 0 } else { 1 });
        }
    }

    Ok(())
}

async fn load_settings(path: &Path) -> Option<Config> {
    match Config::load(path).await {
        Ok(config) => {
            info!("Configuration loaded from {}", path.display());
            Some(config)
        }
        Err(e) => {
            error!("Error loading configuration: {}", e);
            None
        }
    }
}

async fn load_commands(path: &Path) -> Option<CommandTable> {
    match CommandTable::load(path).await {
        Ok(table) => {
            info!("Loaded {} command(s) from {}", table.len(), path.display());
            Some(table)
        }
        Err(e) => {
            error!("Error loading commands: {}", e);
            None
        }
    }
}

async fn run_beacon(paths: &ConfigPaths, port: Option<String>, baud: Option<u32>) {
    let settings = load_settings(&paths.settings()).await;
    if settings.is_some() {
        step_ok("Initialized configuration...");
    } else {
        step_failed("Initialized configuration...");
    }

    let commands = match load_commands(&paths.commands()).await {
        Some(table) => {
            step_ok("Initialized commands...");
            table
        }
        None => {
            step_failed("Initialized commands...");
            CommandTable::default()
        }
    };

    let mesh_config = settings
        .as_ref()
        .map(|s| s.meshtastic())
        .unwrap_or_default();
    let chosen_port = port.or_else(|| mesh_config.port.clone().filter(|p| !p.is_empty()));

    let context = BeaconContext::new(settings, commands);
    let mut serial =
        SerialSettings::from_config(chosen_port.clone().unwrap_or_default(), &mesh_config);
    if let Some(baud) = baud {
        serial.baud_rate = baud;
    }
    let mut server = BeaconServer::new(context, MeshtasticTransport::new(serial));

    match chosen_port {
        Some(port_path) => match server.connect().await {
            Ok(()) => {
                info!("Connected to Meshtastic device on {}", port_path);
                step_ok("Initialized Meshtastic interface...");
            }
            Err(e) => {
                warn!(
                    "Failed to connect to device on {}: {} (beacon continuing without device)",
                    port_path, e
                );
                step_failed("Initialized Meshtastic interface...");
            }
        },
        None => {
            warn!(
                "No --port specified and no meshtastic.port configured; starting without device."
            );
            step_failed("Initialized Meshtastic interface (no port configured)...");
        }
    }

    step_ok("Initialized Beacon... (Ctrl-C to exit)");
    if let Err(e) = server.run().await {
        error!("Beacon loop error: {:#}", e);
    }
    step_ok("Shutdown signal caught. Exiting...");

    match server.shutdown(Some(&paths.settings())).await {
        SettingsOutcome::Saved => step_ok("Configuration saved successfully..."),
        SettingsOutcome::Skipped => step_failed("Configuration not loaded; not saved..."),
        SettingsOutcome::Failed(_) => step_failed("Failed to save configuration..."),
    }
    step_ok("Meshtastic interface closed...");
    info!("Duvan Beacon stopped");
}

async fn init_config(paths: &ConfigPaths) -> Result<()> {
    info!("Initializing configuration in {}", paths.dir().display());
    tokio::fs::create_dir_all(paths.dir())
        .await
        .with_context(|| format!("creating {}", paths.dir().display()))?;

    let settings_path = paths.settings();
    if settings_path.exists() {
        println!("{} already exists; leaving it alone", settings_path.display());
    } else {
        Config::starter().save(&settings_path).await?;
        info!("Configuration file created at {}", settings_path.display());
        step_ok(&format!("Created {}", settings_path.display()));
    }

    let commands_path = paths.commands();
    if commands_path.exists() {
        println!("{} already exists; leaving it alone", commands_path.display());
    } else {
        CommandTable::starter().save(&commands_path).await?;
        info!("Command table created at {}", commands_path.display());
        step_ok(&format!("Created {}", commands_path.display()));
    }
    Ok(())
}

async fn show_status(paths: &ConfigPaths) {
    println!("Duvan Beacon v{}", env!("CARGO_PKG_VERSION"));
    println!("Config directory: {}", paths.dir().display());

    match load_settings(&paths.settings()).await {
        Some(settings) => {
            let mesh = settings.meshtastic();
            println!(
                "Settings: {} ({} key(s))",
                paths.settings().display(),
                settings.document().len()
            );
            println!(
                "  Serial port: {}",
                mesh.port.as_deref().unwrap_or("(not set)")
            );
            println!("  Baud rate: {}", mesh.baud_rate);
            println!("  Connect timeout: {}s", mesh.connect_timeout_secs);
            println!("  Min send gap: {}ms", mesh.min_send_gap_ms);
        }
        None => println!("Settings: unavailable (see log)"),
    }

    match load_commands(&paths.commands()).await {
        Some(table) => {
            println!("Commands: {}", table.len());
            for entry in table.iter() {
                println!("  {:<12} -> {}", entry.trigger, entry.response);
            }
            let lints = lint_commands(&table);
            if lints.is_empty() {
                println!("No command-table warnings");
            }
            for lint in lints {
                println!("  warning: {}", lint);
            }
        }
        None => println!("Commands: unavailable (see log)"),
    }
}

async fn probe(port: &str, baud: u32, timeout: u64) -> bool {
    let mut settings = SerialSettings::new(port, baud);
    settings.connect_timeout = std::time::Duration::from_secs(timeout);
    let mut transport = MeshtasticTransport::new(settings);
    info!("Probing {} @ {} baud", port, baud);

    let result = transport.connect().await;
    let identity = transport.identity();
    let _ = transport.close().await;

    let payload = match (&result, identity) {
        (Ok(_), Some(identity)) => serde_json::json!({
            "status": "ok",
            "port": port,
            "identity": identity,
        }),
        (Ok(_), None) => serde_json::json!({
            "status": "incomplete",
            "port": port,
            "timeout_seconds": timeout,
        }),
        (Err(e), _) => serde_json::json!({
            "status": "error",
            "port": port,
            "error": e.to_string(),
            "timeout_seconds": timeout,
        }),
    };
    println!("{}", payload);
    matches!(payload["status"].as_str(), Some("ok"))
}

/// Log to `<log_dir>/system_log_YYYYMMDD_HHMMSS.log`. Records are echoed to the
/// console when stdout is a terminal and `-v` was given. Returns the log file path.
fn init_logging(log_dir: &Path, verbosity: u8) -> Option<PathBuf> {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    let base_level = match verbosity {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);

    let file_path = log_dir.join(format!(
        "system_log_{}.log",
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    ));
    let opened = std::fs::create_dir_all(log_dir).and_then(|_| {
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&file_path)
    });

    let result = match opened {
        Ok(f) => {
            let write_mutex = std::sync::Arc::new(std::sync::Mutex::new(f));
            let echo = verbosity > 0 && atty::is(atty::Stream::Stdout);
            builder.format(move |fmt, record| {
                let ts = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
                let line = format!("{} [{}] {}", ts, record.level(), record.args());
                if let Ok(mut guard) = write_mutex.lock() {
                    let _ = writeln!(guard, "{}", line);
                }
                if echo {
                    writeln!(fmt, "{}", line)
                } else {
                    Ok(())
                }
            });
            Some(file_path)
        }
        Err(e) => {
            eprintln!("Cannot open log file {}: {}", file_path.display(), e);
            builder.format(|fmt, record| {
                writeln!(
                    fmt,
                    "{} [{}] {}",
                    chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                    record.level(),
                    record.args()
                )
            });
            None
        }
    };
    let _ = builder.try_init();
    result
}
