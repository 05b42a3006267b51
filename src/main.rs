//! Batch Step Sensor CLI
//!
//! Step counting with batched sensor delivery.

use batch_step_sensor::{
    config::Config,
    core::PersistedState,
    sensor::{BatchLatency, SimulatedStepSensor, StepSensorKind},
    session::{Registration, SessionController, SessionError},
    state::StateStore,
    BATCHING_EXPLANATION, VERSION,
};
use clap::{Parser, Subcommand};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "batch-step-sensor")]
#[command(version = VERSION)]
#[command(about = "Step counting with batched sensor delivery", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a step listener and start counting from zero
    Start {
        /// Step sensor to register for (counter or detector)
        #[arg(long, default_value = "counter")]
        sensor: StepSensorKind,

        /// Max batch delay in seconds (0, 5 or 10)
        #[arg(long, default_value = "0")]
        batch: u64,

        /// Stop after this many seconds (runs until Ctrl+C if omitted)
        #[arg(long)]
        duration: Option<u64>,
    },

    /// Resume the last suspended session
    Resume {
        /// Stop after this many seconds (runs until Ctrl+C if omitted)
        #[arg(long)]
        duration: Option<u64>,
    },

    /// Unregister and forget the suspended session
    Stop,

    /// Show the suspended session
    Status,

    /// Explain step sensor batching
    About,

    /// Show configuration, or update it when any option is given
    Config {
        /// Time between two simulated steps, in milliseconds
        #[arg(long)]
        step_interval_ms: Option<u64>,

        /// Whether the simulated sensor can batch events (true or false)
        #[arg(long)]
        batching: Option<bool>,

        /// Step counter total the simulated sensor starts from
        #[arg(long)]
        initial_total: Option<u64>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start {
            sensor,
            batch,
            duration,
        } => {
            cmd_start(sensor, batch, duration);
        }
        Commands::Resume { duration } => {
            cmd_resume(duration);
        }
        Commands::Stop => {
            cmd_stop();
        }
        Commands::Status => {
            cmd_status();
        }
        Commands::About => {
            cmd_about();
        }
        Commands::Config {
            step_interval_ms,
            batching,
            initial_total,
        } => {
            cmd_config(step_interval_ms, batching, initial_total);
        }
    }
}

fn cmd_start(kind: StepSensorKind, batch_secs: u64, duration: Option<u64>) {
    let Some(latency) = BatchLatency::from_secs(batch_secs) else {
        eprintln!("Error: --batch must be 0, 5 or 10 seconds");
        std::process::exit(1);
    };

    let config = load_config();
    let store = StateStore::new(config.state_path());

    println!("Batch Step Sensor v{VERSION}");
    println!();

    let mut session = SessionController::new(SimulatedStepSensor::new(config.sensor_config()));
    match session.register(kind, latency) {
        Ok(registration) => print_registration(registration),
        Err(e) => {
            eprintln!("Error registering listener: {e}");
            std::process::exit(1);
        }
    }

    run_session(&mut session, &store, duration);
}

fn cmd_resume(duration: Option<u64>) {
    let config = load_config();
    let store = StateStore::new(config.state_path());

    let saved = match store.load() {
        Ok(Some(saved)) => saved,
        Ok(None) => {
            println!("No suspended session found.");
            println!("Run 'batch-step-sensor start' to begin counting.");
            return;
        }
        Err(e) => {
            eprintln!("Error loading session state: {e}");
            std::process::exit(1);
        }
    };

    println!("Batch Step Sensor v{VERSION}");
    println!();
    println!(
        "Resuming session saved at {}",
        saved.saved_at.format("%Y-%m-%d %H:%M:%S")
    );

    let mut session = SessionController::new(SimulatedStepSensor::new(config.sensor_config()));
    match session.resume(saved.state) {
        Ok(Some(registration)) => print_registration(registration),
        Ok(None) => {
            println!("The saved session had no registered sensor.");
            return;
        }
        Err(e) => {
            eprintln!("Error registering listener: {e}");
            std::process::exit(1);
        }
    }

    run_session(&mut session, &store, duration);
}

fn cmd_stop() {
    let config = load_config();
    let store = StateStore::new(config.state_path());

    if let Err(e) = store.clear() {
        eprintln!("Error clearing session state: {e}");
        std::process::exit(1);
    }
    println!("Listener unregistered. Use 'batch-step-sensor start' to register again.");
}

fn cmd_status() {
    let config = load_config();
    let store = StateStore::new(config.state_path());

    println!("Batch Step Sensor Status");
    println!("========================");
    println!();

    match store.load() {
        Ok(Some(saved)) => {
            let state = saved.state;
            println!("Suspended session:");
            println!("  Sensor: {}", state.mode.sensor_name());
            println!("  Max batch delay: {} \u{00B5}s", state.max_batch_delay_us);
            println!("  Steps: {}", state.step_count);
            println!(
                "  Saved at: {}",
                saved.saved_at.format("%Y-%m-%d %H:%M:%S")
            );
        }
        Ok(None) => println!("No suspended session found."),
        Err(e) => eprintln!("Error loading session state: {e}"),
    }
}

fn cmd_about() {
    println!("{BATCHING_EXPLANATION}");
}

fn cmd_config(step_interval_ms: Option<u64>, batching: Option<bool>, initial_total: Option<u64>) {
    let mut config = load_config();

    let changed = step_interval_ms.is_some() || batching.is_some() || initial_total.is_some();
    if let Some(ms) = step_interval_ms {
        if ms == 0 {
            eprintln!("Error: --step-interval-ms must be greater than 0");
            std::process::exit(1);
        }
        config.step_interval = Duration::from_millis(ms);
    }
    if let Some(batching) = batching {
        config.supports_batching = batching;
    }
    if let Some(total) = initial_total {
        config.initial_counter_total = total;
    }
    if changed {
        if let Err(e) = config.save() {
            eprintln!("Error saving config: {e}");
            std::process::exit(1);
        }
        println!("Configuration saved.");
        println!();
    }

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).unwrap_or_else(|_| "Error".to_string())
    );
}

fn load_config() -> Config {
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Warning: Could not load config, using defaults: {e}");
        Config::default()
    });
    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }
    config
}

fn print_registration(registration: Registration) {
    match registration {
        Registration::Continuous => println!("Listener registered in continuous mode."),
        Registration::Batched { max_delay_us } => {
            println!("Listener registered with a max batch delay of {max_delay_us} \u{00B5}s.");
        }
        Registration::FellBackToContinuous { requested_us } => {
            eprintln!(
                "Warning: The sensor cannot batch events ({requested_us} \u{00B5}s requested)."
            );
            eprintln!("Falling back to continuous mode.");
        }
    }
    println!();
}

/// Count steps until Ctrl+C or `duration` elapses, then persist the session.
fn run_session(
    session: &mut SessionController<SimulatedStepSensor>,
    store: &StateStore,
    duration: Option<u64>,
) {
    println!("{}", session.card());
    println!();
    println!("Press Ctrl+C to suspend");
    println!();

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone());

    let deadline = duration.map(|secs| Instant::now() + Duration::from_secs(secs));

    while running.load(Ordering::SeqCst) {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }

        match session.pump(Duration::from_millis(100)) {
            Ok(Some(card)) => {
                println!("{card}");
                println!();
            }
            Ok(None) => {}
            Err(SessionError::Accounting(e)) => {
                eprintln!("Warning: {e}");
            }
            Err(e) => {
                eprintln!("Error: {e}");
                break;
            }
        }
    }

    suspend(session, store);
}

fn suspend(session: &SessionController<SimulatedStepSensor>, store: &StateStore) {
    let state: PersistedState = session.suspend();

    println!("Suspending session...");
    match store.save(&state) {
        Ok(()) => println!(
            "Saved {} steps. Run 'batch-step-sensor resume' to continue.",
            state.step_count
        ),
        Err(e) => eprintln!("Error saving session state: {e}"),
    }
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl+C handler");
}
