//! Batch Step Sensor - step counting with batched sensor delivery.
//!
//! This library registers for step detector or step counter events, with
//! optional batching (deferred delivery up to a maximum latency), and keeps a
//! running step count together with the age of the most recent events.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       Batch Step Sensor                      │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐         │
//! │  │ StepSensor  │──▶│   Session   │──▶│ Accountant  │         │
//! │  │ (batching)  │   │ Controller  │   │ (+ delays)  │         │
//! │  └─────────────┘   └─────────────┘   └─────────────┘         │
//! │                           │                  │               │
//! │                           ▼                  ▼               │
//! │                    ┌─────────────┐   ┌─────────────┐         │
//! │                    │ StateStore  │   │  Counting   │         │
//! │                    │  (resume)   │   │    Card     │         │
//! │                    └─────────────┘   └─────────────┘         │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use batch_step_sensor::{BatchLatency, SessionController, SimulatedStepSensor, StepSensorKind};
//!
//! let sensor = SimulatedStepSensor::new(Default::default());
//! let mut session = SessionController::new(sensor);
//! session
//!     .register(StepSensorKind::Counter, BatchLatency::FiveSeconds)
//!     .expect("Failed to register");
//!
//! if let Ok(Some(card)) = session.pump(Duration::from_secs(10)) {
//!     println!("{card}");
//! }
//! ```

pub mod config;
pub mod core;
pub mod sensor;
pub mod session;
pub mod state;

// Re-export key types at crate root for convenience
pub use config::{Config, ConfigError};
pub use crate::core::{
    counting_card, AccountingError, CardText, DelayWindow, PersistedState, SensorMode,
    StepAccountant, EVENT_QUEUE_LENGTH,
};
pub use sensor::{
    BatchLatency, SensorError, SimulatedSensorConfig, SimulatedStepSensor, StepEvent, StepReading,
    StepSensor, StepSensorKind,
};
pub use session::{CardAction, Registration, SessionController, SessionError};
pub use state::{SavedState, StateError, StateStore};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Explanation of batching that can be displayed to users.
pub const BATCHING_EXPLANATION: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║               BATCH STEP SENSOR - ABOUT BATCHING                 ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  Step sensors can hold events back and deliver them together.    ║
║                                                                  ║
║  • STEP_DETECTOR reports one event for every step.               ║
║  • STEP_COUNTER reports the total number of steps since the      ║
║    sensor was activated. Its first event only tells the          ║
║    listener the current total and is not counted as a step.      ║
║                                                                  ║
║  With a max batch delay, events may be delivered up to that      ║
║  many seconds after they happened. The system can stay in a      ║
║  low power state in between. A delay of 0 disables batching.     ║
║                                                                  ║
║  The counting card shows the age of the last 10 events when      ║
║  they reached the listener.                                      ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;
