//! Step sensor access.
//!
//! A [`StepSensor`] hands out a channel of [`StepEvent`]s once a listener is
//! registered for one of the two step streams. The only implementation shipped
//! here is a simulated sensor; hardware backends plug in behind the same trait.

pub mod simulated;
pub mod types;

use crossbeam_channel::Receiver;

// Re-export commonly used types
pub use simulated::{SimulatedSensorConfig, SimulatedStepSensor};
pub use types::{BatchLatency, StepEvent, StepReading, StepSensorKind};

/// A source of step events.
pub trait StepSensor {
    /// Register a listener for `kind` with the given max batch delay.
    ///
    /// A delay of 0 requests continuous delivery. Fails with
    /// [`SensorError::UnsupportedBatchMode`] when a non-zero delay cannot be
    /// honoured; nothing is registered in that case.
    fn register(
        &mut self,
        kind: StepSensorKind,
        max_delay_us: u32,
    ) -> Result<Receiver<StepEvent>, SensorError>;

    /// Unregister the listener, if any.
    fn unregister(&mut self);

    /// Current time on the clock used for event timestamps, in nanoseconds.
    fn now_nanos(&self) -> u64;
}

/// Errors that can occur while registering for step events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SensorError {
    AlreadyRegistered,
    /// The sensor cannot defer delivery by the requested delay
    UnsupportedBatchMode { requested_us: u32 },
}

impl std::fmt::Display for SensorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SensorError::AlreadyRegistered => write!(f, "A listener is already registered"),
            SensorError::UnsupportedBatchMode { requested_us } => write!(
                f,
                "Sensor cannot batch events with a max delay of {requested_us} \u{00B5}s"
            ),
        }
    }
}

impl std::error::Error for SensorError {}
