//! Event and registration types for the step sensors.

use crate::core::accountant::SensorMode;
use serde::{Deserialize, Serialize};

/// The two step sensors a listener can register for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepSensorKind {
    /// Reports a running total of steps since activation
    Counter,
    /// Reports one value per detected step
    Detector,
}

impl StepSensorKind {
    /// The accounting mode matching this sensor.
    pub fn mode(self) -> SensorMode {
        match self {
            StepSensorKind::Counter => SensorMode::Counter,
            StepSensorKind::Detector => SensorMode::Detector,
        }
    }

    /// The sensor backing an accounting mode, if any.
    pub fn from_mode(mode: SensorMode) -> Option<Self> {
        match mode {
            SensorMode::Counter => Some(StepSensorKind::Counter),
            SensorMode::Detector => Some(StepSensorKind::Detector),
            SensorMode::None => None,
        }
    }
}

impl std::str::FromStr for StepSensorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "counter" | "step_counter" => Ok(StepSensorKind::Counter),
            "detector" | "step_detector" => Ok(StepSensorKind::Detector),
            other => Err(format!("unknown step sensor '{other}'")),
        }
    }
}

/// Max batch delays offered when registering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchLatency {
    /// Continuous delivery
    None,
    FiveSeconds,
    TenSeconds,
}

impl BatchLatency {
    /// Max batch delay in microseconds.
    pub fn as_micros(self) -> u32 {
        match self {
            BatchLatency::None => 0,
            BatchLatency::FiveSeconds => 5_000_000,
            BatchLatency::TenSeconds => 10_000_000,
        }
    }

    /// Preset for a delay given in whole seconds.
    pub fn from_secs(secs: u64) -> Option<Self> {
        match secs {
            0 => Some(BatchLatency::None),
            5 => Some(BatchLatency::FiveSeconds),
            10 => Some(BatchLatency::TenSeconds),
            _ => None,
        }
    }
}

/// What a step event reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepReading {
    /// Steps covered by a detector event
    Steps(u32),
    /// Running total reported by the counter
    Total(u64),
}

/// A single delivery from a step sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepEvent {
    /// When the (last) step of this event happened, in nanoseconds on the
    /// sensor clock
    pub timestamp_ns: u64,
    pub reading: StepReading,
}

impl StepEvent {
    /// A detector event covering `steps` steps.
    pub fn detector(timestamp_ns: u64, steps: u32) -> Self {
        Self {
            timestamp_ns,
            reading: StepReading::Steps(steps),
        }
    }

    /// A counter event reporting `total` steps.
    pub fn counter(timestamp_ns: u64, total: u64) -> Self {
        Self {
            timestamp_ns,
            reading: StepReading::Total(total),
        }
    }

    /// The sensor that produced this event.
    pub fn kind(&self) -> StepSensorKind {
        match self.reading {
            StepReading::Steps(_) => StepSensorKind::Detector,
            StepReading::Total(_) => StepSensorKind::Counter,
        }
    }

    /// Age of the event in whole milliseconds at `now_ns`.
    ///
    /// Negative when the timestamp lies in the future of `now_ns`.
    pub fn latency_ms(&self, now_ns: u64) -> i64 {
        (now_ns as i128 - self.timestamp_ns as i128).div_euclid(1_000_000) as i64
    }
}
