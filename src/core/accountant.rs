//! Step accounting for the step detector and step counter streams.
//!
//! The two streams report steps differently:
//!
//! - The **detector** stream delivers one value per step, so steps are summed.
//! - The **counter** stream delivers a running total since the sensor was
//!   activated. The first event after registration only reports the total
//!   already accumulated and becomes the baseline; later events are measured
//!   against it.
//!
//! Steps counted by the counter before a suspend are carried over on restore
//! so the displayed total stays continuous.

use crate::core::delays::DelayWindow;
use serde::{Deserialize, Serialize};

/// Which step stream is currently registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SensorMode {
    /// No listener registered
    #[default]
    None,
    /// Cumulative step counter stream
    Counter,
    /// Per-step detector stream
    Detector,
}

impl SensorMode {
    /// Integer code used in the persisted state.
    pub fn code(self) -> i32 {
        match self {
            SensorMode::None => 0,
            SensorMode::Counter => 1,
            SensorMode::Detector => 2,
        }
    }

    /// Parse a persisted mode code.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(SensorMode::None),
            1 => Some(SensorMode::Counter),
            2 => Some(SensorMode::Detector),
            _ => None,
        }
    }

    /// Sensor name shown on the counting card.
    pub fn sensor_name(self) -> &'static str {
        match self {
            SensorMode::None => "-",
            SensorMode::Counter => "STEP_COUNTER",
            SensorMode::Detector => "STEP_DETECTOR",
        }
    }
}

impl std::fmt::Display for SensorMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SensorMode::None => write!(f, "none"),
            SensorMode::Counter => write!(f, "counter"),
            SensorMode::Detector => write!(f, "detector"),
        }
    }
}

/// The three values that survive a suspend/resume cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PersistedState {
    pub mode: SensorMode,
    /// Max batch delay in microseconds
    pub max_batch_delay_us: u32,
    pub step_count: u64,
}

/// Errors raised when an incoming event breaks the accounting contract.
///
/// None of these mutate the accountant: the state after a failed call is the
/// state before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountingError {
    /// An event arrived for a stream that is not the registered one.
    InvalidModeTransition {
        event: SensorMode,
        active: SensorMode,
    },
    /// The cumulative counter went backwards after the baseline was captured.
    SensorContractViolation { baseline: u64, value: u64 },
    /// The event was received before it happened.
    NegativeLatency { latency_ms: i64 },
    /// A detector event carried no steps.
    EmptyDetectorEvent,
}

impl std::fmt::Display for AccountingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccountingError::InvalidModeTransition { event, active } => {
                write!(f, "Received a {event} event while {active} mode is active")
            }
            AccountingError::SensorContractViolation { baseline, value } => write!(
                f,
                "Step counter decreased below its baseline ({value} < {baseline})"
            ),
            AccountingError::NegativeLatency { latency_ms } => {
                write!(f, "Event latency is negative ({latency_ms}ms)")
            }
            AccountingError::EmptyDetectorEvent => write!(f, "Detector event carried no steps"),
        }
    }
}

impl std::error::Error for AccountingError {}

/// Turns raw step sensor events into a running step count.
#[derive(Debug, Clone, Default)]
pub struct StepAccountant {
    mode: SensorMode,
    max_batch_delay_us: u32,
    step_count: u64,
    counter_baseline: u64,
    baseline_captured: bool,
    prior_step_count: u64,
    recent_delays: DelayWindow,
}

impl StepAccountant {
    /// Create an inactive accountant.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start accounting for a newly registered stream.
    ///
    /// Steps carried over by [`restore`](Self::restore) are kept; everything
    /// else is reset. Activating [`SensorMode::None`] is the same as
    /// [`deactivate`](Self::deactivate).
    pub fn activate(&mut self, mode: SensorMode, max_batch_delay_us: u32) {
        if mode == SensorMode::None {
            self.deactivate();
            return;
        }

        self.mode = mode;
        self.max_batch_delay_us = max_batch_delay_us;
        self.step_count = 0;
        if mode == SensorMode::Counter {
            self.counter_baseline = 0;
            self.baseline_captured = false;
        }
        self.recent_delays.clear();
    }

    /// Account for a detector event reporting `step_increment` steps.
    ///
    /// Returns the updated step count.
    pub fn on_detector_event(
        &mut self,
        step_increment: u32,
        latency_ms: i64,
    ) -> Result<u64, AccountingError> {
        self.expect_mode(SensorMode::Detector)?;
        if step_increment == 0 {
            return Err(AccountingError::EmptyDetectorEvent);
        }
        let delay = checked_latency(latency_ms)?;

        self.step_count += u64::from(step_increment);
        self.recent_delays.push(delay);
        Ok(self.step_count)
    }

    /// Account for a counter event reporting the cumulative `value`.
    ///
    /// The first event after activation only captures the baseline and is
    /// not recorded as a delay. Returns the updated step count.
    pub fn on_counter_event(&mut self, value: u64, latency_ms: i64) -> Result<u64, AccountingError> {
        self.expect_mode(SensorMode::Counter)?;

        if !self.baseline_captured {
            self.counter_baseline = value;
            self.baseline_captured = true;
            self.step_count = self.prior_step_count;
            return Ok(self.step_count);
        }

        let delta = value
            .checked_sub(self.counter_baseline)
            .ok_or(AccountingError::SensorContractViolation {
                baseline: self.counter_baseline,
                value,
            })?;
        let delay = checked_latency(latency_ms)?;

        self.step_count = delta + self.prior_step_count;
        self.recent_delays.push(delay);
        Ok(self.step_count)
    }

    /// Forget the session entirely, as on an explicit unregister.
    pub fn deactivate(&mut self) {
        *self = Self::default();
    }

    /// The values to persist across a suspend.
    pub fn snapshot(&self) -> PersistedState {
        PersistedState {
            mode: self.mode,
            max_batch_delay_us: self.max_batch_delay_us,
            step_count: self.step_count,
        }
    }

    /// Rebuild the session from persisted values.
    ///
    /// A restored counter session continues from the saved step count, and
    /// reports it until the next baseline is captured. A restored detector
    /// session starts counting from zero again, since the detector stream has
    /// no cumulative value to anchor to.
    pub fn restore(&mut self, state: PersistedState) {
        self.deactivate();
        match state.mode {
            SensorMode::Counter => {
                self.prior_step_count = state.step_count;
                self.activate(SensorMode::Counter, state.max_batch_delay_us);
                self.step_count = state.step_count;
            }
            SensorMode::Detector => {
                self.activate(SensorMode::Detector, state.max_batch_delay_us);
            }
            SensorMode::None => {}
        }
    }

    /// Recorded delays as comma-separated seconds, oldest first.
    pub fn format_delay_seconds(&self) -> String {
        self.recent_delays.format_seconds()
    }

    pub fn mode(&self) -> SensorMode {
        self.mode
    }

    pub fn max_batch_delay_us(&self) -> u32 {
        self.max_batch_delay_us
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    pub fn prior_step_count(&self) -> u64 {
        self.prior_step_count
    }

    pub fn baseline_captured(&self) -> bool {
        self.baseline_captured
    }

    pub fn recent_delays(&self) -> &DelayWindow {
        &self.recent_delays
    }

    fn expect_mode(&self, event: SensorMode) -> Result<(), AccountingError> {
        if self.mode == event {
            Ok(())
        } else {
            Err(AccountingError::InvalidModeTransition {
                event,
                active: self.mode,
            })
        }
    }
}

fn checked_latency(latency_ms: i64) -> Result<u64, AccountingError> {
    u64::try_from(latency_ms).map_err(|_| AccountingError::NegativeLatency { latency_ms })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delays(accountant: &StepAccountant) -> Vec<u64> {
        accountant.recent_delays().iter().collect()
    }

    #[test]
    fn test_detector_sums_increments() {
        let mut accountant = StepAccountant::new();
        accountant.activate(SensorMode::Detector, 5_000_000);

        assert_eq!(accountant.on_detector_event(1, 80), Ok(1));
        assert_eq!(accountant.on_detector_event(2, 90), Ok(3));
        assert_eq!(accountant.step_count(), 3);
        assert_eq!(delays(&accountant), vec![80, 90]);
    }

    #[test]
    fn test_counter_baseline_then_delta() {
        let mut accountant = StepAccountant::new();
        accountant.activate(SensorMode::Counter, 0);

        assert_eq!(accountant.on_counter_event(100, 50), Ok(0));
        assert!(accountant.baseline_captured());
        assert!(accountant.recent_delays().is_empty());

        assert_eq!(accountant.on_counter_event(103, 60), Ok(3));
        assert_eq!(delays(&accountant), vec![60]);
    }

    #[test]
    fn test_counter_regression_is_reported() {
        let mut accountant = StepAccountant::new();
        accountant.activate(SensorMode::Counter, 0);
        accountant.on_counter_event(100, 0).unwrap();
        accountant.on_counter_event(104, 10).unwrap();

        let err = accountant.on_counter_event(99, 20).unwrap_err();
        assert_eq!(
            err,
            AccountingError::SensorContractViolation {
                baseline: 100,
                value: 99
            }
        );
        assert_eq!(accountant.step_count(), 4);
        assert_eq!(delays(&accountant), vec![10]);
    }

    #[test]
    fn test_wrong_stream_fails_fast() {
        let mut accountant = StepAccountant::new();
        accountant.activate(SensorMode::Detector, 0);

        let err = accountant.on_counter_event(10, 5).unwrap_err();
        assert_eq!(
            err,
            AccountingError::InvalidModeTransition {
                event: SensorMode::Counter,
                active: SensorMode::Detector
            }
        );

        accountant.deactivate();
        assert!(accountant.on_detector_event(1, 5).is_err());
    }

    #[test]
    fn test_negative_latency_and_empty_event() {
        let mut accountant = StepAccountant::new();
        accountant.activate(SensorMode::Detector, 0);

        assert_eq!(
            accountant.on_detector_event(1, -3),
            Err(AccountingError::NegativeLatency { latency_ms: -3 })
        );
        assert_eq!(
            accountant.on_detector_event(0, 3),
            Err(AccountingError::EmptyDetectorEvent)
        );
        assert_eq!(accountant.step_count(), 0);
        assert!(accountant.recent_delays().is_empty());
    }

    #[test]
    fn test_counter_restore_continues_count() {
        let mut accountant = StepAccountant::new();
        accountant.restore(PersistedState {
            mode: SensorMode::Counter,
            max_batch_delay_us: 0,
            step_count: 10,
        });

        assert_eq!(accountant.prior_step_count(), 10);
        assert_eq!(accountant.on_counter_event(5, 0), Ok(10));
        assert_eq!(accountant.on_counter_event(8, 0), Ok(13));
    }

    #[test]
    fn test_snapshot_restore_round_trip() {
        let mut accountant = StepAccountant::new();
        accountant.activate(SensorMode::Counter, 10_000_000);
        accountant.on_counter_event(40, 0).unwrap();
        accountant.on_counter_event(47, 12).unwrap();

        let snapshot = accountant.snapshot();
        assert_eq!(snapshot.step_count, 7);

        let mut restored = StepAccountant::new();
        restored.restore(snapshot);
        assert_eq!(restored.mode(), SensorMode::Counter);
        assert_eq!(restored.max_batch_delay_us(), 10_000_000);
        assert_eq!(restored.prior_step_count(), 7);
        assert_eq!(restored.step_count(), 7);
        assert!(!restored.baseline_captured());

        // A fresh sensor may report any total; only the delta matters.
        restored.on_counter_event(2, 0).unwrap();
        assert_eq!(restored.on_counter_event(4, 0), Ok(9));
    }

    #[test]
    fn test_counter_snapshot_survives_repeated_restore() {
        let saved = PersistedState {
            mode: SensorMode::Counter,
            max_batch_delay_us: 5_000_000,
            step_count: 42,
        };

        let mut accountant = StepAccountant::new();
        accountant.restore(saved);
        assert_eq!(accountant.snapshot(), saved);

        // Suspended again before the sensor reported anything.
        let mut again = StepAccountant::new();
        again.restore(accountant.snapshot());
        assert_eq!(again.snapshot(), saved);
    }

    #[test]
    fn test_counter_regression_wins_over_negative_latency() {
        let mut accountant = StepAccountant::new();
        accountant.activate(SensorMode::Counter, 0);
        accountant.on_counter_event(100, 0).unwrap();

        assert_eq!(
            accountant.on_counter_event(90, -5),
            Err(AccountingError::SensorContractViolation {
                baseline: 100,
                value: 90
            })
        );
        assert_eq!(
            accountant.on_counter_event(101, -5),
            Err(AccountingError::NegativeLatency { latency_ms: -5 })
        );
        assert_eq!(accountant.step_count(), 0);
    }

    #[test]
    fn test_detector_restore_starts_over() {
        let mut accountant = StepAccountant::new();
        accountant.restore(PersistedState {
            mode: SensorMode::Detector,
            max_batch_delay_us: 5_000_000,
            step_count: 25,
        });

        assert_eq!(accountant.mode(), SensorMode::Detector);
        assert_eq!(accountant.step_count(), 0);
        assert_eq!(accountant.on_detector_event(1, 0), Ok(1));
    }

    #[test]
    fn test_deactivate_clears_everything() {
        let mut accountant = StepAccountant::new();
        accountant.restore(PersistedState {
            mode: SensorMode::Counter,
            max_batch_delay_us: 5_000_000,
            step_count: 3,
        });
        accountant.on_counter_event(1, 0).unwrap();
        accountant.on_counter_event(2, 4).unwrap();

        accountant.deactivate();
        assert_eq!(accountant.snapshot(), PersistedState::default());
        assert_eq!(accountant.prior_step_count(), 0);
        assert!(accountant.recent_delays().is_empty());
    }

    #[test]
    fn test_activate_keeps_prior_steps() {
        let mut accountant = StepAccountant::new();
        accountant.restore(PersistedState {
            mode: SensorMode::Counter,
            max_batch_delay_us: 0,
            step_count: 6,
        });
        accountant.activate(SensorMode::Counter, 5_000_000);

        assert_eq!(accountant.prior_step_count(), 6);
        assert_eq!(accountant.step_count(), 0);
        assert!(!accountant.baseline_captured());
    }

    #[test]
    fn test_mode_codes() {
        for mode in [SensorMode::None, SensorMode::Counter, SensorMode::Detector] {
            assert_eq!(SensorMode::from_code(mode.code()), Some(mode));
        }
        assert_eq!(SensorMode::from_code(7), None);
    }
}
