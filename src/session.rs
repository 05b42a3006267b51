//! Session control: turns user actions into sensor registrations and feeds
//! delivered events through the step accountant.
//!
//! The controller is the only writer of the session state. Sensor threads hand
//! events over a channel and never touch the accountant directly, so no locking
//! is needed.

use crate::core::accountant::{AccountingError, PersistedState, StepAccountant};
use crate::core::card::{counting_card, CardText};
use crate::sensor::types::{BatchLatency, StepEvent, StepReading, StepSensorKind};
use crate::sensor::{SensorError, StepSensor};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::time::Duration;

/// Actions offered on the registration and counting cards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardAction {
    RegisterDetector(BatchLatency),
    RegisterCounter(BatchLatency),
    Unregister,
}

impl CardAction {
    /// Numeric action id attached to the card button.
    pub fn id(self) -> i32 {
        match self {
            CardAction::Unregister => 1,
            CardAction::RegisterDetector(BatchLatency::None) => 10,
            CardAction::RegisterDetector(BatchLatency::FiveSeconds) => 11,
            CardAction::RegisterDetector(BatchLatency::TenSeconds) => 12,
            CardAction::RegisterCounter(BatchLatency::None) => 21,
            CardAction::RegisterCounter(BatchLatency::FiveSeconds) => 22,
            CardAction::RegisterCounter(BatchLatency::TenSeconds) => 23,
        }
    }

    pub fn from_id(id: i32) -> Option<Self> {
        let action = match id {
            1 => CardAction::Unregister,
            10 => CardAction::RegisterDetector(BatchLatency::None),
            11 => CardAction::RegisterDetector(BatchLatency::FiveSeconds),
            12 => CardAction::RegisterDetector(BatchLatency::TenSeconds),
            21 => CardAction::RegisterCounter(BatchLatency::None),
            22 => CardAction::RegisterCounter(BatchLatency::FiveSeconds),
            23 => CardAction::RegisterCounter(BatchLatency::TenSeconds),
            _ => return None,
        };
        Some(action)
    }
}

/// How the sensor ended up delivering events after a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Continuous,
    Batched { max_delay_us: u32 },
    /// Batching was requested but is not supported; events arrive continuously
    FellBackToContinuous { requested_us: u32 },
}

/// Errors surfaced to the caller of the session controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    Accounting(AccountingError),
    Sensor(SensorError),
    /// No listener is registered
    NotRegistered,
    /// The sensor stopped delivering events
    Disconnected,
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::Accounting(e) => write!(f, "Accounting error: {e}"),
            SessionError::Sensor(e) => write!(f, "Sensor error: {e}"),
            SessionError::NotRegistered => write!(f, "No sensor listener is registered"),
            SessionError::Disconnected => write!(f, "Sensor disconnected unexpectedly"),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<AccountingError> for SessionError {
    fn from(e: AccountingError) -> Self {
        SessionError::Accounting(e)
    }
}

impl From<SensorError> for SessionError {
    fn from(e: SensorError) -> Self {
        SessionError::Sensor(e)
    }
}

/// Owns the step accountant and the sensor registration for one session.
pub struct SessionController<S: StepSensor> {
    sensor: S,
    accountant: StepAccountant,
    receiver: Option<Receiver<StepEvent>>,
}

impl<S: StepSensor> SessionController<S> {
    /// Create an inactive session on top of `sensor`.
    pub fn new(sensor: S) -> Self {
        Self {
            sensor,
            accountant: StepAccountant::new(),
            receiver: None,
        }
    }

    /// Apply a card action. Returns the registration outcome for register
    /// actions and `None` for unregister.
    pub fn handle_action(
        &mut self,
        action: CardAction,
    ) -> Result<Option<Registration>, SessionError> {
        match action {
            CardAction::RegisterDetector(latency) => self
                .register(StepSensorKind::Detector, latency)
                .map(Some),
            CardAction::RegisterCounter(latency) => {
                self.register(StepSensorKind::Counter, latency).map(Some)
            }
            CardAction::Unregister => {
                self.unregister();
                Ok(None)
            }
        }
    }

    /// Start a fresh session for `kind`. Any previous count is discarded.
    pub fn register(
        &mut self,
        kind: StepSensorKind,
        latency: BatchLatency,
    ) -> Result<Registration, SessionError> {
        self.detach();
        self.accountant.deactivate();
        self.accountant.activate(kind.mode(), latency.as_micros());
        self.listen(kind, latency.as_micros())
    }

    /// Stop listening and forget the session.
    pub fn unregister(&mut self) {
        self.detach();
        self.accountant.deactivate();
        tracing::info!("Sensor listener unregistered.");
    }

    /// The values to persist before the session is suspended.
    pub fn suspend(&self) -> PersistedState {
        self.accountant.snapshot()
    }

    /// Rebuild a suspended session and register for its sensor again.
    ///
    /// Returns `None` when the saved session had no active sensor.
    pub fn resume(&mut self, state: PersistedState) -> Result<Option<Registration>, SessionError> {
        self.detach();
        self.accountant.restore(state);

        match StepSensorKind::from_mode(state.mode) {
            Some(kind) => self.listen(kind, state.max_batch_delay_us).map(Some),
            None => Ok(None),
        }
    }

    /// Account for one delivered event and return the refreshed card.
    pub fn handle_event(&mut self, event: &StepEvent) -> Result<CardText, SessionError> {
        let latency_ms = event.latency_ms(self.sensor.now_nanos());

        let result = match event.reading {
            StepReading::Steps(steps) => self.accountant.on_detector_event(steps, latency_ms),
            StepReading::Total(total) => {
                tracing::debug!("Step counter value: {total}");
                self.accountant.on_counter_event(total, latency_ms)
            }
        };

        match result {
            Ok(steps) => {
                tracing::info!(
                    "New step detected by {} sensor. Total step count: {steps}",
                    event.kind().mode().sensor_name()
                );
                tracing::debug!("Age of most recent data = {latency_ms}ms");
                Ok(self.card())
            }
            Err(e) => {
                tracing::warn!("Rejected step event: {e}");
                Err(e.into())
            }
        }
    }

    /// Wait up to `timeout` for the next event and account for it.
    ///
    /// Returns `Ok(None)` when no event arrived in time.
    pub fn pump(&mut self, timeout: Duration) -> Result<Option<CardText>, SessionError> {
        let receiver = self.receiver.as_ref().ok_or(SessionError::NotRegistered)?;

        match receiver.recv_timeout(timeout) {
            Ok(event) => self.handle_event(&event).map(Some),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(SessionError::Disconnected),
        }
    }

    /// The counting card for the current state.
    pub fn card(&self) -> CardText {
        counting_card(&self.accountant)
    }

    pub fn accountant(&self) -> &StepAccountant {
        &self.accountant
    }

    pub fn sensor(&self) -> &S {
        &self.sensor
    }

    pub fn is_listening(&self) -> bool {
        self.receiver.is_some()
    }

    fn listen(
        &mut self,
        kind: StepSensorKind,
        max_delay_us: u32,
    ) -> Result<Registration, SessionError> {
        let registered = match self.sensor.register(kind, max_delay_us) {
            Ok(receiver) => {
                tracing::info!(
                    "Event listener for step {:?} sensor registered with a max delay of {max_delay_us}",
                    kind
                );
                let registration = if max_delay_us > 0 {
                    Registration::Batched { max_delay_us }
                } else {
                    Registration::Continuous
                };
                Ok((receiver, registration))
            }
            Err(SensorError::UnsupportedBatchMode { requested_us }) => {
                tracing::warn!(
                    "Could not register sensor listener in batch mode, falling back to continuous mode."
                );
                self.sensor
                    .register(kind, 0)
                    .map(|receiver| (receiver, Registration::FellBackToContinuous { requested_us }))
            }
            Err(e) => Err(e),
        };

        match registered {
            Ok((receiver, registration)) => {
                self.receiver = Some(receiver);
                Ok(registration)
            }
            Err(e) => {
                self.accountant.deactivate();
                Err(e.into())
            }
        }
    }

    fn detach(&mut self) {
        self.sensor.unregister();
        self.receiver = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_ids_round_trip() {
        for id in [1, 10, 11, 12, 21, 22, 23] {
            let action = CardAction::from_id(id).unwrap();
            assert_eq!(action.id(), id);
        }
        assert_eq!(CardAction::from_id(2), None);
    }

    #[test]
    fn test_register_action_latencies() {
        assert_eq!(
            CardAction::from_id(22),
            Some(CardAction::RegisterCounter(BatchLatency::FiveSeconds))
        );
        assert_eq!(
            CardAction::from_id(12),
            Some(CardAction::RegisterDetector(BatchLatency::TenSeconds))
        );
    }
}
