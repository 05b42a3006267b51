//! Simulated step sensor with a hardware-style batching FIFO.
//!
//! Steps are generated at a fixed cadence on a background thread. Without
//! batching every event is delivered as soon as it happens. With a max batch
//! delay, events are held back and the whole batch is delivered once the
//! oldest held event is `max_delay` old, the way a sensor hub flushes its FIFO.

use crate::sensor::types::{StepEvent, StepSensorKind};
use crate::sensor::{SensorError, StepSensor};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// How often the sensor thread wakes up to check for steps and flushes.
const TICK: Duration = Duration::from_millis(5);

/// Capacity of the delivery channel.
const CHANNEL_CAPACITY: usize = 10_000;

/// Behaviour of the simulated sensor.
#[derive(Debug, Clone)]
pub struct SimulatedSensorConfig {
    /// Time between two simulated steps
    pub step_interval: Duration,
    /// Whether a non-zero max batch delay can be honoured
    pub supports_batching: bool,
    /// Counter total reported before any simulated step
    pub initial_counter_total: u64,
}

impl Default for SimulatedSensorConfig {
    fn default() -> Self {
        Self {
            step_interval: Duration::from_millis(600),
            supports_batching: true,
            initial_counter_total: 0,
        }
    }
}

/// A step sensor driven by a timer instead of hardware.
pub struct SimulatedStepSensor {
    config: SimulatedSensorConfig,
    /// Zero point of the sensor clock
    epoch: Instant,
    /// Steps taken since the sensor was created; survives re-registration
    total_steps: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl SimulatedStepSensor {
    /// Create a new simulated sensor.
    pub fn new(config: SimulatedSensorConfig) -> Self {
        let total_steps = Arc::new(AtomicU64::new(config.initial_counter_total));
        Self {
            config,
            epoch: Instant::now(),
            total_steps,
            running: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
        }
    }

    /// Check if a listener is currently registered.
    pub fn is_registered(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl StepSensor for SimulatedStepSensor {
    fn register(
        &mut self,
        kind: StepSensorKind,
        max_delay_us: u32,
    ) -> Result<Receiver<StepEvent>, SensorError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(SensorError::AlreadyRegistered);
        }
        if max_delay_us > 0 && !self.config.supports_batching {
            return Err(SensorError::UnsupportedBatchMode {
                requested_us: max_delay_us,
            });
        }

        let (sender, receiver) = bounded(CHANNEL_CAPACITY);
        self.running.store(true, Ordering::SeqCst);

        let generator = StepGenerator {
            kind,
            max_delay: Duration::from_micros(u64::from(max_delay_us)),
            step_interval: self.config.step_interval,
            epoch: self.epoch,
            total_steps: self.total_steps.clone(),
            running: self.running.clone(),
        };
        let running = self.running.clone();
        let handle = thread::spawn(move || {
            generator.run(sender);
            running.store(false, Ordering::SeqCst);
        });

        self.thread_handle = Some(handle);
        Ok(receiver)
    }

    fn unregister(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }

    fn now_nanos(&self) -> u64 {
        self.epoch.elapsed().as_nanos() as u64
    }
}

impl Drop for SimulatedStepSensor {
    fn drop(&mut self) {
        self.unregister();
    }
}

/// State owned by the sensor thread.
struct StepGenerator {
    kind: StepSensorKind,
    max_delay: Duration,
    step_interval: Duration,
    epoch: Instant,
    total_steps: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
}

impl StepGenerator {
    fn run(self, sender: Sender<StepEvent>) {
        let mut fifo: VecDeque<StepEvent> = VecDeque::new();

        // A new counter listener is told the current total straight away.
        if self.kind == StepSensorKind::Counter {
            let event = StepEvent::counter(self.clock(), self.total_steps.load(Ordering::SeqCst));
            if !self.deliver(&sender, event) {
                return;
            }
        }

        let mut next_step = Instant::now() + self.step_interval;
        while self.running.load(Ordering::SeqCst) {
            let now = Instant::now();
            if now >= next_step {
                let total = self.total_steps.fetch_add(1, Ordering::SeqCst) + 1;
                let timestamp_ns = self.clock();
                let event = match self.kind {
                    StepSensorKind::Detector => StepEvent::detector(timestamp_ns, 1),
                    StepSensorKind::Counter => StepEvent::counter(timestamp_ns, total),
                };

                if self.max_delay.is_zero() {
                    if !self.deliver(&sender, event) {
                        return;
                    }
                } else {
                    fifo.push_back(event);
                }
                next_step += self.step_interval;
            }

            let flush_due = fifo.front().is_some_and(|oldest| {
                self.clock().saturating_sub(oldest.timestamp_ns) >= self.max_delay.as_nanos() as u64
            });
            if flush_due {
                tracing::debug!("Flushing {} batched {:?} events", fifo.len(), self.kind);
                while let Some(event) = fifo.pop_front() {
                    if !self.deliver(&sender, event) {
                        return;
                    }
                }
            }

            thread::sleep(TICK);
        }
    }

    /// Send an event; returns false once the listener is gone.
    fn deliver(&self, sender: &Sender<StepEvent>, event: StepEvent) -> bool {
        match sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!("Step event dropped, listener is not keeping up");
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    fn clock(&self) -> u64 {
        self.epoch.elapsed().as_nanos() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::types::StepReading;

    fn fast_config() -> SimulatedSensorConfig {
        SimulatedSensorConfig {
            step_interval: Duration::from_millis(5),
            supports_batching: true,
            initial_counter_total: 42,
        }
    }

    #[test]
    fn test_counter_reports_current_total_first() {
        let mut sensor = SimulatedStepSensor::new(fast_config());
        let receiver = sensor.register(StepSensorKind::Counter, 0).unwrap();

        let first = receiver.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(first.reading, StepReading::Total(42));

        let next = receiver.recv_timeout(Duration::from_secs(1)).unwrap();
        assert!(matches!(next.reading, StepReading::Total(total) if total > 42));
        sensor.unregister();
        assert!(!sensor.is_registered());
    }

    #[test]
    fn test_continuous_detector_delivers_single_steps() {
        let mut sensor = SimulatedStepSensor::new(fast_config());
        let receiver = sensor.register(StepSensorKind::Detector, 0).unwrap();

        let event = receiver.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(event.reading, StepReading::Steps(1));
    }

    #[test]
    fn test_batching_holds_events_until_max_delay() {
        let mut sensor = SimulatedStepSensor::new(fast_config());
        let receiver = sensor.register(StepSensorKind::Detector, 300_000).unwrap();

        // Nothing may arrive before the first held event is 300ms old.
        assert!(receiver.recv_timeout(Duration::from_millis(150)).is_err());

        let first = receiver.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(first.latency_ms(sensor.now_nanos()) >= 250);

        // The rest of the batch follows immediately.
        thread::sleep(Duration::from_millis(50));
        assert!(!receiver.is_empty());
    }

    #[test]
    fn test_unsupported_batching_is_rejected() {
        let mut sensor = SimulatedStepSensor::new(SimulatedSensorConfig {
            supports_batching: false,
            ..fast_config()
        });

        let err = sensor.register(StepSensorKind::Detector, 5_000_000).unwrap_err();
        assert!(matches!(
            err,
            SensorError::UnsupportedBatchMode {
                requested_us: 5_000_000
            }
        ));
        assert!(!sensor.is_registered());
        assert!(sensor.register(StepSensorKind::Detector, 0).is_ok());
    }

    #[test]
    fn test_double_registration() {
        let mut sensor = SimulatedStepSensor::new(fast_config());
        let _receiver = sensor.register(StepSensorKind::Detector, 0).unwrap();
        assert!(matches!(
            sensor.register(StepSensorKind::Counter, 0),
            Err(SensorError::AlreadyRegistered)
        ));
    }
}
