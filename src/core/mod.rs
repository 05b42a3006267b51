//! Core functionality for the batch step sensor.
//!
//! This module contains:
//! - Step accounting for the detector and counter streams
//! - The bounded history of event delivery delays
//! - Rendering of the counting card text

pub mod accountant;
pub mod card;
pub mod delays;

// Re-export commonly used types
pub use accountant::{AccountingError, PersistedState, SensorMode, StepAccountant};
pub use card::{counting_card, CardText};
pub use delays::{DelayWindow, EVENT_QUEUE_LENGTH};
