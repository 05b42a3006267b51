//! Text shown on the step counting card.

use crate::core::accountant::StepAccountant;
use crate::core::delays::EVENT_QUEUE_LENGTH;
use serde::{Deserialize, Serialize};

/// Title and description of a rendered card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardText {
    pub title: String,
    pub description: String,
}

impl std::fmt::Display for CardText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}\n{}", self.title, self.description)
    }
}

/// Render the counting card for the current accountant state.
///
/// Before the first delay is recorded the delay list shows `-`.
pub fn counting_card(accountant: &StepAccountant) -> CardText {
    let delays = if accountant.recent_delays().is_empty() {
        "-".to_string()
    } else {
        accountant.format_delay_seconds()
    };

    CardText {
        title: format!("Steps: {}", accountant.step_count()),
        description: format!(
            "Sensor: {}\n\
             Max sensor event delay: {} \u{00B5}s\n\
             Age of events in s (last {}):\n\
             {}",
            accountant.mode().sensor_name(),
            accountant.max_batch_delay_us(),
            EVENT_QUEUE_LENGTH,
            delays
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::accountant::SensorMode;

    #[test]
    fn test_initial_card() {
        let mut accountant = StepAccountant::new();
        accountant.activate(SensorMode::Counter, 5_000_000);

        let card = counting_card(&accountant);
        assert_eq!(card.title, "Steps: 0");
        assert!(card.description.contains("STEP_COUNTER"));
        assert!(card.description.contains("5000000"));
        assert!(card.description.contains("(last 10)"));
        assert!(card.description.ends_with('-'));
    }

    #[test]
    fn test_card_after_steps() {
        let mut accountant = StepAccountant::new();
        accountant.activate(SensorMode::Detector, 0);
        accountant.on_detector_event(1, 80).unwrap();
        accountant.on_detector_event(2, 1500).unwrap();

        let card = counting_card(&accountant);
        assert_eq!(card.title, "Steps: 3");
        assert!(card.description.contains("STEP_DETECTOR"));
        assert!(card.description.ends_with("0.08, 1.50"));
    }

    #[test]
    fn test_inactive_card_names_no_sensor() {
        let card = counting_card(&StepAccountant::new());
        assert!(card.description.starts_with("Sensor: -"));
    }
}
