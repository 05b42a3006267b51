//! Fixed-size history of event delivery delays.
//!
//! Only the most recent events are kept so the effect of batching can be
//! shown to the user: with a large max batch delay, events arrive in bursts
//! and their age on arrival grows accordingly.

/// Number of event delays kept and shown on the counting card.
pub const EVENT_QUEUE_LENGTH: usize = 10;

/// Ring buffer of the last [`EVENT_QUEUE_LENGTH`] event delays, in milliseconds.
///
/// Eviction is strict FIFO: once full, every push drops the oldest entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelayWindow {
    slots: [u64; EVENT_QUEUE_LENGTH],
    /// Index of the oldest entry
    head: usize,
    len: usize,
}

impl DelayWindow {
    /// Create an empty window.
    pub fn new() -> Self {
        Self {
            slots: [0; EVENT_QUEUE_LENGTH],
            head: 0,
            len: 0,
        }
    }

    /// Record a delay, evicting the oldest one if the window is full.
    pub fn push(&mut self, delay_ms: u64) {
        if self.len < EVENT_QUEUE_LENGTH {
            let tail = (self.head + self.len) % EVENT_QUEUE_LENGTH;
            self.slots[tail] = delay_ms;
            self.len += 1;
        } else {
            // Full: the slot at head is the oldest, overwrite it and advance.
            self.slots[self.head] = delay_ms;
            self.head = (self.head + 1) % EVENT_QUEUE_LENGTH;
        }
    }

    /// Drop every recorded delay.
    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        EVENT_QUEUE_LENGTH
    }

    /// Iterate over the delays, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        (0..self.len).map(move |i| self.slots[(self.head + i) % EVENT_QUEUE_LENGTH])
    }

    /// Render the delays as seconds with two decimals, oldest first.
    ///
    /// `[60, 1250]` renders as `"0.06, 1.25"`; an empty window renders as `""`.
    pub fn format_seconds(&self) -> String {
        self.iter()
            .map(|ms| format!("{:.2}", ms as f64 / 1000.0))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Default for DelayWindow {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_preserves_insertion_order() {
        let mut window = DelayWindow::new();
        window.push(80);
        window.push(90);

        assert_eq!(window.len(), 2);
        assert_eq!(window.iter().collect::<Vec<_>>(), vec![80, 90]);
    }

    #[test]
    fn test_eviction_keeps_last_ten() {
        let mut window = DelayWindow::new();
        for delay in 1..=12 {
            window.push(delay);
        }

        assert_eq!(window.len(), EVENT_QUEUE_LENGTH);
        assert_eq!(window.iter().collect::<Vec<_>>(), (3..=12).collect::<Vec<_>>());
    }

    #[test]
    fn test_never_exceeds_capacity() {
        let mut window = DelayWindow::new();
        for delay in 0..100 {
            window.push(delay);
            assert!(window.len() <= window.capacity());
        }
        assert_eq!(window.iter().next(), Some(90));
    }

    #[test]
    fn test_clear() {
        let mut window = DelayWindow::new();
        window.push(5);
        window.push(6);
        window.clear();

        assert!(window.is_empty());
        assert_eq!(window.format_seconds(), "");

        window.push(7);
        assert_eq!(window.iter().collect::<Vec<_>>(), vec![7]);
    }

    #[test]
    fn test_format_seconds() {
        let mut window = DelayWindow::new();
        window.push(60);
        window.push(1250);
        window.push(0);

        assert_eq!(window.format_seconds(), "0.06, 1.25, 0.00");
    }
}
