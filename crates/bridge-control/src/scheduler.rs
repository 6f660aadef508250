//! Frame-keyed input scheduler
//!
//! Presses and releases button bitmasks at target frames. Entries press once
//! the tick reaches their start frame and release once the tick passes their
//! end frame; releases happen after the whole press pass so overlapping
//! entries within one tick see a consistent register.

use crate::memory::InputPort;

/// One pending press/release pair
#[derive(Debug, Clone, Copy)]
struct ScheduledInput {
    mask: u16,
    start: u64,
    end: u64,
    pressed: bool,
}

/// Pending scheduled inputs, advanced once per frame tick.
#[derive(Debug, Default)]
pub struct InputScheduler {
    entries: Vec<ScheduledInput>,
}

impl InputScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `mask` to be held for `duration` frames starting now.
    pub fn enqueue(&mut self, mask: u16, duration: u64, now: u64) {
        self.entries.push(ScheduledInput {
            mask,
            start: now,
            end: now + duration + 1,
            pressed: false,
        });
    }

    /// Apply due presses, then drop expired entries and release their bits.
    ///
    /// When entries share bits but expire at different frames, an expiring
    /// entry keeps its hands off any bit another live pressed entry still
    /// claims (bit-level reference counting).
    pub fn tick(&mut self, now: u64, port: &mut dyn InputPort) {
        for entry in &mut self.entries {
            if !entry.pressed && entry.start <= now && now <= entry.end {
                port.press(entry.mask);
                entry.pressed = true;
            }
        }

        let live_mask = self
            .entries
            .iter()
            .filter(|entry| entry.pressed && now <= entry.end)
            .fold(0u16, |mask, entry| mask | entry.mask);

        let mut release_mask = 0u16;
        self.entries.retain(|entry| {
            if now > entry.end {
                if entry.pressed {
                    release_mask |= entry.mask & !live_mask;
                }
                false
            } else {
                true
            }
        });

        if release_mask != 0 {
            port.release(release_mask);
        }
    }

    /// Number of pending entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::RecordingPort;

    #[test]
    fn test_press_and_release_window() {
        let mut sched = InputScheduler::new();
        let mut port = RecordingPort::new();

        sched.enqueue(0x01, 2, 10);
        sched.tick(10, &mut port);
        assert_eq!(port.held(), 0x01);

        // Held through the end frame (start + duration + 1)
        for now in 11..=13 {
            sched.tick(now, &mut port);
            assert_eq!(port.held(), 0x01, "still held at tick {now}");
        }

        sched.tick(14, &mut port);
        assert_eq!(port.held(), 0);
        assert!(sched.is_empty());
    }

    #[test]
    fn test_entry_never_survives_past_end() {
        let mut sched = InputScheduler::new();
        let mut port = RecordingPort::new();
        sched.enqueue(0x40, 0, 5);
        sched.tick(5, &mut port);
        sched.tick(7, &mut port);
        assert!(sched.is_empty());
        assert_eq!(port.held(), 0);
    }

    #[test]
    fn test_disjoint_overlap_touches_own_bits_only() {
        let mut sched = InputScheduler::new();
        let mut port = RecordingPort::new();

        sched.enqueue(0x01, 1, 0);
        sched.enqueue(0x02, 5, 0);
        sched.tick(0, &mut port);
        assert_eq!(port.held(), 0x03);

        sched.tick(3, &mut port);
        assert_eq!(port.held(), 0x02);

        sched.tick(7, &mut port);
        assert_eq!(port.held(), 0);
    }

    #[test]
    fn test_shared_bit_held_until_last_claim_expires() {
        let mut sched = InputScheduler::new();
        let mut port = RecordingPort::new();

        sched.enqueue(0x01, 1, 0);
        sched.enqueue(0x01, 10, 0);
        sched.tick(0, &mut port);
        assert_eq!(port.held(), 0x01);

        // First entry expires; the second still claims the bit.
        sched.tick(3, &mut port);
        assert_eq!(port.held(), 0x01);
        assert_eq!(sched.len(), 1);

        sched.tick(12, &mut port);
        assert_eq!(port.held(), 0);
    }

    #[test]
    fn test_late_enqueue_presses_on_next_tick() {
        let mut sched = InputScheduler::new();
        let mut port = RecordingPort::new();
        sched.enqueue(0x10, 3, 20);
        sched.tick(22, &mut port);
        assert_eq!(port.held(), 0x10);
    }
}
