use std::time::Duration;

use foundation::time::Year;
use tokio::time::MissedTickBehavior;

use crate::task::TaskHandle;

/// Year playback over an inclusive range.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Timeline {
    pub start: Year,
    pub end: Year,
    /// Years advanced per tick. Zero is treated as one.
    pub step: u32,
    pub interval: Duration,
}

impl Timeline {
    pub fn new(start: Year, end: Year) -> Self {
        Self {
            start,
            end,
            step: 1,
            interval: Duration::from_millis(500),
        }
    }

    /// Next year on the timeline, wrapping back to `start` after `end`.
    pub fn next_year(&self, current: Year) -> Year {
        let step = self.step.max(1).min(i32::MAX as u32) as i32;
        let next = current.offset(step);
        if next > self.end || next < self.start {
            self.start
        } else {
            next
        }
    }

    /// Advance from `from` once per interval, calling `on_tick` with each new
    /// year until the returned handle is cancelled.
    pub fn play<F>(&self, from: Year, mut on_tick: F) -> TaskHandle
    where
        F: FnMut(Year) + Send + 'static,
    {
        let timeline = *self;
        TaskHandle::spawn(async move {
            let mut ticker = tokio::time::interval(timeline.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick completes immediately.
            ticker.tick().await;
            let mut year = from;
            loop {
                ticker.tick().await;
                year = timeline.next_year(year);
                on_tick(year);
            }
        })
    }
}
