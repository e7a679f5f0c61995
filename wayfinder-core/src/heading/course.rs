//! GPS course gating
//!
//! Raw course from the location provider is only meaningful while the user is
//! actually moving. The filter drops course while stationary or too slow, and
//! clears the course slot when accepted updates stop arriving.

use std::sync::{Arc, Mutex};

use super::{HeadingFeed, HeadingSourceType, HeadingValue};
use crate::clock::Clock;
use crate::config::CourseSettings;
use crate::signal::lock;

#[derive(Debug, Default)]
struct CourseState {
    in_motion: bool,
    /// Time of the last accepted course; `None` once the slot has been cleared
    last_accepted_ms: Option<u64>,
}

/// Feeds filtered GPS course into the `Course` slot of a [`HeadingFeed`].
pub struct CourseFilter {
    feed: Arc<HeadingFeed>,
    clock: Arc<dyn Clock>,
    settings: CourseSettings,
    state: Mutex<CourseState>,
}

impl CourseFilter {
    pub fn new(feed: Arc<HeadingFeed>, clock: Arc<dyn Clock>, settings: CourseSettings) -> Self {
        CourseFilter {
            feed,
            clock,
            settings,
            state: Mutex::new(CourseState::default()),
        }
    }

    pub fn is_in_motion(&self) -> bool {
        lock(&self.state).in_motion
    }

    /// Report whether the user is moving. Stopping clears the course at once.
    pub fn set_in_motion(&self, in_motion: bool) {
        let cleared = {
            let mut state = lock(&self.state);
            if state.in_motion == in_motion {
                return;
            }
            state.in_motion = in_motion;
            !in_motion && state.last_accepted_ms.take().is_some()
        };

        log::debug!("Course filter motion state: in_motion={}", in_motion);
        if cleared {
            self.feed.push(HeadingSourceType::Course, None);
        }
    }

    /// Offer a raw course reading with the speed it was measured at.
    ///
    /// Returns `true` when the reading was forwarded to the feed.
    pub fn update(&self, course: Option<HeadingValue>, speed_mps: Option<f64>) -> bool {
        {
            let mut state = lock(&self.state);
            if !state.in_motion {
                log::trace!("Ignoring course while not in motion");
                return false;
            }
            if let Some(speed) = speed_mps {
                if speed < self.settings.min_speed_mps {
                    log::trace!("Ignoring course at {:.2} m/s", speed);
                    return false;
                }
            }
            state.last_accepted_ms = course.map(|_| self.clock.now_ms());
        }

        self.feed.push(HeadingSourceType::Course, course);
        true
    }

    /// Clear the course once it has gone stale. Returns `true` if it was cleared.
    pub fn poll(&self) -> bool {
        {
            let mut state = lock(&self.state);
            let now_ms = self.clock.now_ms();
            match state.last_accepted_ms {
                Some(t) if now_ms.saturating_sub(t) >= self.settings.stale_after_ms => {
                    state.last_accepted_ms = None;
                }
                _ => return false,
            }
        }

        log::debug!("Course is stale, clearing");
        self.feed.push(HeadingSourceType::Course, None);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn setup() -> (Arc<HeadingFeed>, Arc<ManualClock>, CourseFilter) {
        let feed = Arc::new(HeadingFeed::new());
        let clock = Arc::new(ManualClock::new(0));
        let filter = CourseFilter::new(feed.clone(), clock.clone(), CourseSettings::default());
        (feed, clock, filter)
    }

    fn course(v: f64) -> Option<HeadingValue> {
        Some(HeadingValue::new(v, Some(10.0)))
    }

    #[test]
    fn test_ignored_when_stationary() {
        let (feed, _clock, filter) = setup();
        assert!(!filter.update(course(90.0), Some(2.0)));
        assert_eq!(feed.latest(HeadingSourceType::Course), None);
    }

    #[test]
    fn test_ignored_when_slow() {
        let (feed, _clock, filter) = setup();
        filter.set_in_motion(true);
        assert!(!filter.update(course(90.0), Some(0.3)));
        assert!(filter.update(course(95.0), Some(0.4)));
        assert!(filter.update(course(100.0), None));
        assert_eq!(feed.latest(HeadingSourceType::Course), course(100.0));
    }

    #[test]
    fn test_stale_course_cleared_once() {
        let (feed, clock, filter) = setup();
        filter.set_in_motion(true);
        filter.update(course(90.0), Some(1.5));

        clock.advance(2_999);
        assert!(!filter.poll());
        assert_eq!(feed.latest(HeadingSourceType::Course), course(90.0));

        clock.advance(1);
        assert!(filter.poll());
        assert_eq!(feed.latest(HeadingSourceType::Course), None);
        assert!(!filter.poll());
    }

    #[test]
    fn test_stopping_clears_course() {
        let (feed, _clock, filter) = setup();
        let heading = feed.heading(vec![HeadingSourceType::Course]).unwrap();

        filter.set_in_motion(true);
        filter.update(course(45.0), Some(1.0));
        assert!(heading.is_course());

        filter.set_in_motion(false);
        assert!(!filter.is_in_motion());
        assert_eq!(heading.reading(), None);
    }
}
