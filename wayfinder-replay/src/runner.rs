//! Deterministic replay of a scenario through a beacon session

use std::sync::Arc;

use wayfinder_core::{
    BeaconDriver, BeaconRenderers, BeaconSensors, CourseFilter, HeadingFeed, HeadingValue,
    LocationFeed, LocationUpdateFilter, ManualClock, MotionFeed, SignificantChangeMonitoringOrigin,
    StaticRegions,
};

use crate::record::{Journal, LoggingAudio, LoggingHaptics, Record};
use crate::scenario::{Input, Scenario};
use crate::ReplayError;

/// Run every step of `scenario` and return what the renderers were asked to do.
///
/// Before each step the replay clock jumps to the step time and time-based
/// checks (stale course, long focus) are polled.
pub fn replay(scenario: &Scenario) -> Result<Vec<Record>, ReplayError> {
    let config = &scenario.config;
    let clock = Arc::new(ManualClock::new(0));
    let journal = Journal::new(clock.clone());

    let location = Arc::new(LocationFeed::new(scenario.start));
    let motion = Arc::new(MotionFeed::new(scenario.flat));
    let headings = Arc::new(HeadingFeed::new());
    let course = CourseFilter::new(headings.clone(), clock.clone(), config.course.clone());
    let heading = headings.heading(config.beacon.heading_order.clone())?;
    let audio = Arc::new(LoggingAudio::new(journal.clone()));

    let driver = BeaconDriver::new(
        scenario.beacon,
        config.beacon.clone(),
        config.wand.clone(),
        BeaconSensors {
            location: location.clone(),
            motion: motion.clone(),
            heading,
            clock: clock.clone(),
        },
        BeaconRenderers {
            haptics: Arc::new(LoggingHaptics::new(journal.clone())),
            audio: audio.clone(),
        },
    )?;

    let wand_journal = journal.clone();
    let _wand_events = driver.subscribe(move |event| {
        let event = *event;
        wand_journal.record(|at_ms| Record::Wand { at_ms, event });
    });

    let regions = StaticRegions::new(scenario.regions.clone());
    let mut filter = LocationUpdateFilter::new(clock.clone(), &config.location_filter);
    let mut origin = scenario.start.map(|start| {
        SignificantChangeMonitoringOrigin::new(start, &regions, &config.significant_change)
    });

    let started = driver.start();
    journal.record(|at_ms| Record::Session { at_ms, started });
    let mut last_volume = audio.sample();

    for step in &scenario.steps {
        clock.set(step.at_ms);
        course.poll();
        driver.poll();

        match &step.input {
            Input::Heading {
                source,
                value,
                accuracy,
            } => {
                headings.push(*source, value.map(|v| HeadingValue::new(v, *accuracy)));
            }
            Input::Course {
                value,
                accuracy,
                speed,
            } => {
                course.update(value.map(|v| HeadingValue::new(v, *accuracy)), *speed);
            }
            Input::Motion { in_motion } => course.set_in_motion(*in_motion),
            Input::Location { position } => {
                location.push(*position);

                if let Some(position) = position {
                    let accepted = filter.should_update(position);
                    if accepted {
                        filter.update(*position);
                    }
                    journal.record(|at_ms| Record::LocationUpdate { at_ms, accepted });

                    let moved = origin
                        .as_ref()
                        .map_or(true, |o| o.should_update_location(position));
                    if moved {
                        if origin.is_some() {
                            journal.record(|at_ms| Record::SignificantChange { at_ms });
                        }
                        origin = Some(SignificantChangeMonitoringOrigin::new(
                            *position,
                            &regions,
                            &config.significant_change,
                        ));
                    }
                }
            }
            Input::Flat { flat } => motion.set_flat(*flat),
            Input::Tick => {}
            Input::Stop => driver.stop(),
        }

        let volume = audio.sample();
        if volume != last_volume {
            if let Some(volume) = volume {
                journal.record(|at_ms| Record::Volume { at_ms, volume });
            }
            last_volume = volume;
        }
    }

    driver.stop();
    Ok(journal.take())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wayfinder_core::{GeoPoint, HeadingSourceType, WandEvent};

    const USER: GeoPoint = GeoPoint::new(52.3731, 4.8922);

    fn heading(at_ms: u64, value: f64) -> crate::scenario::Step {
        crate::scenario::Step {
            at_ms,
            input: Input::Heading {
                source: HeadingSourceType::Device,
                value: Some(value),
                accuracy: None,
            },
        }
    }

    fn scenario(flat: bool, steps: Vec<crate::scenario::Step>) -> Scenario {
        Scenario {
            config: Default::default(),
            beacon: USER.offset(90.0, 100.0),
            start: Some(USER),
            flat,
            regions: Vec::new(),
            steps,
        }
    }

    fn wand_events(records: &[Record]) -> Vec<WandEvent> {
        records
            .iter()
            .filter_map(|r| match r {
                Record::Wand { event, .. } => Some(*event),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_no_start_location() {
        let mut s = scenario(true, vec![heading(0, 90.0)]);
        s.start = None;
        let records = replay(&s).unwrap();
        assert_eq!(records, vec![Record::Session { at_ms: 0, started: false }]);
    }

    #[test]
    fn test_sweep_and_hold() {
        let records = replay(&scenario(
            true,
            vec![
                heading(0, 0.0),
                heading(100, 45.0),
                heading(200, 90.0),
                // Holding still: only time passes
                crate::scenario::Step {
                    at_ms: 1_300,
                    input: Input::Tick,
                },
                heading(1_400, 180.0),
            ],
        ))
        .unwrap();

        assert_eq!(
            wand_events(&records),
            vec![
                WandEvent::Started,
                WandEvent::FocusGained {
                    target: 0,
                    is_initial: false
                },
                WandEvent::ThresholdCrossed { target: 0 },
                WandEvent::LongFocus { target: 0 },
                WandEvent::FocusLost { target: 0 },
                WandEvent::ThresholdCrossed { target: 0 },
            ]
        );

        let long_focus_at = records
            .iter()
            .find(|r| matches!(r, Record::Wand { event: WandEvent::LongFocus { .. }, .. }))
            .map(Record::at_ms);
        assert_eq!(long_focus_at, Some(1_300));

        // Focused on the beacon at 200 ms: full volume
        let full_volume = |r: &Record| {
            matches!(r, Record::Volume { at_ms: 200, volume: Some(v) } if (*v - 1.0).abs() < 1e-6)
        };
        assert!(records.iter().any(full_volume));

        // Session ends with the ambient audio stopped
        assert!(matches!(records.last(), Some(Record::AudioStop { .. })));
    }

    #[test]
    fn test_lifting_phone_stops_audio() {
        let records = replay(&scenario(
            true,
            vec![
                heading(0, 90.0),
                crate::scenario::Step {
                    at_ms: 500,
                    input: Input::Flat { flat: false },
                },
                heading(600, 0.0),
            ],
        ))
        .unwrap();

        let audio: Vec<&Record> = records
            .iter()
            .filter(|r| matches!(r, Record::AudioPlay { .. } | Record::AudioStop { .. }))
            .collect();
        assert_eq!(
            audio,
            vec![
                &Record::AudioPlay { at_ms: 0, handle: 1 },
                &Record::AudioStop { at_ms: 500, handle: 1 },
            ]
        );

        // Threshold crossed while the phone is lifted: no haptics
        assert!(!records.iter().any(|r| matches!(r, Record::Haptic { .. })));
    }

    #[test]
    fn test_location_filter_and_significant_change() {
        let mut s = scenario(
            false,
            vec![
                crate::scenario::Step {
                    at_ms: 0,
                    input: Input::Location {
                        position: Some(USER.offset(0.0, 10.0)),
                    },
                },
                crate::scenario::Step {
                    at_ms: 20_000,
                    input: Input::Location {
                        position: Some(USER.offset(0.0, 80.0)),
                    },
                },
            ],
        );
        s.steps.insert(
            1,
            crate::scenario::Step {
                at_ms: 1_000,
                input: Input::Location {
                    position: Some(USER.offset(0.0, 20.0)),
                },
            },
        );

        let records = replay(&s).unwrap();
        let decisions: Vec<bool> = records
            .iter()
            .filter_map(|r| match r {
                Record::LocationUpdate { accepted, .. } => Some(*accepted),
                _ => None,
            })
            .collect();
        assert_eq!(decisions, vec![true, false, true]);

        let changes: Vec<u64> = records
            .iter()
            .filter(|r| matches!(r, Record::SignificantChange { .. }))
            .map(Record::at_ms)
            .collect();
        assert_eq!(changes, vec![20_000]);
    }
}
