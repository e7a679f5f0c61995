//! Haptic/audio beacon driver
//!
//! Turns wand events for a single beacon location into feedback:
//!
//! ```text
//!  heading ──▶ Wand ──ThresholdCrossed──▶ haptic pulse (phone flat only)
//!               │
//!               └──Focus*──▶ is_focused ──▶ VolumeSelector ◀── audio renderer
//!
//!  phone flat ──▶ play ambient audio      phone lifted ──▶ stop ambient audio
//! ```
//!
//! The ambient audio plays for as long as the phone is held flat. Its volume
//! is pulled by the renderer from a [`VolumeSelector`], which only yields a
//! level while the beacon is focused:
//!
//! ```text
//!  volume
//!   1.0 ┤━━━━━━━━━━━┓
//!       │           ┃╲
//!       │           ┃  ╲
//!   0.0 ┤           ┃    ╲━━━━
//!       └───────────┸─────┸──── offset
//!       0      silent   silent + max  (= window/2)
//! ```

use std::fmt;
use std::sync::{Arc, Mutex, Weak};

use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::config::{BeaconSettings, WandSettings};
use crate::error::{validate_distance, validate_window, ConfigError};
use crate::geo::GeoPoint;
use crate::heading::HeadingNotifier;
use crate::orientation::BeaconOrientation;
use crate::sensors::{DeviceMotionProvider, LocationProvider};
use crate::signal::{lock, Subscription};
use crate::wand::{Wand, WandEvent, WandTarget};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FeedbackStyle {
    ImpactLight,
    ImpactMedium,
    ImpactHeavy,
    Selection,
}

/// Plays discrete haptic pulses
pub trait HapticRenderer: Send + Sync {
    /// Warm up the generator so the next pulse has less latency
    fn prepare(&self, style: FeedbackStyle);

    fn trigger(&self, style: FeedbackStyle);
}

/// Opaque handle for a playing audio asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AudioHandle(pub u64);

/// Chooses the current volume of a playing asset.
///
/// `None` means no asset should be audible at all.
pub trait VolumeSelector: Send + Sync {
    /// `heading` is the renderer's own heading if it tracks one; otherwise
    /// the selector falls back to the heading it was created with.
    fn select(&self, heading: Option<f64>) -> Option<f64>;
}

/// Plays and stops spatialized audio
pub trait AudioRenderer: Send + Sync {
    fn play(&self, location: GeoPoint, volume: Arc<dyn VolumeSelector>) -> AudioHandle;

    fn stop(&self, handle: AudioHandle);
}

/// Volume for an angular offset from the beacon.
///
/// Full volume up to `silent_distance`, then a linear fall-off to zero over
/// the next `max_distance` degrees.
pub fn volume_for_offset(offset: f64, silent_distance: f64, max_distance: f64) -> f64 {
    if offset < silent_distance {
        return 1.0;
    }
    if max_distance <= 0.0 {
        return if offset <= silent_distance { 1.0 } else { 0.0 };
    }
    1.0 - ((offset - silent_distance) / max_distance).clamp(0.0, 1.0)
}

/// Sensor capabilities a beacon session consumes
#[derive(Clone)]
pub struct BeaconSensors {
    pub location: Arc<dyn LocationProvider>,
    pub motion: Arc<dyn DeviceMotionProvider>,
    pub heading: Arc<dyn HeadingNotifier>,
    pub clock: Arc<dyn Clock>,
}

/// Output renderers a beacon session drives
#[derive(Clone)]
pub struct BeaconRenderers {
    pub haptics: Arc<dyn HapticRenderer>,
    pub audio: Arc<dyn AudioRenderer>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum AudioSlot {
    Idle,
    /// `play` has been requested but has not returned yet
    Starting,
    Playing(AudioHandle),
}

struct SessionState {
    running: bool,
    is_focused: bool,
    is_flat: bool,
    audio: AudioSlot,
    subscriptions: Vec<Subscription>,
}

impl SessionState {
    fn idle() -> Self {
        SessionState {
            running: false,
            is_focused: false,
            is_flat: false,
            audio: AudioSlot::Idle,
            subscriptions: Vec::new(),
        }
    }

    fn take_playing(&mut self) -> Option<AudioHandle> {
        match std::mem::replace(&mut self.audio, AudioSlot::Idle) {
            AudioSlot::Playing(handle) => Some(handle),
            _ => None,
        }
    }
}

struct DriverInner {
    beacon: GeoPoint,
    settings: BeaconSettings,
    sensors: BeaconSensors,
    renderers: BeaconRenderers,
    wand: Wand,
    state: Mutex<SessionState>,
}

impl DriverInner {
    fn handle_wand_event(self: &Arc<Self>, event: &WandEvent) {
        match event {
            WandEvent::Started => {
                if lock(&self.state).is_flat {
                    self.play_audio();
                }
            }
            WandEvent::FocusGained { .. } => lock(&self.state).is_focused = true,
            WandEvent::FocusLost { .. } => lock(&self.state).is_focused = false,
            WandEvent::LongFocus { .. } => {}
            WandEvent::ThresholdCrossed { .. } => {
                let flat = {
                    let state = lock(&self.state);
                    state.running && state.is_flat
                };
                if flat {
                    self.renderers.haptics.trigger(FeedbackStyle::ImpactHeavy);
                    self.renderers.haptics.prepare(FeedbackStyle::ImpactHeavy);
                }
            }
        }
    }

    fn handle_flat_change(self: &Arc<Self>, is_flat: bool) {
        let released = {
            let mut state = lock(&self.state);
            if !state.running {
                return;
            }
            state.is_flat = is_flat;
            if is_flat {
                None
            } else {
                state.take_playing()
            }
        };

        log::debug!("Beacon phone flat: {}", is_flat);
        if is_flat {
            self.play_audio();
        } else if let Some(handle) = released {
            self.renderers.audio.stop(handle);
        }
    }

    /// Start the ambient audio unless it is already playing
    fn play_audio(self: &Arc<Self>) {
        {
            let mut state = lock(&self.state);
            if !state.running || !state.is_flat || state.audio != AudioSlot::Idle {
                return;
            }
            state.audio = AudioSlot::Starting;
        }

        let selector: Arc<dyn VolumeSelector> = Arc::new(BeaconVolume {
            driver: Arc::downgrade(self),
        });
        let handle = self.renderers.audio.play(self.beacon, selector);

        let keep = {
            let mut state = lock(&self.state);
            if state.running && state.is_flat && state.audio == AudioSlot::Starting {
                state.audio = AudioSlot::Playing(handle);
                true
            } else {
                if state.audio == AudioSlot::Starting {
                    state.audio = AudioSlot::Idle;
                }
                false
            }
        };

        if keep {
            log::debug!("Beacon audio playing: {:?}", handle);
        } else {
            // Stopped or lifted while play was in progress
            self.renderers.audio.stop(handle);
        }
    }

    fn volume(&self, heading: Option<f64>) -> Option<f64> {
        if !lock(&self.state).is_focused {
            return None;
        }
        let heading = heading.or_else(|| self.sensors.heading.value())?;
        let offset = self.wand.angle_from_current_target(heading)?;
        if offset > self.settings.window_deg / 2.0 {
            return None;
        }
        Some(volume_for_offset(
            offset,
            self.settings.silent_distance_deg,
            self.settings.max_distance_deg(),
        ))
    }
}

/// Volume source handed to the audio renderer; does not keep the driver alive
struct BeaconVolume {
    driver: Weak<DriverInner>,
}

impl VolumeSelector for BeaconVolume {
    fn select(&self, heading: Option<f64>) -> Option<f64> {
        self.driver.upgrade()?.volume(heading)
    }
}

/// Haptic and audio feedback towards one beacon location.
pub struct BeaconDriver {
    inner: Arc<DriverInner>,
}

impl BeaconDriver {
    pub fn new(
        beacon: GeoPoint,
        settings: BeaconSettings,
        wand_settings: WandSettings,
        sensors: BeaconSensors,
        renderers: BeaconRenderers,
    ) -> Result<Self, ConfigError> {
        validate_window(settings.window_deg)?;
        validate_distance("silent_distance_deg", settings.silent_distance_deg)?;

        let wand = Wand::new(sensors.clock.clone(), wand_settings)?;
        Ok(BeaconDriver {
            inner: Arc::new(DriverInner {
                beacon,
                settings,
                sensors,
                renderers,
                wand,
                state: Mutex::new(SessionState::idle()),
            }),
        })
    }

    pub fn beacon(&self) -> GeoPoint {
        self.inner.beacon
    }

    /// Begin a session. Returns `false` (and does nothing) when there is no
    /// current location to take a bearing from. Restarting stops first.
    pub fn start(&self) -> bool {
        self.stop();

        let inner = &self.inner;
        let Some(orientation) =
            BeaconOrientation::new(inner.beacon, inner.sensors.location.as_ref())
        else {
            log::warn!("Beacon at {:?} not started: no current location", inner.beacon);
            return false;
        };
        let target = match WandTarget::new(Arc::new(orientation), inner.settings.window_deg) {
            Ok(target) => target,
            Err(e) => {
                log::warn!("Beacon not started: {}", e);
                return false;
            }
        };

        let weak = Arc::downgrade(inner);
        let wand_subscription = inner.wand.subscribe(move |event: &WandEvent| {
            if let Some(inner) = weak.upgrade() {
                inner.handle_wand_event(event);
            }
        });

        let weak = Arc::downgrade(inner);
        let on_flat = Arc::new(move |is_flat: &bool| {
            if let Some(inner) = weak.upgrade() {
                inner.handle_flat_change(*is_flat);
            }
        });
        let flat_subscription = inner.sensors.motion.on_flat_change(on_flat);

        {
            let mut state = lock(&inner.state);
            state.running = true;
            state.is_focused = false;
            state.is_flat = inner.sensors.motion.is_flat();
            state.audio = AudioSlot::Idle;
            state.subscriptions = vec![wand_subscription, flat_subscription];
        }

        log::debug!("Beacon session started for {:?}", inner.beacon);
        inner.wand.start(vec![target], inner.sensors.heading.clone());
        true
    }

    /// End the session: drop the flatness subscription, stop the wand and
    /// stop any playing audio. Idempotent, and safe from inside callbacks.
    pub fn stop(&self) {
        let (subscriptions, handle, was_running) = {
            let mut state = lock(&self.inner.state);
            let was_running = state.running;
            state.running = false;
            state.is_focused = false;
            (
                std::mem::take(&mut state.subscriptions),
                state.take_playing(),
                was_running,
            )
        };

        drop(subscriptions);
        self.inner.wand.stop();
        if let Some(handle) = handle {
            self.inner.renderers.audio.stop(handle);
        }
        if was_running {
            log::debug!("Beacon session stopped for {:?}", self.inner.beacon);
        }
    }

    /// Evaluate time-based wand events (long focus)
    pub fn poll(&self) {
        self.inner.wand.poll();
    }

    pub fn is_running(&self) -> bool {
        lock(&self.inner.state).running
    }

    pub fn is_focused(&self) -> bool {
        lock(&self.inner.state).is_focused
    }

    pub fn active_audio(&self) -> Option<AudioHandle> {
        match lock(&self.inner.state).audio {
            AudioSlot::Playing(handle) => Some(handle),
            _ => None,
        }
    }

    /// Current ambient volume for `heading` (or the session heading)
    pub fn volume(&self, heading: Option<f64>) -> Option<f64> {
        self.inner.volume(heading)
    }

    /// Observe the underlying wand events
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&WandEvent) + Send + Sync + 'static,
    {
        self.inner.wand.subscribe(callback)
    }
}

impl Drop for BeaconDriver {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for BeaconDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeaconDriver")
            .field("beacon", &self.inner.beacon)
            .field("running", &self.is_running())
            .field("focused", &self.is_focused())
            .field("audio", &self.active_audio())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::heading::{HeadingFeed, HeadingSourceType, HeadingValue};
    use crate::sensors::{LocationFeed, MotionFeed};
    use std::sync::atomic::{AtomicU64, Ordering};

    const USER: GeoPoint = GeoPoint::new(37.8199, -122.4783);

    #[derive(Default)]
    struct RecordingHaptics {
        calls: Mutex<Vec<(&'static str, FeedbackStyle)>>,
    }

    impl HapticRenderer for RecordingHaptics {
        fn prepare(&self, style: FeedbackStyle) {
            self.calls.lock().unwrap().push(("prepare", style));
        }

        fn trigger(&self, style: FeedbackStyle) {
            self.calls.lock().unwrap().push(("trigger", style));
        }
    }

    impl RecordingHaptics {
        fn pulses(&self) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|(kind, _)| *kind == "trigger")
                .count()
        }
    }

    #[derive(Default)]
    struct RecordingAudio {
        next: AtomicU64,
        playing: Mutex<Vec<(AudioHandle, Arc<dyn VolumeSelector>)>>,
        stopped: Mutex<Vec<AudioHandle>>,
    }

    impl AudioRenderer for RecordingAudio {
        fn play(&self, _location: GeoPoint, volume: Arc<dyn VolumeSelector>) -> AudioHandle {
            let handle = AudioHandle(self.next.fetch_add(1, Ordering::SeqCst));
            self.playing.lock().unwrap().push((handle, volume));
            handle
        }

        fn stop(&self, handle: AudioHandle) {
            self.playing.lock().unwrap().retain(|(h, _)| *h != handle);
            self.stopped.lock().unwrap().push(handle);
        }
    }

    impl RecordingAudio {
        fn playing_count(&self) -> usize {
            self.playing.lock().unwrap().len()
        }

        fn selector(&self) -> Option<Arc<dyn VolumeSelector>> {
            self.playing.lock().unwrap().first().map(|(_, s)| s.clone())
        }
    }

    struct Rig {
        clock: Arc<ManualClock>,
        location: Arc<LocationFeed>,
        motion: Arc<MotionFeed>,
        headings: Arc<HeadingFeed>,
        haptics: Arc<RecordingHaptics>,
        audio: Arc<RecordingAudio>,
        driver: BeaconDriver,
        events: Arc<Mutex<Vec<WandEvent>>>,
        _sub: Subscription,
    }

    impl Rig {
        fn new(location: Option<GeoPoint>, flat: bool, heading: Option<f64>) -> Self {
            let _ = env_logger::builder().is_test(true).try_init();
            let clock = Arc::new(ManualClock::new(0));
            let location_feed = Arc::new(LocationFeed::new(location));
            let motion = Arc::new(MotionFeed::new(flat));
            let headings = Arc::new(HeadingFeed::new());
            headings.push(
                HeadingSourceType::Device,
                heading.map(|v| HeadingValue::new(v, Some(5.0))),
            );
            let heading = headings.heading(vec![HeadingSourceType::Device]).unwrap();
            let haptics = Arc::new(RecordingHaptics::default());
            let audio = Arc::new(RecordingAudio::default());

            let driver = BeaconDriver::new(
                USER.offset(90.0, 100.0),
                BeaconSettings::default(),
                WandSettings::default(),
                BeaconSensors {
                    location: location_feed.clone(),
                    motion: motion.clone(),
                    heading,
                    clock: clock.clone(),
                },
                BeaconRenderers {
                    haptics: haptics.clone(),
                    audio: audio.clone(),
                },
            )
            .unwrap();

            let events = Arc::new(Mutex::new(Vec::new()));
            let events_cb = events.clone();
            let sub = driver.subscribe(move |e| events_cb.lock().unwrap().push(*e));

            Rig {
                clock,
                location: location_feed,
                motion,
                headings,
                haptics,
                audio,
                driver,
                events,
                _sub: sub,
            }
        }

        fn turn(&self, degrees: f64) {
            self.headings.push(
                HeadingSourceType::Device,
                Some(HeadingValue::new(degrees, Some(5.0))),
            );
        }

        fn take(&self) -> Vec<WandEvent> {
            std::mem::take(&mut *self.events.lock().unwrap())
        }
    }

    #[test]
    fn test_volume_curve() {
        assert_eq!(volume_for_offset(0.0, 15.0, 15.0), 1.0);
        assert_eq!(volume_for_offset(15.0, 15.0, 15.0), 1.0);
        assert!((volume_for_offset(22.5, 15.0, 15.0) - 0.5).abs() < 1e-9);
        assert!((volume_for_offset(18.0, 15.0, 15.0) - 0.8).abs() < 1e-9);
        assert_eq!(volume_for_offset(30.0, 15.0, 15.0), 0.0);
        assert_eq!(volume_for_offset(90.0, 15.0, 15.0), 0.0);
    }

    #[test]
    fn test_volume_curve_without_falloff() {
        assert_eq!(volume_for_offset(10.0, 10.0, 0.0), 1.0);
        assert_eq!(volume_for_offset(10.5, 10.0, 0.0), 0.0);
    }

    #[test]
    fn test_invalid_settings() {
        let rig = Rig::new(Some(USER), false, None);
        let settings = BeaconSettings {
            window_deg: 0.0,
            ..BeaconSettings::default()
        };
        let result = BeaconDriver::new(
            USER,
            settings,
            WandSettings::default(),
            rig.driver.inner.sensors.clone(),
            rig.driver.inner.renderers.clone(),
        );
        assert_eq!(result.err(), Some(ConfigError::InvalidWindow(0.0)));
    }

    #[test]
    fn test_start_without_location_is_noop() {
        let rig = Rig::new(None, true, Some(90.0));
        assert!(!rig.driver.start());
        assert!(!rig.driver.is_running());
        assert_eq!(rig.motion.subscriber_count(), 0);
        assert_eq!(rig.audio.playing_count(), 0);
        assert!(rig.take().is_empty());
    }

    #[test]
    fn test_flat_start_plays_audio() {
        let rig = Rig::new(Some(USER), true, Some(90.0));
        assert!(rig.driver.start());
        assert!(rig.driver.is_focused());
        assert_eq!(rig.audio.playing_count(), 1);
        assert!(rig.driver.active_audio().is_some());

        // The renderer pulls the volume: dead on target
        let selector = rig.audio.selector().unwrap();
        let volume = selector.select(None).unwrap();
        assert!((volume - 1.0).abs() < 1e-6);
        assert!((selector.select(Some(112.5)).unwrap() - 0.5).abs() < 0.01);
    }

    #[test]
    fn test_no_asset_outside_window() {
        let rig = Rig::new(Some(USER), true, Some(0.0));
        rig.driver.start();
        assert!(!rig.driver.is_focused());
        assert_eq!(rig.audio.playing_count(), 1);
        assert_eq!(rig.driver.volume(None), None);
        assert_eq!(rig.driver.volume(Some(90.0)), None);
    }

    #[test]
    fn test_flatness_toggles_audio() {
        let rig = Rig::new(Some(USER), false, Some(90.0));
        rig.driver.start();
        assert_eq!(rig.audio.playing_count(), 0);

        rig.motion.set_flat(true);
        assert_eq!(rig.audio.playing_count(), 1);
        let handle = rig.driver.active_audio().unwrap();

        rig.motion.set_flat(false);
        assert_eq!(rig.audio.playing_count(), 0);
        assert_eq!(*rig.audio.stopped.lock().unwrap(), vec![handle]);
        assert_eq!(rig.driver.active_audio(), None);

        rig.motion.set_flat(true);
        assert_eq!(rig.audio.playing_count(), 1);
    }

    #[test]
    fn test_haptics_only_when_flat() {
        let rig = Rig::new(Some(USER), false, Some(0.0));
        rig.driver.start();

        rig.turn(90.0);
        assert_eq!(rig.haptics.pulses(), 0);

        rig.motion.set_flat(true);
        rig.turn(0.0);
        assert_eq!(rig.haptics.pulses(), 1);
        assert_eq!(
            *rig.haptics.calls.lock().unwrap(),
            vec![
                ("trigger", FeedbackStyle::ImpactHeavy),
                ("prepare", FeedbackStyle::ImpactHeavy)
            ]
        );
    }

    #[test]
    fn test_stop_releases_everything() {
        let rig = Rig::new(Some(USER), true, Some(90.0));
        rig.driver.start();
        assert_eq!(rig.motion.subscriber_count(), 1);

        rig.driver.stop();
        rig.driver.stop();
        assert!(!rig.driver.is_running());
        assert_eq!(rig.motion.subscriber_count(), 0);
        assert_eq!(rig.audio.playing_count(), 0);
        assert_eq!(rig.audio.stopped.lock().unwrap().len(), 1);
        assert_eq!(rig.location.subscriber_count(), 0);

        // No more events or audio after stop
        rig.take();
        rig.turn(0.0);
        rig.motion.set_flat(false);
        rig.motion.set_flat(true);
        assert!(rig.take().is_empty());
        assert_eq!(rig.audio.playing_count(), 0);
    }

    #[test]
    fn test_drop_stops_session() {
        let rig = Rig::new(Some(USER), true, Some(90.0));
        rig.driver.start();
        let Rig { driver, audio, motion, .. } = rig;
        drop(driver);
        assert_eq!(audio.playing_count(), 0);
        assert_eq!(motion.subscriber_count(), 0);
    }

    #[test]
    fn test_stop_from_threshold_callback() {
        let rig = Arc::new(Rig::new(Some(USER), true, Some(0.0)));
        rig.driver.start();

        let weak = Arc::downgrade(&rig);
        let _stopper = rig.driver.subscribe(move |e| {
            if matches!(e, WandEvent::ThresholdCrossed { .. }) {
                if let Some(rig) = weak.upgrade() {
                    rig.driver.stop();
                }
            }
        });

        rig.turn(90.0);
        assert!(!rig.driver.is_running());
        assert_eq!(rig.audio.playing_count(), 0);
        assert_eq!(rig.motion.subscriber_count(), 0);
    }

    #[test]
    fn test_sweep_end_to_end() {
        let rig = Rig::new(Some(USER), true, Some(0.0));
        assert!(rig.driver.start());
        assert_eq!(rig.take(), vec![WandEvent::Started]);

        let mut gained_at = None;
        let mut lost_at = None;
        for step in 1..=360 {
            let heading = step as f64;
            rig.turn(heading);
            for event in rig.take() {
                match event {
                    WandEvent::FocusGained { is_initial, .. } => {
                        assert!(!is_initial);
                        assert!(gained_at.is_none());
                        gained_at = Some(heading);
                    }
                    WandEvent::FocusLost { .. } => {
                        assert!(lost_at.is_none());
                        lost_at = Some(heading);
                    }
                    WandEvent::LongFocus { .. } => panic!("no time passed"),
                    _ => {}
                }
            }
        }

        // Beacon due east with a 60 degree window
        let gained = gained_at.unwrap();
        let lost = lost_at.unwrap();
        assert!((gained - 60.0).abs() <= 1.0, "gained at {}", gained);
        assert!((lost - 121.0).abs() <= 1.0, "lost at {}", lost);
        assert!(!rig.driver.is_focused());
        assert_eq!(rig.haptics.pulses(), 2);

        // Hold still on the beacon
        rig.turn(90.0);
        rig.take();
        rig.clock.advance(999);
        rig.driver.poll();
        assert!(rig.take().is_empty());
        rig.clock.advance(1);
        rig.driver.poll();
        assert_eq!(rig.take(), vec![WandEvent::LongFocus { target: 0 }]);
        rig.clock.advance(5_000);
        rig.driver.poll();
        assert!(rig.take().is_empty());
    }

    #[test]
    fn test_bearing_tracks_walking() {
        let rig = Rig::new(Some(USER), true, Some(90.0));
        rig.driver.start();
        assert!(rig.driver.is_focused());

        // Walk past the beacon; it is now behind, so the same heading loses focus
        rig.location.push(Some(USER.offset(90.0, 200.0)));
        rig.turn(91.0);
        assert!(!rig.driver.is_focused());

        rig.turn(270.0);
        assert!(rig.driver.is_focused());
    }
}
