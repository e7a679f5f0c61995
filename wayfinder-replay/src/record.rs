//! Replay output and the renderers that produce it
//!
//! Instead of driving real haptic and audio hardware, a replay logs every
//! renderer request as a timestamped [`Record`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use wayfinder_core::{
    AudioHandle, AudioRenderer, Clock, FeedbackStyle, GeoPoint, HapticRenderer, ManualClock,
    VolumeSelector, WandEvent,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HapticAction {
    Prepare,
    Trigger,
}

/// Something observable that happened during a replay
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Record {
    /// Result of starting the beacon session
    Session { at_ms: u64, started: bool },
    Wand { at_ms: u64, event: WandEvent },
    Haptic {
        at_ms: u64,
        action: HapticAction,
        style: FeedbackStyle,
    },
    AudioPlay { at_ms: u64, handle: u64 },
    AudioStop { at_ms: u64, handle: u64 },
    /// Ambient volume as the audio renderer would hear it (`None`: silent)
    Volume { at_ms: u64, volume: Option<f64> },
    /// Location update filter decision for a new fix
    LocationUpdate { at_ms: u64, accepted: bool },
    /// User left the low-power monitoring origin
    SignificantChange { at_ms: u64 },
}

impl Record {
    pub fn at_ms(&self) -> u64 {
        match self {
            Record::Session { at_ms, .. }
            | Record::Wand { at_ms, .. }
            | Record::Haptic { at_ms, .. }
            | Record::AudioPlay { at_ms, .. }
            | Record::AudioStop { at_ms, .. }
            | Record::Volume { at_ms, .. }
            | Record::LocationUpdate { at_ms, .. }
            | Record::SignificantChange { at_ms } => *at_ms,
        }
    }
}

/// Shared, time-stamped record list
#[derive(Clone)]
pub struct Journal {
    clock: Arc<ManualClock>,
    records: Arc<Mutex<Vec<Record>>>,
}

impl Journal {
    pub fn new(clock: Arc<ManualClock>) -> Self {
        Journal {
            clock,
            records: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Append a record stamped with the current replay time
    pub fn record(&self, make: impl FnOnce(u64) -> Record) {
        let record = make(self.clock.now_ms());
        log::debug!("{:?}", record);
        lock(&self.records).push(record);
    }

    pub fn take(&self) -> Vec<Record> {
        std::mem::take(&mut *lock(&self.records))
    }
}

pub struct LoggingHaptics {
    journal: Journal,
}

impl LoggingHaptics {
    pub fn new(journal: Journal) -> Self {
        LoggingHaptics { journal }
    }
}

impl HapticRenderer for LoggingHaptics {
    fn prepare(&self, style: FeedbackStyle) {
        self.journal.record(|at_ms| Record::Haptic {
            at_ms,
            action: HapticAction::Prepare,
            style,
        });
    }

    fn trigger(&self, style: FeedbackStyle) {
        log::info!("Haptic pulse: {:?}", style);
        self.journal.record(|at_ms| Record::Haptic {
            at_ms,
            action: HapticAction::Trigger,
            style,
        });
    }
}

/// Audio renderer that keeps the volume selectors of playing assets so the
/// replay can sample them like a real render loop would.
pub struct LoggingAudio {
    journal: Journal,
    next_handle: AtomicU64,
    playing: Mutex<Vec<(AudioHandle, Arc<dyn VolumeSelector>)>>,
}

impl LoggingAudio {
    pub fn new(journal: Journal) -> Self {
        LoggingAudio {
            journal,
            next_handle: AtomicU64::new(1),
            playing: Mutex::new(Vec::new()),
        }
    }

    /// Volume of the first playing asset; `None` when nothing is playing
    pub fn sample(&self) -> Option<Option<f64>> {
        let selector = lock(&self.playing).first().map(|(_, s)| s.clone())?;
        Some(selector.select(None))
    }
}

impl AudioRenderer for LoggingAudio {
    fn play(&self, location: GeoPoint, volume: Arc<dyn VolumeSelector>) -> AudioHandle {
        let handle = AudioHandle(self.next_handle.fetch_add(1, Ordering::SeqCst));
        log::info!("Audio {:?} playing at {:?}", handle, location);
        lock(&self.playing).push((handle, volume));
        self.journal.record(|at_ms| Record::AudioPlay {
            at_ms,
            handle: handle.0,
        });
        handle
    }

    fn stop(&self, handle: AudioHandle) {
        log::info!("Audio {:?} stopped", handle);
        lock(&self.playing).retain(|(h, _)| *h != handle);
        self.journal.record(|at_ms| Record::AudioStop {
            at_ms,
            handle: handle.0,
        });
    }
}
