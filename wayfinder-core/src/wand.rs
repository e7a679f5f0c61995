//! Angular target tracker ("wand")
//!
//! The user sweeps the phone like a wand. Each heading sample is compared
//! against one or more targets, each with an acceptance window centred on its
//! live bearing.
//!
//! ```text
//!                 target bearing
//!                       │
//!          ╲   window/2 │ window/2   ╱
//!           ╲◀─────────▶│◀─────────▶╱
//!            ╲  focus   │  focus   ╱
//!  ───────────┼─────────┼─────────┼─────────── heading
//!      lost   ▲                   ▲   lost
//!        threshold crossed   threshold crossed
//! ```
//!
//! The current target is the first target (in list order) whose window
//! contains the heading. Per sample, events are emitted in a fixed order:
//! `FocusLost`, `FocusGained`, `ThresholdCrossed` (ascending target index),
//! `LongFocus`, then `Started` after the first sample of a session.
//!
//! Long focus needs time to pass without the heading changing, so it is also
//! evaluated by [`Wand::poll`].

use std::fmt;
use std::sync::{Arc, Mutex, Weak};

use serde::Serialize;

use crate::circular::{angular_distance, normalize_degrees};
use crate::clock::Clock;
use crate::config::WandSettings;
use crate::error::{validate_window, ConfigError};
use crate::heading::{HeadingCallback, HeadingNotifier, HeadingValue};
use crate::orientation::Orientable;
use crate::signal::{lock, Publisher, Subscription};

/// Something to point at, with its acceptance window
#[derive(Clone)]
pub struct WandTarget {
    orientable: Arc<dyn Orientable>,
    window: f64,
    focusable: bool,
}

impl WandTarget {
    /// `window` is the total angular width in degrees, `(0, 360]`
    pub fn new(orientable: Arc<dyn Orientable>, window: f64) -> Result<Self, ConfigError> {
        Ok(WandTarget {
            orientable,
            window: validate_window(window)?,
            focusable: true,
        })
    }

    /// A target that takes part in target selection and threshold crossing
    /// but never reports focus
    pub fn unfocusable(
        orientable: Arc<dyn Orientable>,
        settings: &WandSettings,
    ) -> Result<Self, ConfigError> {
        Ok(WandTarget {
            orientable,
            window: validate_window(settings.unfocusable_window_deg)?,
            focusable: false,
        })
    }

    /// Live bearing, read on every call
    pub fn bearing(&self) -> f64 {
        self.orientable.bearing()
    }

    pub fn window(&self) -> f64 {
        self.window
    }

    pub fn is_focusable(&self) -> bool {
        self.focusable
    }

    /// Unsigned offset between `heading` and the target bearing, `[0, 180]`
    pub fn offset(&self, heading: f64) -> f64 {
        angular_distance(heading, self.bearing())
    }

    pub fn contains(&self, heading: f64) -> bool {
        self.offset(heading) <= self.window / 2.0
    }
}

impl fmt::Debug for WandTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WandTarget")
            .field("bearing", &self.bearing())
            .field("window", &self.window)
            .field("focusable", &self.focusable)
            .finish()
    }
}

/// Tracker events; `target` is an index into the session's target list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum WandEvent {
    /// First heading sample of the session has been processed
    Started,
    FocusGained {
        target: usize,
        /// Focus was already there when the session started
        #[serde(rename = "isInitial")]
        is_initial: bool,
    },
    FocusLost { target: usize },
    /// Focus held for the long-focus duration (once per focus episode)
    LongFocus { target: usize },
    /// Heading moved across the edge of a target's window
    ThresholdCrossed { target: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WandState {
    Idle,
    Tracking,
}

struct Session {
    id: u64,
    targets: Vec<WandTarget>,
    heading: Arc<dyn HeadingNotifier>,
    /// Our registration in the heading's callback slot
    callback: HeadingCallback,
    /// First target whose window contains the heading
    current: Option<usize>,
    focus_started_ms: Option<u64>,
    long_focus_sent: bool,
    /// Whether each target contained the previous sample
    inside: Vec<Option<bool>>,
    started_sent: bool,
}

impl Session {
    fn focused(&self) -> Option<usize> {
        self.current.filter(|&i| self.targets[i].is_focusable())
    }

    fn evaluate(
        &mut self,
        heading: f64,
        now_ms: u64,
        is_initial: bool,
        long_focus_ms: u64,
    ) -> Vec<WandEvent> {
        let heading = normalize_degrees(heading);
        let mut events = Vec::new();

        let contains: Vec<bool> = self.targets.iter().map(|t| t.contains(heading)).collect();
        let current = contains.iter().position(|&c| c);

        if current != self.current {
            if let Some(old) = self.focused() {
                events.push(WandEvent::FocusLost { target: old });
                self.focus_started_ms = None;
            }
            self.current = current;
            if let Some(new) = self.focused() {
                events.push(WandEvent::FocusGained {
                    target: new,
                    is_initial,
                });
                self.focus_started_ms = Some(now_ms);
                self.long_focus_sent = false;
            }
        }

        for (i, &now_inside) in contains.iter().enumerate() {
            if let Some(was_inside) = self.inside[i] {
                if was_inside != now_inside {
                    events.push(WandEvent::ThresholdCrossed { target: i });
                }
            }
            self.inside[i] = Some(now_inside);
        }

        events.extend(self.check_long_focus(now_ms, long_focus_ms));

        if !self.started_sent {
            self.started_sent = true;
            events.push(WandEvent::Started);
        }

        log::trace!(
            "Wand heading {:.1}: current={:?} events={:?}",
            heading,
            self.current,
            events
        );
        events
    }

    fn check_long_focus(&mut self, now_ms: u64, long_focus_ms: u64) -> Option<WandEvent> {
        let target = self.focused()?;
        let started = self.focus_started_ms?;
        if self.long_focus_sent || now_ms.saturating_sub(started) < long_focus_ms {
            return None;
        }
        self.long_focus_sent = true;
        Some(WandEvent::LongFocus { target })
    }
}

struct WandInner {
    clock: Arc<dyn Clock>,
    settings: WandSettings,
    session: Mutex<Option<Session>>,
    next_session_id: Mutex<u64>,
    events: Publisher<WandEvent>,
}

impl WandInner {
    fn is_current(&self, session_id: u64) -> bool {
        lock(&self.session).as_ref().map(|s| s.id) == Some(session_id)
    }

    /// Publish outside the session lock, dropping events once the session
    /// that produced them has been stopped (possibly by an earlier event).
    fn emit(&self, session_id: u64, events: Vec<WandEvent>) {
        for event in events {
            if !self.is_current(session_id) {
                return;
            }
            log::debug!("Wand event: {:?}", event);
            self.events.publish(&event);
        }
    }

    fn process(&self, session_id: u64, heading: f64, is_initial: bool) {
        let events = {
            let mut guard = lock(&self.session);
            match guard.as_mut() {
                Some(session) if session.id == session_id => session.evaluate(
                    heading,
                    self.clock.now_ms(),
                    is_initial,
                    self.settings.long_focus_ms,
                ),
                _ => return,
            }
        };
        self.emit(session_id, events);
    }
}

/// Tracks a heading against a set of targets and emits [`WandEvent`]s.
pub struct Wand {
    inner: Arc<WandInner>,
}

impl Wand {
    pub fn new(clock: Arc<dyn Clock>, settings: WandSettings) -> Result<Self, ConfigError> {
        settings.validate()?;
        Ok(Wand {
            inner: Arc::new(WandInner {
                clock,
                settings,
                session: Mutex::new(None),
                next_session_id: Mutex::new(1),
                events: Publisher::new(),
            }),
        })
    }

    /// Receive tracker events until the token is dropped
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&WandEvent) + Send + Sync + 'static,
    {
        self.inner.events.subscribe(callback)
    }

    /// Begin tracking `targets` against `heading`, replacing any running
    /// session. The current heading, if there is one, is evaluated at once
    /// and can produce an initial `FocusGained`.
    ///
    /// An empty target list leaves the wand idle.
    pub fn start(&self, targets: Vec<WandTarget>, heading: Arc<dyn HeadingNotifier>) {
        self.stop();

        if targets.is_empty() {
            log::debug!("Wand started without targets, staying idle");
            return;
        }

        let session_id = {
            let mut next = lock(&self.inner.next_session_id);
            let id = *next;
            *next += 1;
            id
        };

        let weak: Weak<WandInner> = Arc::downgrade(&self.inner);
        let callback: HeadingCallback = Arc::new(move |value: Option<HeadingValue>| {
            if let (Some(inner), Some(value)) = (weak.upgrade(), value) {
                inner.process(session_id, value.value, false);
            }
        });

        let target_count = targets.len();
        *lock(&self.inner.session) = Some(Session {
            id: session_id,
            targets,
            heading: heading.clone(),
            callback: callback.clone(),
            current: None,
            focus_started_ms: None,
            long_focus_sent: false,
            inside: vec![None; target_count],
            started_sent: false,
        });
        log::debug!("Wand tracking {} target(s)", target_count);

        heading.on_heading_did_update(Some(callback));

        if let Some(value) = heading.value() {
            self.inner.process(session_id, value, true);
        }
    }

    /// Return to idle and release the heading callback. Safe to call
    /// repeatedly and from inside an event callback.
    ///
    /// A callback that someone else installed on the heading since `start`
    /// is left in place.
    pub fn stop(&self) {
        let Some(session) = lock(&self.inner.session).take() else {
            return;
        };
        if !session.heading.release_heading_callback(&session.callback) {
            log::debug!("Heading callback was replaced, leaving it in place");
        }
        log::debug!("Wand stopped");
    }

    /// Evaluate time-based events (long focus) without a new heading sample
    pub fn poll(&self) {
        let (session_id, event) = {
            let mut guard = lock(&self.inner.session);
            let Some(session) = guard.as_mut() else {
                return;
            };
            let now_ms = self.inner.clock.now_ms();
            let event = session.check_long_focus(now_ms, self.inner.settings.long_focus_ms);
            (session.id, event)
        };
        if let Some(event) = event {
            self.inner.emit(session_id, vec![event]);
        }
    }

    pub fn state(&self) -> WandState {
        if lock(&self.inner.session).is_some() {
            WandState::Tracking
        } else {
            WandState::Idle
        }
    }

    /// Index of the focused target, if any
    pub fn focused_target(&self) -> Option<usize> {
        lock(&self.inner.session).as_ref().and_then(|s| s.focused())
    }

    pub fn is_focused(&self) -> bool {
        self.focused_target().is_some()
    }

    /// Unsigned offset in degrees between `heading` and the current target.
    /// `None` when idle or when no target contained the last heading sample.
    pub fn angle_from_current_target(&self, heading: f64) -> Option<f64> {
        let guard = lock(&self.inner.session);
        let session = guard.as_ref()?;
        let target = &session.targets[session.current?];
        Some(target.offset(heading))
    }
}

impl Drop for Wand {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for Wand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wand")
            .field("state", &self.state())
            .field("focused_target", &self.focused_target())
            .finish()
    }
}
