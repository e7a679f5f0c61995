//! Heading fusion
//!
//! Up to three heading sources update independently: GPS course, the device
//! compass and a user-supplied heading (for example from head-tracking
//! headphones). A [`Heading`] keeps the latest reading from each and exposes a
//! single *effective* heading, chosen by walking a fixed priority order and
//! taking the first source that currently has a value.
//!
//! ```text
//!  course ─┐
//!  device ─┼─▶ HeadingFeed ──▶ Heading (priority order) ──▶ on_heading_did_update
//!  user   ─┘
//! ```
//!
//! The change callback fires only when the effective reading (source and
//! value) actually changes.

mod course;

pub use course::CourseFilter;

use std::fmt;
use std::sync::{Arc, Mutex, Weak};

use serde::{Deserialize, Serialize};

use crate::error::{validate_priority_order, ConfigError};
use crate::signal::{lock, Publisher, Subscription};

/// A single heading reading.
///
/// Equality is exact field equality. Values are expected to arrive already
/// normalized from their producers, and comparing accuracy exactly keeps
/// accuracy-only changes visible to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeadingValue {
    /// Heading in degrees clockwise from north
    pub value: f64,
    /// Estimated error in degrees, if the source reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
}

impl HeadingValue {
    pub const fn new(value: f64, accuracy: Option<f64>) -> Self {
        HeadingValue { value, accuracy }
    }
}

/// Where a heading reading came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeadingSourceType {
    /// Direction of travel derived from successive GPS fixes
    Course,
    /// Device compass
    Device,
    /// User heading (e.g. head-tracking headphones)
    User,
}

impl fmt::Display for HeadingSourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeadingSourceType::Course => write!(f, "course"),
            HeadingSourceType::Device => write!(f, "device"),
            HeadingSourceType::User => write!(f, "user"),
        }
    }
}

/// The effective heading and the source that produced it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadingReading {
    pub value: HeadingValue,
    pub source: HeadingSourceType,
}

/// A tagged update for one heading source (`None` means the source went away)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeadingUpdate {
    pub source: HeadingSourceType,
    pub value: Option<HeadingValue>,
}

/// Callback invoked with the new effective heading (or `None` when invalid)
pub type HeadingCallback = Arc<dyn Fn(Option<HeadingValue>) + Send + Sync>;

/// Read access to a heading plus a single change-notification slot.
pub trait HeadingNotifier: Send + Sync {
    /// Effective heading value in degrees, if any source is present
    fn value(&self) -> Option<f64>;

    /// Accuracy of the effective heading
    fn accuracy(&self) -> Option<f64>;

    /// Install the change callback, replacing any previous one.
    /// Passing `None` clears it.
    fn on_heading_did_update(&self, callback: Option<HeadingCallback>);

    /// Clear the change callback only if the slot still holds `callback`.
    /// Returns `false` when another callback has replaced it since.
    fn release_heading_callback(&self, callback: &HeadingCallback) -> bool;
}

/// Latest reading per source
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Slots {
    course: Option<HeadingValue>,
    device: Option<HeadingValue>,
    user: Option<HeadingValue>,
}

impl Slots {
    fn get(&self, source: HeadingSourceType) -> Option<HeadingValue> {
        match source {
            HeadingSourceType::Course => self.course,
            HeadingSourceType::Device => self.device,
            HeadingSourceType::User => self.user,
        }
    }

    fn set(&mut self, source: HeadingSourceType, value: Option<HeadingValue>) {
        match source {
            HeadingSourceType::Course => self.course = value,
            HeadingSourceType::Device => self.device = value,
            HeadingSourceType::User => self.user = value,
        }
    }

    fn effective(&self, order: &[HeadingSourceType]) -> Option<HeadingReading> {
        order.iter().find_map(|&source| {
            self.get(source)
                .map(|value| HeadingReading { value, source })
        })
    }
}

struct HeadingState {
    slots: Slots,
    callback: Option<HeadingCallback>,
}

/// A fused heading with a fixed source priority order.
pub struct Heading {
    order: Vec<HeadingSourceType>,
    state: Mutex<HeadingState>,
    /// Serializes read-modify-compare-notify across concurrent producers
    update_gate: Mutex<()>,
    upstream: Mutex<Option<Subscription>>,
}

impl Heading {
    /// Create a heading with an explicit snapshot of all three sources.
    ///
    /// The priority order must be non-empty and must not repeat a source.
    pub fn new(
        order: Vec<HeadingSourceType>,
        course: Option<HeadingValue>,
        device: Option<HeadingValue>,
        user: Option<HeadingValue>,
    ) -> Result<Self, ConfigError> {
        validate_priority_order(&order)?;

        Ok(Heading {
            order,
            state: Mutex::new(HeadingState {
                slots: Slots {
                    course,
                    device,
                    user,
                },
                callback: None,
            }),
            update_gate: Mutex::new(()),
            upstream: Mutex::new(None),
        })
    }

    /// Start a new heading from another one's priority order and current
    /// readings. The copy has no callback and is not attached to any feed.
    pub fn copy_from(other: &Heading) -> Heading {
        let slots = lock(&other.state).slots;
        Heading {
            order: other.order.clone(),
            state: Mutex::new(HeadingState {
                slots,
                callback: None,
            }),
            update_gate: Mutex::new(()),
            upstream: Mutex::new(None),
        }
    }

    /// Source priority order, highest first
    pub fn order(&self) -> &[HeadingSourceType] {
        &self.order
    }

    /// Effective reading, or `None` when no prioritized source is present
    pub fn reading(&self) -> Option<HeadingReading> {
        lock(&self.state).slots.effective(&self.order)
    }

    /// Source that currently wins
    pub fn source(&self) -> Option<HeadingSourceType> {
        self.reading().map(|r| r.source)
    }

    /// Whether the effective heading comes from GPS course
    pub fn is_course(&self) -> bool {
        self.source() == Some(HeadingSourceType::Course)
    }

    /// Replace one source's reading and notify if the effective reading changed.
    pub fn apply_update(&self, source: HeadingSourceType, value: Option<HeadingValue>) {
        let _gate = lock(&self.update_gate);

        let (old, new, callback) = {
            let mut state = lock(&self.state);
            let old = state.slots.effective(&self.order);
            state.slots.set(source, value);
            let new = state.slots.effective(&self.order);
            (old, new, state.callback.clone())
        };

        if old == new {
            return;
        }

        log::trace!(
            "Effective heading changed: {:?} -> {:?} (update from {})",
            old,
            new,
            source
        );

        // Invoked without the state lock so the callback may read the heading
        if let Some(callback) = callback {
            callback(new.map(|r| r.value));
        }
    }

    /// Follow a feed: every update it publishes is applied to this heading.
    /// Replaces any previous attachment.
    pub fn attach(self: &Arc<Self>, feed: &HeadingFeed) {
        let weak: Weak<Heading> = Arc::downgrade(self);
        let subscription = feed.updates.subscribe(move |update: &HeadingUpdate| {
            if let Some(heading) = weak.upgrade() {
                heading.apply_update(update.source, update.value);
            }
        });
        *lock(&self.upstream) = Some(subscription);
    }

    /// Stop following the feed (idempotent)
    pub fn detach(&self) {
        if let Some(mut subscription) = lock(&self.upstream).take() {
            subscription.cancel();
        }
    }
}

impl HeadingNotifier for Heading {
    fn value(&self) -> Option<f64> {
        self.reading().map(|r| r.value.value)
    }

    fn accuracy(&self) -> Option<f64> {
        self.reading().and_then(|r| r.value.accuracy)
    }

    fn on_heading_did_update(&self, callback: Option<HeadingCallback>) {
        lock(&self.state).callback = callback;
    }

    fn release_heading_callback(&self, callback: &HeadingCallback) -> bool {
        let mut state = lock(&self.state);
        let owned = state
            .callback
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, callback));
        if owned {
            state.callback = None;
        }
        owned
    }
}

impl fmt::Debug for Heading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Heading")
            .field("order", &self.order)
            .field("reading", &self.reading())
            .finish()
    }
}

/// Fan-in point for the three heading producers.
///
/// Remembers the latest reading per source so headings created later start
/// from the current state instead of waiting for the next update.
#[derive(Debug, Default)]
pub struct HeadingFeed {
    latest: Mutex<Slots>,
    updates: Publisher<HeadingUpdate>,
}

impl HeadingFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a reading (or loss of reading) for one source
    pub fn push(&self, source: HeadingSourceType, value: Option<HeadingValue>) {
        lock(&self.latest).set(source, value);
        self.updates.publish(&HeadingUpdate { source, value });
    }

    /// Latest reading for one source
    pub fn latest(&self, source: HeadingSourceType) -> Option<HeadingValue> {
        lock(&self.latest).get(source)
    }

    /// Create a heading with the given priority order that follows this feed
    pub fn heading(&self, order: Vec<HeadingSourceType>) -> Result<Arc<Heading>, ConfigError> {
        let slots = *lock(&self.latest);
        let heading = Arc::new(Heading::new(order, slots.course, slots.device, slots.user)?);
        heading.attach(self);
        Ok(heading)
    }

    /// Copy an existing heading's configuration and readings, then follow this feed
    pub fn heading_from(&self, other: &Heading) -> Arc<Heading> {
        let heading = Arc::new(Heading::copy_from(other));
        heading.attach(self);
        heading
    }

    pub fn subscriber_count(&self) -> usize {
        self.updates.subscriber_count()
    }
}
