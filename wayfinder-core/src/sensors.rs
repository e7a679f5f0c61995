//! Sensor capabilities consumed by the orientation core.
//!
//! Each component receives only the capability it needs (for example "current
//! location plus change notifications") instead of reaching for a process-wide
//! sensor manager. The `*Feed` types are the in-process implementations used by
//! the application glue, the replay tool and the tests.

use std::sync::{Arc, Mutex};

use crate::geo::GeoPoint;
use crate::signal::{lock, Publisher, Subscription};

/// Source of the user's position
pub trait LocationProvider: Send + Sync {
    /// Latest known position, if any
    fn current_location(&self) -> Option<GeoPoint>;

    /// Be told about every position change (`None` when the fix is lost)
    fn on_location_change(
        &self,
        callback: Arc<dyn Fn(&Option<GeoPoint>) + Send + Sync>,
    ) -> Subscription;
}

/// Source of the "phone is held flat" signal
pub trait DeviceMotionProvider: Send + Sync {
    fn is_flat(&self) -> bool;

    /// Be told when the flatness state changes
    fn on_flat_change(&self, callback: Arc<dyn Fn(&bool) + Send + Sync>) -> Subscription;
}

/// Location provider fed by pushing positions into it
#[derive(Debug, Default)]
pub struct LocationFeed {
    current: Mutex<Option<GeoPoint>>,
    changes: Publisher<Option<GeoPoint>>,
}

impl LocationFeed {
    pub fn new(initial: Option<GeoPoint>) -> Self {
        LocationFeed {
            current: Mutex::new(initial),
            changes: Publisher::new(),
        }
    }

    /// Record a new position (or loss of fix) and notify subscribers
    pub fn push(&self, location: Option<GeoPoint>) {
        *lock(&self.current) = location;
        self.changes.publish(&location);
    }

    pub fn subscriber_count(&self) -> usize {
        self.changes.subscriber_count()
    }
}

impl LocationProvider for LocationFeed {
    fn current_location(&self) -> Option<GeoPoint> {
        *lock(&self.current)
    }

    fn on_location_change(
        &self,
        callback: Arc<dyn Fn(&Option<GeoPoint>) + Send + Sync>,
    ) -> Subscription {
        self.changes.subscribe_arc(callback)
    }
}

/// Device motion provider fed by pushing flatness changes into it
#[derive(Debug, Default)]
pub struct MotionFeed {
    flat: Mutex<bool>,
    changes: Publisher<bool>,
}

impl MotionFeed {
    pub fn new(is_flat: bool) -> Self {
        MotionFeed {
            flat: Mutex::new(is_flat),
            changes: Publisher::new(),
        }
    }

    /// Update the flatness state. Subscribers are only told about real changes.
    pub fn set_flat(&self, is_flat: bool) {
        {
            let mut flat = lock(&self.flat);
            if *flat == is_flat {
                return;
            }
            *flat = is_flat;
        }
        self.changes.publish(&is_flat);
    }

    pub fn subscriber_count(&self) -> usize {
        self.changes.subscriber_count()
    }
}

impl DeviceMotionProvider for MotionFeed {
    fn is_flat(&self) -> bool {
        *lock(&self.flat)
    }

    fn on_flat_change(&self, callback: Arc<dyn Fn(&bool) + Send + Sync>) -> Subscription {
        self.changes.subscribe_arc(callback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_location_feed() {
        let feed = LocationFeed::new(None);
        assert_eq!(feed.current_location(), None);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_cb = seen.clone();
        let _sub = feed.on_location_change(Arc::new(move |loc: &Option<GeoPoint>| {
            seen_cb.lock().unwrap().push(*loc);
        }));

        let p = GeoPoint::new(1.0, 2.0);
        feed.push(Some(p));
        feed.push(None);

        assert_eq!(feed.current_location(), None);
        assert_eq!(*seen.lock().unwrap(), vec![Some(p), None]);
    }

    #[test]
    fn test_motion_feed_only_reports_changes() {
        let feed = MotionFeed::new(false);
        let count = Arc::new(AtomicUsize::new(0));
        let count_cb = count.clone();
        let _sub = feed.on_flat_change(Arc::new(move |_: &bool| {
            count_cb.fetch_add(1, Ordering::SeqCst);
        }));

        feed.set_flat(false);
        feed.set_flat(true);
        feed.set_flat(true);
        feed.set_flat(false);

        assert!(!feed.is_flat());
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
