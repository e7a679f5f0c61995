//! # Wayfinder Core
//!
//! Spatial-orientation core for an audio navigation app: heading fusion,
//! location update throttling, and the focus/threshold logic that drives
//! haptic and audio feedback towards a beacon.
//!
//! This crate does **no I/O** and spawns no threads. Sensors push values in
//! through small capability traits, feedback goes out through renderer
//! traits, and anything time-dependent reads an injected [`Clock`].
//!
//! ## Architecture
//!
//! ```text
//!  ┌──────────────┐  ┌───────────────┐  ┌────────────────┐
//!  │ LocationFeed │  │  HeadingFeed  │  │   MotionFeed   │
//!  │  (position)  │  │ course/device │  │  (phone flat)  │
//!  └──────┬───────┘  │     /user     │  └───────┬────────┘
//!         │          └───────┬───────┘          │
//!         ▼                  ▼                  │
//!  BeaconOrientation      Heading               │
//!    (live bearing)  (priority fusion)          │
//!         │                  │                  │
//!         └──────▶ Wand ◀────┘                  │
//!            (focus / threshold)                │
//!                   │                           │
//!                   ▼                           │
//!             BeaconDriver ◀────────────────────┘
//!                   │
//!         ┌─────────┴─────────┐
//!         ▼                   ▼
//!   HapticRenderer      AudioRenderer
//! ```
//!
//! [`LocationUpdateFilter`], [`GeneratorUpdateFilter`] and
//! [`SignificantChangeMonitoringOrigin`] sit upstream and decide how often
//! position-driven work is allowed to run.
//!
//! ## Key Modules
//!
//! - [`circular`] - Wraparound-safe angle arithmetic
//! - [`heading`] - Heading values, source priority fusion, GPS course gating
//! - [`filters`] - Time and distance gates for location updates
//! - [`significant_change`] - When low-power monitoring should resume tracking
//! - [`orientation`] - Live bearing to a fixed location
//! - [`wand`] - Angular target tracker
//! - [`beacon`] - Haptic/audio beacon driver
//! - [`config`] - Settings for all of the above
//!
//! ## Example: Heading Fusion
//!
//! ```rust
//! use wayfinder_core::{HeadingFeed, HeadingNotifier, HeadingSourceType, HeadingValue};
//!
//! let feed = HeadingFeed::new();
//! let heading = feed
//!     .heading(vec![HeadingSourceType::Course, HeadingSourceType::Device])
//!     .unwrap();
//!
//! feed.push(HeadingSourceType::Device, Some(HeadingValue::new(270.0, Some(10.0))));
//! assert_eq!(heading.value(), Some(270.0));
//!
//! feed.push(HeadingSourceType::Course, Some(HeadingValue::new(265.0, None)));
//! assert!(heading.is_course());
//! ```
//!
//! ## Example: Circular Arithmetic
//!
//! ```rust
//! use wayfinder_core::CircularQuantity;
//!
//! let a = CircularQuantity::from_degrees(350.0);
//! let b = CircularQuantity::from_degrees(20.0);
//! assert_eq!((a + b).degrees(), 10.0);
//! assert_eq!(a.distance_to(b), 30.0);
//! ```

pub mod beacon;
pub mod circular;
pub mod clock;
pub mod config;
pub mod error;
pub mod filters;
pub mod geo;
pub mod heading;
pub mod orientation;
pub mod sensors;
pub mod signal;
pub mod significant_change;
pub mod wand;

// Re-export commonly used types
pub use beacon::{
    volume_for_offset, AudioHandle, AudioRenderer, BeaconDriver, BeaconRenderers, BeaconSensors,
    FeedbackStyle, HapticRenderer, VolumeSelector,
};
pub use circular::CircularQuantity;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::OrientationConfig;
pub use error::ConfigError;
pub use filters::{GeneratorUpdateFilter, LocationUpdateFilter};
pub use geo::{GeoPoint, Region, RegionLookup, StaticRegions};
pub use heading::{
    CourseFilter, Heading, HeadingFeed, HeadingNotifier, HeadingReading, HeadingSourceType,
    HeadingUpdate, HeadingValue,
};
pub use orientation::{BeaconOrientation, FixedBearing, Orientable};
pub use sensors::{DeviceMotionProvider, LocationFeed, LocationProvider, MotionFeed};
pub use signal::{Publisher, Subscription};
pub use significant_change::{MonitoringAnchor, SignificantChangeMonitoringOrigin};
pub use wand::{Wand, WandEvent, WandState, WandTarget};
