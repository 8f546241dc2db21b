//! # slot-engine
//!
//! Availability resolution for booking pages.
//!
//! Given a host, an event type and a time range, the engine combines weekly
//! availability rules, date-specific overrides, existing bookings, buffers,
//! minimum notice and the booking window into an ordered list of bookable,
//! non-overlapping windows. It is a read-side aggregator: it owns no records
//! and recomputes results per query.
//!
//! ## Modules
//!
//! - [`rules`]: effective day windows from rules and overrides
//! - [`conflict`]: blocking intervals from scheduled bookings
//! - [`generator`]: candidate windows at the event type's duration
//! - [`filter`]: notice, booking window, buffer and conflict constraints
//! - [`resolver`]: validation, orchestration and the public entry point
//! - [`store`]: the read contract and an in-memory store
//! - [`expander`]: RRULE expansion of fixed sessions
//! - [`dst`]: DST transition policies
//! - [`cache`]: scoped cache of pre-filter results
//! - [`config`]: resolver configuration
//! - [`error`]: Error types

pub mod cache;
pub mod config;
pub mod conflict;
pub mod dst;
pub mod error;
pub mod expander;
pub mod filter;
pub mod generator;
pub mod interval;
pub mod model;
pub mod resolver;
pub mod rules;
pub mod store;

pub use cache::AvailabilityCache;
pub use config::ResolverConfig;
pub use conflict::{get_blocking_intervals, BlockingInterval, ConflictIndex};
pub use dst::DstPolicy;
pub use error::{BookingError, SlotError, StoreError};
pub use filter::{filter_bookable, BookableWindow};
pub use generator::{generate_candidates, Candidate};
pub use model::{
    AvailabilityOverride, AvailabilityRule, Booking, BookingStatus, EventType, Host, Invitee,
    Price, SchedulingMode, TimeRange, TimeSlot,
};
pub use resolver::{resolve_availability, Availability, AvailabilityRequest, Resolver};
pub use rules::{get_effective_day_windows, DayWindow, RuleBook};
pub use store::{AvailabilityStore, InMemoryStore, NewBooking, StoreSnapshot};
