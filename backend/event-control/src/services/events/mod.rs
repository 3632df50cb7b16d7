//! Event lifecycle controller: create/update/list, media provisioning and
//! the multi-stage asynchronous teardown.

pub mod lifecycle;
pub mod provision;
pub mod teardown;

pub use lifecycle::{CreateEventInput, EventService, ListEventsQuery, UpdateEventInput};
pub use teardown::TeardownConfig;
