pub mod admin;
pub mod event;
pub mod payment;
pub mod session;
pub mod viewer;

pub use admin::Admin;
pub use event::{
    migrate_event_document, AccessMode, BitrateProfile, Event, EventStatus, EventType,
    RegistrationField, Resolution, VideoConfig, VodStatus,
};
pub use payment::{Payment, PaymentStatus};
pub use session::{PlaybackSession, PlaybackType};
pub use viewer::{migrate_viewer_document, Viewer, ViewerPaymentStatus};
