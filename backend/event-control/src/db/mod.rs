//! Repositories over the document-store port, one per entity.

pub mod admin_repo;
pub mod event_repo;
pub mod payment_repo;
pub mod session_repo;
pub mod tables;
pub mod viewer_repo;

pub use admin_repo::AdminRepo;
pub use event_repo::EventRepo;
pub use payment_repo::PaymentRepo;
pub use session_repo::SessionRepo;
pub use viewer_repo::ViewerRepo;
