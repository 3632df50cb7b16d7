pub mod clock;
pub mod currency;
pub mod ids;
pub mod money;

pub use clock::{Clock, FixedClock, SystemClock};
pub use ids::new_id;
