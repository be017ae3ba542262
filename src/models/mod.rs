pub mod bed;
pub mod hotel;
pub mod stay;
pub mod user;

pub use bed::{Bed, BedStatus, BedWithStay};
pub use hotel::Hotel;
pub use stay::{GuestDetails, Stay};
pub use user::{Role, User};
