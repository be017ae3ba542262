pub mod credentials;
pub mod occupancy;
