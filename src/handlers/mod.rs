pub mod auth;
pub mod health;
pub mod hotels;
pub mod ledger;
pub mod stays;
