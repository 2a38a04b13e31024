//! Background jobs.

mod expiry;

pub use expiry::ExpiryScanner;
