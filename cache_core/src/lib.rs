pub mod addr;
pub mod cache;
pub mod config;
pub mod report;
pub mod sim;
pub mod trace;

#[cfg(feature = "stat")]
pub mod stat;
