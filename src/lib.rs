pub mod config;
pub mod domain;
pub mod error;
pub mod report;
pub mod simulation;
pub mod utils;

pub use error::{Result, TruckSimError};
