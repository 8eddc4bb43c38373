pub mod catalog;
pub mod truck;
pub mod types;

pub use catalog::Catalog;
pub use truck::TruckState;
pub use types::*;
