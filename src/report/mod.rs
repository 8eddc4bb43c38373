pub mod dashboard;
pub mod json;
pub mod telemetry;

pub use dashboard::ConsoleDashboard;
pub use json::JsonLinesSink;
pub use telemetry::{save_alerts_to_csv, CsvTelemetry};
