pub mod events;
pub mod random;
pub mod runner;
pub mod simulator;
pub mod snapshot;

pub use random::{ChaChaSource, RandomSource, ScriptedSource};
pub use simulator::{ControlHandle, RunOutcome, Simulator};
pub use snapshot::{NullSink, Phase, Snapshot, SnapshotSink};
