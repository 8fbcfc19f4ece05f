// Models module
pub mod resource;

pub use resource::{CurrentSnapshots, PerKind, Resource, ResourceKind, Snapshot, TimeWindow};
