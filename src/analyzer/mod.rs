pub mod delta;
pub mod fields;
pub mod trend;

pub use delta::analyze;
pub use fields::{tracked_field, FieldGroup, TrackedField, ValueFormat, TRACKED_FIELDS};
