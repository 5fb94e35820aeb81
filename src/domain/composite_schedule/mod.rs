//! Composite schedule output model

pub mod model;

pub use model::{CompositePeriod, CompositeSchedule};
