//! Application layer: the resolution pipeline

pub mod smart_charging;
