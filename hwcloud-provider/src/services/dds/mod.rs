//! Document Database Service

mod instances;

pub use instances::DdsInstances;
