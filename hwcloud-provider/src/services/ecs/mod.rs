//! Elastic Cloud Server

mod availability_zones;

pub use availability_zones::AvailabilityZones;
