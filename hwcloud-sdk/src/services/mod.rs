pub mod apig;
pub mod dds;
pub mod dms;
pub mod ecs;
pub mod ims;
pub mod tags;
