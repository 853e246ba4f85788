//! Distributed Message Service v2

pub mod availablezones;
pub mod instances;
pub mod products;
