//! Local image storage

pub mod images;
pub mod layers;
pub mod paths;
