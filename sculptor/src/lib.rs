pub mod controls;
pub mod curve;
pub mod deform;
pub mod feature;
pub mod generate_head;
pub mod landmarks;
pub mod library;
pub mod manage_library;
pub mod mesh;
pub mod obj;
pub mod orientation;
pub mod pipeline;
pub mod raster;
pub mod region;
pub mod relationship;
pub mod scan;
pub mod scan_images;
pub mod trace;

pub use base;
