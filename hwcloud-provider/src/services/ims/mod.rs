//! Image Management Service

mod image;

pub use image::ImagesImage;
