pub mod cloudinary;
pub mod error;
pub mod graph;
