pub mod catalog;
pub mod core_api;
pub mod image;
pub mod patch;
pub mod resolution;
