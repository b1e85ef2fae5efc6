pub mod face;
pub mod photo;
