pub mod analyze;
pub mod guide;
pub mod shots;
