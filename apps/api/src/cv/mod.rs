pub mod handlers;
pub mod manager;
pub mod rules;

pub use manager::CvManager;
