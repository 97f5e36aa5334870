pub mod handlers;
pub mod manager;
pub mod status;

pub use manager::ApplicationManager;
