pub mod handlers;
pub mod manager;
pub mod search;

pub use manager::ListingManager;
