pub mod image;
pub mod listing;
pub mod message;
pub mod query;
