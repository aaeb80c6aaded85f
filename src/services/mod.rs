pub mod catalog;
pub mod filters;
pub mod projection;
