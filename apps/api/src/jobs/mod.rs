pub mod catalog;
pub mod filters;
pub mod handlers;
pub mod recommend;
