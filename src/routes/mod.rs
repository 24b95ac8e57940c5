pub mod admin;
pub mod api;
pub mod auth;
pub mod ong;
pub mod public;
