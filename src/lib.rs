pub mod activity;
pub mod configuration;
pub mod demo;
pub mod error_handling;
pub mod handler;
pub mod message;
pub mod platform;
pub mod routing;
pub mod session_management;
