pub mod config;
pub mod jwt;
pub mod relay_msg;
pub mod response;
