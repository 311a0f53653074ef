pub mod auth;
pub mod domain_events;
pub mod realtime;
