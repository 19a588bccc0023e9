pub mod admin;
pub mod audit_log;
pub mod auth;
pub mod forum;
pub mod health;
pub mod jobs;
pub mod matches;
pub mod metrics;
pub mod profiles;
pub mod resources;
pub mod subscription;
