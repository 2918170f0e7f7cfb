pub mod auth;
pub mod clinic;
pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod model;
pub mod provisioning;
pub mod scheduling;
