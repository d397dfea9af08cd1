pub mod auth;
pub mod config;
pub mod dates;
pub mod error;
pub mod models;
pub mod ordering;
pub mod routes;
pub mod services;
pub mod validation;
