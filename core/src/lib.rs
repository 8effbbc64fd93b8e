pub mod auth;
pub mod db;
pub mod error;
pub mod models;
pub mod openfoodfacts;
pub mod rate_limit;
pub mod seed;
pub mod service;
pub mod users;
