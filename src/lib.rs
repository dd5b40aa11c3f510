pub mod app;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod images;
pub mod middleware;
pub mod response;
pub mod state;
pub mod storage;
pub mod test_helpers;
pub mod users;
