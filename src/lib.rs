pub mod config;
pub mod extractors;
pub mod logging;
pub mod middleware;
pub mod monitor;
pub mod response;
pub mod routes;
pub mod state;
pub mod validation;
