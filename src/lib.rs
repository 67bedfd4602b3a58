//! tablestore - relational tables inside named databases, served as REST
//! resources in JSON or CSV

pub mod cli;
pub mod config;
pub mod http_server;
pub mod logging;
pub mod rest_api;
pub mod store;
