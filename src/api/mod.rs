//! HTTP 层

pub mod middleware;
pub mod services;
