//! Session gateway: forwards browser API traffic to the upstream backend and
//! translates its cookies to the gateway origin.

pub mod config;
pub mod cookie;
pub mod routes;
pub mod state;
