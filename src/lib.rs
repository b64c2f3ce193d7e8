//! Data-access daemon for the outreach dashboard: JSON endpoints over a SQLite
//! store, plus the client adapter UI code uses to talk to them.

pub mod activity;
pub mod client;
pub mod config;
pub mod db;
pub mod http;
pub mod naming;
