//! Lead Broker API Library
//!
//! This library provides the core functionality for the insurance lead
//! broker: webhook intake and normalization, durable lead storage, and the
//! asynchronous ping/post workflow against the Ringba bidding partner.
//!
//! # Modules
//!
//! - `auth`: Shared-secret bearer authentication middleware.
//! - `broker`: Bid brokering workflow (ping fan-out, postback recording).
//! - `config`: Configuration management.
//! - `db`: Database connection, pool management, and migrations.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP request handlers.
//! - `intake`: Inbound payload normalization.
//! - `lead_store`: Database storage operations for leads.
//! - `lifecycle`: Lead lifecycle state machine.
//! - `models`: Core data models.
//! - `ringba`: Bid partner HTTP client.

pub mod auth;
pub mod broker;
pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod intake;
pub mod lead_store;
pub mod lifecycle;
pub mod models;
pub mod ringba;
