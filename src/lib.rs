//! Wallet session server library
//!
//! Sign-In-With-Ethereum login and stateless cookie sessions for an axum API.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod state;
