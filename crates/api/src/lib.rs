//! Shopfront API library.
//!
//! This crate provides the REST backend as a library, so the router can be
//! driven in tests against the in-memory store and reused by the CLI.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
