//! Agrimarket - session management for the agricultural marketplace client
//!
//! Owns the signed-in user, decides what each route may render, and ships a
//! development implementation of the marketplace auth API.

pub mod app;
pub mod core;
