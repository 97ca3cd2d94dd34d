// src/handlers/mod.rs

pub mod auth;
pub mod profile;
pub mod project;
