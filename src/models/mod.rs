// src/models/mod.rs

pub mod project;
pub mod session;
pub mod user;
