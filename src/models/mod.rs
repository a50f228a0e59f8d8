// src/models/mod.rs

pub mod guest;
pub mod quiz;
pub mod user;
