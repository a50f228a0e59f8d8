// src/handlers/mod.rs

pub mod attempts;
pub mod catalog;
pub mod login;
pub mod questions;
pub mod submit;
pub mod upload;
