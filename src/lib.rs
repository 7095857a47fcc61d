//! Library crate for live-quiz-back, exposing modules for the binary and tests.

pub mod config;
pub mod dao;
pub mod dto;
pub mod error;
pub mod routes;
pub mod services;
pub mod state;
