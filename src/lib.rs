//! Still Point: an attention-training tracker.
//!
//! Each day's focus session is a little longer than the last. While it runs
//! the user marks every moment a thought pulls them away; the server keeps
//! the attempts and derives streaks, averages and a public board from them.

pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod db;
pub mod focus;
pub mod history;
pub mod models;
pub mod practice;
pub mod stats;
