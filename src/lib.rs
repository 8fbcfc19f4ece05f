// cfstats library crate
// Exposes modules for integration testing

pub mod alerts;
pub mod charts;
pub mod cli;
pub mod clients;
pub mod commands;
pub mod config;
pub mod models;
pub mod output;
pub mod storage;
pub mod tracker;
pub mod utils;
