//! Fetches Børsen RSS feeds, scrapes and translates the articles, and keeps
//! them in a local SQLite store.

pub mod ai;
pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod feed;
pub mod models;
pub mod scheduler;
pub mod services;

#[cfg(test)]
mod test_support;
