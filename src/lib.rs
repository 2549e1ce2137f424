//! Core library for music-library-platform-sync
pub mod config;
pub mod models;
pub mod error;
pub mod pager;
pub mod reconcile;
pub mod governor;
pub mod api;
pub mod store;
pub mod db;
pub mod service;
