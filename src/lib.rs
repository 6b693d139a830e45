// src/lib.rs
pub mod aggregate;
pub mod api;
pub mod catalog;
pub mod chart;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod models;
pub mod pages;
pub mod provider;
