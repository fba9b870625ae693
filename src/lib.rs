//! # Portfolio API
//!
//! A small REST backend serving the content of a personal portfolio site:
//! projects, thoughts (blog posts) and skills, plus an image upload relay
//! to an external image host.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌───────────────┐
//! │  HTTP    │──▶│ Query router │──▶│ DocumentStore │──▶ SQLite (JSON docs)
//! │ (axum)   │   │  + filters   │   └───────────────┘
//! └──────────┘   │              │   ┌───────────────┐
//!                │              │──▶│  ImageHost    │──▶ Cloudinary
//!                └──────────────┘   └───────────────┘
//!                        ▲
//!                  seed (startup, optional)
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! portfolio-api init                  # create database
//! portfolio-api seed                  # load bundled datasets
//! RESET_DB=true portfolio-api serve   # reseed, then serve on :8080
//! curl 'localhost:8080/projects?isFeatured=true'
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment overrides |
//! | [`models`] | Record types and their field schemas |
//! | [`filter`] | Query-string equality filters |
//! | [`store`] | Document store handle |
//! | [`seed`] | Bundled datasets and reseeding |
//! | [`upload`] | Image host seam and Cloudinary client |
//! | [`server`] | HTTP routes |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation |

pub mod config;
pub mod db;
pub mod filter;
pub mod migrate;
pub mod models;
pub mod seed;
pub mod server;
pub mod store;
pub mod upload;
