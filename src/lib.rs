//! # weibo-launch
//!
//! A local web form that configures and runs exactly one Weibo keyword
//! search crawl, then hands the produced CSV to the operator.
//!
//! The operator starts the binary, fills in the form that opens in their
//! browser and submits it. The form is compiled into a [`CrawlDirective`]
//! (keywords, dates, filters), the external crawl engine runs to completion
//! while the browser waits, the output file is located and opened, and the
//! process exits.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌──────────┐   ┌──────────────┐
//! │ browser  │──▶│  server  │──▶│ compiler │──▶│   regions    │
//! │  form    │   │ (axum)   │   │          │   │ FilterLookup │
//! └──────────┘   └────┬─────┘   └──────────┘   └──────────────┘
//!                     │ spawn_blocking
//!                     ▼
//!               ┌──────────┐   ┌──────────────┐   ┌──────────┐
//!               │ session  │──▶│    engine    │──▶│ artifact │
//!               │single-fl.│   │ CrawlEngine  │   │ discover │
//!               └──────────┘   └──────────────┘   └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`keywords`] | Keyword line parsing and hashtag encoding |
//! | [`compiler`] | Form → crawl directive |
//! | [`regions`] | Filter and region lookup |
//! | [`engine`] | Crawl engine boundary |
//! | [`artifact`] | Output discovery |
//! | [`session`] | Single-flight job controller |
//! | [`server`] | Single-use HTTP server |
//! | [`error`] | Typed errors |
//!
//! [`CrawlDirective`]: models::CrawlDirective

pub mod artifact;
pub mod compiler;
pub mod config;
pub mod engine;
pub mod error;
pub mod keywords;
pub mod models;
pub mod regions;
pub mod server;
pub mod session;
