//! sitesearch - a site crawler with a lemma-based inverted index
//!
//! This crate provides:
//! - A concurrent, cancellable crawler that stores every page of a site
//! - Lemmatization of page text into a per-site inverted index
//! - Multi-lemma relevance search with snippets across indexed sites

pub mod commands;
pub mod config;
pub mod crawl;
pub mod error;
pub mod index;
pub mod lemma;
pub mod manager;
pub mod parse;
pub mod search;
pub mod store;

pub use config::Config;
pub use error::{Error, Result};
