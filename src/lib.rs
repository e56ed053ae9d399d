//! larder - recipe crawler and indexer.
//!
//! Crawls recipe sites, extracts structured recipes from each page
//! (embedded JSON-LD, per-site selector profiles, then narrative-text
//! heuristics), and stores them in a search index with URL and fuzzy-title
//! dedup.

pub mod cli;
pub mod config;
pub mod crawler;
pub mod models;
pub mod repository;
pub mod scrapers;
pub mod storage;
