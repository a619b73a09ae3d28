//! SDM UI Core Library
//!
//! This crate provides the core functionality for sdm-ui, a companion to the
//! strongDM `sdm` CLI that caches the resources an account can reach and
//! connects to them from a menu or fuzzy finder.
//!
//! # Key Features
//!
//! - **Error Classification**: Map `sdm` output to semantic error kinds
//! - **Re-authentication**: Log in again and retry once when a session expires
//! - **Resource Cache**: Account-scoped, versioned on-disk cache with last-use tracking
//! - **Credentials**: OS keyring storage with an interactive prompt fallback
//! - **Configuration Management**: YAML configuration merged with command-line flags
//!
//! # Examples
//!
//! Listing the cached data sources of an account:
//!
//! ```no_run
//! use sdm_ui_core::storage::Storage;
//! use sdm_ui_core::config::get_db_directory;
//!
//! let storage = Storage::open("me@example.com", &get_db_directory(&None))?;
//! for data_source in storage.retrieve_data_sources() {
//!     println!("{}", data_source);
//! }
//! # Ok::<(), sdm_ui_core::error::Error>(())
//! ```

pub mod app;
pub mod classifier;
pub mod config;
pub mod credentials;
pub mod dependencies;
pub mod desktop;
pub mod error;
pub mod execution;
pub mod listing;
pub mod model;
pub mod recovery;
pub mod sdm;
pub mod storage;

#[cfg(test)]
mod fakes;
