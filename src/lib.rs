//! JustBlog library.
//!
//! A multi-user blogging platform: profiles, blogs, posts with image
//! attachments and a publish/archive lifecycle, served as HTML pages and as a
//! JSON API over the same SQLite database.

// Allow raw string hashes for safety - they're harmless and prevent issues if content changes
#![allow(clippy::needless_raw_string_hashes)]

pub mod auth;
pub mod components;
pub mod config;
pub mod db;
pub mod import;
pub mod media;
pub mod permissions;
pub mod web;
