//! Synthetic download files for browser-based speed testing.
//!
//! Files are never stored: each request pulls bytes from a fresh
//! [`stream::generate`] sequence, one window at a time.

pub mod catalog;
pub mod delivery;
pub mod stream;
