//! Domain entities for VLC Scrubber.
//!
//! This module contains pure business logic with no infrastructure dependencies.
//!
//! # What is "domain" in Clean Architecture? (for beginners)
//!
//! The innermost layer of the application is the **domain**.  Domain code has
//! no imports from sockets, device SDKs, or async runtimes, so it can be
//! compiled and tested anywhere.  Outer layers (application, infrastructure)
//! depend on it; it never depends on them.

/// Device identity and the events a device reports.
pub mod device;

/// Mapping from device events to playback decisions.
pub mod intent;
