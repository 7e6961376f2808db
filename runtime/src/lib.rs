//! Caplift runtime: rewrites plaintext capability negotiation so a streaming
//! player sees a higher-capability environment.
//!
//! The [`capability`] classifier and patcher decide what to rewrite, the
//! [`intercept`] layer grafts them onto host primitives, [`player`] wraps the
//! late-bound player object, and [`navigation`] keeps everything installed
//! across in-place route changes. [`engine::CapabilityEngine`] owns the
//! mutable state.

pub mod capability;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod host;
pub mod intercept;
pub mod navigation;
pub mod player;
pub mod status;
