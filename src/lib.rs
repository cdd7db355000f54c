//! confann: relays conference "caller joined" webhooks into an IRC channel.
//!
//! The binary keeps one IRC session and one HTTP listener alive side by
//! side. The [`bridge`] module coordinates them; everything else is a
//! building block it wires together.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod auth;
pub mod config;
pub mod credentials;
pub mod logging;

pub mod irc;
pub mod webhook;

pub mod bridge;
