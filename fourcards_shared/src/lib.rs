//! `fourcards_shared`
//!
//! Shared libraries used by the client and the test harness.
//!
//! Design goals:
//! - Nothing here is authoritative; the game process owns every rule.
//! - Pure data and codecs only. Network IO lives in `fourcards_client`.
//! - No `unsafe`.

pub mod config;
pub mod dataitem;
pub mod error;
pub mod invite;
pub mod lenient;
pub mod net;
pub mod reply;
pub mod room;
pub mod session;
pub mod wallet;
