//! `fourcards_client`
//!
//! Client-side systems:
//! - Process RPC (signed messages, result read-back, dry-runs)
//! - Typed calls against the game process
//! - Landing and room flows over an owned session store
//! - Room synchronization loop

pub mod client;
pub mod process;
pub mod rpc;
pub mod sync;

pub use client::GameClient;
