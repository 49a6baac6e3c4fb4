//! User-facing failure categories.
//!
//! Plumbing errors (HTTP, file IO) travel as `anyhow::Error`; the variants
//! here are the ones a frontend shows to the player. Callers recover them
//! with `err.downcast_ref::<GameError>()`.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    /// No credential in the session store.
    #[error("No wallet found. Please connect your wallet first")]
    MissingWallet,
    /// A result set came back without any emitted message.
    #[error("process returned no messages")]
    NoMessages,
    /// A reply was missing fields or could not be decoded.
    #[error("invalid response from process: {0}")]
    InvalidResponse(String),
    /// The process refused the request.
    #[error("{0}")]
    Rejected(String),
    #[error("Please enter a username")]
    EmptyUsername,
    /// Room actions need a registered username first.
    #[error("register a username before entering a room")]
    UsernameRequired,
    /// The submitted message never produced a result in time.
    #[error("timed out waiting for message {0} to be processed")]
    ConfirmTimeout(String),
}
