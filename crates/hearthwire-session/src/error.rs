//! Error types for the session layer.

/// Errors that can occur while authenticating a player or redeeming a
/// redirect.
///
/// Every redirect failure means the same thing to the caller (drop the
/// connection), but the variants say why, which matters in the logs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The [`Authenticator`](crate::Authenticator) rejected the
    /// credentials.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// No redirect is pending for this username. Either it was never
    /// issued, it was already redeemed, or it was swept.
    #[error("no pending redirect for {0}")]
    NoPendingRedirect(String),

    /// A redirect is pending for this username but the presented
    /// serial, salt or seed differ from what was issued.
    #[error("redirect credentials do not match for {0}")]
    CredentialMismatch(String),

    /// The redirect was issued too long ago to be redeemed.
    #[error("redirect for {0} has expired")]
    TokenExpired(String),
}
