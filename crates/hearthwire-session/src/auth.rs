//! Authentication hook for the login role.
//!
//! Hearthwire doesn't store accounts itself. The host supplies an
//! [`Authenticator`]: a single async method that takes the username and
//! password from the login packet and returns the player's [`Serial`]
//! or an error. The login handler calls it before minting a redirect.
//!
//! A trait keeps the account store swappable: a database in production,
//! a fixed table in the demo, a mock in tests.

use std::future::Future;

use crate::{Serial, SessionError};

/// Validates login credentials and returns the player's serial.
///
/// # Trait bounds
///
/// - `Send + Sync` → one authenticator is shared by every connection
///   task.
/// - `'static` → it lives as long as the server.
/// - The returned future is `Send` so handlers can await it inside a
///   spawned connection task.
///
/// # Example
///
/// ```rust
/// use std::future::Future;
/// use hearthwire_session::{Authenticator, Serial, SessionError};
///
/// /// Accepts any user whose password equals their name.
/// struct MirrorAuthenticator;
///
/// impl Authenticator for MirrorAuthenticator {
///     fn authenticate(
///         &self,
///         username: &str,
///         password: &str,
///     ) -> impl Future<Output = Result<Serial, SessionError>> + Send {
///         let ok = username == password;
///         async move {
///             if ok {
///                 Ok(Serial::random())
///             } else {
///                 Err(SessionError::AuthFailed("wrong password".into()))
///             }
///         }
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// Checks `username` and `password`.
    ///
    /// # Returns
    /// - `Ok(Serial)`: the credentials are good
    /// - `Err(SessionError::AuthFailed)`: they aren't
    fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> impl Future<Output = Result<Serial, SessionError>> + Send;
}
