//! Named checkpoints: the only way a dialog reaches into game state.
//!
//! A checkpoint is an async predicate registered under a name. An
//! answer that names it is only followed if the predicate returns
//! `true`. There is no dynamic evaluation: if a graph names a
//! checkpoint nobody registered, the answer simply fails.

use std::collections::HashMap;
use std::fmt;

use futures_util::future::BoxFuture;

use crate::{CheckpointCall, CheckpointError};

/// What a checkpoint handler gets besides the host context.
#[derive(Debug, Clone, Copy)]
pub struct CheckpointInput<'a> {
    /// The `value` authored next to the checkpoint name.
    pub value: &'a str,
    /// Free text the client typed, if the step asked for any.
    pub input: Option<&'a str>,
}

type Handler<C> = Box<
    dyn for<'a> Fn(
            &'a mut C,
            CheckpointInput<'a>,
        ) -> BoxFuture<'a, Result<bool, CheckpointError>>
        + Send
        + Sync,
>;

/// Name → handler table, built by the host and shared by every
/// session.
///
/// `C` is the host's context type (the server passes its per-connection
/// client state), so handlers can read and change it.
pub struct CheckpointRegistry<C> {
    handlers: HashMap<String, Handler<C>>,
}

impl<C> CheckpointRegistry<C> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registers an async handler. A later registration under the same
    /// name replaces the earlier one.
    ///
    /// ```rust
    /// use hearthwire_dialog::{CheckpointError, CheckpointRegistry};
    ///
    /// struct Purse { gold: u32 }
    ///
    /// let mut registry = CheckpointRegistry::<Purse>::new();
    /// registry.register("Pay", |purse, args| {
    ///     Box::pin(async move {
    ///         let Ok(cost) = args.value.parse::<u32>() else {
    ///             return Err(CheckpointError::Failed {
    ///                 name: "Pay".into(),
    ///                 reason: format!("bad cost {:?}", args.value),
    ///             });
    ///         };
    ///         if purse.gold < cost {
    ///             return Ok(false);
    ///         }
    ///         purse.gold -= cost;
    ///         Ok(true)
    ///     })
    /// });
    /// assert!(registry.contains("Pay"));
    /// ```
    pub fn register<F>(&mut self, name: impl Into<String>, handler: F)
    where
        F: for<'a> Fn(
                &'a mut C,
                CheckpointInput<'a>,
            ) -> BoxFuture<'a, Result<bool, CheckpointError>>
            + Send
            + Sync
            + 'static,
    {
        self.handlers.insert(name.into(), Box::new(handler));
    }

    /// Registers a handler that never needs to suspend.
    pub fn register_sync<F>(&mut self, name: impl Into<String>, handler: F)
    where
        F: Fn(&mut C, CheckpointInput<'_>) -> Result<bool, CheckpointError>
            + Send
            + Sync
            + 'static,
        C: Send,
    {
        self.register(name, move |ctx, args| {
            let result = handler(ctx, args);
            Box::pin(async move { result })
        });
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Runs the checkpoint named by `call`.
    ///
    /// Failures never escape: an unregistered name or a handler error is
    /// logged and reported as `false`.
    pub async fn evaluate(
        &self,
        call: &CheckpointCall,
        ctx: &mut C,
        input: Option<&str>,
    ) -> bool {
        let Some(handler) = self.handlers.get(&call.name) else {
            tracing::warn!(
                checkpoint = %call.name,
                error = %CheckpointError::Unregistered(call.name.clone()),
                "checkpoint failed"
            );
            return false;
        };

        let args = CheckpointInput {
            value: &call.value,
            input,
        };
        match handler(ctx, args).await {
            Ok(passed) => passed,
            Err(e) => {
                tracing::warn!(checkpoint = %call.name, error = %e, "checkpoint failed");
                false
            }
        }
    }
}

impl<C> Default for CheckpointRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> fmt::Debug for CheckpointRegistry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("CheckpointRegistry")
            .field("handlers", &names)
            .finish()
    }
}
