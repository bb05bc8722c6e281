//! `HearthwireServer` builder and accept loops.
//!
//! One process runs both roles: a login listener and a world listener,
//! each with its own dispatcher table, sharing one [`ServerState`].

use std::net::{IpAddr, SocketAddr, SocketAddrV4};
use std::sync::Arc;

use hearthwire_dialog::{CheckpointError, CheckpointInput, CheckpointRegistry};
use hearthwire_session::{Authenticator, RedirectRegistry};
use hearthwire_transport::{Connection, TcpTransport, Transport};

use crate::catalog::TemplateCatalog;
use crate::client::{Client, ServerRole};
use crate::config::ServerConfig;
use crate::connection::handle_connection;
use crate::dispatcher::Dispatcher;
use crate::handlers::standard_checkpoints;
use crate::registry::{BoardRegistry, ClientDirectory, PartyTable, WarpLedger};
use crate::storage::Storage;
use crate::HearthwireError;

/// Addresses written into redirect packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoints {
    pub login: SocketAddrV4,
    pub world: SocketAddrV4,
}

/// Shared server state passed to each connection task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks. Each
/// registry guards itself; there is no lock around the whole struct.
pub struct ServerState<A, S> {
    pub(crate) config: ServerConfig,
    pub(crate) auth: A,
    pub(crate) storage: S,
    pub(crate) catalog: Arc<TemplateCatalog>,
    pub(crate) redirects: Arc<RedirectRegistry>,
    pub(crate) boards: BoardRegistry,
    pub(crate) warps: WarpLedger,
    pub(crate) parties: PartyTable,
    pub(crate) directory: ClientDirectory,
    pub(crate) checkpoints: Arc<CheckpointRegistry<Client>>,
    pub(crate) endpoints: Endpoints,
}

impl<A, S> ServerState<A, S> {
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn redirects(&self) -> &RedirectRegistry {
        &self.redirects
    }

    pub fn boards(&self) -> &BoardRegistry {
        &self.boards
    }

    pub fn directory(&self) -> &ClientDirectory {
        &self.directory
    }

    pub fn endpoints(&self) -> Endpoints {
        self.endpoints
    }
}

/// Builder for configuring and starting a Hearthwire server.
///
/// # Example
///
/// ```rust,ignore
/// use hearthwire::prelude::*;
///
/// let server = HearthwireServerBuilder::new()
///     .config(ServerConfig::from_json_file("server.json")?)
///     .catalog(TemplateCatalog::from_json_file("catalog.json")?)
///     .build(my_auth, MemoryStorage::new())
///     .await?;
/// server.run().await
/// ```
pub struct HearthwireServerBuilder {
    config: ServerConfig,
    catalog: TemplateCatalog,
    redirects: Option<Arc<RedirectRegistry>>,
    checkpoints: CheckpointRegistry<Client>,
}

impl HearthwireServerBuilder {
    /// Creates a builder with default settings, an empty catalog, and
    /// the standard checkpoints.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            catalog: TemplateCatalog::default(),
            redirects: None,
            checkpoints: standard_checkpoints(),
        }
    }

    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the login listener address.
    pub fn login_addr(mut self, addr: &str) -> Self {
        self.config.login_addr = addr.to_string();
        self
    }

    /// Sets the world listener address.
    pub fn world_addr(mut self, addr: &str) -> Self {
        self.config.world_addr = addr.to_string();
        self
    }

    pub fn catalog(mut self, catalog: TemplateCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Shares a redirect registry with another server in the same
    /// process. By default each server gets its own.
    pub fn redirects(mut self, redirects: Arc<RedirectRegistry>) -> Self {
        self.redirects = Some(redirects);
        self
    }

    /// Registers an extra dialog checkpoint (or replaces a standard one).
    pub fn checkpoint<F>(mut self, name: &str, handler: F) -> Self
    where
        F: Fn(&mut Client, CheckpointInput<'_>) -> Result<bool, CheckpointError>
            + Send
            + Sync
            + 'static,
    {
        self.checkpoints.register_sync(name, handler);
        self
    }

    /// Binds both listeners and loads persisted boards.
    pub async fn build<A, S>(
        self,
        auth: A,
        storage: S,
    ) -> Result<HearthwireServer<A, S>, HearthwireError>
    where
        A: Authenticator,
        S: Storage,
    {
        let login = TcpTransport::bind(&self.config.login_addr).await?;
        let world = TcpTransport::bind(&self.config.world_addr).await?;

        let endpoints = Endpoints {
            login: advertised(&login, &self.config)?,
            world: advertised(&world, &self.config)?,
        };

        for graph in self.catalog.dialogs() {
            for name in graph.checkpoint_names().keys() {
                if !self.checkpoints.contains(name) {
                    tracing::warn!(dialog = %graph.key, checkpoint = %name, "dialog names an unregistered checkpoint");
                }
            }
        }

        let persisted = storage.load_boards().await?;
        let boards = BoardRegistry::new(self.catalog.boards(), persisted);
        let redirects = self
            .redirects
            .unwrap_or_else(|| Arc::new(RedirectRegistry::new(self.config.session.clone())));

        let state = Arc::new(ServerState {
            config: self.config,
            auth,
            storage,
            catalog: Arc::new(self.catalog),
            redirects,
            boards,
            warps: WarpLedger::new(),
            parties: PartyTable::new(),
            directory: ClientDirectory::new(),
            checkpoints: Arc::new(self.checkpoints),
            endpoints,
        });

        Ok(HearthwireServer {
            login,
            world,
            state,
        })
    }
}

impl Default for HearthwireServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The address clients are told to reconnect to for `transport`.
fn advertised(
    transport: &TcpTransport,
    config: &ServerConfig,
) -> Result<SocketAddrV4, HearthwireError> {
    let bound = transport
        .local_addr()
        .map_err(|e| HearthwireError::Config(format!("listener address: {e}")))?;

    let ip = match (config.advertise_host, bound) {
        (Some(host), _) => host,
        (None, SocketAddr::V4(v4)) => *v4.ip(),
        (None, SocketAddr::V6(v6)) => match v6.ip().to_ipv4_mapped() {
            Some(v4) => v4,
            None => {
                return Err(HearthwireError::Config(format!(
                    "{} is not IPv4; set advertise_host",
                    IpAddr::V6(*v6.ip())
                )));
            }
        },
    };
    Ok(SocketAddrV4::new(ip, bound.port()))
}

/// A running Hearthwire server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct HearthwireServer<A, S> {
    login: TcpTransport,
    world: TcpTransport,
    state: Arc<ServerState<A, S>>,
}

impl<A, S> HearthwireServer<A, S>
where
    A: Authenticator,
    S: Storage,
{
    /// Returns the address the login role is bound to.
    pub fn login_addr(&self) -> std::io::Result<SocketAddr> {
        self.login.local_addr()
    }

    /// Returns the address the world role is bound to.
    pub fn world_addr(&self) -> std::io::Result<SocketAddr> {
        self.world.local_addr()
    }

    /// Shared state, for inspection.
    pub fn state(&self) -> Arc<ServerState<A, S>> {
        Arc::clone(&self.state)
    }

    /// Runs both accept loops and the redirect sweeper.
    ///
    /// Runs until the process is terminated or a listener fails for
    /// good.
    pub async fn run(self) -> Result<(), HearthwireError> {
        tracing::info!(
            login = %self.state.endpoints.login,
            world = %self.state.endpoints.world,
            "Hearthwire server running"
        );

        let sweeper = tokio::spawn(sweep_redirects(Arc::clone(&self.state.redirects)));
        let login = tokio::spawn(accept_loop(
            self.login,
            ServerRole::Login,
            Arc::clone(&self.state),
        ));
        let world = tokio::spawn(accept_loop(
            self.world,
            ServerRole::World,
            Arc::clone(&self.state),
        ));

        let result = tokio::select! {
            r = login => r,
            r = world => r,
        };
        sweeper.abort();

        match result {
            Ok(()) => Ok(()),
            Err(e) => Err(HearthwireError::Config(format!("accept loop stopped: {e}"))),
        }
    }
}

/// Accepts connections for one role and spawns a task per connection.
async fn accept_loop<A, S>(
    mut transport: TcpTransport,
    role: ServerRole,
    state: Arc<ServerState<A, S>>,
) where
    A: Authenticator,
    S: Storage,
{
    let dispatcher = Arc::new(Dispatcher::<A, S>::for_role(role));

    loop {
        match transport.accept().await {
            Ok(conn) => {
                let state = Arc::clone(&state);
                let dispatcher = Arc::clone(&dispatcher);
                tokio::spawn(async move {
                    let conn_id = conn.id();
                    if let Err(e) = handle_connection(conn, dispatcher, state).await {
                        tracing::info!(%conn_id, %role, error = %e, "connection ended with error");
                    }
                });
            }
            Err(e) => {
                tracing::error!(%role, error = %e, "accept failed");
            }
        }
    }
}

/// Drops expired redirect tokens on a fixed interval.
async fn sweep_redirects(redirects: Arc<RedirectRegistry>) {
    let mut ticker = tokio::time::interval(redirects.config().sweep_interval());
    loop {
        ticker.tick().await;
        let expired = redirects.sweep_expired();
        if !expired.is_empty() {
            tracing::debug!(count = expired.len(), "expired redirects swept");
        }
    }
}
