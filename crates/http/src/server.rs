//! TCP listener that runs one task per accepted connection.

use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::config::HttpConfig;
use crate::connection::HttpConnection;
use crate::handler::Handler;

#[derive(Debug)]
pub struct ServerBuilder {
    address: Option<Result<Vec<SocketAddr>, io::Error>>,
    config: HttpConfig,
}

impl ServerBuilder {
    fn new() -> Self {
        Self { address: None, config: HttpConfig::default() }
    }

    /// Address to listen on, resolved when the server is built.
    pub fn address<A: ToSocketAddrs>(mut self, address: A) -> Self {
        self.address = Some(address.to_socket_addrs().map(|addrs| addrs.collect()));
        self
    }

    pub fn config(mut self, config: HttpConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<Server, ServerBuildError> {
        let address = self.address.ok_or(ServerBuildError::MissingAddress)?.map_err(ServerBuildError::InvalidAddress)?;
        if address.is_empty() {
            return Err(ServerBuildError::MissingAddress);
        }
        Ok(Server { address, config: self.config })
    }
}

#[derive(Error, Debug)]
pub enum ServerBuildError {
    #[error("address must be set")]
    MissingAddress,
    #[error("invalid address: {0}")]
    InvalidAddress(#[source] io::Error),
}

/// Accepts TCP connections and serves each on its own task with a shared handler.
#[derive(Debug)]
pub struct Server {
    address: Vec<SocketAddr>,
    config: HttpConfig,
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Binds the listener and serves connections until accepting is no longer possible.
    ///
    /// Only a failing bind is returned; accept failures are logged and the loop goes on.
    pub async fn serve<H>(self, handler: H) -> io::Result<()>
    where
        H: Handler + Sync + 'static,
    {
        let tcp_listener = match TcpListener::bind(self.address.as_slice()).await {
            Ok(tcp_listener) => tcp_listener,
            Err(e) => {
                error!(cause = %e, address = ?self.address, "bind server error");
                return Err(e);
            }
        };
        info!(address = ?tcp_listener.local_addr()?, "start listening");

        self.accept_loop(tcp_listener, Arc::new(handler)).await;
        Ok(())
    }

    async fn accept_loop<H>(&self, tcp_listener: TcpListener, handler: Arc<H>)
    where
        H: Handler + Sync + 'static,
    {
        loop {
            let (tcp_stream, remote_addr) = match tcp_listener.accept().await {
                Ok(stream_and_addr) => stream_and_addr,
                Err(e) => {
                    warn!(cause = %e, "failed to accept");
                    continue;
                }
            };

            let handler = Arc::clone(&handler);
            let config = self.config;

            tokio::spawn(async move {
                let local_addr = tcp_stream.local_addr().ok();
                let (reader, writer) = tcp_stream.into_split();

                let mut connection = HttpConnection::with_config(reader, writer, config).remote_addr(remote_addr);
                if let Some(local_addr) = local_addr {
                    connection = connection.local_addr(local_addr);
                }

                match connection.process(handler.as_ref()).await {
                    Ok(()) => info!(%remote_addr, "finished process, connection shutdown"),
                    Err(e) if e.is_io() => warn!(%remote_addr, cause = %e, "connection broken"),
                    Err(e) => error!(%remote_addr, cause = %e, "service has error, connection shutdown"),
                }
            });
        }
    }
}
