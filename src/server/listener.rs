//! TCP listener and per-connection task spawning.

use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Duration;

use tokio::net::TcpListener;

use crate::config::Config;
use crate::executor::Executor;
use crate::heap::TableStore;

use super::connection::Connection;
use super::handshake::{Handshake, HandshakeResult};

/// TCP server implementing the PostgreSQL wire protocol.
///
/// Each accepted connection runs as its own tokio task; the shared state
/// (buffer pool, page files) lives behind the executor's store.
pub struct Server<S> {
    listener: TcpListener,
    executor: Arc<Executor<S>>,
    next_pid: AtomicI32,
    query_timeout: Duration,
    connection_timeout: Duration,
}

impl<S: TableStore + 'static> Server<S> {
    /// Creates a server from a bound listener.
    pub fn new(listener: TcpListener, executor: Arc<Executor<S>>, config: &Config) -> Self {
        Self {
            listener,
            executor,
            next_pid: AtomicI32::new(1),
            query_timeout: config.query_timeout,
            connection_timeout: config.connection_timeout,
        }
    }

    /// Accepts and serves connections until the listener fails.
    ///
    /// NOTE: Production would want a connection limit (Semaphore), tracked
    /// tasks (JoinSet) for draining on shutdown, and backoff on transient
    /// accept errors instead of propagating them.
    pub async fn serve(self) -> Result<(), std::io::Error> {
        loop {
            let (socket, peer_addr) = self.listener.accept().await?;
            let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
            let executor = Arc::clone(&self.executor);
            let query_timeout = self.query_timeout;
            let connection_timeout = self.connection_timeout;

            println!("(pid={}) accepted connection from {}", pid, peer_addr);

            tokio::spawn(async move {
                let handshake = Handshake::new(socket, pid, connection_timeout);
                let mut connection = match handshake.run().await {
                    Ok(HandshakeResult::Success { framed, .. }) => {
                        Connection::new(framed, pid, executor, query_timeout)
                    }
                    Ok(HandshakeResult::CancelRequested { pid: target, .. }) => {
                        // No mid-query cancellation; the request just closes.
                        println!("(pid={}) cancel request for pid={}", pid, target);
                        return;
                    }
                    Err(e) => {
                        eprintln!("(pid={}) handshake failed: {}", pid, e);
                        return;
                    }
                };

                if let Err(e) = connection.run().await {
                    eprintln!("(pid={}) connection error: {}", pid, e);
                }
                println!("(pid={}) connection closed", pid);
            });
        }
    }
}
