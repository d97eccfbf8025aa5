//! TCP accept loop that ends serving when the socket itself is broken.
//!
//! axum's own `TcpListener` impl retries every accept error forever. Here
//! only per-connection errors and descriptor exhaustion are retried; any
//! other error is recorded, shutdown is triggered and accepting stops.

use axum::serve::Listener;
use garagemon_core::lifecycle::Shutdown;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};

const RESOURCE_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AcceptFailure {
    /// One client went away; the next accept is unaffected.
    Connection,
    /// Out of descriptors or buffers; wait for some to free up.
    Resources,
    Fatal,
}

fn classify(e: &io::Error) -> AcceptFailure {
    match e.kind() {
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::Interrupted => AcceptFailure::Connection,
        _ => match e.raw_os_error() {
            Some(libc::EMFILE | libc::ENFILE | libc::ENOBUFS | libc::ENOMEM) => {
                AcceptFailure::Resources
            }
            _ => AcceptFailure::Fatal,
        },
    }
}

/// First fatal accept error, shared with whoever awaits the server.
#[derive(Debug, Clone, Default)]
pub struct ListenerFailure(Arc<Mutex<Option<io::Error>>>);

impl ListenerFailure {
    fn record(&self, e: io::Error) {
        let mut slot = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        slot.get_or_insert(e);
    }

    pub fn take(&self) -> Option<io::Error> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

#[derive(Debug)]
pub struct SupervisedListener {
    inner: TcpListener,
    shutdown: Shutdown,
    failure: ListenerFailure,
}

impl SupervisedListener {
    pub fn new(inner: TcpListener, shutdown: Shutdown) -> Self {
        Self {
            inner,
            shutdown,
            failure: ListenerFailure::default(),
        }
    }

    pub fn failure(&self) -> ListenerFailure {
        self.failure.clone()
    }
}

impl Listener for SupervisedListener {
    type Io = TcpStream;
    type Addr = SocketAddr;

    async fn accept(&mut self) -> (Self::Io, Self::Addr) {
        loop {
            match self.inner.accept().await {
                Ok(conn) => return conn,
                Err(e) => match classify(&e) {
                    AcceptFailure::Connection => tracing::debug!("accept: {e}"),
                    AcceptFailure::Resources => {
                        tracing::warn!("accept: {e}; retrying in {RESOURCE_BACKOFF:?}");
                        tokio::time::sleep(RESOURCE_BACKOFF).await;
                    }
                    AcceptFailure::Fatal => {
                        tracing::error!("HTTP listener failed: {e}");
                        self.failure.record(e);
                        self.shutdown.trigger();
                        // Graceful shutdown wins the race against this accept.
                        std::future::pending::<()>().await;
                    }
                },
            }
        }
    }

    fn local_addr(&self) -> io::Result<Self::Addr> {
        self.inner.local_addr()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_connection_errors_are_retried() {
        for kind in [
            io::ErrorKind::ConnectionAborted,
            io::ErrorKind::ConnectionReset,
            io::ErrorKind::Interrupted,
        ] {
            assert_eq!(classify(&io::Error::from(kind)), AcceptFailure::Connection);
        }
    }

    #[test]
    fn descriptor_exhaustion_backs_off() {
        assert_eq!(
            classify(&io::Error::from_raw_os_error(libc::EMFILE)),
            AcceptFailure::Resources
        );
        assert_eq!(
            classify(&io::Error::from_raw_os_error(libc::ENFILE)),
            AcceptFailure::Resources
        );
    }

    #[test]
    fn broken_socket_is_fatal() {
        assert_eq!(
            classify(&io::Error::from_raw_os_error(libc::EINVAL)),
            AcceptFailure::Fatal
        );
        assert_eq!(
            classify(&io::Error::from_raw_os_error(libc::EBADF)),
            AcceptFailure::Fatal
        );
    }

    #[test]
    fn failure_keeps_first_error() {
        let failure = ListenerFailure::default();
        failure.record(io::Error::from_raw_os_error(libc::EINVAL));
        failure.record(io::Error::from_raw_os_error(libc::EBADF));
        let first = failure.take().unwrap();
        assert_eq!(first.raw_os_error(), Some(libc::EINVAL));
        assert!(failure.take().is_none());
    }

    #[tokio::test]
    async fn accept_hands_back_connections() {
        let tcp = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut listener = SupervisedListener::new(tcp, Shutdown::new());
        let addr = listener.local_addr().unwrap();

        let client = tokio::spawn(TcpStream::connect(addr));
        let (_stream, peer) = listener.accept().await;
        let client = client.await.unwrap().unwrap();
        assert_eq!(peer, client.local_addr().unwrap());
        assert!(listener.failure().take().is_none());
    }
}
