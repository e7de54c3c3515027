//! Single-use broker session with cooperative cancellation.
//!
//! A [`BrokerSession`] owns one connection and one channel for the lifetime
//! of a single declaration. Every stage runs under [`guard`], which races the
//! stage against its deadline and the caller's `CancellationToken`. The
//! connection is released by [`BrokerSession::close`] on the normal paths and
//! force-closed on drop otherwise (cancellation, early return, panic).
//!
//! The TCP socket is dialled here rather than inside lapin, and a duplicate
//! handle on it is kept for the whole session. Shutting that handle down is
//! what releases the socket when the AMQP handshake is abandoned half way.

use std::future::Future;
use std::io;
use std::net::{Shutdown, TcpStream as StdTcpStream};
use std::time::Duration;

use lapin::tcp::{HandshakeResult, TLSConfig, TcpStream};
use lapin::types::LongString;
use lapin::uri::{AMQPScheme, AMQPUri};
use lapin::{Channel, Connection, ConnectionProperties, ConnectionState};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::TopologyConfig;
use crate::error::{classify, Operation, Stage, TopologyError};

const REPLY_SUCCESS: u16 = 200;

/// Why a guarded future did not yield its own result.
#[derive(Debug)]
pub enum Interrupted<E> {
    Cancelled,
    TimedOut(Duration),
    Failed(E),
}

impl Interrupted<lapin::Error> {
    fn into_topology_error(self, operation: Operation, stage: Stage) -> TopologyError {
        match self {
            Self::Cancelled => TopologyError::Cancelled { operation, stage },
            Self::TimedOut(timeout) => TopologyError::TimedOut {
                operation,
                stage,
                timeout,
            },
            Self::Failed(err) => classify(operation, stage, err),
        }
    }
}

/// Runs `fut` until it completes, `limit` elapses, or `cancel` fires.
///
/// Cancellation wins ties. On cancel or timeout `fut` is dropped in place.
///
/// # Errors
///
/// `Interrupted::Cancelled`, `Interrupted::TimedOut`, or the future's own
/// error as `Interrupted::Failed`.
pub async fn guard<T, E, F>(
    cancel: &CancellationToken,
    limit: Duration,
    fut: F,
) -> Result<T, Interrupted<E>>
where
    F: Future<Output = Result<T, E>>,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(Interrupted::Cancelled),
        res = tokio::time::timeout(limit, fut) => match res {
            Ok(inner) => inner.map_err(Interrupted::Failed),
            Err(_elapsed) => Err(Interrupted::TimedOut(limit)),
        },
    }
}

/// Duplicate of the socket handed to lapin.
struct SocketHandle(StdTcpStream);

impl SocketHandle {
    /// Shuts both directions down so lapin's I/O loop sees EOF and exits.
    fn release(&self) {
        match self.0.shutdown(Shutdown::Both) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotConnected => {}
            Err(err) => debug!(error = %err, "broker socket shutdown failed"),
        }
    }
}

/// Dials the broker's TCP endpoint and returns a blocking std socket, the
/// form lapin's connector expects.
async fn dial(uri: &AMQPUri) -> lapin::Result<StdTcpStream> {
    let stream =
        tokio::net::TcpStream::connect((uri.authority.host.as_str(), uri.authority.port)).await?;
    let stream = stream.into_std()?;
    stream.set_nonblocking(false)?;
    Ok(stream)
}

/// Wraps a dialled socket for lapin, adding TLS for `amqps` URLs.
fn handshake(stream: StdTcpStream, scheme: &AMQPScheme, host: &str) -> HandshakeResult {
    let stream = TcpStream::from_std(stream)?;
    let stream = match scheme {
        AMQPScheme::AMQP => stream,
        AMQPScheme::AMQPS => stream.into_tls(host, TLSConfig::default())?,
    };
    stream.set_nonblocking(true)?;
    Ok(stream)
}

/// Owns the connection and its socket so both are released on drop.
struct ConnectionGuard {
    live: Option<(Connection, SocketHandle)>,
    close_timeout: Duration,
}

impl ConnectionGuard {
    async fn create_channel(&self) -> lapin::Result<Channel> {
        match &self.live {
            Some((connection, _)) => connection.create_channel().await,
            None => Err(lapin::Error::InvalidConnectionState(ConnectionState::Closed)),
        }
    }

    async fn close(mut self) {
        if let Some((connection, socket)) = self.live.take() {
            close_connection(connection, socket, self.close_timeout).await;
        }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let Some((connection, socket)) = self.live.take() else {
            return;
        };
        let close_timeout = self.close_timeout;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(close_connection(connection, socket, close_timeout));
            }
            Err(_) => {
                debug!("no runtime available, shutting broker socket down without close");
                socket.release();
            }
        }
    }
}

async fn close_connection(connection: Connection, socket: SocketHandle, close_timeout: Duration) {
    match tokio::time::timeout(close_timeout, connection.close(REPLY_SUCCESS, "OK")).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => debug!(error = %err, "broker connection close failed"),
        Err(_) => debug!("broker connection close timed out"),
    }
    socket.release();
}

/// One connection and channel, used for exactly one declaration.
pub struct BrokerSession {
    channel: Channel,
    connection: ConnectionGuard,
    cancel: CancellationToken,
    operation: Operation,
    close_timeout: Duration,
}

impl BrokerSession {
    /// Dials `url`, completes the AMQP handshake and opens a channel, each
    /// under `config.connect_timeout`.
    ///
    /// # Errors
    ///
    /// Returns `TopologyError::InvalidUrl` for an unparseable URL, otherwise
    /// `Connectivity`, `TimedOut` or `Cancelled` tagged with `Stage::Connect`
    /// or `Stage::OpenChannel`.
    pub async fn open(
        url: &str,
        config: &TopologyConfig,
        operation: Operation,
        cancel: &CancellationToken,
    ) -> Result<Self, TopologyError> {
        let uri: AMQPUri = url
            .parse()
            .map_err(|reason| TopologyError::InvalidUrl { operation, reason })?;
        let stream = guard(cancel, config.connect_timeout, dial(&uri))
            .await
            .map_err(|e| e.into_topology_error(operation, Stage::Connect))?;
        let socket = stream
            .try_clone()
            .map(SocketHandle)
            .map_err(|e| classify(operation, Stage::Connect, e.into()))?;

        let scheme = uri.scheme.clone();
        let host = uri.authority.host.clone();
        let properties = ConnectionProperties::default()
            .with_connection_name(LongString::from(config.connection_name.clone()));
        let connected = guard(
            cancel,
            config.connect_timeout,
            Connection::connector(
                uri,
                Box::new(move |_: &AMQPUri| handshake(stream, &scheme, &host)),
                properties,
            ),
        )
        .await;
        let connection = match connected {
            Ok(connection) => connection,
            Err(err) => {
                socket.release();
                return Err(err.into_topology_error(operation, Stage::Connect));
            }
        };

        let connection = ConnectionGuard {
            live: Some((connection, socket)),
            close_timeout: config.close_timeout,
        };
        let opened = guard(cancel, config.connect_timeout, connection.create_channel()).await;
        let channel = match opened {
            Ok(channel) => channel,
            Err(err) => {
                connection.close().await;
                return Err(err.into_topology_error(operation, Stage::OpenChannel));
            }
        };
        debug!(operation = operation.resource(), "broker session open");

        Ok(Self {
            channel,
            connection,
            cancel: cancel.clone(),
            operation,
            close_timeout: config.close_timeout,
        })
    }

    #[must_use]
    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Runs one channel call under `limit` and the session's cancel token.
    ///
    /// # Errors
    ///
    /// Returns the classified failure of `fut`, or `TimedOut` / `Cancelled`.
    pub async fn run<T, F>(&self, stage: Stage, limit: Duration, fut: F) -> Result<T, TopologyError>
    where
        F: Future<Output = lapin::Result<T>>,
    {
        guard(&self.cancel, limit, fut)
            .await
            .map_err(|e| e.into_topology_error(self.operation, stage))
    }

    /// Closes the channel, then the connection. Errors are logged, not
    /// returned: a failed declaration has often closed the channel already.
    pub async fn close(self) {
        let Self {
            channel,
            connection,
            close_timeout,
            ..
        } = self;
        match tokio::time::timeout(close_timeout, channel.close(REPLY_SUCCESS, "OK")).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => debug!(error = %err, "channel close failed"),
            Err(_) => debug!("channel close timed out"),
        }
        connection.close().await;
    }
}
