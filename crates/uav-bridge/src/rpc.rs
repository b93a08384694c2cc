//! MessagePack-RPC channel over TCP.
//!
//! Only the subset of the protocol this bridge needs: call/response
//! framing (`[0, msgid, method, params]` out, `[1, msgid, error,
//! result]` back) on a single socket. One call is in flight at a time;
//! the connection manager serializes access.
//!
//! Socket work is blocking (the protocol is strictly request/response)
//! and runs on the tokio blocking pool with read/write timeouts taken
//! from the connect timeout.

use std::io::Write;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, trace};

use crate::error::{BridgeError, Result};
use crate::wire::WireValue;

const MSG_TYPE_REQUEST: i64 = 0;
const MSG_TYPE_RESPONSE: i64 = 1;

/// One established RPC channel. Implementations are the mock seam for
/// connection-manager and translator tests.
#[async_trait]
pub trait RpcChannel: Send {
    /// Issue a single call and wait for its response.
    async fn call(&mut self, method: &str, params: Vec<WireValue>) -> Result<WireValue>;
}

/// Channel factory. The production dialer opens TCP sockets; tests
/// substitute scripted outcomes.
#[async_trait]
pub trait Dialer: Send + Sync {
    async fn dial(&self, host: &str, port: u16, timeout: Duration)
    -> Result<Box<dyn RpcChannel>>;
}

/// Wire response frame.
#[derive(Debug, Deserialize)]
struct ResponseFrame(i64, u32, WireValue, WireValue);

// =============================================================================
// TCP IMPLEMENTATION
// =============================================================================

/// Production channel over a blocking TCP socket.
pub struct TcpChannel {
    stream: TcpStream,
    next_msgid: u32,
}

impl TcpChannel {
    fn remote_failed(method: &str, reason: impl ToString) -> BridgeError {
        BridgeError::RemoteCallFailed {
            method: method.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl RpcChannel for TcpChannel {
    async fn call(&mut self, method: &str, params: Vec<WireValue>) -> Result<WireValue> {
        let msgid = self.next_msgid;
        self.next_msgid = self.next_msgid.wrapping_add(1);

        let request = rmp_serde::to_vec(&(MSG_TYPE_REQUEST, msgid, method, &params))
            .map_err(|e| Self::remote_failed(method, e))?;
        trace!(method, msgid, bytes = request.len(), "issuing rpc call");

        let mut stream = self
            .stream
            .try_clone()
            .map_err(|e| Self::remote_failed(method, e))?;
        let method_owned = method.to_string();

        let frame = tokio::task::spawn_blocking(move || -> Result<ResponseFrame> {
            stream
                .write_all(&request)
                .and_then(|()| stream.flush())
                .map_err(|e| Self::remote_failed(&method_owned, e))?;

            rmp_serde::decode::from_read(&mut stream)
                .map_err(|e| Self::remote_failed(&method_owned, e))
        })
        .await
        .map_err(|e| Self::remote_failed(method, e))??;

        let ResponseFrame(msg_type, reply_id, error, result) = frame;
        if msg_type != MSG_TYPE_RESPONSE {
            return Err(Self::remote_failed(
                method,
                format!("unexpected frame type {msg_type}"),
            ));
        }
        if reply_id != msgid {
            return Err(Self::remote_failed(
                method,
                format!("response id {reply_id} does not match request id {msgid}"),
            ));
        }
        if !error.is_nil() {
            let reason = error
                .as_str()
                .map_or_else(|| format!("{error:?}"), str::to_string);
            return Err(Self::remote_failed(method, reason));
        }

        Ok(result)
    }
}

/// Production dialer: resolves the endpoint and opens a socket with the
/// configured timeout applied to connect, reads, and writes.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpDialer;

#[async_trait]
impl Dialer for TcpDialer {
    async fn dial(
        &self,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> Result<Box<dyn RpcChannel>> {
        let endpoint = format!("{host}:{port}");

        let stream = tokio::task::spawn_blocking(move || -> Result<TcpStream> {
            let addr = endpoint
                .to_socket_addrs()
                .map_err(|e| BridgeError::ChannelIo(e.to_string()))?
                .next()
                .ok_or_else(|| {
                    BridgeError::ChannelIo(format!("no address resolved for {endpoint}"))
                })?;

            let stream = TcpStream::connect_timeout(&addr, timeout)
                .map_err(|e| BridgeError::ChannelIo(e.to_string()))?;
            stream
                .set_read_timeout(Some(timeout))
                .and_then(|()| stream.set_write_timeout(Some(timeout)))
                .and_then(|()| stream.set_nodelay(true))
                .map_err(|e| BridgeError::ChannelIo(e.to_string()))?;
            Ok(stream)
        })
        .await
        .map_err(|e| BridgeError::ChannelIo(e.to_string()))??;

        debug!(host, port, "tcp channel established");
        Ok(Box::new(TcpChannel {
            stream,
            next_msgid: 0,
        }))
    }
}
