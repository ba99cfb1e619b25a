//! Connection establishment and the transport event loop.
//!
//! A [`Transport`] owns one TLS stream to the single remote peer. Inbound
//! bytes are pushed through an event channel in arrival order by a reader
//! task; outbound frames go through a writer task so multiple callers can
//! send without sharing the socket. Both tasks end when the socket closes,
//! errors, or sits idle past the timeout.

use std::sync::Arc;

use rustls::pki_types::ServerName;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;

use farview_shared::constants::{IDLE_TIMEOUT, RELAY_STEP_TIMEOUT};
use farview_shared::DeviceId;

use crate::error::{NetError, Result};
use crate::relay_dial;
use crate::tls::{peer_device_id, TlsIdentity};

const DEFAULT_TCP_PORT: u16 = 22000;
const DEFAULT_RELAY_PORT: u16 = 22067;
const READ_BUF_LEN: usize = 64 * 1024;

/// A parsed connection target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetAddr {
    Tcp {
        host: String,
        port: u16,
    },
    Relay {
        host: String,
        port: u16,
        relay_id: DeviceId,
    },
}

impl TargetAddr {
    /// Parse `tcp://host:port` or `relay://host:port/?id=DEVICE-ID`.
    pub fn parse(url: &str) -> Result<Self> {
        if let Some(rest) = url.strip_prefix("tcp://") {
            let (host, port) = split_host_port(rest, DEFAULT_TCP_PORT)
                .ok_or_else(|| NetError::InvalidTarget(url.to_string()))?;
            return Ok(TargetAddr::Tcp { host, port });
        }
        if let Some(rest) = url.strip_prefix("relay://") {
            let (authority, query) = match rest.split_once('?') {
                Some((a, q)) => (a.trim_end_matches('/'), q),
                None => (rest.trim_end_matches('/'), ""),
            };
            let (host, port) = split_host_port(authority, DEFAULT_RELAY_PORT)
                .ok_or_else(|| NetError::InvalidTarget(url.to_string()))?;
            let id = query
                .split('&')
                .find_map(|kv| kv.strip_prefix("id="))
                .ok_or_else(|| NetError::InvalidTarget(url.to_string()))?;
            let relay_id = DeviceId::parse(id)?;
            return Ok(TargetAddr::Relay {
                host,
                port,
                relay_id,
            });
        }
        Err(NetError::InvalidTarget(url.to_string()))
    }
}

fn split_host_port(authority: &str, default_port: u16) -> Option<(String, u16)> {
    if authority.is_empty() {
        return None;
    }
    // Bracketed IPv6 first.
    if let Some(rest) = authority.strip_prefix('[') {
        let (host, tail) = rest.split_once(']')?;
        let port = match tail.strip_prefix(':') {
            Some(p) => p.parse().ok()?,
            None if tail.is_empty() => default_port,
            None => return None,
        };
        return Some((host.to_string(), port));
    }
    match authority.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() => Some((host.to_string(), port.parse().ok()?)),
        _ => Some((authority.to_string(), default_port)),
    }
}

/// Events delivered upward, in arrival order.
#[derive(Debug)]
pub enum TransportEvent {
    Data(Vec<u8>),
    Closed,
    Error(NetError),
}

/// One established, peer-authenticated connection.
pub struct Transport {
    peer: DeviceId,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    events: mpsc::Receiver<TransportEvent>,
}

impl Transport {
    /// Connect to `target`, authenticate the peer fingerprint against
    /// `expected_peer` and start the reader/writer tasks.
    pub async fn connect(
        target: &TargetAddr,
        expected_peer: &DeviceId,
        identity: &TlsIdentity,
    ) -> Result<Transport> {
        let config = identity.client_config()?;
        let stream = match target {
            TargetAddr::Tcp { host, port } => {
                let tcp = TcpStream::connect((host.as_str(), *port)).await?;
                tls_connect(&config, host, tcp).await?
            }
            TargetAddr::Relay {
                host,
                port,
                relay_id,
            } => relay_connect(&config, host, *port, relay_id, expected_peer).await?,
        };

        let actual = peer_device_id(&stream)?;
        if actual != *expected_peer {
            return Err(NetError::PeerAuthFailed {
                expected: *expected_peer,
                actual,
            });
        }
        tracing::info!(peer = %actual, "peer authenticated");

        Ok(Self::start(stream, actual))
    }

    fn start(stream: TlsStream<TcpStream>, peer: DeviceId) -> Transport {
        let (reader, mut writer) = tokio::io::split(stream);
        let (event_tx, event_rx) = mpsc::channel(64);
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Vec<u8>>();

        tokio::spawn(async move {
            while let Some(bytes) = out_rx.recv().await {
                if let Err(e) = writer.write_all(&bytes).await {
                    tracing::debug!(error = %e, "transport write failed");
                    break;
                }
            }
            let _ = writer.shutdown().await;
        });

        tokio::spawn(read_loop(reader, event_tx));

        Transport {
            peer,
            outbound: out_tx,
            events: event_rx,
        }
    }

    pub fn peer(&self) -> &DeviceId {
        &self.peer
    }

    /// Queue one encoded frame for sending.
    pub fn send(&self, bytes: Vec<u8>) -> Result<()> {
        self.outbound
            .send(bytes)
            .map_err(|_| NetError::Io(std::io::ErrorKind::BrokenPipe.into()))
    }

    /// A cloneable handle for sending from other tasks.
    pub fn sender(&self) -> mpsc::UnboundedSender<Vec<u8>> {
        self.outbound.clone()
    }

    /// Next transport event; `None` after the reader task ended.
    ///
    /// Dropping the transport (and every cloned sender) shuts the write
    /// half down, which closes the connection.
    pub async fn recv(&mut self) -> Option<TransportEvent> {
        self.events.recv().await
    }
}

async fn read_loop(
    mut reader: tokio::io::ReadHalf<TlsStream<TcpStream>>,
    events: mpsc::Sender<TransportEvent>,
) {
    let mut buf = vec![0u8; READ_BUF_LEN];
    loop {
        match timeout(IDLE_TIMEOUT, reader.read(&mut buf)).await {
            Err(_) => {
                tracing::warn!("connection idle timeout");
                let _ = events.send(TransportEvent::Error(NetError::IdleTimeout)).await;
                break;
            }
            Ok(Ok(0)) => {
                let _ = events.send(TransportEvent::Closed).await;
                break;
            }
            Ok(Ok(n)) => {
                if events
                    .send(TransportEvent::Data(buf[..n].to_vec()))
                    .await
                    .is_err()
                {
                    break;
                }
            }
            Ok(Err(e)) => {
                let _ = events.send(TransportEvent::Error(NetError::Io(e))).await;
                break;
            }
        }
    }
}

async fn tls_connect(
    config: &Arc<rustls::ClientConfig>,
    host: &str,
    tcp: TcpStream,
) -> Result<TlsStream<TcpStream>> {
    let server_name = ServerName::try_from(host.to_string())
        .map_err(|_| NetError::InvalidTarget(host.to_string()))?;
    let connector = TlsConnector::from(config.clone());
    let stream = timeout(RELAY_STEP_TIMEOUT, connector.connect(server_name, tcp))
        .await
        .map_err(|_| NetError::HandshakeTimeout)??;
    Ok(stream)
}

/// The two-step relay dial: authenticated session request over TLS to the
/// relay, then a plain TCP join that gets upgraded to TLS with the peer.
async fn relay_connect(
    config: &Arc<rustls::ClientConfig>,
    host: &str,
    port: u16,
    relay_id: &DeviceId,
    expected_peer: &DeviceId,
) -> Result<TlsStream<TcpStream>> {
    let tcp = timeout(RELAY_STEP_TIMEOUT, TcpStream::connect((host, port)))
        .await
        .map_err(|_| NetError::HandshakeTimeout)??;
    let mut relay_stream = tls_connect(config, host, tcp).await?;

    let actual = peer_device_id(&relay_stream)?;
    if actual != *relay_id {
        return Err(NetError::RelayAuthFailed {
            expected: *relay_id,
            actual,
        });
    }

    let invitation = relay_dial::request_session(&mut relay_stream, expected_peer).await?;
    let _ = relay_stream.shutdown().await;

    let session_host = if invitation.address.is_empty() {
        host
    } else {
        invitation.address.as_str()
    };
    tracing::debug!(host = session_host, port = invitation.port, "joining relayed session");

    let mut session_tcp = timeout(
        RELAY_STEP_TIMEOUT,
        TcpStream::connect((session_host, invitation.port)),
    )
    .await
    .map_err(|_| NetError::HandshakeTimeout)??;
    relay_dial::join_session(&mut session_tcp, &invitation.key).await?;

    tls_connect(config, host, session_tcp).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_tcp_target() {
        let t = TargetAddr::parse("tcp://203.0.113.9:22000").unwrap();
        assert_eq!(
            t,
            TargetAddr::Tcp {
                host: "203.0.113.9".into(),
                port: 22000
            }
        );
    }

    #[test]
    fn parse_tcp_default_port() {
        let t = TargetAddr::parse("tcp://syncthing.example").unwrap();
        assert_eq!(
            t,
            TargetAddr::Tcp {
                host: "syncthing.example".into(),
                port: DEFAULT_TCP_PORT
            }
        );
    }

    #[test]
    fn parse_bracketed_ipv6() {
        let t = TargetAddr::parse("tcp://[2001:db8::1]:4242").unwrap();
        assert_eq!(
            t,
            TargetAddr::Tcp {
                host: "2001:db8::1".into(),
                port: 4242
            }
        );
    }

    #[test]
    fn parse_relay_target() {
        let relay_id = DeviceId::from_raw([5u8; 32]);
        let url = format!(
            "relay://relay.example:22067/?id={}&token=abc",
            relay_id.to_checked_string()
        );
        let t = TargetAddr::parse(&url).unwrap();
        assert_eq!(
            t,
            TargetAddr::Relay {
                host: "relay.example".into(),
                port: 22067,
                relay_id,
            }
        );
    }

    #[test]
    fn relay_without_id_rejected() {
        assert!(matches!(
            TargetAddr::parse("relay://relay.example:22067"),
            Err(NetError::InvalidTarget(_))
        ));
    }

    #[test]
    fn unknown_scheme_rejected() {
        assert!(matches!(
            TargetAddr::parse("quic://example:1"),
            Err(NetError::InvalidTarget(_))
        ));
        assert!(matches!(
            TargetAddr::parse("dynamic"),
            Err(NetError::InvalidTarget(_))
        ));
    }
}
