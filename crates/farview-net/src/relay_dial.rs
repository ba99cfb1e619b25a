//! Client side of the relay session handshake.
//!
//! Step one runs over the TLS connection to the relay: announce which peer
//! we want, wait for a session invitation. Step two runs over a fresh plain
//! TCP connection to the invited port: present the session key, wait for a
//! success response, after which the socket is ready for the TLS upgrade to
//! the peer itself. Each step has a hard timeout.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

use farview_proto::relay::{self, RelayMessage, RESPONSE_SUCCESS};
use farview_shared::constants::RELAY_STEP_TIMEOUT;
use farview_shared::DeviceId;

use crate::error::{NetError, Result};

/// A relayed session granted by the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invitation {
    pub key: Vec<u8>,
    /// Empty means "connect to the relay's host".
    pub address: String,
    pub port: u16,
}

/// Ask the relay for a session with `peer` and await the invitation.
pub async fn request_session<S>(stream: &mut S, peer: &DeviceId) -> Result<Invitation>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let frame = relay::encode(&RelayMessage::ConnectRequest {
        id: peer.as_bytes().to_vec(),
    });
    step(stream.write_all(&frame)).await??;

    match step(read_frame(stream)).await?? {
        RelayMessage::SessionInvitation {
            key,
            address,
            port,
            ..
        } => {
            tracing::debug!(port, "received session invitation");
            Ok(Invitation {
                key,
                address: String::from_utf8_lossy(&address).into_owned(),
                port,
            })
        }
        RelayMessage::Response { code, message } => {
            Err(NetError::RelaySessionFailed { code, message })
        }
        other => {
            tracing::warn!(?other, "unexpected relay message awaiting invitation");
            Err(NetError::Proto(farview_proto::ProtoError::RelayMalformed(
                "expected session invitation",
            )))
        }
    }
}

/// Join an invited session on the plain TCP socket.
pub async fn join_session<S>(stream: &mut S, key: &[u8]) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let frame = relay::encode(&RelayMessage::JoinSessionRequest { key: key.to_vec() });
    step(stream.write_all(&frame)).await??;

    match step(read_frame(stream)).await?? {
        RelayMessage::Response { code, .. } if code == RESPONSE_SUCCESS => Ok(()),
        RelayMessage::Response { code, message } => {
            Err(NetError::RelaySessionFailed { code, message })
        }
        other => {
            tracing::warn!(?other, "unexpected relay message joining session");
            Err(NetError::Proto(farview_proto::ProtoError::RelayMalformed(
                "expected join response",
            )))
        }
    }
}

async fn read_frame<S>(stream: &mut S) -> Result<RelayMessage>
where
    S: AsyncRead + Unpin,
{
    let mut header = [0u8; relay::HEADER_LEN];
    stream.read_exact(&mut header).await?;
    let header = relay::decode_header(&header)?;
    let mut payload = vec![0u8; header.len];
    stream.read_exact(&mut payload).await?;
    Ok(relay::decode_payload(header.msg_type, &payload)?)
}

async fn step<F, T>(fut: F) -> Result<T>
where
    F: std::future::Future<Output = T>,
{
    timeout(RELAY_STEP_TIMEOUT, fut)
        .await
        .map_err(|_| NetError::HandshakeTimeout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn invitation_accepted() {
        let (mut client, mut server) = duplex(4096);
        let peer = DeviceId::from_raw([3u8; 32]);

        let server_task = tokio::spawn(async move {
            let req = read_frame(&mut server).await.unwrap();
            assert_eq!(
                req,
                RelayMessage::ConnectRequest {
                    id: vec![3u8; 32]
                }
            );
            let frame = relay::encode(&RelayMessage::SessionInvitation {
                from: vec![3u8; 32],
                key: vec![0xAA; 16],
                address: Vec::new(),
                port: 22067,
                server_socket: false,
            });
            server.write_all(&frame).await.unwrap();
        });

        let invitation = request_session(&mut client, &peer).await.unwrap();
        assert_eq!(invitation.port, 22067);
        assert_eq!(invitation.key, vec![0xAA; 16]);
        assert!(invitation.address.is_empty());
        server_task.await.unwrap();
    }

    #[tokio::test]
    async fn session_refusal_surfaces_code() {
        let (mut client, mut server) = duplex(4096);

        let server_task = tokio::spawn(async move {
            let _ = read_frame(&mut server).await.unwrap();
            let frame = relay::encode(&RelayMessage::Response {
                code: 1,
                message: "no such session".into(),
            });
            server.write_all(&frame).await.unwrap();
        });

        let err = join_session(&mut client, &[1, 2, 3]).await.unwrap_err();
        assert!(matches!(
            err,
            NetError::RelaySessionFailed { code: 1, .. }
        ));
        server_task.await.unwrap();
    }

    #[tokio::test]
    async fn join_success() {
        let (mut client, mut server) = duplex(4096);

        let server_task = tokio::spawn(async move {
            let req = read_frame(&mut server).await.unwrap();
            assert_eq!(
                req,
                RelayMessage::JoinSessionRequest {
                    key: vec![9, 9, 9]
                }
            );
            let frame = relay::encode(&RelayMessage::Response {
                code: RESPONSE_SUCCESS,
                message: "ok".into(),
            });
            server.write_all(&frame).await.unwrap();
        });

        join_session(&mut client, &[9, 9, 9]).await.unwrap();
        server_task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn silent_relay_times_out() {
        let (mut client, _server) = duplex(4096);
        let peer = DeviceId::from_raw([3u8; 32]);
        let err = request_session(&mut client, &peer).await.unwrap_err();
        assert!(matches!(err, NetError::HandshakeTimeout));
    }
}
