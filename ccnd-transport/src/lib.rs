//! Face manager (§4.6): accepts stream, datagram, and local-IPC connections
//! and feeds parsed-or-raw bytes into the forwarder core over its
//! [`ccnd_core::ForwarderCommand`] channel.
//!
//! Replaces the teacher's QUIC-specific transport (`quinn`/`rustls`) with
//! the plain socket kinds the spec names directly: `tokio::net::TcpStream`
//! for stream faces, `tokio::net::UdpSocket` for datagram faces, and
//! `tokio::net::UnixStream` for local-IPC faces. The per-face task split —
//! a face only moves bytes, forwarding state lives solely in
//! `ccnd_core::Forwarder` — carries over the teacher's `Face`/`FaceEvent`
//! separation of I/O from protocol state.

mod face;
mod listener;

pub use face::{FaceKind, HIGH_WATER_MARK_FRAMES};
pub use listener::FaceManager;

/// Maximum length of a single framed ccnb message body (stream/local-IPC
/// faces) or datagram payload (datagram faces). Chosen generously above
/// RFC 8609's 8800-byte NDN-TLV ceiling since ccnb Content Objects here
/// carry no equivalent hard cap; oversized frames are rejected rather than
/// silently truncated.
pub const MAX_FRAME_LEN: usize = 1 << 20;

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use ccnd_common::types::FaceId;
    use ccnd_core::ForwarderCommand;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn stream_face_frames_and_forwards_inbound_bytes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let client = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            let payload = b"hello-face";
            stream.write_all(&(payload.len() as u32).to_be_bytes()).await.unwrap();
            stream.write_all(payload).await.unwrap();
        });

        let (stream, _peer) = listener.accept().await.unwrap();
        let (commands, mut rx) = mpsc::unbounded_channel::<ForwarderCommand>();
        face::spawn_stream_face(FaceId(1), stream, commands);

        client.await.unwrap();

        let up = rx.recv().await.unwrap();
        assert!(matches!(up, ForwarderCommand::FaceUp { face: FaceId(1), .. }));

        let inbound = rx.recv().await.unwrap();
        match inbound {
            ForwarderCommand::Inbound { face, bytes } => {
                assert_eq!(face, FaceId(1));
                assert_eq!(bytes, Bytes::from_static(b"hello-face"));
            }
            _ => panic!("expected Inbound"),
        }
    }
}
