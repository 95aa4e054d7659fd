//! Per-face read/write tasks (§4.6).
//!
//! A face never touches forwarding state directly: it only moves bytes
//! between a socket and the forwarder's `ForwarderCommand` channel, mirroring
//! the split between `fidinda-reto::forwarder::Faces<P>` (I/O-owning) and
//! `Tables` (state-owning) that the forwarder core follows. The QUIC-era
//! teacher shape (`rust-udcn-quic::face::Face`/`FaceEvent`, one struct per
//! connection with an event channel) becomes, here, a pair of lightweight
//! tasks per face instead of a struct with methods, since there is no
//! request/response correlation to do at this layer — that lives in the PIT.

use bytes::Bytes;
use ccnd_common::types::FaceId;
use ccnd_core::ForwarderCommand;
use log::{trace, warn};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::MAX_FRAME_LEN;

/// How a face's underlying transport frames messages. An UNDECIDED face
/// becomes one of these the moment its transport is chosen at accept/connect
/// time; there is no byte-sniffing step because the listener already knows
/// which socket kind it bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceKind {
    /// Length-prefixed sequence of ccnb messages, over `TcpStream`.
    Stream,
    /// One ccnb message per packet, over `UdpSocket`.
    Datagram,
    /// Length-prefixed, same framing as `Stream`, over `UnixStream`.
    LocalIpc,
}

/// Number of outstanding outbound frames past which further sends on a face
/// are dropped rather than queued, per §4.6's backpressure rule. A frame
/// count is used in place of a byte count since the outbound channel is
/// unbounded and only exposes a message-count backlog.
pub const HIGH_WATER_MARK_FRAMES: usize = 1024;

/// Spawns the read and write halves of a stream-oriented face (TCP or Unix
/// domain) and registers it with the forwarder. Returns the sender handed
/// back to the caller so an actively-dialed face can also be torn down
/// locally; passively-accepted faces can simply drop it.
pub fn spawn_stream_face<S>(
    face: FaceId,
    stream: S,
    commands: mpsc::UnboundedSender<ForwarderCommand>,
) -> mpsc::UnboundedSender<Bytes>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (read_half, write_half) = tokio::io::split(stream);
    let (out_tx, out_rx) = mpsc::unbounded_channel();

    tokio::spawn(read_loop(face, read_half, commands.clone()));
    tokio::spawn(write_loop(face, write_half, out_rx));

    let _ = commands.send(ForwarderCommand::FaceUp { face, sender: out_tx.clone() });
    out_tx
}

async fn read_loop<R: AsyncRead + Unpin>(
    face: FaceId,
    mut reader: R,
    commands: mpsc::UnboundedSender<ForwarderCommand>,
) {
    let mut len_buf = [0u8; 4];
    loop {
        if reader.read_exact(&mut len_buf).await.is_err() {
            break;
        }
        let len = u32::from_be_bytes(len_buf) as usize;
        if len == 0 || len > MAX_FRAME_LEN {
            warn!("[{}] rejecting frame of {} bytes", face, len);
            break;
        }
        let mut body = vec![0u8; len];
        if reader.read_exact(&mut body).await.is_err() {
            break;
        }
        trace!("[{}] read frame of {} bytes", face, len);
        if commands
            .send(ForwarderCommand::Inbound { face, bytes: Bytes::from(body) })
            .is_err()
        {
            break;
        }
    }
    let _ = commands.send(ForwarderCommand::FaceDown { face });
}

async fn write_loop<W: AsyncWrite + Unpin>(
    face: FaceId,
    mut writer: W,
    mut outbound: mpsc::UnboundedReceiver<Bytes>,
) {
    while let Some(bytes) = outbound.recv().await {
        if outbound.len() > HIGH_WATER_MARK_FRAMES {
            trace!("[{}] dropping frame, send queue past high-water mark", face);
            continue;
        }
        if bytes.len() > MAX_FRAME_LEN {
            warn!("[{}] dropping oversized outbound frame ({} bytes)", face, bytes.len());
            continue;
        }
        let len = (bytes.len() as u32).to_be_bytes();
        if writer.write_all(&len).await.is_err() || writer.write_all(&bytes).await.is_err() {
            break;
        }
    }
}

/// Runs a datagram face bound to a single already-`connect`ed peer: every
/// inbound packet is one ccnb message, and outbound messages are sent with
/// a single `send`. Used for forwarder-to-forwarder UDP links configured
/// with a known peer address.
pub fn spawn_connected_datagram_face(
    face: FaceId,
    socket: Arc<UdpSocket>,
    commands: mpsc::UnboundedSender<ForwarderCommand>,
) -> mpsc::UnboundedSender<Bytes> {
    let (out_tx, mut out_rx) = mpsc::unbounded_channel();

    let read_socket = Arc::clone(&socket);
    let read_commands = commands.clone();
    tokio::spawn(async move {
        let mut buf = vec![0u8; MAX_FRAME_LEN];
        loop {
            match read_socket.recv(&mut buf).await {
                Ok(n) => {
                    let bytes = Bytes::copy_from_slice(&buf[..n]);
                    if read_commands
                        .send(ForwarderCommand::Inbound { face, bytes })
                        .is_err()
                    {
                        break;
                    }
                }
                Err(e) => {
                    warn!("[{}] datagram face read error: {}", face, e);
                    break;
                }
            }
        }
        let _ = read_commands.send(ForwarderCommand::FaceDown { face });
    });

    tokio::spawn(async move {
        while let Some(bytes) = out_rx.recv().await {
            if bytes.len() > MAX_FRAME_LEN {
                warn!("[{}] dropping oversized outbound datagram ({} bytes)", face, bytes.len());
                continue;
            }
            if let Err(e) = socket.send(&bytes).await {
                warn!("[{}] datagram face write error: {}", face, e);
                break;
            }
        }
    });

    let _ = commands.send(ForwarderCommand::FaceUp { face, sender: out_tx.clone() });
    out_tx
}

/// Demultiplexes a single unconnected `UdpSocket` across many peers,
/// allocating a fresh `FaceId` (via `alloc_face_id`) the first time a packet
/// arrives from an address not seen before. Each peer's outbound queue is
/// drained into a `send_to` on the shared socket.
pub async fn run_datagram_listener(
    socket: Arc<UdpSocket>,
    commands: mpsc::UnboundedSender<ForwarderCommand>,
    mut alloc_face_id: impl FnMut() -> FaceId,
) {
    let mut peers: HashMap<SocketAddr, FaceId> = HashMap::new();
    let mut buf = vec![0u8; MAX_FRAME_LEN];
    loop {
        let (n, peer_addr) = match socket.recv_from(&mut buf).await {
            Ok(pair) => pair,
            Err(e) => {
                warn!("datagram listener recv error: {}", e);
                break;
            }
        };
        let bytes = Bytes::copy_from_slice(&buf[..n]);

        let face = *peers.entry(peer_addr).or_insert_with(|| {
            let face = alloc_face_id();
            let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Bytes>();
            let write_socket = Arc::clone(&socket);
            tokio::spawn(async move {
                while let Some(out_bytes) = out_rx.recv().await {
                    if out_bytes.len() > MAX_FRAME_LEN {
                        continue;
                    }
                    if write_socket.send_to(&out_bytes, peer_addr).await.is_err() {
                        break;
                    }
                }
            });
            let _ = commands.send(ForwarderCommand::FaceUp { face, sender: out_tx });
            trace!("datagram listener: new face {} for peer {}", face, peer_addr);
            face
        });

        if commands
            .send(ForwarderCommand::Inbound { face, bytes })
            .is_err()
        {
            break;
        }
    }
}
