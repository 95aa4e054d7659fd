//! Accept loops and outbound `connect` helpers for each face kind, plus the
//! `FaceId` allocator shared across all of them.
//!
//! Grounded on `rust-udcn-quic::{NdnQuicServer, NdnQuicClient}`'s accept-loop
//! shape (spawn a task per incoming connection, hand each off to the face
//! layer), with the QUIC endpoint replaced by `TcpListener`/`UnixListener`/
//! `UdpSocket` per §4.6.

use ccnd_common::types::FaceId;
use ccnd_core::ForwarderCommand;
use log::{info, warn};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream, UdpSocket, UnixListener, UnixStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::face::{run_datagram_listener, spawn_connected_datagram_face, spawn_stream_face};

/// Owns the `FaceId` counter and the channel into the forwarder core;
/// every accept loop and outbound `connect` call goes through one of these.
#[derive(Clone)]
pub struct FaceManager {
    commands: mpsc::UnboundedSender<ForwarderCommand>,
    next_face_id: Arc<AtomicU32>,
}

impl FaceManager {
    pub fn new(commands: mpsc::UnboundedSender<ForwarderCommand>) -> Self {
        Self { commands, next_face_id: Arc::new(AtomicU32::new(1)) }
    }

    pub fn alloc_face_id(&self) -> FaceId {
        FaceId(self.next_face_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Binds a TCP listener and spawns an accept loop; each accepted
    /// connection becomes a `Stream` face.
    pub async fn listen_tcp(&self, addr: &str) -> std::io::Result<JoinHandle<()>> {
        let listener = TcpListener::bind(addr).await?;
        let local = listener.local_addr()?;
        info!("stream face listener bound to {}", local);
        let this = self.clone();
        Ok(tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, peer)) => {
                        let face = this.alloc_face_id();
                        info!("accepted stream face {} from {}", face, peer);
                        let _ = stream.set_nodelay(true);
                        spawn_stream_face(face, stream, this.commands.clone());
                    }
                    Err(e) => {
                        warn!("stream listener accept error: {}", e);
                        break;
                    }
                }
            }
        }))
    }

    /// Dials a remote TCP endpoint, registering the resulting connection as
    /// a `Stream` face.
    pub async fn connect_tcp(&self, addr: &str) -> std::io::Result<FaceId> {
        let stream = TcpStream::connect(addr).await?;
        let _ = stream.set_nodelay(true);
        let face = self.alloc_face_id();
        info!("connected stream face {} to {}", face, addr);
        spawn_stream_face(face, stream, self.commands.clone());
        Ok(face)
    }

    /// Binds a Unix domain socket listener; each accepted connection becomes
    /// a `LocalIpc` face.
    pub async fn listen_unix<P: AsRef<Path>>(&self, path: P) -> std::io::Result<JoinHandle<()>> {
        let path = path.as_ref().to_path_buf();
        let _ = std::fs::remove_file(&path);
        let listener = UnixListener::bind(&path)?;
        info!("local-ipc face listener bound to {}", path.display());
        let this = self.clone();
        Ok(tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, _addr)) => {
                        let face = this.alloc_face_id();
                        info!("accepted local-ipc face {}", face);
                        spawn_stream_face(face, stream, this.commands.clone());
                    }
                    Err(e) => {
                        warn!("local-ipc listener accept error: {}", e);
                        break;
                    }
                }
            }
        }))
    }

    /// Dials a local Unix domain socket, registering the connection as a
    /// `LocalIpc` face.
    pub async fn connect_unix<P: AsRef<Path>>(&self, path: P) -> std::io::Result<FaceId> {
        let stream = UnixStream::connect(path.as_ref()).await?;
        let face = self.alloc_face_id();
        info!("connected local-ipc face {} to {}", face, path.as_ref().display());
        spawn_stream_face(face, stream, self.commands.clone());
        Ok(face)
    }

    /// Binds a UDP socket and demultiplexes every distinct peer address into
    /// its own `Datagram` face, allocating `FaceId`s lazily as new peers
    /// appear. Use this for a forwarder that accepts datagram faces from
    /// many, not-yet-known, peers.
    pub async fn listen_udp(&self, addr: &str) -> std::io::Result<JoinHandle<()>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("datagram face listener bound to {}", socket.local_addr()?);
        let this = self.clone();
        Ok(tokio::spawn(async move {
            let commands = this.commands.clone();
            run_datagram_listener(socket, commands, move || this.alloc_face_id()).await;
        }))
    }

    /// Binds a UDP socket, connects it to a single known peer, and
    /// registers the pair as one `Datagram` face — the point-to-point case
    /// used for configured forwarder-to-forwarder links.
    pub async fn connect_udp(&self, local_addr: &str, peer_addr: &str) -> std::io::Result<FaceId> {
        let socket = UdpSocket::bind(local_addr).await?;
        socket.connect(peer_addr).await?;
        let face = self.alloc_face_id();
        info!("connected datagram face {} to {}", face, peer_addr);
        spawn_connected_datagram_face(face, Arc::new(socket), self.commands.clone());
        Ok(face)
    }
}
