//! Repository worker loop (§5): the repository owns a [`RepositoryEngine`]
//! on its own task, reachable from the forwarder through exactly one dialed
//! local-IPC connection. Registration, inbound Interests, and pushed
//! content all ride the same stream — the repository presents itself to
//! the forwarder as a single ordinary face, not a privileged component.

use crate::engine::RepositoryEngine;
use crate::registration::build_registration_entry;
use bytes::Bytes;
use ccnd_common::name::Name;
use ccnd_common::packet;
use log::{info, warn};
use std::path::Path;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

const MAX_FRAME_LEN: usize = 1 << 20;

/// Dials the forwarder at `local_ipc_path`, self-registers every prefix in
/// `prefixes`, then serves Interests and accepts pushed content against
/// `engine` until the connection drops.
pub async fn run(
    mut engine: RepositoryEngine,
    local_ipc_path: &Path,
    prefixes: &[Name],
) -> std::io::Result<()> {
    let mut stream = UnixStream::connect(local_ipc_path).await?;
    for prefix in prefixes {
        let entry = build_registration_entry(prefix.clone());
        write_frame(&mut stream, &packet::encode_forwarding_entry(&entry)).await?;
        // The forwarder answers every registration with an acknowledgement
        // Content Object on this same connection; drain it here so it can
        // never be mistaken for pushed content once the serve loop starts.
        read_frame(&mut stream).await?;
        info!("repository: registered {}", prefix);
    }

    loop {
        let Some(body) = read_frame(&mut stream).await? else { break };
        let mut replies = handle_frame(&mut engine, &body);
        replies.extend(deferred_enumeration_replies(&mut engine));
        for reply in replies {
            if write_frame(&mut stream, &reply).await.is_err() {
                return Ok(());
            }
        }
    }
    info!("repository worker: forwarder connection closed");
    Ok(())
}

/// Enumeration responses newly unblocked by content `handle_frame` just
/// stored, encoded as Content Objects under their Interest's own name so the
/// forwarder's PIT still routes them back to whoever asked.
fn deferred_enumeration_replies(engine: &mut RepositoryEngine) -> Vec<Bytes> {
    engine
        .drain_ready_enumerations()
        .into_iter()
        .map(|(interest, children)| encode_enumeration_response(&interest.name, &children))
        .collect()
}

fn encode_enumeration_response(reply_name: &Name, children: &[ccnd_common::name::Component]) -> Bytes {
    let reply = packet::ContentObject::new_signed(
        reply_name.clone(),
        packet::SignedInfo::new(packet::ContentType::Data),
        packet::encode_name_enumeration_response(children),
    );
    packet::encode_content_object(&reply)
}

async fn read_frame(stream: &mut UnixStream) -> std::io::Result<Option<Vec<u8>>> {
    let mut len_buf = [0u8; 4];
    if stream.read_exact(&mut len_buf).await.is_err() {
        return Ok(None);
    }
    let len = u32::from_be_bytes(len_buf) as usize;
    if len == 0 || len > MAX_FRAME_LEN {
        warn!("repository worker: rejecting frame of {} bytes", len);
        return Ok(None);
    }
    let mut body = vec![0u8; len];
    if stream.read_exact(&mut body).await.is_err() {
        return Ok(None);
    }
    Ok(Some(body))
}

/// Dispatches one inbound frame: a plain Interest is answered from the
/// store, an enumeration Interest (marked per
/// [`packet::is_enumeration_interest`]) is answered immediately or deferred,
/// and a Content Object is persisted. At most one reply frame comes out of
/// this directly; deferred enumeration replies surface later, once
/// `save_content` unblocks them, via `deferred_enumeration_replies`.
fn handle_frame(engine: &mut RepositoryEngine, bytes: &[u8]) -> Vec<Bytes> {
    if let Ok((interest, _)) = packet::parse_interest(bytes) {
        if packet::is_enumeration_interest(&interest) {
            let reply_name = interest.name.clone();
            return match engine.get_names_with_prefix(interest) {
                Some(children) => vec![encode_enumeration_response(&reply_name, &children)],
                None => Vec::new(),
            };
        }
        return engine.get_content(&interest).map(|co| packet::encode_content_object(&co)).into_iter().collect();
    }
    if let Ok((co, _, _)) = packet::parse_content_object(bytes) {
        if let Err(e) = engine.save_content(co) {
            warn!("repository worker: failed to store content: {}", e);
        }
    }
    Vec::new()
}

async fn write_frame(stream: &mut UnixStream, body: &[u8]) -> std::io::Result<()> {
    let len = (body.len() as u32).to_be_bytes();
    stream.write_all(&len).await?;
    stream.write_all(body).await?;
    stream.flush().await
}
