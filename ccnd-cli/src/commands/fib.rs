//! `ccnd fib`: administers FIB entries on a running forwarder through the
//! same registration protocol a repository uses to self-register (§4.10),
//! dialed over TCP instead of the local-IPC socket since this is a remote
//! admin client, not a co-located process.

use anyhow::{bail, Context, Result};
use ccnd_common::name::Name;
use ccnd_common::packet::{self, ForwardingEntry, RegistrationAction, FIB_FLAG_ACTIVE, FIB_FLAG_CHILD_INHERIT};
use log::info;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

const MAX_FRAME_LEN: usize = 1 << 20;

pub async fn add(prefix: String, server: String, lifetime_seconds: u32, no_child_inherit: bool) -> Result<()> {
    let flags = FIB_FLAG_ACTIVE | if no_child_inherit { 0 } else { FIB_FLAG_CHILD_INHERIT };
    send_entry(prefix, server, RegistrationAction::Register, lifetime_seconds, flags).await
}

pub async fn remove(prefix: String, server: String) -> Result<()> {
    send_entry(prefix, server, RegistrationAction::Unregister, 0, 0).await
}

async fn send_entry(
    prefix: String,
    server: String,
    action: RegistrationAction,
    lifetime_seconds: u32,
    flags: u32,
) -> Result<()> {
    let prefix = Name::from_uri(&prefix);
    let entry = ForwardingEntry {
        action,
        prefix: prefix.clone(),
        publisher_key_digest: None,
        face_id: None,
        flags,
        lifetime_seconds,
    };

    info!("sending {} entry for {} to {}", action.as_str(), prefix, server);
    let mut stream = TcpStream::connect(server.as_str()).await.with_context(|| format!("connecting to {}", server))?;
    let encoded = packet::encode_forwarding_entry(&entry);
    let len = (encoded.len() as u32).to_be_bytes();
    stream.write_all(&len).await?;
    stream.write_all(&encoded).await?;
    stream.flush().await?;

    let mut len_buf = [0u8; 4];
    if stream.read_exact(&mut len_buf).await.is_err() {
        bail!("connection closed before the forwarder acknowledged the entry");
    }
    let reply_len = u32::from_be_bytes(len_buf) as usize;
    if reply_len == 0 || reply_len > MAX_FRAME_LEN {
        bail!("forwarder sent an invalid acknowledgement frame");
    }
    let mut body = vec![0u8; reply_len];
    stream.read_exact(&mut body).await?;
    let (ack, _, _) = packet::parse_content_object(&body).context("malformed acknowledgement")?;
    let (effective, _) = packet::parse_forwarding_entry(&ack.content).context("malformed acknowledgement payload")?;

    println!(
        "{} {} -> face {:?} (lifetime {}s)",
        effective.action.as_str(),
        effective.prefix,
        effective.face_id,
        effective.lifetime_seconds
    );
    Ok(())
}
