//! `ccnd get`: sends an Interest to a running forwarder and writes the
//! first matching Content Object's payload to stdout. Exit code 0 on a
//! match, 1 otherwise (§6).

use anyhow::{bail, Context, Result};
use bytes::Bytes;
use ccnd_common::name::Name;
use ccnd_common::packet::{self, Interest};
use log::info;
use std::io::Write;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

const MAX_FRAME_LEN: usize = 1 << 20;

pub async fn run(name: String, server: String, timeout_ms: u64) -> Result<()> {
    let name = Name::from_uri(&name);
    let interest = Interest::new(name.clone()).with_nonce(random_nonce());

    info!("connecting to {}", server);
    let mut stream = TcpStream::connect(server.as_str()).await.with_context(|| format!("connecting to {}", server))?;
    write_frame(&mut stream, &packet::encode_interest(&interest)).await?;

    match timeout(Duration::from_millis(timeout_ms), read_frame(&mut stream)).await {
        Ok(Ok(Some(bytes))) => {
            let (co, _, _) = packet::parse_content_object(&bytes).context("malformed Content Object reply")?;
            std::io::stdout().write_all(&co.content)?;
            Ok(())
        }
        Ok(Ok(None)) => bail!("connection closed before a reply arrived for {}", name),
        Ok(Err(e)) => Err(e).context("reading reply"),
        Err(_) => bail!("timed out after {}ms waiting for {}", timeout_ms, name),
    }
}

fn random_nonce() -> Bytes {
    let stamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;
    Bytes::copy_from_slice(&stamp.to_be_bytes())
}

async fn write_frame(stream: &mut TcpStream, body: &[u8]) -> Result<()> {
    let len = (body.len() as u32).to_be_bytes();
    stream.write_all(&len).await?;
    stream.write_all(body).await?;
    stream.flush().await?;
    Ok(())
}

async fn read_frame(stream: &mut TcpStream) -> std::io::Result<Option<Bytes>> {
    let mut len_buf = [0u8; 4];
    if stream.read_exact(&mut len_buf).await.is_err() {
        return Ok(None);
    }
    let len = u32::from_be_bytes(len_buf) as usize;
    if len == 0 || len > MAX_FRAME_LEN {
        return Ok(None);
    }
    let mut body = vec![0u8; len];
    stream.read_exact(&mut body).await?;
    Ok(Some(Bytes::from(body)))
}
