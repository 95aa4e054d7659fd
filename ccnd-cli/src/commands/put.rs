//! `ccnd put`: publishes one signed Content Object, read from stdin, under
//! the given name (§6). Exit code 0 on success, 1 on any error.

use anyhow::{Context, Result};
use ccnd_common::name::Name;
use ccnd_common::packet::{self, ContentObject, ContentType, SignedInfo};
use log::info;
use std::io::Read;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

pub async fn run(name: String, server: String) -> Result<()> {
    let name = Name::from_uri(&name);

    let mut content = Vec::new();
    std::io::stdin().read_to_end(&mut content).context("reading content from stdin")?;

    let co = ContentObject::new_signed(name.clone(), SignedInfo::new(ContentType::Data), content);
    info!("publishing {} ({} bytes) to {}", name, co.content.len(), server);

    let mut stream = TcpStream::connect(server.as_str()).await.with_context(|| format!("connecting to {}", server))?;
    let encoded = packet::encode_content_object(&co);
    let len = (encoded.len() as u32).to_be_bytes();
    stream.write_all(&len).await?;
    stream.write_all(&encoded).await?;
    stream.flush().await?;

    println!("published {}", name);
    Ok(())
}
