//! `ccnd repo`: local administration of a repository's `policy.xml` without
//! needing the daemon to be running (§4.9, §6).

use anyhow::{Context, Result};
use ccnr::Policy;
use std::path::PathBuf;

pub async fn set_policy(data_dir: PathBuf, xml_file: PathBuf) -> Result<()> {
    std::fs::create_dir_all(&data_dir)?;
    let policy_path = data_dir.join("policy.xml");

    let xml = std::fs::read_to_string(&xml_file).with_context(|| format!("reading {}", xml_file.display()))?;
    let update = Policy::from_xml_str(&xml).context("parsing policy update")?;

    let mut current = Policy::load(&policy_path)
        .unwrap_or_else(|_| Policy::empty(update.local_name.clone(), update.global_prefix.clone()));
    current.apply_update(update, &policy_path).context("applying policy update")?;

    println!("policy.xml updated to version {}", current.version);
    Ok(())
}

pub async fn show_policy(data_dir: PathBuf) -> Result<()> {
    let policy_path = data_dir.join("policy.xml");
    let policy = Policy::load(&policy_path).with_context(|| format!("reading {}", policy_path.display()))?;

    println!("version: {}", policy.version);
    println!("local name: {}", policy.local_name);
    println!("global prefix: {}", policy.global_prefix);
    for prefix in &policy.allowed_prefixes {
        println!("namespace: {}", prefix);
    }
    Ok(())
}
