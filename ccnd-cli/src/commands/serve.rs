//! `ccnd serve`: runs the forwarder event loop and, if requested, a
//! repository worker alongside it (§5: forwarder on the single-threaded
//! reactor, repository on its own task talking back over local-IPC).

use anyhow::Result;
use ccnd_common::metrics::ForwarderMetrics;
use ccnd_common::name::Name;
use ccnd_core::Forwarder;
use ccnd_transport::FaceManager;
use ccnr::RepositoryEngine;
use log::info;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config;

pub async fn run(local_ipc_path: PathBuf, with_repository: bool) -> Result<()> {
    let daemon_cfg = config::load_daemon_config()?;
    let metrics = Arc::new(ForwarderMetrics::new());
    let (forwarder, commands) = Forwarder::new(metrics);
    let forwarder_handle = tokio::spawn(forwarder.run());

    let faces = FaceManager::new(commands);
    let tcp_addr = format!("0.0.0.0:{}", daemon_cfg.local_port);
    faces.listen_tcp(&tcp_addr).await?;
    faces.listen_unix(&local_ipc_path).await?;
    info!("ccnd listening on tcp {} and unix {}", tcp_addr, local_ipc_path.display());

    let worker_handle = if with_repository {
        let repo_cfg = config::load_repository_config()?;
        log::set_max_level(repo_cfg.debug);
        let local_name = Name::from_uri("ccnx:/ccnr/local");
        let global_prefix = Name::from_uri(&repo_cfg.global_prefix);
        let engine = RepositoryEngine::open(repo_cfg.directory, local_name.clone(), global_prefix.clone())?;
        let ipc_path = local_ipc_path.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = ccnr::run_worker(engine, &ipc_path, &[global_prefix, local_name]).await {
                log::error!("repository worker exited: {}", e);
            }
        }))
    } else {
        None
    };

    forwarder_handle.await?;
    if let Some(handle) = worker_handle {
        handle.abort();
    }
    Ok(())
}
