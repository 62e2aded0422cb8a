//! `clusterlink monitor`: polls the cluster and reports to the coordinator.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use clusterlink_monitor::{ClusterPoller, RestClusterApi};
use clusterlink_report::{ClusterStatusSink, CoordinatorClient};

use crate::config::Config;

/// Polls until Ctrl-C.
pub async fn run(config: &Config) -> anyhow::Result<()> {
    let api = Arc::new(RestClusterApi::new(
        config.monitor.api_url.clone(),
        config.monitor.timeout(),
    )?);
    let client = Arc::new(CoordinatorClient::new(
        &config.coordinator.host,
        config.coordinator.port,
        config.coordinator.timeout(),
    )?);
    info!(cluster = api.base_url(), coordinator = client.base_url(), "monitoring cluster");

    let sink = Arc::new(ClusterStatusSink::new(client));
    let mut poller = ClusterPoller::new(api, sink, config.monitor.interval());

    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("interrupt received, stopping"),
            Err(e) => warn!(error = %e, "couldn't listen for interrupt, stopping"),
        }
        token.cancel();
    });

    poller.run(cancel).await;
    Ok(())
}
