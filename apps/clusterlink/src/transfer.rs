//! `clusterlink transfer`: one copy between object store, filesystem and web.

use std::fmt;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{error, info};

use clusterlink_protocol::constants::{DONE_MESSAGE, ERROR_PREFIX};
use clusterlink_report::{CoordinatorClient, OpStatusSink, ProgressReporter, ProgressSink, StdoutSink};
use clusterlink_storage::{GsutilStore, HttpSource, LocalFs, WebHdfs};
use clusterlink_transfer::{
    Backends, CopyOrchestrator, DistributedFs, TransferDescriptor, TransferError, TransferReport,
};

use crate::config::{Config, FsConfig, at_least_one_sec};

/// Connect and read timeout for web sources.
const WEB_TIMEOUT: Duration = Duration::from_secs(30);

/// Builds the storage backends described by the configuration.
pub fn backends(config: &Config) -> anyhow::Result<Backends> {
    let storage = &config.storage;
    let object_store =
        Arc::new(GsutilStore::new(storage.gsutil.clone()).with_args(storage.gsutil_args.clone()));

    let fs: Arc<dyn DistributedFs> = match &storage.fs {
        FsConfig::Webhdfs {
            url,
            user,
            timeout_secs,
        } => Arc::new(
            WebHdfs::new(url.clone(), user.clone(), at_least_one_sec(*timeout_secs))
                .with_context(|| format!("filesystem url {url}"))?,
        ),
        FsConfig::Local { root } => Arc::new(LocalFs::new(root.clone())),
    };

    let web = Arc::new(HttpSource::new(WEB_TIMEOUT)?);

    Ok(Backends {
        object_store,
        fs,
        web,
    })
}

/// Final status line for a finished transfer.
pub fn outcome_message<T, E: fmt::Display>(result: &Result<T, E>) -> String {
    match result {
        Ok(_) => DONE_MESSAGE.to_string(),
        Err(e) => format!("{ERROR_PREFIX}{e}"),
    }
}

/// Runs the transfer and reports its outcome.
///
/// With an operation id, progress and the final status go to the
/// coordinator. Without one, progress goes to stdout and failures to stderr.
/// Only a coordinator that can't be set up is returned as an error; every
/// later failure is reported like a failed copy.
pub async fn run(
    config: &Config,
    source: &str,
    destination: &str,
    operation: Option<&str>,
) -> anyhow::Result<ExitCode> {
    let coordinator = match operation {
        Some(op) => Some((
            Arc::new(CoordinatorClient::new(
                &config.coordinator.host,
                config.coordinator.port,
                config.coordinator.timeout(),
            )?),
            op,
        )),
        None => None,
    };
    execute(config, source, destination, coordinator).await
}

async fn execute(
    config: &Config,
    source: &str,
    destination: &str,
    coordinator: Option<(Arc<CoordinatorClient>, &str)>,
) -> anyhow::Result<ExitCode> {
    let result = match copy(config, source, destination, coordinator.as_ref()).await {
        Ok(copied) => copied.map_err(|e| e.to_string()),
        Err(setup) => Err(format!("{setup:#}")),
    };

    match &result {
        Ok(report) => info!(files = report.files, bytes = report.bytes, "transfer finished"),
        Err(e) => error!(error = %e, "transfer failed"),
    }

    let message = outcome_message(&result);
    match coordinator {
        Some((client, op)) => client.send_op_status(op, &message).await?,
        None if result.is_err() => eprintln!("{message}"),
        None => {}
    }

    Ok(if result.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Sets up the backends and progress reporting, then copies.
///
/// The outer error is a setup failure, the inner one a failed copy.
async fn copy(
    config: &Config,
    source: &str,
    destination: &str,
    coordinator: Option<&(Arc<CoordinatorClient>, &str)>,
) -> anyhow::Result<Result<TransferReport, TransferError>> {
    let backends = backends(config)?;

    let sink: Arc<dyn ProgressSink> = match coordinator {
        Some((client, op)) => Arc::new(OpStatusSink::new(client.clone(), *op)),
        None => Arc::new(StdoutSink),
    };

    let reporter = ProgressReporter::spawn(sink, config.transfer.progress_queue);
    let orchestrator = CopyOrchestrator::new(backends, config.transfer.copy_config());
    let descriptor = TransferDescriptor::parse(source, destination);

    let result = orchestrator.run(&descriptor, &reporter).await;
    reporter.close().await;
    Ok(result)
}
