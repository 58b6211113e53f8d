//! Running many scans concurrently.
//!
//! Each scan gets its own independent poll loop. A semaphore bounds how many
//! loops are active at once so a batch stays within the backend's
//! per-endpoint rate limits.

use crate::core::{ClientError, CreateScanRequest, ScanMetadata};
use crate::scans::{CreatedScan, Scans, WaitOptions};

use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Outcome of one entry of a batch.
#[derive(Debug)]
pub struct BatchItem {
    /// Scan identifier, when one was created.
    pub scan_id: Option<String>,

    /// Final metadata or the error that ended this entry.
    pub result: Result<ScanMetadata, ClientError>,
}

impl BatchItem {
    /// Returns `true` if the entry ended with final metadata.
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

impl Scans<'_> {
    /// Waits for several scans at once, at most `concurrency` at a time.
    ///
    /// Results are returned in input order; one failing wait does not affect
    /// the others.
    pub async fn wait_for_all<S: AsRef<str>>(
        &self,
        scan_ids: &[S],
        options: WaitOptions,
        concurrency: usize,
    ) -> Vec<BatchItem> {
        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));

        let futures: Vec<_> = scan_ids
            .iter()
            .map(|scan_id| {
                let semaphore = Arc::clone(&semaphore);
                let options = options.clone();
                let scan_id = scan_id.as_ref();
                async move {
                    let result = match semaphore.acquire_owned().await {
                        Ok(_permit) => self.wait_for_completion(scan_id, options).await,
                        Err(_) => Err(ClientError::Cancelled),
                    };
                    BatchItem {
                        scan_id: Some(scan_id.to_string()),
                        result,
                    }
                }
            })
            .collect();

        let items = join_all(futures).await;
        log_summary("wait_for_all", &items);
        items
    }

    /// Creates and waits for several scans, at most `concurrency` at a time.
    ///
    /// A request that fans out into virtual scans is reported as a
    /// `Validation` error for that entry; wait for those IDs with
    /// [`wait_for_all`](Self::wait_for_all).
    pub async fn run_batch(
        &self,
        requests: Vec<CreateScanRequest>,
        options: WaitOptions,
        concurrency: usize,
    ) -> Vec<BatchItem> {
        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));

        let futures: Vec<_> = requests
            .into_iter()
            .map(|request| {
                let semaphore = Arc::clone(&semaphore);
                let options = options.clone();
                async move {
                    let Ok(_permit) = semaphore.acquire_owned().await else {
                        return BatchItem {
                            scan_id: None,
                            result: Err(ClientError::Cancelled),
                        };
                    };

                    let metadata = match self.create(request).await {
                        Ok(CreatedScan::Single(metadata)) => metadata,
                        Ok(CreatedScan::Virtual { scan_ids, .. }) => {
                            return BatchItem {
                                scan_id: None,
                                result: Err(ClientError::validation(format!(
                                    "request fanned out into {} virtual scans: {}",
                                    scan_ids.len(),
                                    scan_ids.join(", ")
                                ))),
                            };
                        }
                        Err(e) => {
                            return BatchItem {
                                scan_id: None,
                                result: Err(e),
                            }
                        }
                    };

                    let result = self.wait_for_completion(&metadata.scan_id, options).await;
                    BatchItem {
                        scan_id: Some(metadata.scan_id),
                        result,
                    }
                }
            })
            .collect();

        let items = join_all(futures).await;
        log_summary("run_batch", &items);
        items
    }
}

fn log_summary(operation: &str, items: &[BatchItem]) {
    let succeeded = items.iter().filter(|item| item.is_ok()).count();
    tracing::info!(
        operation = operation,
        total = items.len(),
        succeeded = succeeded,
        failed = items.len() - succeeded,
        "Batch finished"
    );
}
