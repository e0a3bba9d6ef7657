use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};

use super::document::{Document, DocumentResult};
use super::stats::BatchSummary;
use super::Pipeline;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchOutput {
    /// Completed documents keyed by id. Never holds a half-built result.
    pub results: BTreeMap<String, DocumentResult>,
    pub summary: BatchSummary,
    pub cancelled: bool,
}

impl Pipeline {
    /// Processes every document, at most `concurrency` at a time.
    pub async fn process_all(&self, documents: Vec<Document>) -> BatchOutput {
        self.process_batch(documents, std::future::pending()).await
    }

    /// Like [`Pipeline::process_all`], but stops collecting once `cancel`
    /// resolves. Documents still in flight at that point are abandoned.
    pub async fn process_batch<F>(&self, documents: Vec<Document>, cancel: F) -> BatchOutput
    where
        F: Future<Output = ()>,
    {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        // Room for every document, so a finished task never waits to send.
        let (tx, mut rx) = mpsc::channel::<(String, DocumentResult)>(documents.len().max(1));

        let mut seen = HashSet::new();
        let mut handles = Vec::with_capacity(documents.len());

        for document in documents {
            if !seen.insert(document.id.clone()) {
                tracing::warn!(document = %document.id, "Skipping duplicate document id");
                continue;
            }

            let pipeline = self.clone();
            let semaphore = semaphore.clone();
            let tx = tx.clone();

            handles.push(tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return;
                };
                let result = pipeline.process(&document).await;
                // The receiver is closed only after cancellation.
                let _ = tx.send((document.id, result)).await;
            }));
        }
        drop(tx);

        let total = handles.len();
        let mut output = BatchOutput::default();
        tokio::pin!(cancel);

        loop {
            tokio::select! {
                received = rx.recv() => match received {
                    Some((id, result)) => {
                        output.summary.record(&result.statistics);
                        output.results.insert(id, result);
                    }
                    None => break,
                },
                () = &mut cancel => {
                    output.cancelled = true;
                    rx.close();
                    for handle in &handles {
                        handle.abort();
                    }
                    // Documents that finished before the cancel are kept.
                    while let Ok((id, result)) = rx.try_recv() {
                        output.summary.record(&result.statistics);
                        output.results.insert(id, result);
                    }
                    tracing::warn!(
                        completed = output.results.len(),
                        abandoned = total - output.results.len(),
                        "Batch cancelled"
                    );
                    break;
                }
            }
        }

        tracing::info!(
            documents = output.summary.documents,
            partial = output.summary.partial,
            failed = output.summary.failed,
            "Batch finished"
        );

        output
    }
}
