//! Parallel batch processing
//!
//! Images are handed to a fixed pool of scoped worker threads over a
//! channel. Each image succeeds or fails on its own; results come back in
//! input order.

use std::path::{Path, PathBuf};

use crossbeam_channel::unbounded;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::vision::pipeline::{InvoiceReport, OcrPipeline};
use crate::vision::preprocess::decode_image_file;

/// Outcome for one image of a batch
#[derive(Debug)]
pub struct BatchItem {
    pub path: PathBuf,
    pub result: Result<InvoiceReport>,
}

/// Extract invoice fields from every image using `workers` threads
pub fn run_batch(pipeline: &OcrPipeline, paths: &[PathBuf], workers: usize) -> Vec<BatchItem> {
    let workers = workers.clamp(1, paths.len().max(1));
    info!("Processing {} images on {} workers", paths.len(), workers);

    let (job_tx, job_rx) = unbounded::<(usize, &Path)>();
    let (result_tx, result_rx) = unbounded::<(usize, Result<InvoiceReport>)>();

    for (index, path) in paths.iter().enumerate() {
        // Receiver is alive until the scope below ends
        let _ = job_tx.send((index, path.as_path()));
    }
    drop(job_tx);

    std::thread::scope(|scope| {
        for worker in 0..workers {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            scope.spawn(move || {
                for (index, path) in job_rx.iter() {
                    debug!("Worker {} processing {:?}", worker, path);
                    let result = decode_image_file(path).and_then(|image| pipeline.extract_invoice(&image));
                    if let Err(e) = &result {
                        warn!("Failed to process {:?}: {}", path, e);
                    }
                    if result_tx.send((index, result)).is_err() {
                        break;
                    }
                }
            });
        }
    });
    drop(result_tx);

    let mut results: Vec<Option<Result<InvoiceReport>>> = paths.iter().map(|_| None).collect();
    for (index, result) in result_rx.iter() {
        results[index] = Some(result);
    }

    paths
        .iter()
        .zip(results)
        .filter_map(|(path, result)| {
            result.map(|result| BatchItem {
                path: path.clone(),
                result,
            })
        })
        .collect()
}
