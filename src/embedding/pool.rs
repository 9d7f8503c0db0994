//! Bounded worker pool for large-batch embedding computation.
//!
//! An explicit task-queue: chunk jobs go into a crossbeam channel, a
//! bounded set of scoped worker threads drains it, and results are
//! merged back in chunk order. Chunks may finish out of order; the
//! ordered merge restores input order before the caller sees anything.

use crossbeam_channel::unbounded;
use tracing::debug;

/// Default worker bound: leave one core for the calling task.
#[must_use]
pub fn default_worker_count() -> usize {
    num_cpus::get().saturating_sub(1).max(1)
}

/// One unit of pooled work: a contiguous slice of the batch, tagged
/// with its position so results can be reassembled in order.
#[derive(Debug)]
pub struct ChunkJob {
    pub ordinal: usize,
    pub texts: Vec<String>,
}

/// Splits `texts` into chunk jobs of at most `chunk_size` items.
#[must_use]
pub fn make_chunks(texts: &[String], chunk_size: usize) -> Vec<ChunkJob> {
    let chunk_size = chunk_size.max(1);
    texts
        .chunks(chunk_size)
        .enumerate()
        .map(|(ordinal, chunk)| ChunkJob {
            ordinal,
            texts: chunk.to_vec(),
        })
        .collect()
}

/// Runs `worker_fn` over every chunk with at most `workers` threads and
/// returns the per-item results concatenated in original input order.
///
/// `worker_fn` must be infallible; callers fold their failure handling
/// (backend degradation to fallback) into the closure so the pool never
/// has to reason about errors.
pub fn run_chunked<F>(chunks: Vec<ChunkJob>, workers: usize, worker_fn: F) -> Vec<Vec<f32>>
where
    F: Fn(&[String]) -> Vec<Vec<f32>> + Send + Sync,
{
    if chunks.is_empty() {
        return Vec::new();
    }

    let workers = workers.max(1).min(chunks.len());
    let total_chunks = chunks.len();
    debug!(total_chunks, workers, "fanning out embedding batch");

    let (job_tx, job_rx) = unbounded::<ChunkJob>();
    let (result_tx, result_rx) = unbounded::<(usize, Vec<Vec<f32>>)>();

    for job in chunks {
        // Receiver outlives all sends; an unbounded channel cannot refuse.
        let _ = job_tx.send(job);
    }
    drop(job_tx);

    std::thread::scope(|scope| {
        for _ in 0..workers {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            let worker_fn = &worker_fn;
            scope.spawn(move || {
                while let Ok(job) = job_rx.recv() {
                    let vectors = worker_fn(&job.texts);
                    let _ = result_tx.send((job.ordinal, vectors));
                }
            });
        }
    });
    drop(result_tx);

    // Ordered merge: chunks complete in any order, output must not.
    let mut completed: Vec<(usize, Vec<Vec<f32>>)> = result_rx.iter().collect();
    completed.sort_by_key(|(ordinal, _)| *ordinal);

    let mut merged = Vec::new();
    for (_, vectors) in completed {
        merged.extend(vectors);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_chunks_covers_all_items() {
        let texts: Vec<String> = (0..10).map(|i| format!("text {i}")).collect();
        let chunks = make_chunks(&texts, 3);
        assert_eq!(chunks.len(), 4);
        let total: usize = chunks.iter().map(|c| c.texts.len()).sum();
        assert_eq!(total, 10);
        assert_eq!(chunks[3].texts.len(), 1);
    }

    #[test]
    fn test_run_chunked_preserves_order() {
        let texts: Vec<String> = (0..50).map(|i| format!("{i}")).collect();
        let chunks = make_chunks(&texts, 4);

        // Each "vector" encodes its input so order is checkable.
        let results = run_chunked(chunks, 4, |chunk| {
            chunk
                .iter()
                .map(|t| vec![t.parse::<f32>().unwrap()])
                .collect()
        });

        assert_eq!(results.len(), 50);
        for (i, vector) in results.iter().enumerate() {
            assert_eq!(vector[0], i as f32);
        }
    }

    #[test]
    fn test_run_chunked_single_worker() {
        let texts: Vec<String> = (0..5).map(|i| format!("{i}")).collect();
        let chunks = make_chunks(&texts, 2);
        let results = run_chunked(chunks, 1, |chunk| {
            chunk.iter().map(|_| vec![1.0]).collect()
        });
        assert_eq!(results.len(), 5);
    }

    #[test]
    fn test_run_chunked_empty() {
        let results = run_chunked(Vec::new(), 4, |_| Vec::new());
        assert!(results.is_empty());
    }

    #[test]
    fn test_default_worker_count_is_positive() {
        assert!(default_worker_count() >= 1);
    }
}
