use crate::errors::{DocrefError, DocrefResult, ErrorKind};

/// Spawn a detached task on a new thread.
/// This avoids global thread pool contention that can occur in parallel test runs.
pub fn async_task<OP>(op: OP)
where
    OP: FnOnce() + Send + 'static,
{
    std::thread::spawn(op);
}

/// Runs every task concurrently and waits for all of them.
///
/// Results come back in task order. When several tasks fail, the error of the
/// earliest failing task is returned, but only after every task has finished.
/// Zero or one task runs inline on the calling thread.
pub fn join_all<T, F>(tasks: Vec<F>) -> DocrefResult<Vec<T>>
where
    T: Send,
    F: FnOnce() -> DocrefResult<T> + Send,
{
    if tasks.len() <= 1 {
        return tasks.into_iter().map(|task| task()).collect();
    }

    let results: Vec<DocrefResult<T>> = std::thread::scope(|s| {
        let handles: Vec<_> = tasks.into_iter().map(|task| s.spawn(task)).collect();

        handles
            .into_iter()
            .map(|h| match h.join() {
                Ok(result) => result,
                Err(_) => {
                    log::error!("A concurrent task panicked");
                    Err(DocrefError::new(
                        "A concurrent task panicked",
                        ErrorKind::InternalError,
                    ))
                }
            })
            .collect()
    });

    results.into_iter().collect()
}

/// Applies `op` to every item, splitting large inputs into one chunk per
/// available core. Output order matches input order.
pub fn map_chunked<I, T, F>(items: &[I], min_parallel: usize, op: F) -> DocrefResult<Vec<T>>
where
    I: Sync,
    T: Send,
    F: Fn(&I) -> DocrefResult<T> + Sync,
{
    if items.len() <= min_parallel {
        return items.iter().map(&op).collect();
    }

    let num_threads = std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(4)
        .min(items.len());
    let chunk_size = items.len().div_ceil(num_threads);

    let op = &op;
    let tasks: Vec<_> = items
        .chunks(chunk_size)
        .map(|chunk| move || chunk.iter().map(op).collect::<DocrefResult<Vec<T>>>())
        .collect();

    let chunks = join_all(tasks)?;
    Ok(chunks.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;
    use test_retry::retry;

    #[test]
    #[retry]
    fn test_async_task() {
        let flag = Arc::new(AtomicBool::new(false));
        let flag_clone = Arc::clone(&flag);
        async_task(move || {
            flag_clone.store(true, Ordering::Relaxed);
        });

        awaitility::at_most(Duration::from_millis(500)).until(|| flag.load(Ordering::Relaxed));
    }

    #[test]
    fn test_join_all_empty() {
        let tasks: Vec<fn() -> DocrefResult<i32>> = vec![];
        let result = join_all(tasks).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_join_all_keeps_order() {
        let tasks: Vec<_> = (0..8)
            .map(|i| {
                move || {
                    thread::sleep(Duration::from_millis(((8 - i) * 5) as u64));
                    Ok(i)
                }
            })
            .collect();
        let result = join_all(tasks).unwrap();
        assert_eq!(result, (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn test_join_all_waits_for_all_before_failing() {
        let finished = AtomicUsize::new(0);
        let finished_ref = &finished;
        let tasks: Vec<Box<dyn FnOnce() -> DocrefResult<i32> + Send + '_>> = vec![
            Box::new(move || {
                Err(DocrefError::new("first", ErrorKind::UpstreamFetchFailed))
            }),
            Box::new(move || {
                thread::sleep(Duration::from_millis(50));
                finished_ref.fetch_add(1, Ordering::SeqCst);
                Ok(1)
            }),
            Box::new(move || Err(DocrefError::new("third", ErrorKind::BackendError))),
        ];

        let err = join_all(tasks).unwrap_err();
        assert_eq!(err.message(), "first");
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_join_all_runs_concurrently() {
        let tasks: Vec<_> = (0..4)
            .map(|_| {
                || {
                    thread::sleep(Duration::from_millis(100));
                    Ok(())
                }
            })
            .collect();
        let start = std::time::Instant::now();
        join_all(tasks).unwrap();
        assert!(start.elapsed() < Duration::from_millis(350));
    }

    #[test]
    fn test_map_chunked_small_input_sequential() {
        let items = vec![1, 2, 3];
        let doubled = map_chunked(&items, 10, |i| Ok(i * 2)).unwrap();
        assert_eq!(doubled, vec![2, 4, 6]);
    }

    #[test]
    fn test_map_chunked_large_input_keeps_order() {
        let items: Vec<usize> = (0..500).collect();
        let doubled = map_chunked(&items, 10, |i| Ok(i * 2)).unwrap();
        assert_eq!(doubled, (0..500).map(|i| i * 2).collect::<Vec<_>>());
    }

    #[test]
    fn test_map_chunked_propagates_error() {
        let items: Vec<usize> = (0..200).collect();
        let result = map_chunked(&items, 10, |i| {
            if *i == 150 {
                Err(DocrefError::new("bad item", ErrorKind::InvalidDataType))
            } else {
                Ok(*i)
            }
        });
        assert_eq!(result.unwrap_err().kind(), &ErrorKind::InvalidDataType);
    }
}
