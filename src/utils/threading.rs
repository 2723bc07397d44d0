use crate::error::ReadError;
use crate::read::Read;
use crate::record::AlignmentRecord;
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use log::debug;
use std::thread;

type Outcome<R> = (usize, Result<Read<R>, ReadError>);

/// Worker threads that validate records into [`Read`]s.
///
/// Records are tagged with their submission index so results come back in
/// input order regardless of which worker handled them.
pub struct ReadPool<R: AlignmentRecord + Send + 'static> {
    handles: Vec<thread::JoinHandle<usize>>,
    tx: Sender<(usize, R)>,
    results: Receiver<Outcome<R>>,
    submitted: usize,
    num_threads: usize,
}

impl<R: AlignmentRecord + Send + 'static> ReadPool<R> {
    pub fn new(num_threads: usize) -> Self {
        let num_threads = num_threads.max(1);
        let (tx, rx) = bounded::<(usize, R)>(num_threads * 2);
        let (result_tx, results) = unbounded();
        let mut handles = Vec::with_capacity(num_threads);

        for _ in 0..num_threads {
            let rx = rx.clone();
            let result_tx = result_tx.clone();
            let handle = thread::spawn(move || {
                let mut processed = 0;
                while let Ok((index, record)) = rx.recv() {
                    if result_tx.send((index, Read::new(record))).is_err() {
                        break;
                    }
                    processed += 1;
                }
                processed
            });
            handles.push(handle);
        }

        ReadPool {
            handles,
            tx,
            results,
            submitted: 0,
            num_threads,
        }
    }

    pub fn send(&mut self, record: R) {
        // Workers only hang up after `tx` is dropped in `finish`.
        if self.tx.send((self.submitted, record)).is_ok() {
            self.submitted += 1;
        }
    }

    /// Waits for the workers and returns one result per submitted record,
    /// in submission order.
    pub fn finish(self) -> Vec<Result<Read<R>, ReadError>> {
        drop(self.tx);

        for (idx, handle) in self.handles.into_iter().enumerate() {
            match handle.join() {
                Ok(processed) => debug!(
                    "Worker {} of {} validated {} records",
                    idx + 1,
                    self.num_threads,
                    processed
                ),
                Err(panic) => std::panic::resume_unwind(panic),
            }
        }

        let mut slots: Vec<Option<Result<Read<R>, ReadError>>> =
            (0..self.submitted).map(|_| None).collect();
        for (index, outcome) in self.results.try_iter() {
            slots[index] = Some(outcome);
        }
        slots.into_iter().flatten().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RawRead;

    #[test]
    fn test_pool_preserves_order() {
        let mut pool = ReadPool::new(3);
        for i in 0..50 {
            pool.send(RawRead::unaligned(&format!("read{}", i), "ACGT", &[30; 4]));
        }
        let results = pool.finish();
        assert_eq!(results.len(), 50);
        for (i, result) in results.iter().enumerate() {
            assert_eq!(result.as_ref().unwrap().name(), format!("read{}", i));
        }
    }

    #[test]
    fn test_pool_reports_failures_in_place() {
        let mut pool = ReadPool::new(2);
        pool.send(RawRead::unaligned("ok", "ACGT", &[30; 4]));
        pool.send(RawRead::unaligned("bad", "ACGT", &[30; 3]));
        let results = pool.finish();
        assert!(results[0].is_ok());
        assert!(matches!(
            &results[1],
            Err(ReadError::InvalidRead { name, .. }) if name == "bad"
        ));
    }
}
