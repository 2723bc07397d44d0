//! Conversions between raw records and validated reads for bulk processing.

use crate::error::ReadError;
use crate::read::Read;
use crate::record::AlignmentRecord;
use crate::utils::threading::ReadPool;

pub fn to_read<R: AlignmentRecord>(record: R) -> Result<Read<R>, ReadError> {
    Read::new(record)
}

pub fn to_record<R>(read: Read<R>) -> R
where
    R: AlignmentRecord,
{
    read.into_record()
}

/// Validates every record; the first invalid record fails the whole batch.
pub fn to_reads<R, I>(records: I) -> Result<Vec<Read<R>>, ReadError>
where
    R: AlignmentRecord,
    I: IntoIterator<Item = R>,
{
    records.into_iter().map(to_read).collect()
}

pub fn to_records<R, I>(reads: I) -> Vec<R>
where
    R: AlignmentRecord,
    I: IntoIterator<Item = Read<R>>,
{
    reads.into_iter().map(to_record).collect()
}

/// [`to_reads`] spread over `num_threads` workers. Output order matches
/// input order; any invalid record fails the whole batch.
pub fn to_reads_parallel<R, I>(records: I, num_threads: usize) -> Result<Vec<Read<R>>, ReadError>
where
    R: AlignmentRecord + Send + 'static,
    I: IntoIterator<Item = R>,
{
    if num_threads <= 1 {
        return to_reads(records);
    }

    let mut pool = ReadPool::new(num_threads);
    for record in records {
        pool.send(record);
    }
    pool.finish().into_iter().collect()
}
