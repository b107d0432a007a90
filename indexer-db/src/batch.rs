use crate::error::QueryResult;

/// Splits `rows` into chunks of at most `batch_size` and hands each chunk to
/// `insert_chunk`, summing the number of rows actually inserted. Each
/// per-table `insert_*` function in [`crate::messages`] and
/// [`crate::onchain`] uses this so that a single oversized batch from the
/// backfill worker or the event processor never turns into one giant SQL
/// statement.
pub fn insert_in_batches<T, F>(rows: Vec<T>, batch_size: usize, mut insert_chunk: F) -> QueryResult<usize>
where
    F: FnMut(&[T]) -> QueryResult<usize>,
{
    let mut total = 0;
    for chunk in rows.chunks(batch_size.max(1)) {
        total += insert_chunk(chunk)?;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_into_expected_chunk_sizes() {
        let rows: Vec<i32> = (0..250).collect();
        let mut seen_chunk_sizes = Vec::new();

        let total = insert_in_batches(rows, 100, |chunk| {
            seen_chunk_sizes.push(chunk.len());
            Ok(chunk.len())
        })
        .unwrap();

        assert_eq!(total, 250);
        assert_eq!(seen_chunk_sizes, vec![100, 100, 50]);
    }

    #[test]
    fn empty_input_performs_no_inserts() {
        let rows: Vec<i32> = Vec::new();
        let mut calls = 0;

        let total = insert_in_batches(rows, 100, |_chunk| {
            calls += 1;
            Ok(0)
        })
        .unwrap();

        assert_eq!(total, 0);
        assert_eq!(calls, 0);
    }
}
