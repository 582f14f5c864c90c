/// Groups an iterator into `Vec`s of at most `size` items.
pub struct Batcher<I: Iterator> {
    inner: I,
    size: usize,
}

/// Batch `iter` for bulk writes. A `size` of zero is treated as one.
pub fn batcher<I: IntoIterator>(iter: I, size: usize) -> Batcher<I::IntoIter> {
    Batcher {
        inner: iter.into_iter(),
        size: size.max(1),
    }
}

impl<I: Iterator> Iterator for Batcher<I> {
    type Item = Vec<I::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        let batch: Vec<I::Item> = self.inner.by_ref().take(self.size).collect();
        if batch.is_empty() { None } else { Some(batch) }
    }
}
