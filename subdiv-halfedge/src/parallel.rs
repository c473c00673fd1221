//! Fork-join primitives used by the half-edge construction passes.
//!
//! All passes fan out over fixed-size index ranges. Every task writes only to
//! the slice it was handed, so the helpers here are built around carving a
//! mutable slice into disjoint pieces up front and then running one task per
//! piece.
//!
//! With the `rayon` feature the tasks run on the global `rayon` pool,
//! otherwise they run in order on the calling thread. Results are identical
//! either way.
use std::ops::Range;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Default number of items handled by one task.
pub const DEFAULT_BLOCK_SIZE: usize = 4096;

/// Runs `f` once per task.
pub fn for_each_task<I, F>(tasks: Vec<I>, f: F)
where
    I: Send,
    F: Fn(I) + Send + Sync,
{
    #[cfg(feature = "rayon")]
    tasks.into_par_iter().for_each(f);

    #[cfg(not(feature = "rayon"))]
    tasks.into_iter().for_each(f);
}

/// Runs `f` once per task and returns the results in task order.
pub fn map_tasks<I, R, F>(tasks: Vec<I>, f: F) -> Vec<R>
where
    I: Send,
    R: Send,
    F: Fn(I) -> R + Send + Sync,
{
    #[cfg(feature = "rayon")]
    return tasks.into_par_iter().map(f).collect();

    #[cfg(not(feature = "rayon"))]
    return tasks.into_iter().map(f).collect();
}

/// Splits `range` into consecutive blocks of at most `block_size` items.
pub fn blocks(range: Range<usize>, block_size: usize) -> Vec<Range<usize>> {
    let block_size = block_size.max(1);
    let mut out = Vec::with_capacity(range.len().div_ceil(block_size));
    let mut begin = range.start;
    while begin < range.end {
        let end = (begin + block_size).min(range.end);
        out.push(begin..end);
        begin = end;
    }
    out
}

/// Evaluates `f` for every index in `0..len`, preserving order.
pub fn parallel_map<R, F>(len: usize, block_size: usize, f: F) -> Vec<R>
where
    R: Send,
    F: Fn(usize) -> R + Send + Sync,
{
    let parts = map_tasks(blocks(0..len, block_size), |r| r.map(&f).collect::<Vec<_>>());
    let mut out = Vec::with_capacity(len);
    for part in parts {
        out.extend(part);
    }
    out
}

/// Carves `slice` into consecutive, disjoint pieces of the given lengths.
///
/// The lengths must not add up to more than `slice.len()`; any remainder is
/// dropped.
pub fn split_lengths_mut<'a, T>(
    slice: &'a mut [T],
    lengths: impl IntoIterator<Item = usize>,
) -> Vec<&'a mut [T]> {
    let mut rest = slice;
    let mut out = Vec::new();
    for len in lengths {
        let (head, tail) = std::mem::take(&mut rest).split_at_mut(len);
        out.push(head);
        rest = tail;
    }
    out
}

/// Writes the exclusive prefix sum of `input` into `output` and returns the
/// total.
///
/// Block sums are computed in parallel, scanned serially, then every block
/// is filled in parallel from its starting offset.
pub fn exclusive_prefix_sum(input: &[u32], output: &mut Vec<u32>, block_size: usize) -> usize {
    let block_size = block_size.max(1);
    output.clear();
    output.resize(input.len(), 0);

    let sums = map_tasks(input.chunks(block_size).collect(), |chunk| {
        chunk.iter().map(|&v| v as usize).sum::<usize>()
    });

    let mut offsets = Vec::with_capacity(sums.len());
    let mut total = 0usize;
    for sum in sums {
        offsets.push(total);
        total += sum;
    }

    let tasks: Vec<_> = input
        .chunks(block_size)
        .zip(output.chunks_mut(block_size))
        .zip(offsets)
        .collect();
    for_each_task(tasks, |((src, dst), offset)| {
        let mut acc = offset;
        for (s, d) in src.iter().zip(dst.iter_mut()) {
            *d = acc as u32;
            acc += *s as usize;
        }
    });

    total
}

/// Items sortable by [`radix_sort_u64`].
pub trait RadixKey {
    fn radix_key(&self) -> u64;
}

impl RadixKey for u64 {
    #[inline]
    fn radix_key(&self) -> u64 {
        *self
    }
}

const RADIX_BITS: usize = 8;
const RADIX_BUCKETS: usize = 1 << RADIX_BITS;

/// Stable least-significant-digit radix sort over 64-bit keys.
///
/// `aux` must hold at least `data.len()` items; it is used as the ping-pong
/// target of every pass. The sorted result always ends up in `data`.
///
/// Each pass counts digits per block in parallel, carves the output into one
/// contiguous piece per (digit, block) pair and scatters every block into
/// its own pieces in parallel. Passes in which all keys share a digit are
/// skipped.
pub fn radix_sort_u64<T>(data: &mut [T], aux: &mut [T], block_size: usize)
where
    T: RadixKey + Copy + Send + Sync,
{
    let len = data.len();
    if len <= 1 {
        return;
    }
    assert!(
        aux.len() >= len,
        "radix sort scratch buffer too small ({} < {})",
        aux.len(),
        len
    );
    let block_size = block_size.max(1);
    let aux = &mut aux[..len];

    let mut sorted_in_data = true;
    for pass in 0..(64 / RADIX_BITS) {
        let shift = pass * RADIX_BITS;
        let (src, dst): (&[T], &mut [T]) = if sorted_in_data {
            (&*data, &mut *aux)
        } else {
            (&*aux, &mut *data)
        };

        let histograms: Vec<[usize; RADIX_BUCKETS]> =
            map_tasks(src.chunks(block_size).collect(), |chunk| {
                let mut counts = [0usize; RADIX_BUCKETS];
                for item in chunk {
                    counts[digit(item.radix_key(), shift)] += 1;
                }
                counts
            });

        let mut totals = [0usize; RADIX_BUCKETS];
        for histogram in &histograms {
            for (total, count) in totals.iter_mut().zip(histogram.iter()) {
                *total += count;
            }
        }
        if totals.iter().any(|&count| count == len) {
            continue;
        }

        let mut targets: Vec<Vec<&mut [T]>> = (0..histograms.len())
            .map(|_| Vec::with_capacity(RADIX_BUCKETS))
            .collect();
        let mut rest = dst;
        for d in 0..RADIX_BUCKETS {
            for (block, histogram) in histograms.iter().enumerate() {
                let (head, tail) = std::mem::take(&mut rest).split_at_mut(histogram[d]);
                targets[block].push(head);
                rest = tail;
            }
        }

        let tasks: Vec<_> = src.chunks(block_size).zip(targets).collect();
        for_each_task(tasks, |(chunk, mut buckets)| {
            let mut cursor = [0usize; RADIX_BUCKETS];
            for item in chunk {
                let d = digit(item.radix_key(), shift);
                buckets[d][cursor[d]] = *item;
                cursor[d] += 1;
            }
        });

        sorted_in_data = !sorted_in_data;
    }

    if !sorted_in_data {
        data.copy_from_slice(aux);
    }
}

#[inline]
fn digit(key: u64, shift: usize) -> usize {
    ((key >> shift) as usize) & (RADIX_BUCKETS - 1)
}
