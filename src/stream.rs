//! Stream-buffer prefetch unit: N FIFO streams of consecutive block
//! addresses, depth M each, true LRU across streams.

#[derive(Debug)]
pub struct StreamBuffers {
    streams: Vec<Stream>,
    depth: usize,
}

#[derive(Debug)]
pub(crate) struct Stream {
    pub(crate) valid: bool,
    pub(crate) rank: usize,
    pub(crate) blocks: Vec<u32>,
}

pub struct StbUpdate {
    pub hit: bool,
    /// Blocks brought into the buffer by this update.
    pub prefetched: u64,
}

impl StreamBuffers {
    pub fn new(count: usize, depth: usize) -> Self {
        assert!(count > 0 && depth > 0);
        StreamBuffers {
            streams: (0..count)
                .map(|rank| Stream {
                    valid: false,
                    rank,
                    blocks: Vec::with_capacity(depth),
                })
                .collect(),
            depth,
        }
    }

    /// Run the update protocol for one access to the owning cache.
    ///
    /// A hit anywhere refills the hit stream from one past the requested
    /// block and promotes it. A miss allocates the LRU stream, but only when
    /// the cache itself also missed.
    pub fn update(&mut self, cache_miss: bool, block: u32) -> StbUpdate {
        if let Some((hit, pos)) = self.probe(block) {
            self.refill(hit, block);
            self.promote(hit);
            StbUpdate {
                hit: true,
                prefetched: pos as u64 + 1,
            }
        } else if cache_miss {
            let lru_rank = self.streams.len() - 1;
            let lru = self
                .streams
                .iter()
                .position(|s| s.rank == lru_rank)
                .expect("no LRU stream");
            self.refill(lru, block);
            self.promote(lru);
            StbUpdate {
                hit: false,
                prefetched: self.depth as u64,
            }
        } else {
            StbUpdate {
                hit: false,
                prefetched: 0,
            }
        }
    }

    /// MRU-first scan of the valid streams for `block`; returns the stream
    /// index and the position of the match within its buffer.
    fn probe(&self, block: u32) -> Option<(usize, usize)> {
        let mut order: Vec<usize> = (0..self.streams.len()).collect();
        order.sort_by_key(|&i| self.streams[i].rank);
        for i in order {
            let stream = &self.streams[i];
            if !stream.valid {
                continue;
            }
            if let Some(pos) = stream.blocks.iter().position(|&b| b == block) {
                return Some((i, pos));
            }
        }
        None
    }

    fn refill(&mut self, idx: usize, block: u32) {
        let stream = &mut self.streams[idx];
        stream.blocks.clear();
        stream
            .blocks
            .extend((1..=self.depth as u32).map(|k| block.wrapping_add(k)));
        stream.valid = true;
        log::trace!("stream {idx}: refill from block {:x}", block.wrapping_add(1));
    }

    fn promote(&mut self, idx: usize) {
        let old_rank = self.streams[idx].rank;
        for (i, stream) in self.streams.iter_mut().enumerate() {
            if i != idx && stream.rank < old_rank {
                stream.rank += 1;
            }
        }
        self.streams[idx].rank = 0;
        debug_assert!(self.ranks_are_permutation());
    }

    fn ranks_are_permutation(&self) -> bool {
        let mut seen = vec![false; self.streams.len()];
        for s in &self.streams {
            if s.rank >= seen.len() || seen[s.rank] {
                return false;
            }
            seen[s.rank] = true;
        }
        true
    }

    #[cfg(test)]
    pub(crate) fn streams(&self) -> &[Stream] {
        &self.streams
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn by_rank(stb: &StreamBuffers) -> Vec<&Stream> {
        let mut v: Vec<&Stream> = stb.streams().iter().collect();
        v.sort_by_key(|s| s.rank);
        v
    }

    #[test]
    fn cold_miss_fills_lru_stream() {
        let mut stb = StreamBuffers::new(1, 4);
        let upd = stb.update(true, 0);
        assert!(!upd.hit);
        assert_eq!(upd.prefetched, 4);
        let mru = by_rank(&stb)[0];
        assert!(mru.valid);
        assert_eq!(mru.blocks, vec![1, 2, 3, 4]);
    }

    #[test]
    fn cache_hit_never_allocates() {
        let mut stb = StreamBuffers::new(2, 4);
        let upd = stb.update(false, 0);
        assert!(!upd.hit);
        assert_eq!(upd.prefetched, 0);
        assert!(stb.streams().iter().all(|s| !s.valid));
    }

    #[test]
    fn hit_refills_one_past_hit_block() {
        let mut stb = StreamBuffers::new(1, 4);
        stb.update(true, 0);
        // block 3 sits at position 2; the refill pays for entries 1..=3
        let upd = stb.update(true, 3);
        assert!(upd.hit);
        assert_eq!(upd.prefetched, 3);
        assert_eq!(by_rank(&stb)[0].blocks, vec![4, 5, 6, 7]);
    }

    #[test]
    fn hit_on_cache_hit_still_refills_and_promotes() {
        let mut stb = StreamBuffers::new(2, 2);
        stb.update(true, 0); // stream A: {1, 2}
        stb.update(true, 10); // stream B: {11, 12}, A now LRU
        let upd = stb.update(false, 1);
        assert!(upd.hit);
        assert_eq!(upd.prefetched, 1);
        let order = by_rank(&stb);
        assert_eq!(order[0].blocks, vec![2, 3]);
        assert_eq!(order[1].blocks, vec![11, 12]);
    }

    #[test]
    fn misses_rotate_through_lru_streams() {
        let mut stb = StreamBuffers::new(2, 2);
        stb.update(true, 0);
        stb.update(true, 64);
        let order = by_rank(&stb);
        assert_eq!(order[0].blocks, vec![65, 66]);
        assert_eq!(order[1].blocks, vec![1, 2]);
        // third allocation reclaims the oldest stream again
        stb.update(true, 200);
        let order = by_rank(&stb);
        assert_eq!(order[0].blocks, vec![201, 202]);
        assert_eq!(order[1].blocks, vec![65, 66]);
    }

    #[test]
    fn probe_prefers_mru_stream_on_duplicate_entries() {
        let mut stb = StreamBuffers::new(3, 4);
        stb.update(true, 0); // A: {1, 2, 3, 4}
        stb.update(true, 100); // B: {101..104}
        stb.update(true, 0); // 0 itself is buffered nowhere: C: {1, 2, 3, 4}
        let upd = stb.update(false, 2);
        assert!(upd.hit);
        assert_eq!(upd.prefetched, 2);
        let order = by_rank(&stb);
        // the MRU duplicate was consumed and refilled; the older copy is intact
        assert_eq!(order[0].blocks, vec![3, 4, 5, 6]);
        assert_eq!(order[2].blocks, vec![1, 2, 3, 4]);
    }

    #[test]
    fn block_numbers_wrap_at_32_bits() {
        let mut stb = StreamBuffers::new(1, 2);
        stb.update(true, u32::MAX);
        assert_eq!(by_rank(&stb)[0].blocks, vec![0, 1]);
    }

    #[test]
    fn stream_ranks_stay_a_permutation() {
        let mut stb = StreamBuffers::new(4, 2);
        for block in [0u32, 50, 100, 150, 1, 51, 200] {
            stb.update(true, block);
            assert!(stb.ranks_are_permutation());
        }
    }
}
