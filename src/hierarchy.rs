use crate::cache::{CacheLevel, ReqKind};

/// The cache levels in order, L1 first. Absent levels are never
/// constructed, so "next level" is simply the next index.
#[derive(Debug)]
pub struct Hierarchy {
    levels: Vec<CacheLevel>,
}

impl Hierarchy {
    pub fn new(levels: Vec<CacheLevel>) -> Self {
        assert!(!levels.is_empty());
        Hierarchy { levels }
    }

    pub fn feed(&mut self, addr: u32, kind: ReqKind) {
        self.request(0, addr, kind);
    }

    fn request(&mut self, lvl: usize, addr: u32, kind: ReqKind) {
        let demand = self.levels[lvl].request(addr, kind);
        let next = lvl + 1;
        if next >= self.levels.len() {
            // conceptual main memory services the demand
            return;
        }
        if let Some(evicted) = demand.writeback {
            self.request(next, evicted, ReqKind::Write);
        }
        if let Some(fetch) = demand.fetch {
            self.request(next, fetch, ReqKind::Read);
        }
    }

    pub fn levels(&self) -> &[CacheLevel] {
        &self.levels
    }

    pub fn l1(&self) -> &CacheLevel {
        &self.levels[0]
    }

    pub fn l2(&self) -> Option<&CacheLevel> {
        self.levels.get(1)
    }
}
