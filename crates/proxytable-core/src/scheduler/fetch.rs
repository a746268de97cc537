use std::collections::{HashMap, VecDeque};

/// Upper bound on concurrent fetches for the bounded policy
pub const MAX_IN_FLIGHT: usize = 8;

/// Fetch state of a block. Blocks without an entry are absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    /// A fetch is outstanding
    Requested,
    /// The slice is in the cache
    Cached,
    /// The last fetch failed; the block is queued again by the next reconcile
    Failed,
}

/// Decides which blocks to fetch and in which order.
///
/// Pure bookkeeping: callers dispatch the actual requests and report back via
/// [`FetchScheduler::complete`] and [`FetchScheduler::fail`]. At most
/// `max_in_flight` blocks are `Requested` at once, and each block has at most
/// one outstanding request.
#[derive(Debug)]
pub struct FetchScheduler {
    states: HashMap<usize, BlockState>,
    pending: VecDeque<usize>,
    in_flight: usize,
    max_in_flight: usize,
}

impl FetchScheduler {
    pub fn new(max_in_flight: usize) -> Self {
        Self {
            states: HashMap::new(),
            pending: VecDeque::new(),
            in_flight: 0,
            max_in_flight: max_in_flight.clamp(1, MAX_IN_FLIGHT),
        }
    }

    /// Sequential policy: one outstanding fetch at a time
    pub fn sequential() -> Self {
        Self::new(1)
    }

    pub fn state(&self, block: usize) -> Option<BlockState> {
        self.states.get(&block).copied()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    /// Blocks waiting for a free slot, nearest first
    pub fn pending(&self) -> impl Iterator<Item = usize> + '_ {
        self.pending.iter().copied()
    }

    /// Replace the pending queue with the `needed` blocks that are neither
    /// cached nor requested, keeping the given order. Failed blocks become
    /// absent again and are queued like any other gap.
    pub fn reconcile(&mut self, needed: &[usize]) {
        self.states.retain(|_, state| *state != BlockState::Failed);
        self.queue(needed);
    }

    /// Like [`FetchScheduler::reconcile`], but failed blocks stay failed and
    /// are not queued. Used for passes triggered by arrivals, so a block that
    /// keeps failing is not retried in a loop.
    pub fn requeue(&mut self, needed: &[usize]) {
        self.queue(needed);
    }

    fn queue(&mut self, needed: &[usize]) {
        self.pending.clear();
        for &block in needed {
            if !self.states.contains_key(&block) && !self.pending.contains(&block) {
                self.pending.push_back(block);
            }
        }
    }

    /// Take the next pending block if a slot is free, marking it requested
    pub fn next_dispatch(&mut self) -> Option<usize> {
        if self.in_flight >= self.max_in_flight {
            return None;
        }
        let block = self.pending.pop_front()?;
        self.states.insert(block, BlockState::Requested);
        self.in_flight += 1;
        Some(block)
    }

    /// Every block that can be dispatched right now, in order
    pub fn drain_dispatchable(&mut self) -> Vec<usize> {
        std::iter::from_fn(|| self.next_dispatch()).collect()
    }

    /// A fetch succeeded and its slice was stored
    pub fn complete(&mut self, block: usize) {
        self.settle(block, BlockState::Cached);
    }

    /// A fetch failed
    pub fn fail(&mut self, block: usize) {
        self.settle(block, BlockState::Failed);
    }

    fn settle(&mut self, block: usize, state: BlockState) {
        if self.states.get(&block) == Some(&BlockState::Requested) {
            self.in_flight = self.in_flight.saturating_sub(1);
        }
        self.states.insert(block, state);
    }

    /// A fetch issued before the last [`FetchScheduler::reset`] finished.
    /// Its slot is released, its result is not recorded.
    pub fn settle_stale(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }

    /// A finished fetch whose result no longer belongs to the table. Its slot
    /// is released and the block goes back to absent.
    pub fn discard(&mut self, block: usize) {
        if self.states.remove(&block) == Some(BlockState::Requested) {
            self.in_flight = self.in_flight.saturating_sub(1);
        }
    }

    /// Evicted blocks go back to absent so they are fetched again when the
    /// viewport returns to them
    pub fn forget(&mut self, blocks: &[usize]) {
        for block in blocks {
            if self.states.get(block) == Some(&BlockState::Cached) {
                self.states.remove(block);
            }
        }
    }

    /// Drop all block states. Outstanding fetches keep their slots until they
    /// are settled with [`FetchScheduler::settle_stale`].
    pub fn reset(&mut self) {
        self.states.clear();
        self.pending.clear();
    }
}
