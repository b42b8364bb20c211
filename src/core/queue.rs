use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

/// Live handle for one admitted transfer. `generation` distinguishes a
/// re-admission of the same item from the attempt it replaced.
#[derive(Clone)]
pub struct ActiveTransfer {
    pub id: String,
    pub generation: u64,
    pub cancel: CancellationToken,
}

/// Per-item file guard. A transfer holds it for its whole lifetime including
/// cleanup of the partial file, so anyone awaiting it knows the file is settled.
pub type IoGuard = Arc<tokio::sync::Mutex<()>>;

/// Pending FIFO plus the bounded active set.
pub struct DownloadQueue {
    pending: VecDeque<String>,
    active: Vec<ActiveTransfer>,
    io_guards: HashMap<String, IoGuard>,
    max_concurrent: usize,
    halted: bool,
    next_generation: u64,
}

impl DownloadQueue {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            pending: VecDeque::new(),
            active: Vec::new(),
            io_guards: HashMap::new(),
            max_concurrent: max_concurrent.max(1),
            halted: false,
            next_generation: 0,
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn enqueue(&mut self, id: String) {
        self.pending.push_back(id);
    }

    /// Puts `ids` at the head of the queue, keeping their relative order.
    pub fn requeue_front(&mut self, ids: Vec<String>) {
        for id in ids.into_iter().rev() {
            self.pending.push_front(id);
        }
    }

    pub fn remove_pending(&mut self, id: &str) -> bool {
        match self.pending.iter().position(|p| p == id) {
            Some(pos) => {
                self.pending.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn pending_ids(&self) -> impl Iterator<Item = &String> {
        self.pending.iter()
    }

    pub fn active_ids(&self) -> impl Iterator<Item = &String> {
        self.active.iter().map(|a| &a.id)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn has_free_slot(&self) -> bool {
        !self.halted && self.active.len() < self.max_concurrent
    }

    /// Head of the pending queue, if admission is allowed right now.
    pub fn next_admissible(&mut self) -> Option<String> {
        if !self.has_free_slot() {
            return None;
        }
        self.pending.pop_front()
    }

    pub fn activate(&mut self, id: &str) -> (ActiveTransfer, IoGuard) {
        self.next_generation += 1;
        let slot = ActiveTransfer {
            id: id.to_string(),
            generation: self.next_generation,
            cancel: CancellationToken::new(),
        };
        self.active.push(slot.clone());
        let guard = self.io_guards.entry(id.to_string()).or_default().clone();
        (slot, guard)
    }

    pub fn is_current(&self, id: &str, generation: u64) -> bool {
        self.active
            .iter()
            .any(|a| a.id == id && a.generation == generation)
    }

    pub fn take_active(&mut self, id: &str) -> Option<ActiveTransfer> {
        let pos = self.active.iter().position(|a| a.id == id)?;
        Some(self.active.remove(pos))
    }

    pub fn drain_active(&mut self) -> Vec<ActiveTransfer> {
        std::mem::take(&mut self.active)
    }

    pub fn io_guard(&self, id: &str) -> Option<IoGuard> {
        self.io_guards.get(id).cloned()
    }

    /// Forgets the item's guard once it is terminal, handing it back so the
    /// caller can still wait on it.
    pub fn release(&mut self, id: &str) -> Option<IoGuard> {
        self.io_guards.remove(id)
    }

    pub fn halt(&mut self) {
        self.halted = true;
    }

    pub fn unhalt(&mut self) {
        self.halted = false;
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }
}
