use std::fmt;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use crate::error::{KernelError, Result};

/// Identifies which barrier in a kernel body is being reached.
///
/// Every lane of a group must pass the same sites in the same order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BarrierSite {
    /// The scratch tile is fully populated for the current block.
    TileLoaded,
    /// Every lane has finished reading the scratch tile for the current block.
    TileConsumed,
    /// A barrier in some other kernel.
    Named(&'static str),
}

impl fmt::Display for BarrierSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BarrierSite::TileLoaded => write!(f, "tile-loaded"),
            BarrierSite::TileConsumed => write!(f, "tile-consumed"),
            BarrierSite::Named(name) => write!(f, "{name}"),
        }
    }
}

/// Work-group scoped synchronization shared by the lanes of one compute unit.
///
/// A lane calls `enter` once before running any work-item, `barrier` at each
/// barrier site, and `leave` once it has no more work. A lane that fails must
/// call `poison` so the others stop waiting for it.
pub trait GroupSync: Send + Sync {
    fn lanes(&self) -> usize;

    fn enter(&self, _lane: usize) -> Result<()> {
        Ok(())
    }

    fn barrier(&self, lane: usize, site: BarrierSite) -> Result<()>;

    fn leave(&self, _lane: usize) {}

    fn poison(&self);
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // State is only mutated under the lock without panicking, so a poisoned
    // mutex still holds consistent state.
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct BarrierState {
    arrived: usize,
    generation: u64,
    poisoned: bool,
}

/// Generation-counting barrier for lanes running truly concurrently.
#[derive(Debug)]
pub struct GroupBarrier {
    lanes: usize,
    state: Mutex<BarrierState>,
    cvar: Condvar,
}

impl GroupBarrier {
    pub fn new(lanes: usize) -> Self {
        GroupBarrier {
            lanes,
            state: Mutex::new(BarrierState::default()),
            cvar: Condvar::new(),
        }
    }
}

impl GroupSync for GroupBarrier {
    fn lanes(&self) -> usize {
        self.lanes
    }

    fn barrier(&self, _lane: usize, _site: BarrierSite) -> Result<()> {
        let mut state = lock(&self.state);
        if state.poisoned {
            return Err(KernelError::BarrierPoisoned);
        }
        let generation = state.generation;
        state.arrived += 1;
        if state.arrived == self.lanes {
            state.arrived = 0;
            state.generation = state.generation.wrapping_add(1);
            self.cvar.notify_all();
            return Ok(());
        }
        while state.generation == generation && !state.poisoned {
            state = self.cvar.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
        if state.generation != generation {
            Ok(())
        } else {
            Err(KernelError::BarrierPoisoned)
        }
    }

    fn poison(&self) {
        lock(&self.state).poisoned = true;
        self.cvar.notify_all();
    }
}

#[derive(Debug, Default)]
struct LockstepState {
    turn: usize,
    arrived: usize,
    generation: u64,
    poisoned: bool,
}

/// Deterministic barrier that runs exactly one lane at a time.
///
/// Lanes start in local-id order and hand over to the next lane only when they
/// reach a barrier or leave. When the last lane arrives, lane 0 resumes first.
/// This makes every interleaving reproducible: with a barrier missing, lane 0
/// runs ahead of lanes that have not stored their tile element yet.
#[derive(Debug)]
pub struct LockstepBarrier {
    lanes: usize,
    state: Mutex<LockstepState>,
    cvar: Condvar,
}

impl LockstepBarrier {
    pub fn new(lanes: usize) -> Self {
        LockstepBarrier {
            lanes,
            state: Mutex::new(LockstepState::default()),
            cvar: Condvar::new(),
        }
    }

    fn next(&self, lane: usize) -> usize {
        (lane + 1) % self.lanes
    }

    fn wait_turn<'a>(
        &self,
        mut state: MutexGuard<'a, LockstepState>,
        lane: usize,
        generation: Option<u64>,
    ) -> Result<MutexGuard<'a, LockstepState>> {
        let ready = |s: &LockstepState| s.turn == lane && generation.map_or(true, |g| s.generation != g);
        while !ready(&*state) && !state.poisoned {
            state = self.cvar.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
        if ready(&*state) {
            Ok(state)
        } else {
            Err(KernelError::BarrierPoisoned)
        }
    }
}

impl GroupSync for LockstepBarrier {
    fn lanes(&self) -> usize {
        self.lanes
    }

    fn enter(&self, lane: usize) -> Result<()> {
        let state = lock(&self.state);
        if state.poisoned {
            return Err(KernelError::BarrierPoisoned);
        }
        self.wait_turn(state, lane, None).map(drop)
    }

    fn barrier(&self, lane: usize, _site: BarrierSite) -> Result<()> {
        let mut state = lock(&self.state);
        if state.poisoned {
            return Err(KernelError::BarrierPoisoned);
        }
        let generation = state.generation;
        state.arrived += 1;
        if state.arrived == self.lanes {
            state.arrived = 0;
            state.generation = state.generation.wrapping_add(1);
            state.turn = 0;
        } else {
            state.turn = self.next(lane);
        }
        self.cvar.notify_all();
        self.wait_turn(state, lane, Some(generation)).map(drop)
    }

    fn leave(&self, lane: usize) {
        let mut state = lock(&self.state);
        state.turn = self.next(lane);
        self.cvar.notify_all();
    }

    fn poison(&self) {
        lock(&self.state).poisoned = true;
        self.cvar.notify_all();
    }
}
