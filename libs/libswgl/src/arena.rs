//! Scratch arena shared by all compiled shaders.
//!
//! Every variable and constant gets a permanent 16-byte slot here the first
//! time the lowering touches it. Slots are addressed by index, so native code
//! only needs the arena base at call time and stays valid when the backing
//! vector grows. Nothing is ever freed; recompiling a shader leaks its old slots.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

/// Index of a 4-lane slot in the arena.
pub type Slot = u32;

pub struct ScratchArena {
    slots: Vec<[f32; 4]>,
    /// Interned constants keyed by their bit pattern.
    consts: BTreeMap<[u32; 4], Slot>,
}

impl ScratchArena {
    pub fn new() -> Self {
        Self { slots: Vec::new(), consts: BTreeMap::new() }
    }

    /// Reserve `rows` consecutive zeroed slots.
    pub fn alloc(&mut self, rows: usize) -> Slot {
        let base = self.slots.len() as Slot;
        self.slots.resize(self.slots.len() + rows.max(1), [0.0; 4]);
        base
    }

    /// Slot holding `value`, shared with every other use of the same bits.
    pub fn intern(&mut self, value: [f32; 4]) -> Slot {
        let key = value.map(f32::to_bits);
        if let Some(&slot) = self.consts.get(&key) {
            return slot;
        }
        let slot = self.alloc(1);
        self.slots[slot as usize] = value;
        self.consts.insert(key, slot);
        slot
    }

    /// All-ones bit mask over the first `width` lanes.
    pub fn lane_mask(&mut self, width: usize) -> Slot {
        let mut m = [0.0f32; 4];
        for lane in m.iter_mut().take(width) {
            *lane = f32::from_bits(u32::MAX);
        }
        self.intern(m)
    }

    /// 1.0 in the first `width` lanes.
    pub fn ones(&mut self, width: usize) -> Slot {
        let mut v = [0.0f32; 4];
        for lane in v.iter_mut().take(width) {
            *lane = 1.0;
        }
        self.intern(v)
    }

    pub fn rows(&self, slot: Slot, n: usize) -> &[[f32; 4]] {
        &self.slots[slot as usize..slot as usize + n]
    }

    pub fn rows_mut(&mut self, slot: Slot, n: usize) -> &mut [[f32; 4]] {
        &mut self.slots[slot as usize..slot as usize + n]
    }

    pub fn as_mut_slice(&mut self) -> &mut [[f32; 4]] {
        &mut self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl Default for ScratchArena {
    fn default() -> Self {
        Self::new()
    }
}
