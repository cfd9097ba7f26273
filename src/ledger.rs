//! # Replenishment Ledger
//!
//! A fixed pool of pending capacity replenishments. Each occupied slot
//! holds an amount of consumed time that will be given back to the server
//! when its timer matures. The ledger knows nothing about timers or due
//! times; the timer bridge binds a timer to the slot it matures.
//!
//! Order among slots carries no meaning: `remove_one()` frees whichever
//! occupied slot it finds first.

use crate::config::REPLENISHMENT_SLOTS;
use crate::error::SporadicError;
use crate::time::Ticks;

/// Index of a ledger slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotId(pub(crate) usize);

impl SlotId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    amount: Ticks,
    occupied: bool,
}

impl Slot {
    const FREE: Self = Self {
        amount: 0,
        occupied: false,
    };
}

/// Bounded multiset of pending replenishment amounts.
pub struct ReplenishmentLedger {
    slots: [Slot; REPLENISHMENT_SLOTS],
    occupied: usize,
}

impl ReplenishmentLedger {
    /// An empty ledger with every slot free.
    pub const fn new() -> Self {
        Self {
            slots: [Slot::FREE; REPLENISHMENT_SLOTS],
            occupied: 0,
        }
    }

    /// Record `amount` in the first free slot.
    ///
    /// A full ledger is left untouched: no live entry is overwritten.
    pub fn insert(&mut self, amount: Ticks) -> Result<SlotId, SporadicError> {
        let index = self
            .slots
            .iter()
            .position(|slot| !slot.occupied)
            .ok_or(SporadicError::CapacityPoolExhausted)?;

        self.slots[index] = Slot {
            amount,
            occupied: true,
        };
        self.occupied += 1;
        Ok(SlotId(index))
    }

    /// Free the slot `id` and return its amount, if it was occupied.
    pub fn take(&mut self, id: SlotId) -> Option<Ticks> {
        let slot = self.slots.get_mut(id.0)?;
        if !slot.occupied {
            return None;
        }
        slot.occupied = false;
        self.occupied -= 1;
        Some(slot.amount)
    }

    /// Free an arbitrary occupied slot and return its amount.
    pub fn remove_one(&mut self) -> Option<Ticks> {
        let index = self.slots.iter().position(|slot| slot.occupied)?;
        self.take(SlotId(index))
    }

    /// Amount held by `id`, if occupied.
    pub fn get(&self, id: SlotId) -> Option<Ticks> {
        self.slots
            .get(id.0)
            .filter(|slot| slot.occupied)
            .map(|slot| slot.amount)
    }

    /// Number of occupied slots.
    #[inline]
    pub fn len(&self) -> usize {
        self.occupied
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.occupied == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.occupied == REPLENISHMENT_SLOTS
    }

    /// Sum of every pending amount.
    pub fn pending(&self) -> u64 {
        self.slots
            .iter()
            .filter(|slot| slot.occupied)
            .map(|slot| u64::from(slot.amount))
            .sum()
    }
}

impl Default for ReplenishmentLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_uses_first_free_slot() {
        let mut ledger = ReplenishmentLedger::new();
        assert!(ledger.is_empty());

        let a = ledger.insert(100).unwrap();
        let b = ledger.insert(200).unwrap();
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(ledger.len(), 2);

        // Freed slot is reused before later ones
        assert_eq!(ledger.take(a), Some(100));
        let c = ledger.insert(300).unwrap();
        assert_eq!(c.index(), 0);
        assert_eq!(ledger.pending(), 500);
    }

    #[test]
    fn test_take_is_exactly_once() {
        let mut ledger = ReplenishmentLedger::new();
        let id = ledger.insert(42).unwrap();
        assert_eq!(ledger.get(id), Some(42));
        assert_eq!(ledger.take(id), Some(42));
        assert_eq!(ledger.take(id), None);
        assert_eq!(ledger.get(id), None);
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_remove_one_scans_whole_ledger() {
        let mut ledger = ReplenishmentLedger::new();
        let mut last = None;
        for i in 0..REPLENISHMENT_SLOTS {
            last = Some(ledger.insert(i as Ticks).unwrap());
        }
        // Free everything but the very last slot
        for i in 0..REPLENISHMENT_SLOTS - 1 {
            ledger.take(SlotId(i));
        }
        assert_eq!(last.unwrap().index(), REPLENISHMENT_SLOTS - 1);
        assert_eq!(ledger.remove_one(), Some((REPLENISHMENT_SLOTS - 1) as Ticks));
        assert_eq!(ledger.remove_one(), None);
    }

    #[test]
    fn test_full_ledger_rejects_without_overwrite() {
        let mut ledger = ReplenishmentLedger::new();
        for _ in 0..REPLENISHMENT_SLOTS {
            ledger.insert(7).unwrap();
        }
        assert!(ledger.is_full());

        assert_eq!(ledger.insert(999), Err(SporadicError::CapacityPoolExhausted));
        assert_eq!(ledger.len(), REPLENISHMENT_SLOTS);
        assert_eq!(ledger.get(SlotId(REPLENISHMENT_SLOTS - 1)), Some(7));
        assert_eq!(ledger.pending(), 7 * REPLENISHMENT_SLOTS as u64);
    }

    #[test]
    fn test_out_of_range_slot() {
        let mut ledger = ReplenishmentLedger::new();
        assert_eq!(ledger.take(SlotId(REPLENISHMENT_SLOTS)), None);
    }
}
