//! Page replacement policies for the buffer pool.

use crate::frame::FrameId;
use parking_lot::Mutex;

/// Trait for page replacement algorithms.
///
/// Implementations serialize their own state; every method is atomic with
/// respect to the others.
pub trait Replacer: Send + Sync {
    /// Marks a frame ineligible for eviction, tracking it if unknown.
    fn pin(&self, frame_id: FrameId);

    /// Marks a frame eligible for eviction.
    ///
    /// A tracked frame keeps a freshly set reference bit (it was in use a
    /// moment ago); a previously unknown frame is inserted with the bit
    /// cleared.
    fn unpin(&self, frame_id: FrameId);

    /// Selects a victim frame, removes it from the tracked set, and
    /// returns it. Returns None if no frame is eligible.
    fn victim(&self) -> Option<FrameId>;

    /// Returns the number of frames currently eligible for eviction.
    fn size(&self) -> usize;
}

/// Clock (second-chance) replacement algorithm.
///
/// Tracked frames sit in a fixed slot array swept by a clock hand. When
/// selecting a victim the hand skips pinned and empty slots; an eligible
/// slot with its reference bit set gets a second chance (the bit is
/// cleared), and an eligible slot with the bit clear is evicted. Every
/// bit can be cleared at most once per selection, so the sweep visits at
/// most two full rotations.
pub struct ClockReplacer {
    /// Internal state protected by mutex.
    inner: Mutex<ClockInner>,
}

struct ClockSlot {
    /// Tracked frame, or INVALID for an empty slot.
    frame_id: FrameId,
    /// Pinned frames are skipped by the sweep.
    pinned: bool,
    /// One-bit recency hint.
    referenced: bool,
}

impl ClockSlot {
    fn empty() -> Self {
        Self {
            frame_id: FrameId::INVALID,
            pinned: false,
            referenced: false,
        }
    }

    fn is_occupied(&self) -> bool {
        self.frame_id.is_valid()
    }

    fn is_eligible(&self) -> bool {
        self.is_occupied() && !self.pinned
    }
}

struct ClockInner {
    /// Fixed slot array, one slot per pool frame.
    slots: Vec<ClockSlot>,
    /// Current clock hand position.
    hand: usize,
}

impl ClockInner {
    fn find(&self, frame_id: FrameId) -> Option<usize> {
        self.slots.iter().position(|s| s.frame_id == frame_id)
    }

    /// Inserts a new entry into the first empty slot.
    ///
    /// The slot array has one slot per pool frame and each frame is
    /// tracked at most once, so a full array means the caller passed a
    /// frame id from a different pool; the insert is dropped.
    fn insert(&mut self, frame_id: FrameId, pinned: bool) {
        if let Some(idx) = self.slots.iter().position(|s| !s.is_occupied()) {
            self.slots[idx] = ClockSlot {
                frame_id,
                pinned,
                referenced: false,
            };
        }
    }

    fn eligible_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_eligible()).count()
    }
}

impl ClockReplacer {
    /// Creates a new clock replacer with the given capacity (pool size).
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(ClockInner {
                slots: (0..capacity).map(|_| ClockSlot::empty()).collect(),
                hand: 0,
            }),
        }
    }

    /// Returns the total capacity.
    pub fn capacity(&self) -> usize {
        self.inner.lock().slots.len()
    }
}

impl Replacer for ClockReplacer {
    fn pin(&self, frame_id: FrameId) {
        let mut inner = self.inner.lock();
        match inner.find(frame_id) {
            Some(idx) => {
                let slot = &mut inner.slots[idx];
                slot.pinned = true;
                slot.referenced = true;
            }
            None => inner.insert(frame_id, true),
        }
    }

    fn unpin(&self, frame_id: FrameId) {
        let mut inner = self.inner.lock();
        match inner.find(frame_id) {
            Some(idx) => {
                let slot = &mut inner.slots[idx];
                if slot.pinned {
                    slot.pinned = false;
                    slot.referenced = true;
                }
            }
            None => inner.insert(frame_id, false),
        }
    }

    fn victim(&self) -> Option<FrameId> {
        let mut inner = self.inner.lock();

        if inner.eligible_count() == 0 {
            return None;
        }

        // At least one slot is eligible. One rotation clears every set
        // reference bit; a second rotation must then hit an eligible slot
        // with its bit clear, so 2 * len iterations always suffice.
        let len = inner.slots.len();
        for _ in 0..2 * len {
            let hand = inner.hand;
            inner.hand = (hand + 1) % len;

            let slot = &mut inner.slots[hand];
            if !slot.is_eligible() {
                continue;
            }
            if slot.referenced {
                // Second chance.
                slot.referenced = false;
                continue;
            }
            let frame_id = slot.frame_id;
            *slot = ClockSlot::empty();
            return Some(frame_id);
        }

        None
    }

    fn size(&self) -> usize {
        self.inner.lock().eligible_count()
    }
}
