use crate::error::DecodeError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scored<T> {
    pub score: f32,
    pub item: T,
}

/// Fixed-capacity min-heap keeping the best `capacity` scored items.
///
/// The worst held item sits at the root. Once full, [`BoundedBeam::push`]
/// always replaces the root and hands it back; callers decide beforehand
/// whether an item is worth inserting.
#[derive(Debug, Clone)]
pub struct BoundedBeam<T> {
    capacity: usize,
    heap: Vec<Scored<T>>,
}

impl<T: Copy> BoundedBeam<T> {
    pub fn new(capacity: usize) -> Result<Self, DecodeError> {
        if capacity == 0 {
            return Err(DecodeError::InvalidBeamWidth(capacity));
        }
        Ok(Self {
            capacity,
            heap: Vec::with_capacity(capacity),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.heap.len() >= self.capacity
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }

    /// Lowest-scored held item.
    pub fn min(&self) -> Result<Scored<T>, DecodeError> {
        self.heap.first().copied().ok_or(DecodeError::EmptyBeam)
    }

    /// Inserts `item`, returning the evicted minimum when the beam was full.
    pub fn push(&mut self, score: f32, item: T) -> Option<T> {
        let entry = Scored { score, item };
        if self.heap.len() < self.capacity {
            self.heap.push(entry);
            self.sift_up(self.heap.len() - 1);
            None
        } else {
            let removed = std::mem::replace(&mut self.heap[0], entry);
            self.sift_down(0);
            Some(removed.item)
        }
    }

    /// Held items in heap order.
    pub fn entries(&self) -> &[Scored<T>] {
        &self.heap
    }

    /// Copies the held items into `out`, replacing its contents.
    pub fn snapshot_into(&self, out: &mut Vec<T>) {
        out.clear();
        out.extend(self.heap.iter().map(|e| e.item));
    }

    fn sift_up(&mut self, mut idx: usize) {
        while idx > 0 {
            let parent = (idx - 1) / 2;
            if self.heap[idx].score >= self.heap[parent].score {
                break;
            }
            self.heap.swap(idx, parent);
            idx = parent;
        }
    }

    fn sift_down(&mut self, mut idx: usize) {
        let len = self.heap.len();
        loop {
            let left = 2 * idx + 1;
            let right = left + 1;
            if left >= len {
                break;
            }

            let mut child = left;
            if right < len && self.heap[right].score < self.heap[left].score {
                child = right;
            }

            if self.heap[idx].score <= self.heap[child].score {
                break;
            }
            self.heap.swap(idx, child);
            idx = child;
        }
    }
}
