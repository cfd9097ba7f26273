//! # Aperiodic Request Queue
//!
//! Aperiodic work items live in a fixed arena owned by the server and are
//! chained by index into a singly linked FIFO. The server body executes
//! the head, then advances it. There is no ordering among requests other
//! than arrival.
//!
//! A request stays allocated after it has run, so the same work item can be
//! submitted again with `enqueue()`; `release()` frees its slot.
//!
//! Every slot carries a generation that `release()` bumps. A handle kept
//! past its release no longer matches and is rejected with `UnknownRequest`
//! instead of reaching whatever reuses the slot.

use crate::config::MAX_REQUESTS;
use crate::error::SporadicError;

/// Work function of an aperiodic request.
pub type RequestFn = fn(usize);

/// Handle on an allocated request slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestHandle {
    index: u8,
    generation: u16,
}

impl RequestHandle {
    pub fn index(self) -> usize {
        usize::from(self.index)
    }
}

/// An aperiodic work item: a function, its argument, and its link.
#[derive(Debug, Clone, Copy)]
pub struct AperiodicRequest {
    pub fun: RequestFn,
    pub arg: usize,
    next: Option<RequestHandle>,
    queued: bool,
}

impl AperiodicRequest {
    /// Run the work item.
    #[inline]
    pub fn execute(&self) {
        (self.fun)(self.arg)
    }
}

/// Arena of requests plus the FIFO threaded through it.
pub struct RequestQueue {
    slots: [Option<AperiodicRequest>; MAX_REQUESTS],
    generations: [u16; MAX_REQUESTS],
    head: Option<RequestHandle>,
    tail: Option<RequestHandle>,
    len: usize,
}

impl RequestQueue {
    pub const fn new() -> Self {
        Self {
            slots: [None; MAX_REQUESTS],
            generations: [0; MAX_REQUESTS],
            head: None,
            tail: None,
            len: 0,
        }
    }

    /// Allocate a slot for a new request. The request is not queued yet.
    pub fn allocate(&mut self, fun: RequestFn, arg: usize) -> Result<RequestHandle, SporadicError> {
        let index = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(SporadicError::RequestPoolFull)?;

        self.slots[index] = Some(AperiodicRequest {
            fun,
            arg,
            next: None,
            queued: false,
        });
        Ok(RequestHandle {
            index: index as u8,
            generation: self.generations[index],
        })
    }

    /// Free the slot of a request that is not queued.
    pub fn release(&mut self, handle: RequestHandle) -> Result<(), SporadicError> {
        if self.get_mut(handle)?.queued {
            return Err(SporadicError::RequestAlreadyQueued);
        }
        let index = handle.index();
        self.slots[index] = None;
        self.generations[index] = self.generations[index].wrapping_add(1);
        Ok(())
    }

    fn is_current(&self, handle: RequestHandle) -> bool {
        self.generations.get(handle.index()) == Some(&handle.generation)
    }

    /// Append `handle` at the tail.
    ///
    /// Returns `true` when the queue was empty before, i.e. the request
    /// became the head and the server has work again.
    pub fn push_back(&mut self, handle: RequestHandle) -> Result<bool, SporadicError> {
        let request = self.get_mut(handle)?;
        if request.queued {
            return Err(SporadicError::RequestAlreadyQueued);
        }
        request.queued = true;
        request.next = None;

        let was_empty = match self.tail {
            Some(tail) => {
                self.get_mut(tail)?.next = Some(handle);
                false
            }
            None => {
                self.head = Some(handle);
                true
            }
        };
        self.tail = Some(handle);
        self.len += 1;
        Ok(was_empty)
    }

    /// Unlink the head and return its handle.
    pub fn pop_front(&mut self) -> Option<RequestHandle> {
        let head = self.head?;
        let request = self.slots[head.index()].as_mut()?;
        request.queued = false;
        self.head = request.next.take();
        if self.head.is_none() {
            self.tail = None;
        }
        self.len -= 1;
        Some(head)
    }

    /// The request at the head of the queue.
    pub fn front(&self) -> Option<&AperiodicRequest> {
        self.head.and_then(|head| self.slots[head.index()].as_ref())
    }

    pub fn get(&self, handle: RequestHandle) -> Option<&AperiodicRequest> {
        if !self.is_current(handle) {
            return None;
        }
        self.slots.get(handle.index())?.as_ref()
    }

    fn get_mut(&mut self, handle: RequestHandle) -> Result<&mut AperiodicRequest, SporadicError> {
        if !self.is_current(handle) {
            return Err(SporadicError::UnknownRequest);
        }
        self.slots
            .get_mut(handle.index())
            .and_then(Option::as_mut)
            .ok_or(SporadicError::UnknownRequest)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Number of queued requests.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Queued handles, head first.
    pub fn iter(&self) -> impl Iterator<Item = RequestHandle> + '_ {
        core::iter::successors(self.head, move |handle| {
            self.slots[handle.index()].as_ref().and_then(|r| r.next)
        })
    }
}

impl Default for RequestQueue {
    fn default() -> Self {
        Self::new()
    }
}
