//! # Host Simulation (test-only)
//!
//! `MockPort` records what the server asks of the host: ready-set
//! membership, armed timers, switch-outs. `Sim` builds a discrete-time,
//! single-core, fixed-priority scheduler on top of it: an idle thread at
//! priority 0, optional periodic threads, and the sporadic server, with
//! the switch hook called on every context switch and timers fired on the
//! tick they fall due.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::vec::Vec;

use crate::body;
use crate::config::ServerConfig;
use crate::error::SporadicError;
use crate::port::{Port, ThreadId, ThreadRef};
use crate::request::{AperiodicRequest, RequestHandle};
use crate::server::{BodyStep, ServerState, SporadicServer};
use crate::time::{Priority, Ticks};
use crate::timer::TimerId;

pub const IDLE: ThreadRef = ThreadRef::new(ThreadId(0), 0);

// ---------------------------------------------------------------------------
// Mock port
// ---------------------------------------------------------------------------

pub struct MockPort {
    now: Cell<Ticks>,
    next_id: Cell<u32>,
    priorities: RefCell<HashMap<ThreadId, Priority>>,
    ready: RefCell<Vec<ThreadId>>,
    /// Armed timers with the ticks left until they fire.
    timers: RefCell<Vec<(TimerId, Ticks)>>,
    highest_override: Cell<Option<Option<Priority>>>,
    switch_outs: Cell<u32>,
    /// Host work run from inside `switch_out`.
    switch_hook: RefCell<Option<Box<dyn Fn(&MockPort)>>>,
}

impl MockPort {
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    pub fn starting_at(now: Ticks) -> Self {
        Self {
            now: Cell::new(now),
            next_id: Cell::new(1),
            priorities: RefCell::new(HashMap::new()),
            ready: RefCell::new(Vec::new()),
            timers: RefCell::new(Vec::new()),
            highest_override: Cell::new(None),
            switch_outs: Cell::new(0),
            switch_hook: RefCell::new(None),
        }
    }

    pub fn set_now(&self, now: Ticks) {
        self.now.set(now);
    }

    /// Advance the clock one tick and return the timers that fell due.
    pub fn tick(&self) -> Vec<TimerId> {
        self.now.set(self.now.get().wrapping_add(1));
        let mut timers = self.timers.borrow_mut();
        let mut due = Vec::new();
        timers.retain_mut(|(timer, left)| {
            *left -= 1;
            if *left == 0 {
                due.push(*timer);
                false
            } else {
                true
            }
        });
        due
    }

    pub fn spawn(&self, priority: Priority) -> ThreadRef {
        let id = ThreadId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.priorities.borrow_mut().insert(id, priority);
        ThreadRef::new(id, priority)
    }

    pub fn thread_priority(&self, thread: ThreadId) -> Option<Priority> {
        self.priorities.borrow().get(&thread).copied()
    }

    pub fn is_ready(&self, thread: ThreadId) -> bool {
        self.ready.borrow().contains(&thread)
    }

    pub fn ready_count(&self) -> usize {
        self.ready.borrow().len()
    }

    /// Remove `thread` from the ready set as a dispatcher would.
    pub fn take_ready(&self, thread: ThreadId) {
        self.ready.borrow_mut().retain(|t| *t != thread);
    }

    /// Pop the best ready thread (FIFO among equals), skipping `except`.
    pub fn pop_best(&self, except: Option<ThreadId>) -> Option<ThreadRef> {
        let mut ready = self.ready.borrow_mut();
        let mut best: Option<(usize, Priority)> = None;
        for (pos, id) in ready.iter().enumerate() {
            if Some(*id) == except {
                continue;
            }
            let prio = self.priorities.borrow()[id];
            if best.map_or(true, |(_, p)| prio > p) {
                best = Some((pos, prio));
            }
        }
        let (pos, prio) = best?;
        Some(ThreadRef::new(ready.remove(pos), prio))
    }

    pub fn set_highest_ready(&self, priority: Option<Priority>) {
        self.highest_override.set(Some(priority));
    }

    pub fn armed_delay(&self, timer: TimerId) -> Option<Ticks> {
        self.timers
            .borrow()
            .iter()
            .find(|(t, _)| *t == timer)
            .map(|(_, left)| *left)
    }

    pub fn armed_due(&self, timer: TimerId) -> Option<Ticks> {
        self.armed_delay(timer)
            .map(|left| self.now.get().wrapping_add(left))
    }

    pub fn armed_count(&self) -> usize {
        self.timers.borrow().len()
    }

    pub fn switch_outs(&self) -> u32 {
        self.switch_outs.get()
    }

    /// Run `hook` on every switch-out, the way a host switches threads
    /// before `switch_out` returns.
    pub fn set_switch_hook(&self, hook: impl Fn(&MockPort) + 'static) {
        *self.switch_hook.borrow_mut() = Some(Box::new(hook));
    }
}

impl Port for MockPort {
    fn now(&self) -> Ticks {
        self.now.get()
    }

    fn create_thread(&self, _name: &'static str, priority: Priority, _stack_size: usize) -> ThreadId {
        self.spawn(priority).id
    }

    fn ready(&self, thread: ThreadId) {
        assert!(!self.is_ready(thread), "ready set corrupted: {thread:?} inserted twice");
        self.ready.borrow_mut().push(thread);
    }

    fn unready(&self, thread: ThreadId) {
        self.take_ready(thread);
    }

    fn switch_out(&self) {
        self.switch_outs.set(self.switch_outs.get() + 1);
        if let Some(hook) = self.switch_hook.borrow().as_ref() {
            hook(self);
        }
    }

    fn highest_ready_priority(&self) -> Option<Priority> {
        if let Some(priority) = self.highest_override.get() {
            return priority;
        }
        let priorities = self.priorities.borrow();
        self.ready.borrow().iter().map(|id| priorities[id]).max()
    }

    fn arm_timer(&self, timer: TimerId, delay: Ticks) {
        assert!(delay > 0, "zero-length timer armed");
        let mut timers = self.timers.borrow_mut();
        assert!(
            timers.iter().all(|(t, _)| *t != timer),
            "{timer:?} armed while already armed"
        );
        timers.push((timer, delay));
    }

    fn disarm_timer(&self, timer: TimerId) {
        self.timers.borrow_mut().retain(|(t, _)| *t != timer);
    }
}

// ---------------------------------------------------------------------------
// Simulated single-core host
// ---------------------------------------------------------------------------

struct Periodic {
    thread: ThreadRef,
    period: u64,
    offset: u64,
    wcet: Ticks,
    left: Ticks,
}

pub struct Sim {
    pub port: MockPort,
    pub server: SporadicServer,
    /// Arguments of completed requests, in completion order.
    pub completed: Vec<usize>,
    /// Errors reported by the switch hook.
    pub errors: Vec<SporadicError>,
    current: ThreadRef,
    /// The current thread gave up the processor on its own.
    blocked: bool,
    periodic: Vec<Periodic>,
    durations: HashMap<usize, Ticks>,
    handles: HashMap<usize, RequestHandle>,
    /// Request the server body is running, and its ticks left.
    pass: Option<AperiodicRequest>,
    work_left: Option<Ticks>,
    elapsed: u64,
}

fn record(_: usize) {}

impl Sim {
    pub fn new(config: ServerConfig) -> Self {
        Self::starting_at(config, 0)
    }

    pub fn starting_at(config: ServerConfig, now: Ticks) -> Self {
        let port = MockPort::starting_at(now);
        let server = SporadicServer::new(config, &port).unwrap();
        Self {
            port,
            server,
            completed: Vec::new(),
            errors: Vec::new(),
            current: IDLE,
            blocked: false,
            periodic: Vec::new(),
            durations: HashMap::new(),
            handles: HashMap::new(),
            pass: None,
            work_left: None,
            elapsed: 0,
        }
    }

    /// Add a periodic thread released at `offset + k * period` for `wcet` ticks.
    pub fn add_periodic(&mut self, priority: Priority, period: u64, offset: u64, wcet: Ticks) {
        let thread = self.port.spawn(priority);
        self.periodic.push(Periodic {
            thread,
            period,
            offset,
            wcet,
            left: 0,
        });
    }

    /// Queue a request taking `work` ticks, identified by `arg`.
    pub fn submit(&mut self, arg: usize, work: Ticks) {
        self.durations.insert(arg, work);
        let handle = self.server.create_aperiodic(record, arg, &self.port).unwrap();
        self.handles.insert(arg, handle);
    }

    pub fn current(&self) -> ThreadRef {
        self.current
    }

    pub fn run_until(&mut self, elapsed: u64) {
        while self.elapsed < elapsed {
            self.step();
        }
    }

    /// One tick: dispatch, run the current thread, advance the clock, fire
    /// the timers that fell due and release periodic jobs.
    pub fn step(&mut self) {
        self.dispatch();
        self.execute();
        let due = self.port.tick();
        self.elapsed += 1;
        self.complete();
        for timer in due {
            self.server.on_timer(timer, &self.port);
        }
        self.release_periodic();
    }

    fn server_ref(&self) -> ThreadRef {
        ThreadRef::new(self.server.thread(), self.server.priority())
    }

    fn dispatch(&mut self) {
        let server = self.server_ref();
        let running = self.current != IDLE && !self.blocked;

        let next = if !running {
            Some(self.port.pop_best(None).unwrap_or(IDLE))
        } else if self.current == server && self.server.preemption_required() {
            // Budget spent: requeue and run anything but the server
            self.port.ready(server.id);
            Some(self.port.pop_best(Some(server.id)).unwrap_or(IDLE))
        } else if self
            .port
            .highest_ready_priority()
            .is_some_and(|prio| prio > self.current.priority)
        {
            self.port.ready(self.current.id);
            self.port.pop_best(None)
        } else {
            None
        };

        let Some(next) = next else { return };
        if next == self.current && running {
            return;
        }
        let prev = self.current;
        self.current = next;
        self.blocked = false;
        if next != prev {
            if let Err(err) = self.server.on_context_switch(next, prev, &self.port) {
                self.errors.push(err);
            }
        }
    }

    /// Consume one tick of the current thread's work.
    fn execute(&mut self) {
        let server = self.server_ref();
        if self.current == server {
            if self.pass.is_none() {
                if self.server.requests().is_empty() {
                    return;
                }
                self.pass = body::begin_pass(&mut self.server, &self.port);
            }
            let Some(request) = self.pass else { return };
            let left = self
                .work_left
                .get_or_insert_with(|| self.durations[&request.arg]);
            *left -= 1;
        } else if let Some(task) = self
            .periodic
            .iter_mut()
            .find(|task| task.thread == self.current)
        {
            task.left -= 1;
        }
    }

    /// Retire finished work at the new time. The server's body passes run
    /// through `body`; a thread that blocks is switched out immediately,
    /// as `switch_out` would on a real host.
    fn complete(&mut self) {
        let server = self.server_ref();
        if self.current == server {
            match self.pass {
                None => match body::begin_pass(&mut self.server, &self.port) {
                    None => self.block(),
                    Some(request) => self.pass = Some(request),
                },
                Some(request) if self.work_left == Some(0) => {
                    self.pass = None;
                    self.work_left = None;
                    request.execute();
                    self.completed.push(request.arg);
                    let step = body::finish_pass(&mut self.server, &self.port);
                    if let Some(handle) = self.handles.remove(&request.arg) {
                        self.server.release(handle).unwrap();
                    }
                    if step != BodyStep::Continue {
                        self.block();
                    }
                }
                Some(_) => {}
            }
        } else if self
            .periodic
            .iter()
            .any(|task| task.thread == self.current && task.left == 0)
        {
            self.blocked = true;
            self.dispatch();
        }
    }

    fn block(&mut self) {
        self.blocked = true;
        self.dispatch();
    }

    fn release_periodic(&mut self) {
        for task in &mut self.periodic {
            if self.elapsed >= task.offset && (self.elapsed - task.offset) % task.period == 0 {
                if task.left == 0 {
                    task.left = task.wcet;
                    self.port.ready(task.thread.id);
                }
            }
        }
    }

    /// Capacity plus everything owed back to it equals the budget.
    pub fn check_invariants(&self) {
        let server = &self.server;
        assert!(server.capacity() <= server.maximum_capacity());
        assert_eq!(
            u64::from(server.capacity())
                + u64::from(server.staged_replenishment())
                + server.ledger().pending(),
            u64::from(server.maximum_capacity()),
            "capacity not conserved"
        );
        if server.state() == ServerState::Suspended {
            assert!(!self.port.is_ready(server.thread()));
        }
        assert!(server.ledger().len() <= server.timers().armed_replenishments());
    }
}
