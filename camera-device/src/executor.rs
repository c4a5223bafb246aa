//! Execution contexts that application callbacks are delivered on.
//!
//! Every callback registration pairs a callback with an [`Executor`]. The
//! device never calls application code while holding its interface lock:
//! dispatches are collected in an [`Outbox`], appended to the device's
//! [`DispatchQueue`] before the lock is released, and then handed to their
//! executors by whichever thread claims the queue, in the order the lock
//! sections ran.

use std::collections::VecDeque;
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use crate::util;

pub type Task = Box<dyn FnOnce() + Send + 'static>;

pub trait Executor: Send + Sync {
    /// Queue `task` to run on this execution context
    fn execute(&self, task: Task);
}

/// Runs each task immediately on the posting thread
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectExecutor;

impl Executor for DirectExecutor {
    fn execute(&self, task: Task) {
        util::run_guarded(task);
    }
}

/// Runs tasks in posting order on a dedicated thread
#[derive(Debug)]
pub struct ThreadExecutor {
    sender: Mutex<Option<Sender<Task>>>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl ThreadExecutor {
    pub fn new(name: impl Into<String>) -> std::io::Result<Self> {
        let (sender, receiver) = mpsc::channel::<Task>();
        let thread = thread::Builder::new().name(name.into()).spawn(move || {
            while let Ok(task) = receiver.recv() {
                util::run_guarded(task);
            }
            log::trace!("ThreadExecutor queue closed");
        })?;

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            thread: Mutex::new(Some(thread)),
        })
    }

    /// Stops accepting new tasks, runs everything already queued and waits
    /// for the worker thread to exit.
    ///
    /// Must not be called from a task running on this executor.
    pub fn shutdown(&self) {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let thread = self
            .thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(thread) = thread {
            if thread.thread().id() == thread::current().id() {
                log::error!("ThreadExecutor::shutdown() called from its own worker thread");
                return;
            }
            if let Err(panic) = thread.join() {
                util::log_panic(panic);
            }
        }
    }
}

impl Executor for ThreadExecutor {
    fn execute(&self, task: Task) {
        let guard = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(sender) => {
                if sender.send(task).is_err() {
                    log::error!("Dropping task posted to a stopped ThreadExecutor");
                }
            }
            None => log::warn!("Dropping task posted after ThreadExecutor::shutdown()"),
        }
    }
}

impl Drop for ThreadExecutor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Dispatches collected by one section of code holding the device interface
/// lock, moved into the [`DispatchQueue`] before the lock is released.
#[derive(Default)]
pub(crate) struct Outbox {
    tasks: Vec<(Arc<dyn Executor>, Task)>,
}

impl Outbox {
    pub fn post<F>(&mut self, executor: &Arc<dyn Executor>, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.tasks.push((executor.clone(), Box::new(task)));
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }
}

/// Dispatches waiting to be handed to their executors, across every lock
/// section of a device.
///
/// Only one thread drains the queue at a time. A thread that appends while
/// another is draining leaves its tasks to that thread, so executors see
/// tasks in the order they were queued even when several threads leave the
/// lock back to back.
#[derive(Default)]
pub(crate) struct DispatchQueue {
    tasks: VecDeque<(Arc<dyn Executor>, Task)>,
    draining: bool,
}

impl DispatchQueue {
    pub fn push(&mut self, outbox: Outbox) {
        self.tasks.extend(outbox.tasks);
    }

    /// Claims the queue for the calling thread.
    ///
    /// Returns `false` if there's nothing to do or another thread is already
    /// draining.
    pub fn begin_drain(&mut self) -> bool {
        if self.draining || self.tasks.is_empty() {
            return false;
        }
        self.draining = true;
        true
    }

    /// The next task for the draining thread; releases the claim once empty
    pub fn pop(&mut self) -> Option<(Arc<dyn Executor>, Task)> {
        let next = self.tasks.pop_front();
        if next.is_none() {
            self.draining = false;
        }
        next
    }
}
