//! The single background thread that runs queries in submission order.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
};

use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::Mutex;

use crate::{EngineError, QueryError, ShutdownPolicy, result::Task};

enum Message {
    Run(Box<dyn Task>),
    Shutdown,
}

/// Owner of the worker thread and its FIFO queue.
///
/// The `accepting` gate is held while sending, so a submission either lands
/// ahead of the shutdown message or is refused; none is lost in between.
pub(crate) struct Worker {
    sender: Sender<Message>,
    accepting: Mutex<bool>,
    abort: Arc<AtomicBool>,
    thread: Mutex<Option<JoinHandle<()>>>,
    policy: ShutdownPolicy,
}

impl Worker {
    /// Start the worker thread.
    pub(crate) fn spawn(policy: ShutdownPolicy) -> Result<Self, EngineError> {
        let (sender, receiver) = unbounded();
        let abort = Arc::new(AtomicBool::new(false));
        let thread = thread::Builder::new()
            .name(String::from("skyquery-worker"))
            .spawn({
                let abort = Arc::clone(&abort);
                move || run(&receiver, &abort)
            })
            .map_err(|source| EngineError::Spawn { source })?;
        log::debug!("query worker started");
        Ok(Self {
            sender,
            accepting: Mutex::new(true),
            abort,
            thread: Mutex::new(Some(thread)),
            policy,
        })
    }

    /// Append `task` to the queue, or fail it when the worker is stopping.
    pub(crate) fn enqueue(&self, task: Box<dyn Task>) {
        let accepting = self.accepting.lock();
        if !*accepting {
            drop(accepting);
            task.fail(QueryError::Shutdown);
            return;
        }
        if let Err(refused) = self.sender.send(Message::Run(task)) {
            drop(accepting);
            log::warn!("query worker exited unexpectedly; refusing task");
            if let Message::Run(task) = refused.into_inner() {
                task.fail(QueryError::Shutdown);
            }
        }
    }

    /// Stop accepting work and wait for the thread to finish.
    ///
    /// Later calls only wait. When called from the worker thread itself the
    /// thread is detached instead of joined.
    pub(crate) fn shutdown(&self, policy: ShutdownPolicy) {
        {
            let mut accepting = self.accepting.lock();
            if *accepting {
                *accepting = false;
                self.abort
                    .store(policy == ShutdownPolicy::Abort, Ordering::SeqCst);
                log::debug!("query worker shutting down ({policy:?})");
                // The receiver only goes away if the thread died, in which
                // case there is nothing left to stop.
                if self.sender.send(Message::Shutdown).is_err() {
                    log::debug!("query worker already gone");
                }
            }
        }

        let Some(handle) = self.thread.lock().take() else {
            return;
        };
        if handle.thread().id() == thread::current().id() {
            log::debug!("query worker shut down from its own thread; detaching");
            return;
        }
        if handle.join().is_err() {
            log::error!("query worker thread panicked");
        }
    }

    pub(crate) const fn policy(&self) -> ShutdownPolicy {
        self.policy
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.shutdown(self.policy);
    }
}

fn run(receiver: &Receiver<Message>, abort: &AtomicBool) {
    let mut executed = 0_u64;
    let mut refused = 0_u64;
    while let Ok(message) = receiver.recv() {
        match message {
            Message::Run(task) if abort.load(Ordering::SeqCst) => {
                task.fail(QueryError::Shutdown);
                refused += 1;
            }
            Message::Run(task) => {
                task.run();
                executed += 1;
            }
            Message::Shutdown => break,
        }
    }
    log::debug!("query worker stopped after {executed} queries ({refused} aborted)");
}
