//! In-order execution queue.
//!
//! A [`Stream`] owns one background thread that runs submitted jobs one at a
//! time, in submission order. Each job hands its result back through a
//! [`Ticket`]; the first failure since the last [`Stream::synchronize`] is
//! also kept as the stream's sticky status.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use tracing::{debug, trace};

use crate::error::{Result, SoftmaxError};

type Job = Box<dyn FnOnce() + Send>;

enum Command {
    Run(Job),
    Flush(Sender<()>),
}

/// Pending result of a submitted job.
#[derive(Debug)]
pub struct Ticket<R> {
    receiver: Receiver<Result<R>>,
}

impl<R> Ticket<R> {
    /// Block until the job has run and return its result.
    ///
    /// # Errors
    ///
    /// Returns the job's own error, or [`SoftmaxError::StreamClosed`] if the
    /// worker died before finishing it.
    pub fn wait(self) -> Result<R> {
        self.receiver
            .recv()
            .map_err(|_| SoftmaxError::StreamClosed("worker exited before the job completed".into()))?
    }
}

#[derive(Debug)]
pub struct Stream {
    name: String,
    sender: Option<Sender<Command>>,
    worker: Option<JoinHandle<()>>,
    status: Arc<Mutex<Option<SoftmaxError>>>,
}

impl Stream {
    /// Spawn the worker thread.
    ///
    /// # Errors
    ///
    /// Returns [`SoftmaxError::Io`] if the thread cannot be spawned.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let (sender, receiver) = mpsc::channel::<Command>();
        let worker = thread::Builder::new()
            .name(format!("stream-{name}"))
            .spawn(move || Self::run(&receiver))?;
        debug!(stream = %name, "started stream");
        Ok(Self {
            name,
            sender: Some(sender),
            worker: Some(worker),
            status: Arc::new(Mutex::new(None)),
        })
    }

    fn run(receiver: &Receiver<Command>) {
        while let Ok(command) = receiver.recv() {
            match command {
                Command::Run(job) => job(),
                Command::Flush(done) => {
                    let _ = done.send(());
                }
            }
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    fn send(&self, command: Command) -> Result<()> {
        self.sender
            .as_ref()
            .ok_or_else(|| SoftmaxError::StreamClosed(self.name.clone()))?
            .send(command)
            .map_err(|_| SoftmaxError::StreamClosed(self.name.clone()))
    }

    /// Queue `job` behind everything already submitted.
    ///
    /// # Errors
    ///
    /// Returns [`SoftmaxError::StreamClosed`] if the worker is gone.
    pub fn submit<R, F>(&self, job: F) -> Result<Ticket<R>>
    where
        R: Send + 'static,
        F: FnOnce() -> Result<R> + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel();
        let status = Arc::clone(&self.status);
        self.send(Command::Run(Box::new(move || {
            let result = job();
            if let Err(e) = &result {
                let mut sticky = status.lock().unwrap_or_else(PoisonError::into_inner);
                if sticky.is_none() {
                    *sticky = Some(e.clone());
                }
            }
            // The caller may have dropped the ticket.
            let _ = sender.send(result);
        })))?;
        trace!(stream = %self.name, "submitted job");
        Ok(Ticket { receiver })
    }

    /// Wait for every job submitted so far, then return and clear the first
    /// error any of them produced.
    ///
    /// # Errors
    ///
    /// Returns the sticky job error, or [`SoftmaxError::StreamClosed`] if the
    /// worker is gone.
    pub fn synchronize(&self) -> Result<()> {
        let (done, wait) = mpsc::channel();
        self.send(Command::Flush(done))?;
        wait.recv()
            .map_err(|_| SoftmaxError::StreamClosed(self.name.clone()))?;
        let sticky = self
            .status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match sticky {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for Stream {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain its queue and exit.
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
