//! Wall-clock driver: one `dispatcher` thread owns the [`Dispatcher`] and
//! serializes every mutation through a command channel.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::config::DispatchConfig;
use crate::dispatcher::{Dispatcher, Snapshot};
use crate::error::DispatchError;
use crate::types::{ItemId, Priority, WorkerId};

enum Command {
    Submit {
        priority: Priority,
        reply: Sender<ItemId>,
    },
    AddWorker {
        processing_time: Option<Duration>,
        reply: Sender<Result<WorkerId, DispatchError>>,
    },
    RemoveWorker {
        reply: Sender<Option<WorkerId>>,
    },
    Snapshot {
        reply: Sender<Snapshot>,
    },
    Shutdown,
}

/// Handle to a dispatcher running on its own thread in real time.
pub struct DispatchService {
    commands: Sender<Command>,
    handle: Option<JoinHandle<Result<Snapshot, DispatchError>>>,
}

impl DispatchService {
    /// Start the dispatcher thread. Config is validated before the thread starts.
    pub fn spawn(config: &DispatchConfig) -> Result<Self, DispatchError> {
        config.validate()?;
        let config = config.clone();
        let (commands, inbox) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("dispatcher".to_string())
            .spawn(move || -> Result<Snapshot, DispatchError> {
                // Built here: pending completion callbacks are not Send.
                let dispatcher = Dispatcher::new(&config)?;
                Ok(run(dispatcher, inbox))
            })?;
        Ok(Self {
            commands,
            handle: Some(handle),
        })
    }

    pub fn submit(&self, priority: Priority) -> Result<ItemId, DispatchError> {
        self.request(|reply| Command::Submit { priority, reply })
    }

    /// Add a worker; `None` uses the configured processing time.
    pub fn add_worker(&self, processing_time: Option<Duration>) -> Result<WorkerId, DispatchError> {
        self.request(|reply| Command::AddWorker {
            processing_time,
            reply,
        })?
    }

    pub fn remove_worker(&self) -> Result<Option<WorkerId>, DispatchError> {
        self.request(|reply| Command::RemoveWorker { reply })
    }

    pub fn snapshot(&self) -> Result<Snapshot, DispatchError> {
        self.request(|reply| Command::Snapshot { reply })
    }

    /// Poll snapshots until `done` holds or `timeout` passes; returns the last snapshot seen.
    pub fn wait_for(
        &self,
        timeout: Duration,
        done: impl Fn(&Snapshot) -> bool,
    ) -> Result<Snapshot, DispatchError> {
        let start = Instant::now();
        loop {
            let snapshot = self.snapshot()?;
            if done(&snapshot) || start.elapsed() >= timeout {
                return Ok(snapshot);
            }
            thread::sleep(Duration::from_millis(5));
        }
    }

    /// Stop the thread and return the final state. In-flight work is left unfinished.
    pub fn shutdown(mut self) -> Result<Snapshot, DispatchError> {
        let _ = self.commands.send(Command::Shutdown);
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| DispatchError::ServiceClosed)?,
            None => Err(DispatchError::ServiceClosed),
        }
    }

    fn request<T>(&self, command: impl FnOnce(Sender<T>) -> Command) -> Result<T, DispatchError> {
        let (reply, response) = mpsc::channel();
        self.commands
            .send(command(reply))
            .map_err(|_| DispatchError::ServiceClosed)?;
        response.recv().map_err(|_| DispatchError::ServiceClosed)
    }
}

impl Drop for DispatchService {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = self.commands.send(Command::Shutdown);
            let _ = handle.join();
        }
    }
}

fn run(mut dispatcher: Dispatcher, inbox: Receiver<Command>) -> Snapshot {
    let started = Instant::now();
    info!("dispatcher thread started");
    loop {
        dispatcher.advance_to(started.elapsed());
        let received = match dispatcher.next_completion() {
            Some(deadline) => {
                // Sleep only until the next completion is due.
                let wait = deadline.saturating_sub(started.elapsed());
                match inbox.recv_timeout(wait) {
                    Ok(command) => command,
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            None => match inbox.recv() {
                Ok(command) => command,
                Err(_) => break,
            },
        };
        dispatcher.advance_to(started.elapsed());
        match received {
            Command::Submit { priority, reply } => {
                let _ = reply.send(dispatcher.submit(priority));
            }
            Command::AddWorker {
                processing_time,
                reply,
            } => {
                let added = match processing_time {
                    Some(processing_time) => dispatcher.add_worker_with_duration(processing_time),
                    None => Ok(dispatcher.add_worker()),
                };
                let _ = reply.send(added);
            }
            Command::RemoveWorker { reply } => {
                let _ = reply.send(dispatcher.remove_worker());
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(dispatcher.snapshot());
            }
            Command::Shutdown => {
                debug!("shutdown requested");
                break;
            }
        }
    }
    info!(
        completed = dispatcher.completed_items().len(),
        queued = dispatcher.queue_len(),
        "dispatcher thread stopped"
    );
    dispatcher.snapshot()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(processing_ms: u64) -> DispatchConfig {
        DispatchConfig {
            processing_ms,
            ..DispatchConfig::default()
        }
    }

    #[test]
    fn completes_work_in_real_time() {
        let service = DispatchService::spawn(&config(20)).expect("spawn service");
        service.add_worker(None).expect("add worker");
        let item = service.submit(Priority::VIP).expect("submit");
        let snapshot = service
            .wait_for(Duration::from_secs(2), |s| s.completed.len() == 1)
            .expect("snapshot");
        assert_eq!(snapshot.completed[0].id, item);
        assert!(snapshot.workers[0].item.is_none());
        let last = service.shutdown().expect("shutdown");
        assert!(last.is_conserved());
    }

    #[test]
    fn queue_waits_for_busy_worker() {
        let service = DispatchService::spawn(&config(5_000)).expect("spawn service");
        service.add_worker(None).expect("add worker");
        service.submit(Priority::NORMAL).expect("submit");
        service.submit(Priority::NORMAL).expect("submit");
        let snapshot = service.snapshot().expect("snapshot");
        assert_eq!(snapshot.queued.len(), 1);
        assert_eq!(snapshot.in_flight.len(), 1);
        service.shutdown().expect("shutdown");
    }

    #[test]
    fn remove_worker_requeues_through_service() {
        let service = DispatchService::spawn(&config(5_000)).expect("spawn service");
        service.add_worker(None).expect("add worker");
        let item = service.submit(Priority::NORMAL).expect("submit");
        let removed = service.remove_worker().expect("remove");
        assert_eq!(removed, Some(1));
        let snapshot = service.snapshot().expect("snapshot");
        assert_eq!(snapshot.queued.len(), 1);
        assert_eq!(snapshot.queued[0].id, item);
        assert_eq!(snapshot.requeued, 1);
        assert_eq!(service.remove_worker().expect("remove"), None);
        service.shutdown().expect("shutdown");
    }

    #[test]
    fn zero_duration_worker_is_reported() {
        let service = DispatchService::spawn(&config(100)).expect("spawn service");
        let result = service.add_worker(Some(Duration::ZERO));
        assert!(matches!(result, Err(DispatchError::InvalidDuration(_))));
        service.shutdown().expect("shutdown");
    }

    #[test]
    fn invalid_config_fails_before_spawn() {
        let result = DispatchService::spawn(&config(0));
        assert!(matches!(result, Err(DispatchError::InvalidDuration(_))));
    }
}
