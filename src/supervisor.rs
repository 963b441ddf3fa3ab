use std::sync::Arc;

use log::{debug, info};
use nix::{
    errno::Errno,
    sys::signal::{self, Signal},
    unistd::Pid,
};
use parking_lot::Mutex;

/// Ordered identifiers of the processes running in the current wave.
///
/// Cloning shares the underlying list.
#[derive(Debug, Clone, Default)]
pub struct ProcessRegistry {
    pids: Arc<Mutex<Vec<u32>>>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&self, pid: u32) {
        self.pids.lock().push(pid);
    }

    /// Forgets a process that has already been reaped.
    pub fn untrack(&self, pid: u32) {
        self.pids.lock().retain(|&p| p != pid);
    }

    pub fn clear(&self) {
        self.pids.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.pids.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pids.lock().is_empty()
    }

    /// The tracked identifiers in registration order.
    pub fn snapshot(&self) -> Vec<u32> {
        self.pids.lock().clone()
    }

    /// Takes every tracked identifier, leaving the registry empty.
    pub fn drain(&self) -> Vec<u32> {
        std::mem::take(&mut *self.pids.lock())
    }
}

/// Owns the registry of the running wave and tears it down on cancellation.
#[derive(Debug, Clone, Default)]
pub struct Supervisor {
    registry: ProcessRegistry,
}

impl Supervisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &ProcessRegistry {
        &self.registry
    }

    /// Resets the registry for a new wave.
    pub fn begin_wave(&self) {
        self.registry.clear();
    }

    /// Sends `SIGTERM` to every tracked process that is still alive.
    ///
    /// The registry is drained, so a second call signals nothing. Failures to
    /// signal a process that exited in the meantime are ignored.
    ///
    /// # Returns
    /// The number of processes that were sent a termination request.
    pub fn terminate_all(&self) -> usize {
        let pids = self.registry.drain();
        let mut terminated = 0;

        for pid in pids {
            if !is_alive(pid) {
                debug!(pid = pid; "already exited");
                continue;
            }

            if terminate(pid) {
                info!("sent SIGTERM to pid {pid}");
                terminated += 1;
            }
        }

        terminated
    }
}

fn to_pid(pid: u32) -> Option<Pid> {
    match i32::try_from(pid) {
        Ok(raw) if raw > 0 => Some(Pid::from_raw(raw)),
        _ => None,
    }
}

/// Whether `pid` still denotes a process, checked with the null signal.
pub fn is_alive(pid: u32) -> bool {
    let Some(pid) = to_pid(pid) else {
        return false;
    };

    match signal::kill(pid, None) {
        Ok(()) => true,
        // Exists, but belongs to someone else.
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

/// Sends `SIGTERM` to `pid`.
///
/// # Returns
/// Whether the signal was delivered.
pub fn terminate(pid: u32) -> bool {
    let Some(raw) = to_pid(pid) else {
        return false;
    };

    match signal::kill(raw, Signal::SIGTERM) {
        Ok(()) => true,
        Err(e) => {
            debug!("could not signal pid {pid}: {e}");
            false
        }
    }
}
