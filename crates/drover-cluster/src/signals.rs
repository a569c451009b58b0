//! Signal router: OS signals in, supervisor commands out.
//!
//! | Signal           | Command          |
//! |------------------|------------------|
//! | `SIGTTIN`        | `ScaleBy(+1)`    |
//! | `SIGTTOU`        | `ScaleBy(-1)`    |
//! | `SIGUSR2`        | `RollingReload`  |
//! | `SIGHUP`/`WINCH` | `FullReload`     |
//! | `SIGTERM`/`INT`  | `Stop`           |
//!
//! A dedicated thread iterates `signal_hook` deliveries and posts the mapped
//! command onto the master's event queue. Anything unmapped is dropped.

use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM, SIGTTIN, SIGTTOU, SIGUSR2, SIGWINCH};
use signal_hook::iterator::{Handle, Signals};
use tracing::{debug, info, warn};

use drover_types::{Command, DroverError};

/// Every signal the master intercepts.
pub const ROUTED_SIGNALS: [i32; 7] = [SIGTTIN, SIGTTOU, SIGUSR2, SIGHUP, SIGWINCH, SIGTERM, SIGINT];

/// Map a signal number to the command it requests.
pub fn route(signo: i32) -> Option<Command> {
    match signo {
        SIGTTIN => Some(Command::ScaleBy(1)),
        SIGTTOU => Some(Command::ScaleBy(-1)),
        SIGUSR2 => Some(Command::RollingReload),
        SIGHUP | SIGWINCH => Some(Command::FullReload),
        SIGTERM | SIGINT => Some(Command::Stop),
        _ => None,
    }
}

/// Running signal listener. Dropping it unregisters the handlers and joins
/// the listener thread.
pub struct SignalRouter {
    handle: Handle,
    thread: Option<JoinHandle<()>>,
}

impl SignalRouter {
    /// Register handlers for [`ROUTED_SIGNALS`] and start forwarding into `tx`.
    pub fn install<E>(tx: mpsc::Sender<E>) -> Result<Self, DroverError>
    where
        E: From<Command> + Send + 'static,
    {
        let mut signals = Signals::new(ROUTED_SIGNALS)
            .map_err(|e| DroverError::Signal(format!("failed to register signal handlers: {e}")))?;
        let handle = signals.handle();

        let thread = thread::Builder::new()
            .name("drover-signals".into())
            .spawn(move || {
                for signo in signals.forever() {
                    let Some(command) = route(signo) else {
                        debug!(signo, "ignoring unrouted signal");
                        continue;
                    };
                    info!(signo, ?command, "signal received");
                    if tx.send(E::from(command)).is_err() {
                        warn!(signo, "event queue closed, signal listener exiting");
                        break;
                    }
                }
            })
            .map_err(|e| DroverError::Signal(format!("failed to start signal listener: {e}")))?;

        Ok(Self {
            handle,
            thread: Some(thread),
        })
    }
}

impl Drop for SignalRouter {
    fn drop(&mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("signal listener thread panicked");
            }
        }
    }
}
