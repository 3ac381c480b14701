//! Actor Supervisor
//!
//! Starts the two actors on their own named threads and joins both, whether
//! they completed, stopped on a mismatch or failed.

use spiduplex_core::{ActorOutcome, MasterActor, MasterOutcome, SlaveActor};
use spiduplex_report::ActorRole;
use spiduplex_transport::{ReadinessGate, Transport};
use std::any::Any;
use std::thread;
use thiserror::Error;
use tracing::{debug, error};

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("Failed to spawn {role} thread: {source}")]
    SpawnFailed {
        role: ActorRole,
        #[source]
        source: std::io::Error,
    },

    #[error("{role} actor panicked: {message}")]
    ActorPanicked { role: ActorRole, message: String },
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

/// Run both actors concurrently and wait for both.
pub fn run_actors<M, G, S>(
    master: MasterActor<M, G>,
    slave: SlaveActor<S>,
) -> Result<(MasterOutcome, ActorOutcome), SupervisorError>
where
    M: Transport + 'static,
    G: ReadinessGate + 'static,
    S: Transport + 'static,
{
    let slave = thread::Builder::new()
        .name("spi-slave".to_string())
        .spawn(move || slave.run())
        .map_err(|source| SupervisorError::SpawnFailed {
            role: ActorRole::Slave,
            source,
        })?;
    let master = thread::Builder::new()
        .name("spi-master".to_string())
        .spawn(move || master.run())
        .map_err(|source| SupervisorError::SpawnFailed {
            role: ActorRole::Master,
            source,
        })?;
    debug!("actors started");

    let slave = slave.join();
    let master = master.join();

    let slave = slave.map_err(|panic| {
        let message = panic_message(panic);
        error!(%message, "slave actor panicked");
        SupervisorError::ActorPanicked {
            role: ActorRole::Slave,
            message,
        }
    });
    let master = master.map_err(|panic| {
        let message = panic_message(panic);
        error!(%message, "master actor panicked");
        SupervisorError::ActorPanicked {
            role: ActorRole::Master,
            message,
        }
    });

    Ok((master?, slave?))
}
