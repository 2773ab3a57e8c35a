//! Death-mode enforcement commands.

use std::error::Error;
use std::time::Duration;

use nomercy_core::scheduler::{self, EnforcementScheduler};
use nomercy_core::Event;

use super::{print_json, warn_persistence_failures, Session};

/// One check. Prints the penalty event, or the verdict when nothing fired.
pub fn tick(session: &Session) -> Result<(), Box<dyn Error>> {
    let (mut engine, _) = session.open()?;
    match engine.tick() {
        Some(event) => print_json(&event)?,
        None => print_json(&engine.verdict())?,
    }
    warn_persistence_failures(&mut engine);
    Ok(())
}

/// Check on an interval until Ctrl-C, printing one JSON line per penalty.
pub fn watch(session: &Session, interval: Option<u64>) -> Result<(), Box<dyn Error>> {
    let (engine, config) = session.open()?;
    let period = interval
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.tick_interval());

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let shared = scheduler::shared(engine);
        let scheduler = EnforcementScheduler::new(shared.clone(), period);
        tracing::info!(user_id = %session.user_id, "watch started");
        eprintln!("watching death mode every {}s (Ctrl-C to stop)", scheduler.period().as_secs());

        let (handle, shutdown) = scheduler.spawn(|event: Event| {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(e) => eprintln!("error: {e}"),
            }
        });

        tokio::signal::ctrl_c().await?;
        let _ = shutdown.send(true);
        handle.await?;

        warn_persistence_failures(&mut *shared.lock().await);
        Ok::<(), Box<dyn Error>>(())
    })
}
