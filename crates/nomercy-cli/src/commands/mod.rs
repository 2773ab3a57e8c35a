pub mod config;
pub mod enforce;
pub mod status;
pub mod strict;
pub mod task;

use std::error::Error;
use std::sync::Arc;

use nomercy_core::{Config, Engine, Identity, SqliteStore, SystemClock};
use serde::Serialize;

/// Who the command acts for.
pub struct Session {
    pub user_id: String,
    pub display_name: String,
}

impl Session {
    pub fn resolve(user: Option<String>, name: Option<String>) -> Self {
        let user_id = user
            .or_else(|| std::env::var("NOMERCY_USER").ok())
            .or_else(|| std::env::var("USER").ok())
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| "local".to_string());
        let display_name = name.unwrap_or_else(|| user_id.clone());
        Self {
            user_id,
            display_name,
        }
    }

    /// Sign in against the on-disk store with the on-disk config.
    pub fn open(&self) -> Result<(Engine, Config), Box<dyn Error>> {
        let config = Config::load()?;
        let store = SqliteStore::open()?;
        tracing::debug!(user_id = %self.user_id, "opening session");
        let engine = Engine::sign_in(
            Identity::new(self.user_id.clone(), self.display_name.clone()),
            Box::new(store),
            Arc::new(SystemClock),
            &config,
        )?;
        Ok((engine, config))
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Surface writes that did not reach the store. The operation itself
/// already succeeded, so these are warnings, not errors.
pub fn warn_persistence_failures(engine: &mut Engine) {
    for failure in engine.take_persistence_failures() {
        eprintln!(
            "warning: {} not saved ({}): {}",
            failure.target, failure.operation, failure.error
        );
    }
}
