use clap::Subcommand;
use nomercy_core::StrictDays;

use super::{print_json, warn_persistence_failures, Session};

#[derive(Subcommand)]
pub enum StrictAction {
    /// Set the strict weekdays (e.g. "mon,wed,fri", "all", "none")
    Days {
        days: String,
    },
    /// Set the wake-up time (HH:MM)
    Wake {
        time: String,
    },
    /// Disable death mode
    Off,
}

pub fn run(session: &Session, action: StrictAction) -> Result<(), Box<dyn std::error::Error>> {
    let (mut engine, _) = session.open()?;

    let events = match action {
        StrictAction::Days { days } => engine.set_strict_days(StrictDays::parse_list(&days)?),
        StrictAction::Wake { time } => engine.set_wake_time(&time)?,
        StrictAction::Off => engine.set_strict_days(StrictDays::none()),
    };
    print_json(&events)?;

    warn_persistence_failures(&mut engine);
    Ok(())
}
