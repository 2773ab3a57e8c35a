//! Task management commands for CLI.

use chrono::NaiveDate;
use clap::Subcommand;

use super::{print_json, warn_persistence_failures, Session};

#[derive(Subcommand)]
pub enum TaskAction {
    /// Log a new task
    Add {
        /// Task text
        text: String,
        /// Calendar day (YYYY-MM-DD, default: today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Complete a pending task
    Complete {
        /// Task ID
        id: String,
    },
    /// Spend a forgive on a pending task
    Forgive {
        /// Task ID
        id: String,
    },
    /// List tasks for a day
    List {
        /// Calendar day (YYYY-MM-DD, default: today)
        #[arg(long)]
        date: Option<NaiveDate>,
        /// List every task instead of one day
        #[arg(long)]
        all: bool,
    },
}

pub fn run(session: &Session, action: TaskAction) -> Result<(), Box<dyn std::error::Error>> {
    let (mut engine, _) = session.open()?;

    match action {
        TaskAction::Add { text, date } => {
            let event = engine.add_task(date, &text)?;
            print_json(&event)?;
        }
        TaskAction::Complete { id } => {
            let events = engine.complete_task(&id)?;
            print_json(&events)?;
        }
        TaskAction::Forgive { id } => {
            let event = engine.forgive_task(&id)?;
            print_json(&event)?;
        }
        TaskAction::List { date, all } => {
            let tasks = if all {
                let mut tasks: Vec<_> = engine.ledger().iter().cloned().collect();
                tasks.sort_by(|a, b| {
                    (a.calendar_date, a.created_at).cmp(&(b.calendar_date, b.created_at))
                });
                tasks
            } else {
                engine.tasks_on(date.unwrap_or_else(|| engine.today()))
            };
            print_json(&tasks)?;
        }
    }

    warn_persistence_failures(&mut engine);
    Ok(())
}
