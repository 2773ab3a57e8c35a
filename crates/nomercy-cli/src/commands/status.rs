//! Read-only views: snapshot, report, achievements, leaderboard.

use std::error::Error;

use serde::Serialize;

use super::{print_json, Session};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReportOutput {
    #[serde(flatten)]
    report: nomercy_core::Report,
    history: Vec<nomercy_core::DayReport>,
}

pub fn status(session: &Session) -> Result<(), Box<dyn Error>> {
    let (engine, _) = session.open()?;
    print_json(&engine.snapshot())
}

pub fn report(session: &Session, days: u32) -> Result<(), Box<dyn Error>> {
    let (engine, _) = session.open()?;
    print_json(&ReportOutput {
        report: engine.report(),
        history: engine.history(days),
    })
}

pub fn achievements(session: &Session) -> Result<(), Box<dyn Error>> {
    let (engine, _) = session.open()?;
    print_json(&engine.achievements())
}

pub fn leaderboard(session: &Session, limit: Option<usize>) -> Result<(), Box<dyn Error>> {
    let (engine, config) = session.open()?;
    let entries = engine.leaderboard(limit.unwrap_or(config.leaderboard_size))?;
    print_json(&entries)
}
