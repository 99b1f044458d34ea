use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;

use sessiontally_core::{
    reconcile, CarryOver, ConflictPolicy, DurationTally, PendingOpen, StrayEvent, UserAverage,
};
use sessiontally_logging::{Logger, RunEvent};
use sessiontally_store::{read_event_log, CarryOverFile, MalformedLines, StrayReportWriter};

use crate::config::StrayHandling;

/// Everything a run needs, after CLI and config have been merged.
#[derive(Debug)]
pub struct RunSettings {
    pub log_files: Vec<PathBuf>,
    pub policy: ConflictPolicy,
    pub strays: StrayHandling,
    pub carry_over: PathBuf,
    pub read_carry_over: bool,
    pub write_carry_over: bool,
    pub stray_report: Option<PathBuf>,
    pub malformed: MalformedLines,
}

/// Result of a run, as printed or serialized.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub files: usize,
    pub sessions: usize,
    pub averages: Vec<UserAverage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stray_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strays: Option<Vec<StrayEvent>>,
    pub pending: Vec<PendingOpen>,
}

/// Process each log file in order, threading the carry-over set through them.
///
/// Nothing is written until every file has reconciled cleanly, so a failed
/// run leaves the carry-over file as it was.
pub fn execute(settings: &RunSettings, logger: &Logger) -> Result<RunSummary> {
    logger.log(&RunEvent::RunStarted {
        files: settings.log_files.len(),
        policy: settings.policy.to_string(),
    });

    let carry_file = CarryOverFile::with_path(settings.carry_over.clone());
    let _lock = if settings.read_carry_over || settings.write_carry_over {
        Some(carry_file.lock().context("Failed to lock carry-over file")?)
    } else {
        None
    };

    let mut carry_over = if settings.read_carry_over {
        let loaded = carry_file.load().context("Failed to load carry-over")?;
        logger.log(&RunEvent::CarryOverLoaded {
            path: carry_file.path().to_path_buf(),
            pending: loaded.len(),
        });
        loaded
    } else {
        CarryOver::new()
    };

    let mut tally = DurationTally::new();
    let mut strays: Vec<StrayEvent> = Vec::new();

    for path in &settings.log_files {
        let log = read_event_log(path, settings.malformed)?;
        let event_count = log.events.len();

        let outcome = reconcile(carry_over, log.events, settings.policy)
            .with_context(|| format!("Data-integrity error in {:?}", path))?;

        tally.extend(&outcome.sessions);
        logger.log(&RunEvent::FileProcessed {
            path: path.clone(),
            events: event_count,
            skipped: log.skipped,
            sessions: outcome.sessions.len(),
            strays: outcome.strays.len(),
            pending: outcome.carry_over.len(),
        });

        if settings.strays == StrayHandling::Report {
            for stray in &outcome.strays {
                logger.log(&RunEvent::StrayDetected {
                    user_id: stray.user_id.clone(),
                    timestamp: stray.timestamp.as_secs(),
                    action: stray.action.to_string(),
                    reason: stray.reason.to_string(),
                });
            }
        }

        strays.extend(outcome.strays);
        carry_over = outcome.carry_over;
    }

    if settings.write_carry_over {
        carry_file
            .save(&carry_over)
            .context("Failed to write carry-over")?;
        logger.log(&RunEvent::CarryOverWritten {
            path: carry_file.path().to_path_buf(),
            pending: carry_over.len(),
        });
    }

    if let (StrayHandling::Report, Some(report_path)) = (settings.strays, &settings.stray_report) {
        let mut writer = StrayReportWriter::create(report_path)
            .with_context(|| format!("Failed to create stray report {:?}", report_path))?;
        writer
            .write_all(&strays)
            .with_context(|| format!("Failed to write stray report {:?}", report_path))?;
        writer
            .finish()
            .with_context(|| format!("Failed to flush stray report {:?}", report_path))?;
    }

    let averages = tally.averages();
    logger.log(&RunEvent::RunCompleted {
        files: settings.log_files.len(),
        sessions: tally.session_count(),
        users: averages.len(),
        strays: strays.len(),
        pending: carry_over.len(),
    });

    let (stray_count, strays) = match settings.strays {
        StrayHandling::Discard => (None, None),
        StrayHandling::Count => (Some(strays.len()), None),
        StrayHandling::Report => (Some(strays.len()), Some(strays)),
    };

    Ok(RunSummary {
        files: settings.log_files.len(),
        sessions: tally.session_count(),
        averages,
        stray_count,
        strays,
        pending: carry_over.into_iter().collect(),
    })
}
