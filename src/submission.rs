use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use chrono::Utc;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::SpreadsheetConfig;
use crate::error::{ScoutError, ScoutResult};
use crate::field::{is_valid_timestamp, ScoredEvent};
use crate::form::{MatchMeta, ScoutingForm};

/// Everything the scout hands over for one match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub meta: MatchMeta,
    pub autonomous_missed: u32,
    pub autonomous_made: u32,
    pub teleop_missed: u32,
    pub teleop_made: u32,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_events: Option<Vec<ScoredEvent>>,
}

impl Submission {
    pub fn from_form(form: &ScoutingForm, field_events: Option<Vec<ScoredEvent>>) -> Self {
        Self {
            meta: form.meta.clone(),
            autonomous_missed: form.autonomous_missed,
            autonomous_made: form.autonomous_made,
            teleop_missed: form.teleop_missed,
            teleop_made: form.teleop_made,
            tags: form.tags.clone(),
            field_events,
        }
    }

    /// Collects every problem as `path: message`
    pub fn validate(&self) -> ScoutResult<()> {
        let mut issues = Vec::new();

        if !self.meta.team_number.is_some_and(|n| n >= 1) {
            issues.push("meta.teamNumber: Team Number is required".to_string());
        }
        if !self.meta.qualification.is_some_and(|n| n >= 1) {
            issues.push("meta.qualification: Qualification Number is required".to_string());
        }
        if let Some(events) = &self.field_events {
            for (i, event) in events.iter().enumerate() {
                if !is_valid_timestamp(&event.timestamp) {
                    issues.push(format!(
                        "fieldEvents.{i}.timestamp: Timestamp must be in MM:SS format"
                    ));
                }
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ScoutError::Validation(issues.join(", ")))
        }
    }
}

/// Server-side attribution attached to every stored row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoutAttribution {
    pub organisation_id: String,
    pub scout_user_id: String,
    pub scout_name: String,
}

/// Outcome shown to the scout as a toast
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionResult {
    pub success: bool,
    pub message: String,
}

impl SubmissionResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Boundary to whatever stores submissions
pub trait Submitter {
    fn submit(&self, submission: &Submission) -> SubmissionResult;
}

const SHEET_HEADER: [&str; 14] = [
    "team_number",
    "qualification",
    "team_name",
    "alliance_colour",
    "autonomous_missed",
    "autonomous_made",
    "teleop_missed",
    "teleop_made",
    "tags",
    "field_events",
    "organisation_id",
    "scout_user_id",
    "scout_name",
    "created_at",
];

/// Appends one CSV row per submission to
/// `<root>/<spreadsheet_id>/<sheet_id>.csv`
#[derive(Debug, Clone)]
pub struct CsvSheetSubmitter {
    root: PathBuf,
    sheet: Option<SpreadsheetConfig>,
    attribution: Option<ScoutAttribution>,
}

impl CsvSheetSubmitter {
    pub fn new<P: AsRef<Path>>(root: P, sheet: Option<SpreadsheetConfig>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            sheet,
            attribution: None,
        }
    }

    pub fn with_attribution(mut self, attribution: ScoutAttribution) -> Self {
        self.attribution = Some(attribution);
        self
    }

    pub fn sheet_path(&self) -> Option<PathBuf> {
        self.sheet.as_ref().map(|s| {
            self.root
                .join(&s.spreadsheet_id)
                .join(format!("{}.csv", s.sheet_id))
        })
    }

    fn append_row(&self, path: &Path, submission: &Submission) -> ScoutResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let needs_header = !path.exists();
        let file = OpenOptions::new().append(true).create(true).open(path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if needs_header {
            writer.write_record(SHEET_HEADER)?;
        }

        let meta = &submission.meta;
        let field_events = match &submission.field_events {
            Some(events) => serde_json::to_string(events)?,
            None => String::new(),
        };
        let (org, user, name) = match &self.attribution {
            Some(a) => (
                a.organisation_id.as_str(),
                a.scout_user_id.as_str(),
                a.scout_name.as_str(),
            ),
            None => ("", "", ""),
        };

        writer.write_record([
            meta.team_number.map(|n| n.to_string()).unwrap_or_default(),
            meta.qualification.map(|n| n.to_string()).unwrap_or_default(),
            meta.team_name.clone().unwrap_or_default(),
            meta.alliance_colour
                .map(|c| c.to_string())
                .unwrap_or_default(),
            submission.autonomous_missed.to_string(),
            submission.autonomous_made.to_string(),
            submission.teleop_missed.to_string(),
            submission.teleop_made.to_string(),
            serde_json::to_string(&submission.tags)?,
            field_events,
            org.to_string(),
            user.to_string(),
            name.to_string(),
            Utc::now().to_rfc3339(),
        ])?;
        writer.flush()?;
        Ok(())
    }
}

impl Submitter for CsvSheetSubmitter {
    fn submit(&self, submission: &Submission) -> SubmissionResult {
        let Some(path) = self.sheet_path() else {
            return SubmissionResult::failed("Spreadsheet config is missing");
        };

        if let Err(e) = submission.validate() {
            warn!(error = %e, "submission rejected");
            return SubmissionResult::failed(e.to_string());
        }

        match self.append_row(&path, submission) {
            Ok(()) => {
                info!(
                    path = %path.display(),
                    tags = %submission.tags.iter().join(","),
                    "submission stored"
                );
                SubmissionResult::ok("Data submitted successfully")
            }
            Err(e) => {
                warn!(error = %e, "submission failed");
                SubmissionResult::failed(format!("Submission failed: {e}"))
            }
        }
    }
}
