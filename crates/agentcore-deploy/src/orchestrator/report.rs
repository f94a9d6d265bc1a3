//! Step reports and summary display

use agentcore_deploy_common::ResourceKind;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Deploy,
    Teardown,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Deploy => f.write_str("deploy"),
            Mode::Teardown => f.write_str("teardown"),
        }
    }
}

/// What happened to one planned step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    /// No identifier resolved; nothing was called
    Skipped,
    /// Teardown calls were made; `warnings` lists the ones that failed
    Attempted { warnings: Vec<String> },
    Created { id: String },
    Reused { id: String },
    Failed { error: String },
    /// An earlier deploy step failed
    NotAttempted,
}

impl StepOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            StepOutcome::Skipped => "skipped (not found)",
            StepOutcome::Attempted { warnings } if warnings.is_empty() => "deleted",
            StepOutcome::Attempted { .. } => "attempted",
            StepOutcome::Created { .. } => "created",
            StepOutcome::Reused { .. } => "reused",
            StepOutcome::Failed { .. } => "failed",
            StepOutcome::NotAttempted => "not attempted",
        }
    }

    fn color(&self) -> Color {
        match self {
            StepOutcome::Created { .. } | StepOutcome::Reused { .. } => Color::Green,
            StepOutcome::Attempted { warnings } if warnings.is_empty() => Color::Green,
            StepOutcome::Attempted { .. } => Color::Yellow,
            StepOutcome::Failed { .. } => Color::Red,
            StepOutcome::Skipped | StepOutcome::NotAttempted => Color::DarkGrey,
        }
    }

    fn detail(&self) -> String {
        match self {
            StepOutcome::Attempted { warnings } => warnings.join("\n"),
            StepOutcome::Failed { error } => error.clone(),
            _ => String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReport {
    pub name: String,
    pub kind: ResourceKind,
    pub id: Option<String>,
    #[serde(flatten)]
    pub outcome: StepOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub mode: Mode,
    pub steps: Vec<StepReport>,
}

impl Report {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            steps: Vec::new(),
        }
    }

    pub fn push(
        &mut self,
        name: impl Into<String>,
        kind: ResourceKind,
        id: Option<String>,
        outcome: StepOutcome,
    ) {
        self.steps.push(StepReport {
            name: name.into(),
            kind,
            id,
            outcome,
        });
    }

    pub fn step(&self, name: &str) -> Option<&StepReport> {
        self.steps.iter().find(|s| s.name == name)
    }

    pub fn has_failures(&self) -> bool {
        self.steps
            .iter()
            .any(|s| matches!(s.outcome, StepOutcome::Failed { .. }))
    }

    /// Number of steps that logged at least one warning
    pub fn warning_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(&s.outcome, StepOutcome::Attempted { warnings } if !warnings.is_empty()))
            .count()
    }

    pub fn to_table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL_CONDENSED)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec!["Resource", "Kind", "Identifier", "Outcome", "Details"]);

        for step in &self.steps {
            table.add_row(vec![
                Cell::new(&step.name),
                Cell::new(step.kind),
                Cell::new(step.id.as_deref().unwrap_or("-")),
                Cell::new(step.outcome.label()).fg(step.outcome.color()),
                Cell::new(step.outcome.detail()),
            ]);
        }
        table
    }

    /// Print the summary table to stdout
    pub fn print(&self) {
        println!("\n=== {} summary ===\n", self.mode);
        println!("{}", self.to_table());
    }
}

/// Whether a resource is currently recorded as deployed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "id", rename_all = "snake_case")]
pub enum Deployment {
    Deployed(String),
    NotDeployed,
}

impl fmt::Display for Deployment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Deployment::Deployed(id) => f.write_str(id),
            Deployment::NotDeployed => f.write_str("not deployed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusEntry {
    pub name: String,
    pub kind: ResourceKind,
    pub deployment: Deployment,
}

pub fn status_table(entries: &[StatusEntry]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Resource", "Kind", "Status"]);

    for entry in entries {
        let color = match entry.deployment {
            Deployment::Deployed(_) => Color::Green,
            Deployment::NotDeployed => Color::DarkGrey,
        };
        table.add_row(vec![
            Cell::new(&entry.name),
            Cell::new(entry.kind),
            Cell::new(&entry.deployment).fg(color),
        ]);
    }
    table
}
