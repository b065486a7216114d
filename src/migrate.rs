//! Per-entry planning and execution.
//!
//! Each directory under a prod root is classified, given a `Plan`, and the
//! plan's filesystem steps are run (or only reported on a dry run). Failures
//! are recorded in the entry's `EntryReport` and never stop the batch.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::MigrationConfig;
use crate::discover;
use crate::fsops::FsMutator;
use crate::scheme::{classify, Scheme};
use crate::slug::SlugRules;

/// Name a legacy directory gets once merged into an existing new-scheme one.
pub const OLD_HOME: &str = "_old_home";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    /// Already in the new scheme.
    SkipCurrent,
    /// Legacy name whose slug is the same name.
    SkipUnchanged,
    Rename { to: PathBuf },
    /// Target exists: move the entry into it as `staged`, then rename to `old_home`.
    Merge { target: PathBuf, staged: PathBuf, old_home: PathBuf },
    /// A previous merge moved `staged` but never renamed it.
    ResumeMerge { staged: PathBuf, old_home: PathBuf },
    Blocked { reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Move,
    Rename,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Applied,
    DryRun,
    Failed(String),
    /// An earlier step of the same plan failed.
    NotAttempted,
}

#[derive(Debug, Clone)]
pub struct Step {
    pub action: Action,
    pub from: PathBuf,
    pub to: PathBuf,
    pub outcome: StepOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeState {
    NotStarted,
    MovedPendingRename,
    Completed,
}

#[derive(Debug)]
pub struct EntryReport {
    pub path: PathBuf,
    pub scheme: Scheme,
    pub plan: Plan,
    pub dry_run: bool,
    pub steps: Vec<Step>,
}

impl EntryReport {
    pub fn failed(&self) -> bool {
        self.steps.iter().any(|s| matches!(s.outcome, StepOutcome::Failed(_)))
    }

    /// Progress of a merge; None for plans that are not merges.
    pub fn merge_state(&self) -> Option<MergeState> {
        let applied = |i: usize| self.steps.get(i).map(|s| s.outcome == StepOutcome::Applied).unwrap_or(false);
        match self.plan {
            Plan::Merge { .. } => Some(match (applied(0), applied(1)) {
                (true, true) => MergeState::Completed,
                (true, false) => MergeState::MovedPendingRename,
                _ => MergeState::NotStarted,
            }),
            Plan::ResumeMerge { .. } => Some(if applied(0) { MergeState::Completed } else { MergeState::MovedPendingRename }),
            _ => None,
        }
    }
}

/// Decide what to do with the directory `name` at `path`. Only reads the
/// filesystem.
pub fn plan_entry(name: &str, path: &Path, rules: &SlugRules) -> (Scheme, Plan) {
    let scheme = classify(name);
    let plan = match &scheme {
        Scheme::Current(_) => find_stranded_merge(name, path, rules).unwrap_or(Plan::SkipCurrent),
        Scheme::Legacy { username } => {
            let new_name = rules.derive(username);
            let target = path.with_file_name(&new_name);
            if target == path {
                find_stranded_merge(name, path, rules).unwrap_or(Plan::SkipUnchanged)
            } else if target.is_dir() {
                plan_merge(name, target)
            } else if target.exists() {
                Plan::Blocked { reason: format!("'{}' exists and is not a directory", target.display()) }
            } else {
                Plan::Rename { to: target }
            }
        }
    };
    (scheme, plan)
}

fn plan_merge(name: &str, target: PathBuf) -> Plan {
    let staged = target.join(name);
    let old_home = target.join(OLD_HOME);
    if old_home.exists() {
        return Plan::Blocked { reason: format!("'{}' already exists", old_home.display()) };
    }
    if staged.exists() {
        return Plan::Blocked { reason: format!("'{}' already exists", staged.display()) };
    }
    Plan::Merge { target, staged, old_home }
}

// A merge interrupted between its two steps leaves the legacy directory inside
// its target under its legacy name. Recognise it by deriving the child's slug.
fn find_stranded_merge(dir_name: &str, dir: &Path, rules: &SlugRules) -> Option<Plan> {
    let children = match discover::subdirectory_names(dir) {
        Ok(c) => c,
        Err(e) => {
            log::warn!("Could not look for an interrupted merge in {}: {:#}", dir.display(), e);
            return None;
        }
    };
    for child in children {
        if child == OLD_HOME { continue; }
        let Scheme::Legacy { username } = classify(&child) else { continue };
        let slug = rules.derive(&username);
        if slug == child || slug != dir_name { continue; }
        // the move never happened if the source is still there
        let source = dir.with_file_name(&child);
        if source.exists() {
            return Some(Plan::Blocked {
                reason: format!("'{}' still exists next to '{}'", source.display(), dir.join(&child).display()),
            });
        }
        let old_home = dir.join(OLD_HOME);
        if old_home.exists() {
            return Some(Plan::Blocked {
                reason: format!("interrupted merge '{}' found but '{}' already exists", child, old_home.display()),
            });
        }
        return Some(Plan::ResumeMerge { staged: dir.join(&child), old_home });
    }
    None
}

fn run_step(fs: &dyn FsMutator, force: bool, action: Action, from: &Path, to: &Path) -> Step {
    let outcome = if !force {
        StepOutcome::DryRun
    } else {
        let res = match action {
            Action::Move => fs.move_dir(from, to),
            Action::Rename => fs.rename(from, to),
        };
        match res {
            Ok(()) => StepOutcome::Applied,
            Err(e) => {
                log::error!("{:?} {} -> {} failed: {:#}", action, from.display(), to.display(), e);
                StepOutcome::Failed(format!("{:#}", e))
            }
        }
    };
    Step { action, from: from.to_path_buf(), to: to.to_path_buf(), outcome }
}

/// Carry out the filesystem steps of `plan`. With `force` unset every step is
/// reported as a dry run and nothing is touched.
pub fn execute(path: &Path, plan: &Plan, force: bool, fs: &dyn FsMutator) -> Vec<Step> {
    match plan {
        Plan::Rename { to } => vec![run_step(fs, force, Action::Rename, path, to)],
        Plan::Merge { staged, old_home, .. } => {
            let moved = run_step(fs, force, Action::Move, path, staged);
            let renamed = if matches!(moved.outcome, StepOutcome::Failed(_)) {
                Step { action: Action::Rename, from: staged.clone(), to: old_home.clone(), outcome: StepOutcome::NotAttempted }
            } else {
                run_step(fs, force, Action::Rename, staged, old_home)
            };
            vec![moved, renamed]
        }
        Plan::ResumeMerge { staged, old_home } => vec![run_step(fs, force, Action::Rename, staged, old_home)],
        Plan::SkipCurrent | Plan::SkipUnchanged | Plan::Blocked { .. } => Vec::new(),
    }
}

pub fn process_entry(name: &str, path: &Path, config: &MigrationConfig, fs: &dyn FsMutator) -> EntryReport {
    let (scheme, plan) = if path.is_dir() {
        plan_entry(name, path, &config.rules)
    } else {
        // moved away by an earlier merge in the same run
        (classify(name), Plan::Blocked { reason: "directory no longer exists".to_string() })
    };
    let steps = execute(path, &plan, config.force, fs);
    EntryReport { path: path.to_path_buf(), scheme, plan, dry_run: !config.force, steps }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub entries: usize,
    pub current: usize,
    pub unchanged: usize,
    pub renamed: usize,
    pub merged: usize,
    pub resumed: usize,
    pub blocked: usize,
    pub failed: usize,
    pub missing_roots: usize,
}

impl RunSummary {
    fn record(&mut self, report: &EntryReport) {
        self.entries += 1;
        match report.plan {
            Plan::SkipCurrent => self.current += 1,
            Plan::SkipUnchanged => self.unchanged += 1,
            Plan::Rename { .. } => self.renamed += 1,
            Plan::Merge { .. } => self.merged += 1,
            Plan::ResumeMerge { .. } => self.resumed += 1,
            Plan::Blocked { .. } => self.blocked += 1,
        }
        if report.failed() { self.failed += 1; }
    }
}

/// Process every entry of every prod dir in order, handing each report to
/// `on_report` as soon as it is done.
pub fn run(config: &MigrationConfig, prod_dirs: &[PathBuf], fs: &dyn FsMutator, mut on_report: impl FnMut(&EntryReport)) -> RunSummary {
    let mut summary = RunSummary::default();
    for prod in prod_dirs {
        if !prod.is_dir() {
            log::warn!("The directory {} does not exist.", prod.display());
            summary.missing_roots += 1;
            continue;
        }
        let entries = match discover::entries(prod, &config.exclude_dirs) {
            Ok(e) => e,
            Err(e) => {
                log::error!("Skipping {}: {:#}", prod.display(), e);
                summary.missing_roots += 1;
                continue;
            }
        };
        for (name, path) in entries {
            let report = process_entry(&name, &path, config, fs);
            summary.record(&report);
            on_report(&report);
        }
    }
    summary
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Move => write!(f, "move"),
            Action::Rename => write!(f, "rename"),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (from, to) = (self.from.display(), self.to.display());
        match &self.outcome {
            StepOutcome::Applied => {
                let done = match self.action { Action::Move => "moved", Action::Rename => "renamed" };
                write!(f, "Successfully {} '{}' to '{}'.", done, from, to)
            }
            StepOutcome::DryRun => write!(f, "Would {} '{}' to '{}'.", self.action, from, to),
            StepOutcome::Failed(e) => write!(f, "Error: failed to {} '{}' to '{}': {}", self.action, from, to, e),
            StepOutcome::NotAttempted => write!(f, "Not attempted: {} '{}' to '{}'.", self.action, from, to),
        }
    }
}

impl fmt::Display for EntryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = self.path.display();
        writeln!(f, "-------- Processing {} --------", path)?;
        if self.dry_run { writeln!(f, "Dry run. No change is made.")?; }
        match &self.scheme {
            Scheme::Legacy { username } => {
                writeln!(f, "'{}' is using the old naming scheme.", path)?;
                writeln!(f, "username is '{}'", username)?;
            }
            Scheme::Current(reason) => writeln!(f, "'{}' is using the new naming scheme ({}).", path, reason)?,
        }
        match &self.plan {
            Plan::SkipCurrent => writeln!(f, "Skipping '{}'.", path)?,
            Plan::SkipUnchanged => writeln!(f, "Skipping '{}': the new name is the same as the old name.", path)?,
            Plan::Rename { to } => writeln!(f, "'{}' does not exist, renaming the old directory to the new one.", to.display())?,
            Plan::Merge { target, .. } => {
                writeln!(f, "'{}' already exists, moving the old directory into it as {}.", target.display(), OLD_HOME)?
            }
            Plan::ResumeMerge { staged, .. } => {
                writeln!(f, "Found interrupted merge '{}', finishing the rename to {}.", staged.display(), OLD_HOME)?
            }
            Plan::Blocked { reason } => writeln!(f, "Skipping '{}': {}.", path, reason)?,
        }
        for step in &self.steps {
            writeln!(f, "{}", step)?;
        }
        if self.merge_state() == Some(MergeState::MovedPendingRename) {
            writeln!(f, "Warning: merge left half done; rerun to finish it.")?;
        }
        Ok(())
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} entries: {} current, {} unchanged, {} renamed, {} merged, {} resumed, {} blocked, {} failed",
            self.entries, self.current, self.unchanged, self.renamed, self.merged, self.resumed, self.blocked, self.failed
        )?;
        if self.missing_roots > 0 { write!(f, " ({} prod directories skipped)", self.missing_roots)?; }
        Ok(())
    }
}
