//! Event outbox for collaborator side effects
//!
//! Tree operations publish a [`TreeEvent`] after their mutation succeeds and
//! never call the audit log or notifier inline. An [`EventDispatcher`] turns
//! events into mod log entries and notifications, either on demand
//! (`dispatch_pending`) or on a background thread (`spawn`). Collaborator
//! failures are logged and dropped.

use crate::detach::DeleteReport;
use crate::relocate::RelocationReport;
use canopy_core::{
    AuditSink, BranchId, ModAction, ModLogEntry, ModeratorRoster, Notification,
    NotificationKind, Notifier, RelocationRequest, Username,
};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, warn};

/// Something that happened to the tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeEvent {
    BranchCreated {
        branch: BranchId,
        parent: BranchId,
        actor: Username,
    },
    RelocationProposed {
        request: RelocationRequest,
    },
    RelocationAccepted {
        report: RelocationReport,
        actor: Username,
        /// Who proposed it; `None` for an auto-accepted move to the root
        proposer: Option<Username>,
    },
    RelocationRejected {
        request: RelocationRequest,
        actor: Username,
    },
    BranchDetached {
        report: RelocationReport,
        actor: Username,
    },
    BranchDeleted {
        report: DeleteReport,
        actor: Username,
    },
}

impl TreeEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::BranchCreated { .. } => "branch-created",
            Self::RelocationProposed { .. } => "relocation-proposed",
            Self::RelocationAccepted { .. } => "relocation-accepted",
            Self::RelocationRejected { .. } => "relocation-rejected",
            Self::BranchDetached { .. } => "branch-detached",
            Self::BranchDeleted { .. } => "branch-deleted",
        }
    }
}

/// Sending half of the outbox, held by the engine
#[derive(Clone)]
pub struct Outbox {
    tx: Sender<TreeEvent>,
}

impl Outbox {
    /// New outbox and the receiver to hand to an [`EventDispatcher`]
    pub fn channel() -> (Self, Receiver<TreeEvent>) {
        let (tx, rx) = unbounded();
        (Self { tx }, rx)
    }

    /// Outbox whose events are discarded
    pub fn discard() -> Self {
        let (outbox, _rx) = Self::channel();
        outbox
    }

    pub fn publish(&self, event: TreeEvent) {
        debug!("publish {}", event.name());
        if self.tx.send(event).is_err() {
            debug!("outbox has no dispatcher; event dropped");
        }
    }
}

/// Delivers outbox events to the audit log and notifier
pub struct EventDispatcher {
    rx: Receiver<TreeEvent>,
    audit: Arc<dyn AuditSink>,
    notifier: Arc<dyn Notifier>,
    roster: Arc<dyn ModeratorRoster>,
    root: BranchId,
}

impl EventDispatcher {
    pub fn new(
        rx: Receiver<TreeEvent>,
        audit: Arc<dyn AuditSink>,
        notifier: Arc<dyn Notifier>,
        roster: Arc<dyn ModeratorRoster>,
        root: BranchId,
    ) -> Self {
        Self {
            rx,
            audit,
            notifier,
            roster,
            root,
        }
    }

    /// Deliver everything queued so far; returns the number of events handled
    pub fn dispatch_pending(&self) -> usize {
        let mut handled = 0;
        for event in self.rx.try_iter() {
            self.deliver(&event);
            handled += 1;
        }
        handled
    }

    /// Deliver on a background thread until every [`Outbox`] is dropped
    pub fn spawn(self) -> JoinHandle<usize> {
        std::thread::spawn(move || {
            let mut handled = 0;
            while let Ok(event) = self.rx.recv() {
                self.deliver(&event);
                handled += 1;
            }
            handled
        })
    }

    /// Side effects for one event
    pub fn deliver(&self, event: &TreeEvent) {
        match event {
            TreeEvent::BranchCreated {
                branch,
                parent,
                actor,
            } => {
                self.log(ModLogEntry::new(branch.clone(), actor, ModAction::CreateBranch).with("parent", parent));
            }
            TreeEvent::RelocationProposed { request } => {
                self.log(
                    ModLogEntry::new(request.parent.clone(), &request.creator, ModAction::ProposeRelocation)
                        .with("child", &request.child),
                );
                let recipients = self.moderators(&[&request.parent, &request.child], None);
                let note = Notification::new("", NotificationKind::RelocationProposed)
                    .with("parent", &request.parent)
                    .with("child", &request.child)
                    .with("proposer", &request.creator);
                self.fan_out(recipients, &note);
            }
            TreeEvent::RelocationAccepted {
                report,
                actor,
                proposer,
            } => {
                self.log_move(report, actor);
                // An auto-accepted move never notifies the person who made it
                let exclude = proposer.is_none().then_some(actor.as_str());
                let mut recipients = self.moderators(
                    &[&report.old_parent, &report.new_parent, &report.moving],
                    exclude,
                );
                if let Some(proposer) = proposer {
                    recipients.insert(proposer.clone());
                }
                let note = Notification::new("", NotificationKind::RelocationAccepted)
                    .with("parent", &report.new_parent)
                    .with("child", &report.moving)
                    .with("actor", actor);
                self.fan_out(recipients, &note);
            }
            TreeEvent::RelocationRejected { request, actor } => {
                self.log(
                    ModLogEntry::new(request.parent.clone(), actor, ModAction::RejectRelocation)
                        .with("child", &request.child)
                        .with("proposer", &request.creator),
                );
                let note = Notification::new("", NotificationKind::RelocationRejected)
                    .with("parent", &request.parent)
                    .with("child", &request.child)
                    .with("actor", actor);
                self.fan_out(BTreeSet::from([request.creator.clone()]), &note);
            }
            TreeEvent::BranchDetached { report, actor } => {
                self.log(
                    ModLogEntry::new(report.moving.clone(), actor, ModAction::DetachBranch)
                        .with("old_parent", &report.old_parent),
                );
                self.log_move(report, actor);
                let recipients =
                    self.moderators(&[&report.old_parent, &report.moving], Some(actor.as_str()));
                let note = Notification::new("", NotificationKind::BranchDetached)
                    .with("branch", &report.moving)
                    .with("old_parent", &report.old_parent);
                self.fan_out(recipients, &note);
            }
            TreeEvent::BranchDeleted { report, actor } => {
                let reassigned: Vec<&str> = report.reassigned.iter().map(|id| id.as_str()).collect();
                self.log(
                    ModLogEntry::new(self.root.clone(), actor, ModAction::DeleteBranch)
                        .with("branch", &report.branch)
                        .with("reassigned", reassigned.join(",")),
                );
                let recipients =
                    self.moderators(&[&self.root, &report.branch], Some(actor.as_str()));
                let note = Notification::new("", NotificationKind::BranchDeleted)
                    .with("branch", &report.branch);
                self.fan_out(recipients, &note);
            }
        }
    }

    /// One entry on the parent the branch left, one on the parent it joined
    fn log_move(&self, report: &RelocationReport, actor: &str) {
        self.log(
            ModLogEntry::new(report.old_parent.clone(), actor, ModAction::ReleaseChild)
                .with("child", &report.moving)
                .with("new_parent", &report.new_parent),
        );
        self.log(
            ModLogEntry::new(report.new_parent.clone(), actor, ModAction::AcceptChild)
                .with("child", &report.moving)
                .with("old_parent", &report.old_parent)
                .with("subtree_size", report.subtree.len()),
        );
    }

    fn log(&self, entry: ModLogEntry) {
        if let Err(e) = self.audit.append(&entry) {
            warn!("Failed to append mod log entry for {}: {}", entry.branch, e);
        }
    }

    /// Union of the moderators of `branches`, minus `exclude`
    fn moderators(&self, branches: &[&BranchId], exclude: Option<&str>) -> BTreeSet<Username> {
        let mut out = BTreeSet::new();
        for branch in branches {
            match self.roster.moderators_of(branch) {
                Ok(mods) => out.extend(mods),
                Err(e) => warn!("Failed to look up moderators of {}: {}", branch, e),
            }
        }
        if let Some(actor) = exclude {
            out.remove(actor);
        }
        out
    }

    fn fan_out(&self, recipients: BTreeSet<Username>, template: &Notification) {
        for username in recipients {
            let mut note = template.clone();
            note.username = username;
            if let Err(e) = self.notifier.notify(&note) {
                warn!("Failed to notify {}: {}", note.username, e);
            }
        }
    }
}
