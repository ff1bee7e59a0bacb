//! Cross-collection sync rules, their duplicate guards and the notification log.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use databridge_core::{
    date_after_days, date_stamp, format_amount, format_number, iso_timestamp, new_id, stage,
    Clock, IntakeSubmission, Invoice, LineItem, Notification, NotificationKind, PipelineDeal,
    Project, Proposal, Record, SmartLead, SystemClock,
};
use databridge_storage::Store;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, info, info_span, warn};

pub const CRATE_NAME: &str = "databridge-sync";

const PROJECT_DEADLINE_DAYS: i64 = 30;
const INVOICE_DUE_DAYS: i64 = 14;
const DEPOSIT_RATIO: f64 = 0.5;

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub data_dir: PathBuf,
    pub workspace_root: PathBuf,
    pub scheduler_enabled: bool,
    pub sync_cron: String,
}

impl BridgeConfig {
    pub fn from_env() -> Self {
        Self {
            data_dir: std::env::var("DATABRIDGE_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data")),
            workspace_root: std::env::var("DATABRIDGE_WORKSPACE_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".")),
            scheduler_enabled: std::env::var("DATABRIDGE_SCHEDULER_ENABLED")
                .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "True"))
                .unwrap_or(false),
            sync_cron: std::env::var("DATABRIDGE_SYNC_CRON")
                .unwrap_or_else(|_| "0 */15 * * * *".to_string()),
        }
    }

    pub fn health_rules_path(&self) -> PathBuf {
        self.workspace_root.join("rules").join("health.yaml")
    }

    pub fn open_store(&self) -> Result<Store> {
        Store::open_dir(&self.data_dir)
            .with_context(|| format!("opening data directory {}", self.data_dir.display()))
    }
}

/// Records created per rule by one orchestrator pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub intake_to_lead: usize,
    pub lead_to_pipeline: usize,
    pub pipeline_to_projects: usize,
    pub proposal_to_invoice: usize,
    pub project_completion: usize,
}

impl SyncReport {
    pub fn total(&self) -> usize {
        self.intake_to_lead
            + self.lead_to_pipeline
            + self.pipeline_to_projects
            + self.proposal_to_invoice
            + self.project_completion
    }
}

/// Append-only notification side-channel plus the read/dismiss operations the
/// bell menu needs. Newest notifications sit at the front of the collection.
#[derive(Clone)]
pub struct Notifier {
    store: Store,
    clock: Arc<dyn Clock>,
}

impl Notifier {
    pub fn new(store: Store, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn emit(&self, kind: NotificationKind, title: &str, description: &str) -> Notification {
        let notification = Notification {
            id: new_id(),
            kind,
            title: title.to_string(),
            description: description.to_string(),
            timestamp: iso_timestamp(self.clock.now()),
            read: false,
        };
        let Some(mut list) = self.load_for_update() else {
            warn!(kind = ?kind, title, "notification dropped");
            return notification;
        };
        list.insert(0, notification.clone());
        self.store.save(&list);
        debug!(kind = ?kind, title, "notification emitted");
        notification
    }

    pub fn list(&self) -> Vec<Notification> {
        self.store.load()
    }

    pub fn unread_count(&self) -> usize {
        self.list().iter().filter(|n| !n.read).count()
    }

    pub fn mark_read(&self, id: &str) -> bool {
        let Some(mut list) = self.load_for_update() else {
            return false;
        };
        let Some(notification) = list.iter_mut().find(|n| n.id == id) else {
            return false;
        };
        notification.read = true;
        self.store.save(&list);
        true
    }

    pub fn mark_all_read(&self) {
        let Some(mut list) = self.load_for_update() else {
            return;
        };
        for notification in &mut list {
            notification.read = true;
        }
        self.store.save(&list);
    }

    pub fn delete(&self, id: &str) -> bool {
        let Some(mut list) = self.load_for_update() else {
            return false;
        };
        let before = list.len();
        list.retain(|n| n.id != id);
        if list.len() == before {
            return false;
        }
        self.store.save(&list);
        true
    }

    pub fn clear(&self) {
        self.store.save::<Notification>(&[]);
    }

    /// `None` when the stored list is unreadable; rewriting it would lose it.
    fn load_for_update(&self) -> Option<Vec<Notification>> {
        load_strict(&self.store)
    }
}

/// Existence checks run before a rule creates a record. Names are the only
/// join key shared across collections, so matching is case-insensitive text.
pub mod guards {
    use databridge_core::{contains_ignore_case, eq_ignore_case, Invoice, PipelineDeal, Project};
    use databridge_storage::Store;

    pub fn has_pipeline_entry(pipeline: &[PipelineDeal], business_name: &str) -> bool {
        pipeline
            .iter()
            .any(|deal| eq_ignore_case(&deal.business_name, business_name))
    }

    pub fn has_project(projects: &[Project], client_name: &str, project_name: &str) -> bool {
        projects.iter().any(|p| {
            eq_ignore_case(&p.client_name, client_name) && eq_ignore_case(&p.project_name, project_name)
        })
    }

    pub fn has_invoice_for_client_and_fragment(
        invoices: &[Invoice],
        client_name: &str,
        fragment: &str,
    ) -> bool {
        invoices.iter().any(|inv| {
            eq_ignore_case(&inv.client_name, client_name)
                && inv
                    .items
                    .iter()
                    .any(|item| contains_ignore_case(&item.description, fragment))
        })
    }

    /// Store-backed forms of the guards above.
    pub struct StoreGuards<'a> {
        store: &'a Store,
    }

    impl<'a> StoreGuards<'a> {
        pub fn new(store: &'a Store) -> Self {
            Self { store }
        }

        pub fn has_pipeline_entry(&self, business_name: &str) -> bool {
            has_pipeline_entry(&self.store.load(), business_name)
        }

        pub fn has_project(&self, client_name: &str, project_name: &str) -> bool {
            has_project(&self.store.load(), client_name, project_name)
        }

        pub fn has_invoice_for_client_and_fragment(&self, client_name: &str, fragment: &str) -> bool {
            has_invoice_for_client_and_fragment(&self.store.load(), client_name, fragment)
        }
    }
}

struct PendingNotification {
    kind: NotificationKind,
    title: &'static str,
    description: String,
}

/// Runs the sync rules against one store.
///
/// Each rule loads the collections it needs, creates whatever its guard lets
/// through, writes the target collection once and then emits one notification
/// per created record. Rules never fail: an unreadable collection is empty and
/// produces nothing.
pub struct SyncEngine {
    store: Store,
    clock: Arc<dyn Clock>,
    notifier: Notifier,
}

impl SyncEngine {
    pub fn new(store: Store) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Store, clock: Arc<dyn Clock>) -> Self {
        let notifier = Notifier::new(store.clone(), Arc::clone(&clock));
        Self {
            store,
            clock,
            notifier,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Runs every rule once: intake and lead promotion first so a same-pass
    /// intake can flow through to projects and invoices.
    pub fn run_all(&self) -> SyncReport {
        let started_at = Utc::now();
        let report = SyncReport {
            intake_to_lead: self.sync_intake_to_lead(),
            lead_to_pipeline: self.sync_lead_to_pipeline(),
            pipeline_to_projects: self.sync_pipeline_to_projects(),
            proposal_to_invoice: self.sync_proposal_to_invoice(),
            project_completion: self.sync_project_completion(),
        };
        info!(
            total = report.total(),
            intake_to_lead = report.intake_to_lead,
            lead_to_pipeline = report.lead_to_pipeline,
            pipeline_to_projects = report.pipeline_to_projects,
            proposal_to_invoice = report.proposal_to_invoice,
            project_completion = report.project_completion,
            elapsed_ms = (Utc::now() - started_at).num_milliseconds(),
            "sync pass finished"
        );
        report
    }

    /// Won deal → project.
    pub fn sync_pipeline_to_projects(&self) -> usize {
        let _span = info_span!("sync_rule", rule = "pipeline_to_projects").entered();
        let pipeline: Vec<PipelineDeal> = self.store.load();
        let Some(mut projects) = load_strict::<Project>(&self.store) else {
            return 0;
        };
        let now = self.clock.now();
        let mut pending = Vec::new();

        for deal in pipeline.iter().filter(|d| d.stage == stage::CLOSED_WON) {
            if deal.business_name.trim().is_empty() {
                debug!(deal_id = %deal.id, "won deal has no business name; skipped");
                continue;
            }
            let project_name = format!("{} Project", deal.business_name);
            if guards::has_project(&projects, &deal.business_name, &project_name) {
                continue;
            }

            projects.push(Project {
                id: new_id(),
                client_name: deal.business_name.clone(),
                project_name: project_name.clone(),
                tier: "standard".into(),
                stage: stage::PLANNING.into(),
                start_date: date_stamp(now),
                deadline: date_after_days(now, PROJECT_DEADLINE_DAYS),
                progress: 0.0,
                description: format!(
                    "Auto-created from pipeline deal. Value: ${}",
                    format_amount(deal.value.unwrap_or(0.0))
                ),
                ..Default::default()
            });
            pending.push(PendingNotification {
                kind: NotificationKind::NewLead,
                title: "Project Created",
                description: format!("\"{project_name}\" auto-created from won deal."),
            });
        }

        self.commit(&projects, pending)
    }

    /// Accepted proposal → 50% deposit invoice.
    pub fn sync_proposal_to_invoice(&self) -> usize {
        let _span = info_span!("sync_rule", rule = "proposal_to_invoice").entered();
        let proposals: Vec<Proposal> = self.store.load();
        let Some(mut invoices) = load_strict::<Invoice>(&self.store) else {
            return 0;
        };
        let now = self.clock.now();
        let mut pending = Vec::new();

        for proposal in proposals
            .iter()
            .filter(|p| p.status == stage::PROPOSAL_ACCEPTED)
        {
            if proposal.client_name.trim().is_empty() {
                debug!(proposal_id = %proposal.id, "accepted proposal has no client; skipped");
                continue;
            }
            let description = format!("50% Deposit - {}", proposal.project_title);
            if guards::has_invoice_for_client_and_fragment(&invoices, &proposal.client_name, &description) {
                continue;
            }

            let number = next_invoice_number(&invoices);
            let deposit = round_cents(proposal.total * DEPOSIT_RATIO);
            invoices.push(Invoice {
                id: new_id(),
                number: number.clone(),
                client_name: proposal.client_name.clone(),
                items: vec![LineItem {
                    description,
                    amount: deposit,
                    ..Default::default()
                }],
                tax_percent: 0.0,
                due_date: date_after_days(now, INVOICE_DUE_DAYS),
                status: stage::INVOICE_SENT.into(),
                created_at: iso_timestamp(now),
                ..Default::default()
            });
            // Deposit creation has always been announced under this kind.
            pending.push(PendingNotification {
                kind: NotificationKind::InvoiceOverdue,
                title: "Invoice Created",
                description: format!(
                    "{number} (${}) for {} deposit.",
                    format_amount(deposit),
                    proposal.client_name
                ),
            });
        }

        self.commit(&invoices, pending)
    }

    /// Completed project → draft final invoice. The amount stays zero for manual entry.
    pub fn sync_project_completion(&self) -> usize {
        let _span = info_span!("sync_rule", rule = "project_completion").entered();
        let projects: Vec<Project> = self.store.load();
        let Some(mut invoices) = load_strict::<Invoice>(&self.store) else {
            return 0;
        };
        let now = self.clock.now();
        let mut pending = Vec::new();

        for project in projects
            .iter()
            .filter(|p| stage::is_project_complete(&p.stage))
        {
            if project.client_name.trim().is_empty() {
                debug!(project_id = %project.id, "completed project has no client; skipped");
                continue;
            }
            let description = format!("Final Payment - {}", project.project_name);
            if guards::has_invoice_for_client_and_fragment(&invoices, &project.client_name, &description) {
                continue;
            }

            invoices.push(Invoice {
                id: new_id(),
                number: next_invoice_number(&invoices),
                client_name: project.client_name.clone(),
                items: vec![LineItem {
                    description,
                    amount: 0.0,
                    ..Default::default()
                }],
                tax_percent: 0.0,
                due_date: date_after_days(now, INVOICE_DUE_DAYS),
                status: stage::INVOICE_DRAFT.into(),
                created_at: iso_timestamp(now),
                ..Default::default()
            });
            pending.push(PendingNotification {
                kind: NotificationKind::ProjectDeadline,
                title: "Project Complete",
                description: format!(
                    "\"{}\" marked complete. Final invoice created & feedback requested.",
                    project.project_name
                ),
            });
        }

        self.commit(&invoices, pending)
    }

    /// Won or qualified smart lead → pipeline deal.
    pub fn sync_lead_to_pipeline(&self) -> usize {
        let _span = info_span!("sync_rule", rule = "lead_to_pipeline").entered();
        let leads: Vec<SmartLead> = self.store.load();
        let Some(mut pipeline) = load_strict::<PipelineDeal>(&self.store) else {
            return 0;
        };
        let now = iso_timestamp(self.clock.now());
        let mut pending = Vec::new();

        for lead in leads.iter().filter(|l| is_promotable_lead(&l.status)) {
            if lead.business_name.trim().is_empty() {
                debug!(lead_id = %lead.id, "qualified lead has no business name; skipped");
                continue;
            }
            if guards::has_pipeline_entry(&pipeline, &lead.business_name) {
                continue;
            }

            let score = lead.score.map(format_number).unwrap_or_else(|| "N/A".into());
            pipeline.push(PipelineDeal {
                id: new_id(),
                business_name: lead.business_name.clone(),
                contact_name: lead.contact_name.clone(),
                contact_email: lead.email.clone(),
                contact_phone: lead.phone.clone(),
                source: lead
                    .source
                    .clone()
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| "inbound".into()),
                value: None,
                stage: stage::NEW_LEAD.into(),
                stage_entered_at: now.clone(),
                last_activity: now.clone(),
                notes: format!("Auto-imported from Smart Leads (score: {score})"),
                created_at: now.clone(),
                ..Default::default()
            });
            pending.push(PendingNotification {
                kind: NotificationKind::NewLead,
                title: "Lead → Pipeline",
                description: format!("{} added to pipeline from Smart Leads.", lead.business_name),
            });
        }

        self.commit(&pipeline, pending)
    }

    /// Unsynced intake submission → pipeline deal. A submission whose business
    /// already has a deal is flagged synced without creating anything.
    pub fn sync_intake_to_lead(&self) -> usize {
        let _span = info_span!("sync_rule", rule = "intake_to_lead").entered();
        let Some(mut intakes) = load_strict::<IntakeSubmission>(&self.store) else {
            return 0;
        };
        let Some(mut pipeline) = load_strict::<PipelineDeal>(&self.store) else {
            return 0;
        };
        let now = iso_timestamp(self.clock.now());
        let mut pending = Vec::new();
        let mut flagged = 0usize;

        for intake in intakes.iter_mut().filter(|i| !i.is_synced()) {
            if intake.business_name.trim().is_empty() {
                debug!(intake_id = %intake.id, "intake has no business name; left pending");
                continue;
            }
            flagged += 1;
            if guards::has_pipeline_entry(&pipeline, &intake.business_name) {
                debug!(business = %intake.business_name, "intake already in pipeline");
                intake.status = Some(stage::INTAKE_SYNCED.into());
                continue;
            }

            pipeline.push(PipelineDeal {
                id: new_id(),
                business_name: intake.business_name.clone(),
                contact_name: intake.contact_name.clone(),
                contact_email: intake.email.clone(),
                contact_phone: intake.phone.clone(),
                source: "inbound".into(),
                value: None,
                stage: stage::NEW_LEAD.into(),
                stage_entered_at: now.clone(),
                last_activity: now.clone(),
                notes: format!(
                    "Intake form: {} \u{2014} Budget: {}",
                    or_na(&intake.services),
                    or_na(&intake.budget)
                ),
                created_at: now.clone(),
                ..Default::default()
            });
            intake.status = Some(stage::INTAKE_SYNCED.into());
            pending.push(PendingNotification {
                kind: NotificationKind::IntakeSubmitted,
                title: "Intake Submitted",
                description: format!("{} submitted intake form.", intake.business_name),
            });
        }

        let created = self.commit(&pipeline, pending);
        if flagged > 0 {
            self.store.save(&intakes);
        }
        created
    }

    fn commit<R: Record>(&self, records: &[R], pending: Vec<PendingNotification>) -> usize {
        if pending.is_empty() {
            return 0;
        }
        self.store.save(records);
        for event in &pending {
            self.notifier.emit(event.kind, event.title, &event.description);
        }
        debug!(created = pending.len(), "rule committed");
        pending.len()
    }
}

/// Strict read of a collection that is about to be rewritten. An unreadable
/// one is left alone so the rewrite cannot replace what it still holds.
fn load_strict<R: Record>(store: &Store) -> Option<Vec<R>> {
    match store.try_load() {
        Ok(records) => Some(records),
        Err(err) => {
            warn!(collection = R::COLLECTION.key(), error = %err, "collection unreadable; left untouched");
            None
        }
    }
}

/// `INV-0001`-style numbers continuing from the current invoice count.
pub fn next_invoice_number(invoices: &[Invoice]) -> String {
    format!("INV-{:04}", invoices.len() + 1)
}

fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

fn is_promotable_lead(status: &str) -> bool {
    status.eq_ignore_ascii_case(stage::LEAD_WON) || status.eq_ignore_ascii_case(stage::LEAD_QUALIFIED)
}

fn or_na(value: &str) -> &str {
    if value.trim().is_empty() {
        "N/A"
    } else {
        value
    }
}

/// Cron-driven `run_all` for long-running processes; `None` when disabled.
pub async fn maybe_build_scheduler(
    config: &BridgeConfig,
    engine: Arc<Mutex<SyncEngine>>,
) -> Result<Option<JobScheduler>> {
    if !config.scheduler_enabled {
        return Ok(None);
    }

    let sched = JobScheduler::new().await.context("creating scheduler")?;
    let cron = config.sync_cron.as_str();
    let job = Job::new_async(cron, move |_uuid, _l| {
        let engine = Arc::clone(&engine);
        Box::pin(async move {
            let report = engine.lock().await.run_all();
            info!(total = report.total(), "scheduled sync finished");
        })
    })
    .with_context(|| format!("creating scheduler job for cron {cron}"))?;
    sched.add(job).await.context("adding scheduler job")?;
    Ok(Some(sched))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone};
    use databridge_core::FixedClock;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 24, 12, 0, 0).single().unwrap()
    }

    fn engine() -> SyncEngine {
        SyncEngine::with_clock(Store::in_memory(), Arc::new(FixedClock(fixed_now())))
    }

    fn deal(name: &str, stage: &str, value: Option<f64>) -> PipelineDeal {
        PipelineDeal {
            id: new_id(),
            business_name: name.into(),
            stage: stage.into(),
            value,
            ..Default::default()
        }
    }

    #[test]
    fn won_deal_creates_planning_project() {
        let engine = engine();
        engine.store().save(&[
            deal("Acme", stage::CLOSED_WON, Some(12500.0)),
            deal("Globex", stage::NEGOTIATING, None),
        ]);

        assert_eq!(engine.sync_pipeline_to_projects(), 1);

        let projects: Vec<Project> = engine.store().load();
        assert_eq!(projects.len(), 1);
        let project = &projects[0];
        assert_eq!(project.project_name, "Acme Project");
        assert_eq!(project.client_name, "Acme");
        assert_eq!(project.stage, "planning");
        assert_eq!(project.progress, 0.0);
        assert_eq!(project.start_date, "2026-02-24");
        assert_eq!(project.deadline, "2026-03-26");
        assert_eq!(project.description, "Auto-created from pipeline deal. Value: $12,500");

        let notifications = engine.notifier().list();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].kind, NotificationKind::NewLead);
        assert_eq!(notifications[0].title, "Project Created");
    }

    #[test]
    fn duplicate_won_deals_in_one_pass_create_one_project() {
        let engine = engine();
        engine.store().save(&[
            deal("Acme", stage::CLOSED_WON, None),
            deal("ACME", stage::CLOSED_WON, None),
        ]);
        assert_eq!(engine.sync_pipeline_to_projects(), 1);
        assert_eq!(engine.store().load::<Project>().len(), 1);
        assert_eq!(engine.notifier().list().len(), 1);
    }

    #[test]
    fn existing_project_suppresses_creation_and_notification() {
        let engine = engine();
        engine.store().save(&[deal("Acme", stage::CLOSED_WON, None)]);
        engine.store().save(&[Project {
            id: "p1".into(),
            client_name: "acme".into(),
            project_name: "ACME PROJECT".into(),
            stage: "development".into(),
            ..Default::default()
        }]);
        assert_eq!(engine.sync_pipeline_to_projects(), 0);
        assert_eq!(engine.store().load::<Project>().len(), 1);
        assert!(engine.notifier().list().is_empty());
    }

    #[test]
    fn accepted_proposal_creates_rounded_deposit_invoice() {
        let engine = engine();
        engine.store().save(&[
            Proposal {
                id: "pr1".into(),
                client_name: "Acme".into(),
                project_title: "Redesign".into(),
                total: 1000.0,
                status: "accepted".into(),
                ..Default::default()
            },
            Proposal {
                id: "pr2".into(),
                client_name: "Initech".into(),
                project_title: "Audit".into(),
                total: 1500.5,
                status: "accepted".into(),
                ..Default::default()
            },
            Proposal {
                id: "pr3".into(),
                client_name: "Globex".into(),
                project_title: "SEO".into(),
                total: 900.0,
                status: "sent".into(),
                ..Default::default()
            },
        ]);

        assert_eq!(engine.sync_proposal_to_invoice(), 2);
        let invoices: Vec<Invoice> = engine.store().load();
        assert_eq!(invoices.len(), 2);
        assert_eq!(invoices[0].number, "INV-0001");
        assert_eq!(invoices[0].items.len(), 1);
        assert_eq!(invoices[0].items[0].amount, 500.0);
        assert_eq!(invoices[0].items[0].description, "50% Deposit - Redesign");
        assert_eq!(invoices[0].status, "sent");
        assert_eq!(invoices[0].due_date, "2026-03-10");
        assert_eq!(invoices[1].number, "INV-0002");
        assert_eq!(invoices[1].items[0].amount, 750.25);

        let notifications = engine.notifier().list();
        assert_eq!(notifications.len(), 2);
        assert!(notifications
            .iter()
            .all(|n| n.kind == NotificationKind::InvoiceOverdue && n.title == "Invoice Created"));
        assert_eq!(notifications[1].description, "INV-0001 ($500) for Acme deposit.");
    }

    #[test]
    fn deposit_guard_matches_fragment_case_insensitively() {
        let engine = engine();
        engine.store().save(&[Proposal {
            client_name: "Acme".into(),
            project_title: "Redesign".into(),
            total: 1000.0,
            status: "accepted".into(),
            ..Default::default()
        }]);
        engine.store().save(&[Invoice {
            number: "INV-0007".into(),
            client_name: "ACME".into(),
            items: vec![LineItem {
                description: "50% deposit - redesign (manual)".into(),
                amount: 500.0,
                ..Default::default()
            }],
            status: "paid".into(),
            ..Default::default()
        }]);
        assert_eq!(engine.sync_proposal_to_invoice(), 0);
    }

    #[test]
    fn completed_project_creates_zero_amount_draft() {
        let engine = engine();
        engine.store().save(&[
            Project {
                client_name: "Acme".into(),
                project_name: "Website".into(),
                stage: "completed".into(),
                ..Default::default()
            },
            Project {
                client_name: "Globex".into(),
                project_name: "Brand".into(),
                stage: "complete".into(),
                ..Default::default()
            },
            Project {
                client_name: "Initech".into(),
                project_name: "App".into(),
                stage: "development".into(),
                ..Default::default()
            },
        ]);
        engine.store().save(&[Invoice {
            number: "INV-0001".into(),
            client_name: "Someone".into(),
            ..Default::default()
        }]);

        assert_eq!(engine.sync_project_completion(), 2);
        let invoices: Vec<Invoice> = engine.store().load();
        assert_eq!(invoices.len(), 3);
        assert_eq!(invoices[1].number, "INV-0002");
        assert_eq!(invoices[2].number, "INV-0003");
        assert_eq!(invoices[1].status, "draft");
        assert_eq!(invoices[1].items[0].description, "Final Payment - Website");
        assert_eq!(invoices[1].items[0].amount, 0.0);
        assert!(engine
            .notifier()
            .list()
            .iter()
            .all(|n| n.kind == NotificationKind::ProjectDeadline));
    }

    #[test]
    fn qualified_leads_are_promoted_once() {
        let engine = engine();
        engine.store().save(&[
            SmartLead {
                id: "l1".into(),
                business_name: "Acme".into(),
                status: "Qualified".into(),
                score: Some(82.0),
                ..Default::default()
            },
            SmartLead {
                id: "l2".into(),
                business_name: "Globex".into(),
                status: "WON".into(),
                source: Some("referral".into()),
                ..Default::default()
            },
            SmartLead {
                id: "l3".into(),
                business_name: "Initech".into(),
                status: "cold".into(),
                ..Default::default()
            },
        ]);
        engine.store().save(&[deal("globex", stage::NEGOTIATING, Some(5000.0))]);

        assert_eq!(engine.sync_lead_to_pipeline(), 1);
        let pipeline: Vec<PipelineDeal> = engine.store().load();
        assert_eq!(pipeline.len(), 2);
        let promoted = &pipeline[1];
        assert_eq!(promoted.business_name, "Acme");
        assert_eq!(promoted.stage, "new_lead");
        assert_eq!(promoted.value, None);
        assert_eq!(promoted.source, "inbound");
        assert_eq!(promoted.notes, "Auto-imported from Smart Leads (score: 82)");

        assert_eq!(engine.sync_lead_to_pipeline(), 0);
    }

    #[test]
    fn intake_dedup_marks_synced_without_creating() {
        let engine = engine();
        engine.store().save(&[deal("Acme", stage::NEW_LEAD, None)]);
        engine.store().save(&[IntakeSubmission {
            id: "i1".into(),
            business_name: "acme".into(),
            contact_name: "Jane".into(),
            email: "jane@acme.test".into(),
            ..Default::default()
        }]);

        assert_eq!(engine.sync_intake_to_lead(), 0);
        assert_eq!(engine.store().load::<PipelineDeal>().len(), 1);
        let intakes: Vec<IntakeSubmission> = engine.store().load();
        assert!(intakes[0].is_synced());
        assert!(engine.notifier().list().is_empty());
    }

    #[test]
    fn intake_creates_deal_with_form_notes() {
        let engine = engine();
        engine.store().save(&[
            IntakeSubmission {
                id: "i1".into(),
                business_name: "Umbrella".into(),
                contact_name: "Alex".into(),
                email: "alex@umbrella.test".into(),
                services: "Web design".into(),
                ..Default::default()
            },
            IntakeSubmission {
                id: "i2".into(),
                business_name: "Hooli".into(),
                status: Some("synced".into()),
                ..Default::default()
            },
        ]);

        assert_eq!(engine.sync_intake_to_lead(), 1);
        let pipeline: Vec<PipelineDeal> = engine.store().load();
        assert_eq!(pipeline.len(), 1);
        assert_eq!(pipeline[0].business_name, "Umbrella");
        assert_eq!(pipeline[0].contact_email, "alex@umbrella.test");
        assert_eq!(pipeline[0].notes, "Intake form: Web design \u{2014} Budget: N/A");
        assert_eq!(pipeline[0].created_at, "2026-02-24T12:00:00.000Z");

        let notifications = engine.notifier().list();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].kind, NotificationKind::IntakeSubmitted);
        assert!(engine.store().load::<IntakeSubmission>().iter().all(|i| i.is_synced()));
    }

    #[test]
    fn notifier_center_operations() {
        let engine = engine();
        let notifier = engine.notifier();
        let first = notifier.emit(NotificationKind::NewLead, "One", "first");
        let second = notifier.emit(NotificationKind::MeetingReminder, "Two", "second");

        let list = notifier.list();
        assert_eq!(list[0].id, second.id);
        assert_eq!(notifier.unread_count(), 2);

        assert!(notifier.mark_read(&first.id));
        assert!(!notifier.mark_read("missing"));
        assert_eq!(notifier.unread_count(), 1);

        notifier.mark_all_read();
        assert_eq!(notifier.unread_count(), 0);

        assert!(notifier.delete(&first.id));
        assert!(!notifier.delete(&first.id));
        assert_eq!(notifier.list().len(), 1);

        notifier.clear();
        assert!(notifier.list().is_empty());
    }

    #[test]
    fn store_guards_read_through_the_store() {
        let store = Store::in_memory();
        store.save(&[deal("Acme", stage::NEW_LEAD, None)]);
        let guards = guards::StoreGuards::new(&store);
        assert!(guards.has_pipeline_entry("ACME"));
        assert!(!guards.has_pipeline_entry("Acme Corp"));
        assert!(!guards.has_project("Acme", "Acme Project"));
        assert!(!guards.has_invoice_for_client_and_fragment("Acme", "Deposit"));
    }

    #[test]
    fn report_serializes_with_rule_names() {
        let report = SyncReport {
            pipeline_to_projects: 1,
            proposal_to_invoice: 2,
            ..Default::default()
        };
        assert_eq!(report.total(), 3);
        let json = serde_json::to_value(report).unwrap();
        assert_eq!(json["pipelineToProjects"], 1);
        assert_eq!(json["proposalToInvoice"], 2);
        assert_eq!(json["intakeToLead"], 0);
    }

    #[tokio::test]
    async fn scheduler_is_disabled_by_default() {
        let config = BridgeConfig {
            data_dir: PathBuf::from("./data"),
            workspace_root: PathBuf::from("."),
            scheduler_enabled: false,
            sync_cron: "0 */15 * * * *".into(),
        };
        let engine = Arc::new(Mutex::new(engine()));
        let sched = maybe_build_scheduler(&config, engine).await.unwrap();
        assert!(sched.is_none());
    }
}
