//! Read-side aggregation: per-client overview with a health score, the client
//! directory and global dashboard KPIs.

use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, Utc};
use databridge_core::{
    contains_ignore_case, date_stamp, parse_timestamp, stage, ClientRecord, Clock, Collection,
    Communication, FeedbackEntry, Invoice, Meeting, PipelineDeal, Project, Proposal, Referral,
    RevenueLedger, SystemClock, TimeEntry,
};
use databridge_storage::Store;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const CRATE_NAME: &str = "databridge-insights";

/// Longest accepted "recent communication" window, in days.
pub const MAX_RECENT_COMMUNICATION_DAYS: i64 = 36_500;

/// Tunable weights of the client health heuristic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthWeights {
    pub baseline: f64,
    pub paid_invoice_bonus: f64,
    pub paid_invoice_cap: f64,
    pub overdue_invoice_penalty: f64,
    pub recent_communication_bonus: f64,
    pub recent_communication_cap: f64,
    pub recent_communication_days: i64,
    pub progress_weight: f64,
    /// Progress assumed when a client has no open projects.
    pub idle_progress: f64,
    pub feedback_weight: f64,
    pub neutral_rating: f64,
}

impl Default for HealthWeights {
    fn default() -> Self {
        Self {
            baseline: 50.0,
            paid_invoice_bonus: 5.0,
            paid_invoice_cap: 20.0,
            overdue_invoice_penalty: 10.0,
            recent_communication_bonus: 5.0,
            recent_communication_cap: 15.0,
            recent_communication_days: 30,
            progress_weight: 15.0,
            idle_progress: 50.0,
            feedback_weight: 5.0,
            neutral_rating: 3.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct HealthRulesFile {
    #[allow(dead_code)]
    #[serde(default)]
    version: u32,
    #[serde(flatten)]
    weights: HealthWeights,
}

impl HealthWeights {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let file: HealthRulesFile = serde_yaml::from_str(text).context("parsing health rules")?;
        file.weights.validate()?;
        Ok(file.weights)
    }

    pub fn validate(&self) -> Result<()> {
        let days = self.recent_communication_days;
        if !(0..=MAX_RECENT_COMMUNICATION_DAYS).contains(&days) {
            bail!(
                "recent_communication_days must be within 0..={MAX_RECENT_COMMUNICATION_DAYS}, got {days}"
            );
        }
        Ok(())
    }

    /// Reads `path`; a missing file means the built-in defaults.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no health rules file; using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_yaml_str(&text).with_context(|| format!("parsing {}", path.display()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientOverview {
    pub name: String,
    pub pipeline_deals: Vec<PipelineDeal>,
    pub projects: Vec<Project>,
    pub invoices: Vec<Invoice>,
    pub proposals: Vec<Proposal>,
    pub communications: Vec<Communication>,
    pub time_entries: Vec<TimeEntry>,
    pub feedback: Vec<FeedbackEntry>,
    pub referrals: Vec<Referral>,
    pub total_revenue: f64,
    pub total_owed: f64,
    pub total_hours: f64,
    pub health_score: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_revenue: f64,
    pub total_expenses: f64,
    pub net_profit: f64,
    pub active_projects: usize,
    pub total_projects: usize,
    pub hot_leads: usize,
    pub pending_invoices: usize,
    pub overdue_invoices: usize,
    pub proposals_sent: usize,
    pub proposals_accepted: usize,
    pub total_clients: usize,
    pub active_clients: usize,
    pub avg_project_size: f64,
    pub pipeline_value: f64,
    pub total_time_hours: f64,
    pub avg_rating: f64,
    pub meetings_today: usize,
}

/// Computes the bounded health score from a client's matched records.
pub fn health_score(
    weights: &HealthWeights,
    invoices: &[Invoice],
    communications: &[Communication],
    projects: &[Project],
    feedback: &[FeedbackEntry],
    now: DateTime<Utc>,
) -> u8 {
    let mut health = weights.baseline;

    let paid = invoices
        .iter()
        .filter(|i| i.status == stage::INVOICE_PAID)
        .count() as f64;
    let overdue = invoices
        .iter()
        .filter(|i| i.status == stage::INVOICE_OVERDUE)
        .count() as f64;
    health += (paid * weights.paid_invoice_bonus).min(weights.paid_invoice_cap);
    health -= overdue * weights.overdue_invoice_penalty;

    let window = Duration::try_days(weights.recent_communication_days).unwrap_or(Duration::MAX);
    let recent = communications
        .iter()
        .filter_map(|c| parse_timestamp(&c.date))
        .filter(|at| now - *at < window)
        .count() as f64;
    health += (recent * weights.recent_communication_bonus).min(weights.recent_communication_cap);

    let open = projects
        .iter()
        .filter(|p| !stage::is_project_complete(&p.stage))
        .map(|p| p.progress.clamp(0.0, 100.0))
        .collect::<Vec<_>>();
    let avg_progress = if open.is_empty() {
        weights.idle_progress
    } else {
        open.iter().sum::<f64>() / open.len() as f64
    };
    health += avg_progress * weights.progress_weight / 100.0;

    let avg_rating = if feedback.is_empty() {
        weights.neutral_rating
    } else {
        feedback.iter().map(|f| f.rating).sum::<f64>() / feedback.len() as f64
    };
    health += (avg_rating - weights.neutral_rating) * weights.feedback_weight;

    // NaN saturates to 0 on the cast.
    health.round().clamp(0.0, 100.0) as u8
}

/// Read-only queries over the store.
pub struct Insights {
    store: Store,
    clock: Arc<dyn Clock>,
    weights: HealthWeights,
}

impl Insights {
    pub fn new(store: Store) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Store, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            weights: HealthWeights::default(),
        }
    }

    pub fn with_weights(mut self, weights: HealthWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn weights(&self) -> &HealthWeights {
        &self.weights
    }

    /// Everything whose name or contact fields contain `client_name`
    /// (case-insensitive), plus money/time totals and the health score.
    pub fn client_overview(&self, client_name: &str) -> ClientOverview {
        let matches = |field: &str| contains_ignore_case(field, client_name);

        let pipeline_deals = self
            .store
            .load::<PipelineDeal>()
            .into_iter()
            .filter(|d| matches(&d.business_name) || matches(&d.contact_name))
            .collect::<Vec<_>>();
        let projects = self
            .store
            .load::<Project>()
            .into_iter()
            .filter(|p| matches(&p.client_name))
            .collect::<Vec<_>>();
        let invoices = self
            .store
            .load::<Invoice>()
            .into_iter()
            .filter(|i| matches(&i.client_name))
            .collect::<Vec<_>>();
        let proposals = self
            .store
            .load::<Proposal>()
            .into_iter()
            .filter(|p| matches(&p.client_name))
            .collect::<Vec<_>>();
        let communications = self
            .store
            .load::<Communication>()
            .into_iter()
            .filter(|c| matches(&c.client_name))
            .collect::<Vec<_>>();
        let time_entries = self
            .store
            .load::<TimeEntry>()
            .into_iter()
            .filter(|t| matches(&t.client_name) || matches(&t.project))
            .collect::<Vec<_>>();
        let feedback = self
            .store
            .load::<FeedbackEntry>()
            .into_iter()
            .filter(|f| matches(&f.client_name))
            .collect::<Vec<_>>();
        let referrals = self
            .store
            .load::<Referral>()
            .into_iter()
            .filter(|r| matches(&r.referrer_name) || matches(&r.referred_name))
            .collect::<Vec<_>>();

        let total_revenue = invoices
            .iter()
            .filter(|i| i.status == stage::INVOICE_PAID)
            .map(Invoice::items_total)
            .sum();
        let total_owed = invoices
            .iter()
            .filter(|i| i.status == stage::INVOICE_SENT || i.status == stage::INVOICE_OVERDUE)
            .map(Invoice::items_total)
            .sum();
        let total_hours = time_entries.iter().map(|t| t.hours).sum();

        let health_score = health_score(
            &self.weights,
            &invoices,
            &communications,
            &projects,
            &feedback,
            self.clock.now(),
        );

        ClientOverview {
            name: client_name.to_string(),
            pipeline_deals,
            projects,
            invoices,
            proposals,
            communications,
            time_entries,
            feedback,
            referrals,
            total_revenue,
            total_owed,
            total_hours,
            health_score,
        }
    }

    /// Sorted, distinct client names drawn from every collection that names one.
    pub fn all_client_names(&self) -> Vec<String> {
        let mut names = BTreeSet::new();
        let mut add = |name: &str| {
            if !name.trim().is_empty() {
                names.insert(name.to_string());
            }
        };

        for deal in self.store.load::<PipelineDeal>() {
            add(&deal.business_name);
        }
        for project in self.store.load::<Project>() {
            add(&project.client_name);
        }
        for invoice in self.store.load::<Invoice>() {
            add(&invoice.client_name);
        }
        for proposal in self.store.load::<Proposal>() {
            add(&proposal.client_name);
        }
        for communication in self.store.load::<Communication>() {
            add(&communication.client_name);
        }
        for entry in self.store.load::<FeedbackEntry>() {
            add(&entry.client_name);
        }
        for client in self.store.load::<ClientRecord>() {
            if let Some(name) = client.display_name() {
                add(name);
            }
        }

        names.into_iter().collect()
    }

    pub fn dashboard_stats(&self) -> DashboardStats {
        let revenue = self
            .store
            .read(Collection::Revenue.key(), RevenueLedger::default());
        let finances = self
            .store
            .read(Collection::Finances.key(), RevenueLedger::default());
        let income = if revenue.income.is_empty() {
            finances.income
        } else {
            revenue.income
        };
        let expenses = if revenue.expenses.is_empty() {
            finances.expenses
        } else {
            revenue.expenses
        };

        let ledger_revenue: f64 = income
            .iter()
            .filter(|i| i.status == stage::INCOME_PAID)
            .map(|i| i.amount)
            .sum();
        let total_expenses: f64 = expenses.iter().map(|e| e.amount).sum();

        let pipeline: Vec<PipelineDeal> = self.store.load();
        let invoices: Vec<Invoice> = self.store.load();
        let projects: Vec<Project> = self.store.load();
        let proposals: Vec<Proposal> = self.store.load();
        let time_entries: Vec<TimeEntry> = self.store.load();
        let feedback: Vec<FeedbackEntry> = self.store.load();
        let meetings: Vec<Meeting> = self.store.load();

        let paid_invoice_total: f64 = invoices
            .iter()
            .filter(|i| i.status == stage::INVOICE_PAID)
            .map(Invoice::items_total)
            .sum();
        let total_revenue = if ledger_revenue != 0.0 {
            ledger_revenue
        } else {
            paid_invoice_total
        };

        let open_projects = projects
            .iter()
            .filter(|p| !stage::is_project_complete(&p.stage))
            .collect::<Vec<_>>();
        let active_clients = open_projects
            .iter()
            .map(|p| p.client_name.as_str())
            .filter(|name| !name.trim().is_empty())
            .collect::<HashSet<_>>()
            .len();

        let avg_project_size = if projects.is_empty() {
            0.0
        } else {
            (paid_invoice_total / projects.len() as f64).round()
        };
        let avg_rating = if feedback.is_empty() {
            0.0
        } else {
            let mean = feedback.iter().map(|f| f.rating).sum::<f64>() / feedback.len() as f64;
            (mean * 10.0).round() / 10.0
        };

        let today = date_stamp(self.clock.now());

        DashboardStats {
            total_revenue,
            total_expenses,
            net_profit: total_revenue - total_expenses,
            active_projects: open_projects.len(),
            total_projects: projects.len(),
            hot_leads: pipeline
                .iter()
                .filter(|d| d.stage == stage::PROPOSAL_SENT || d.stage == stage::NEGOTIATING)
                .count(),
            pending_invoices: invoices
                .iter()
                .filter(|i| i.status == stage::INVOICE_SENT || i.status == stage::INVOICE_OVERDUE)
                .count(),
            overdue_invoices: invoices
                .iter()
                .filter(|i| i.status == stage::INVOICE_OVERDUE)
                .count(),
            proposals_sent: proposals
                .iter()
                .filter(|p| p.status != stage::PROPOSAL_DRAFT)
                .count(),
            proposals_accepted: proposals
                .iter()
                .filter(|p| p.status == stage::PROPOSAL_ACCEPTED)
                .count(),
            total_clients: self.all_client_names().len(),
            active_clients,
            avg_project_size,
            pipeline_value: pipeline
                .iter()
                .filter(|d| d.stage != stage::CLOSED_WON && d.stage != stage::CLOSED_LOST)
                .map(|d| d.value.unwrap_or(0.0))
                .sum(),
            total_time_hours: time_entries.iter().map(|t| t.hours).sum(),
            avg_rating,
            meetings_today: meetings
                .iter()
                .filter(|m| m.date.get(..10) == Some(today.as_str()))
                .count(),
        }
    }
}
