//! Core domain model, collection keys and id/time utilities for the data bridge.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;

pub const CRATE_NAME: &str = "databridge-core";

/// Unknown fields carried through a read/modify/write cycle untouched.
pub type ExtraFields = Map<String, JsonValue>;

/// Field-level leniency for stored records: `null` or a value of the wrong
/// shape reads as the field's default instead of failing the whole collection.
pub mod lenient {
    use serde::de::DeserializeOwned;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned + Default,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(T::deserialize(value).unwrap_or_default())
    }

    /// Keeps the elements that read back; anything but an array is empty.
    pub fn seq<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        let Value::Array(items) = Value::deserialize(deserializer)? else {
            return Ok(Vec::new());
        };
        Ok(items
            .into_iter()
            .filter_map(|item| T::deserialize(item).ok())
            .collect())
    }
}

/// Well-known collection keys shared with whatever storage medium backs the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Pipeline,
    Invoices,
    Projects,
    Leads,
    Proposals,
    Communications,
    TimeEntries,
    Finances,
    Revenue,
    Feedback,
    Referrals,
    Notifications,
    Clients,
    Meetings,
    Intake,
}

impl Collection {
    pub const ALL: [Collection; 15] = [
        Collection::Pipeline,
        Collection::Invoices,
        Collection::Projects,
        Collection::Leads,
        Collection::Proposals,
        Collection::Communications,
        Collection::TimeEntries,
        Collection::Finances,
        Collection::Revenue,
        Collection::Feedback,
        Collection::Referrals,
        Collection::Notifications,
        Collection::Clients,
        Collection::Meetings,
        Collection::Intake,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Self::Pipeline => "pipeline",
            Self::Invoices => "invoices",
            Self::Projects => "projects",
            Self::Leads => "leads",
            Self::Proposals => "proposals",
            Self::Communications => "communications",
            Self::TimeEntries => "time_entries",
            Self::Finances => "finances",
            Self::Revenue => "revenue",
            Self::Feedback => "feedback",
            Self::Referrals => "referrals",
            Self::Notifications => "notifications",
            Self::Clients => "clients",
            Self::Meetings => "meetings",
            Self::Intake => "intake",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.key() == key)
    }
}

/// A record type stored as an ordered list under a fixed collection key.
pub trait Record: Serialize + DeserializeOwned + Clone {
    const COLLECTION: Collection;
}

macro_rules! impl_record {
    ($($ty:ty => $collection:expr),* $(,)?) => {
        $(impl Record for $ty {
            const COLLECTION: Collection = $collection;
        })*
    };
}

pub mod stage {
    //! Stage and status literals written by the dashboard pages.

    pub const CLOSED_WON: &str = "closed_won";
    pub const CLOSED_LOST: &str = "closed_lost";
    pub const NEW_LEAD: &str = "new_lead";
    pub const PROPOSAL_SENT: &str = "proposal_sent";
    pub const NEGOTIATING: &str = "negotiating";

    pub const PLANNING: &str = "planning";
    pub const COMPLETE: &str = "complete";
    pub const COMPLETED: &str = "completed";

    pub const INVOICE_DRAFT: &str = "draft";
    pub const INVOICE_SENT: &str = "sent";
    pub const INVOICE_PAID: &str = "paid";
    pub const INVOICE_OVERDUE: &str = "overdue";

    pub const PROPOSAL_DRAFT: &str = "draft";
    pub const PROPOSAL_ACCEPTED: &str = "accepted";

    pub const LEAD_WON: &str = "won";
    pub const LEAD_QUALIFIED: &str = "qualified";

    pub const INTAKE_SYNCED: &str = "synced";

    pub const INCOME_PAID: &str = "paid";

    /// Both spellings of a finished project appear in stored data.
    pub fn is_project_complete(stage: &str) -> bool {
        stage == COMPLETE || stage == COMPLETED
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct PipelineDeal {
    #[serde(deserialize_with = "lenient::or_default")]
    pub id: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub business_name: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub contact_name: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub contact_email: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub contact_phone: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub source: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub value: Option<f64>,
    #[serde(deserialize_with = "lenient::or_default")]
    pub stage: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub stage_entered_at: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub last_activity: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub notes: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub created_at: String,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct ProjectTask {
    #[serde(deserialize_with = "lenient::or_default")]
    pub id: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub label: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub done: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct Project {
    #[serde(deserialize_with = "lenient::or_default")]
    pub id: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub client_name: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub project_name: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub tier: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub stage: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub start_date: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub deadline: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub progress: f64,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient::or_default")]
    pub budget: Option<f64>,
    #[serde(deserialize_with = "lenient::or_default")]
    pub assigned_to: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub description: String,
    #[serde(deserialize_with = "lenient::seq")]
    pub tasks: Vec<ProjectTask>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct LineItem {
    #[serde(deserialize_with = "lenient::or_default")]
    pub description: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub amount: f64,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct Invoice {
    #[serde(deserialize_with = "lenient::or_default")]
    pub id: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub number: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub client_name: String,
    #[serde(deserialize_with = "lenient::seq")]
    pub items: Vec<LineItem>,
    #[serde(deserialize_with = "lenient::or_default")]
    pub tax_percent: f64,
    #[serde(deserialize_with = "lenient::or_default")]
    pub due_date: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub status: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient::or_default")]
    pub paid_at: Option<String>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl Invoice {
    pub fn items_total(&self) -> f64 {
        self.items.iter().map(|item| item.amount).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct Proposal {
    #[serde(deserialize_with = "lenient::or_default")]
    pub id: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub client_name: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub project_title: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub total: f64,
    #[serde(deserialize_with = "lenient::or_default")]
    pub status: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient::or_default")]
    pub sent_at: Option<String>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct Communication {
    #[serde(deserialize_with = "lenient::or_default")]
    pub id: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub client_name: String,
    #[serde(rename = "type", deserialize_with = "lenient::or_default")]
    pub kind: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub date: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient::or_default")]
    pub direction: Option<String>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct TimeEntry {
    #[serde(deserialize_with = "lenient::or_default")]
    pub id: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub client_name: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub project: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub hours: f64,
    #[serde(deserialize_with = "lenient::or_default")]
    pub date: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub description: String,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct FeedbackEntry {
    #[serde(deserialize_with = "lenient::or_default")]
    pub id: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub client_name: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub rating: f64,
    #[serde(deserialize_with = "lenient::or_default")]
    pub comment: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub date: String,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct Referral {
    #[serde(deserialize_with = "lenient::or_default")]
    pub id: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub referrer_name: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub referred_name: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub status: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub date: String,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient::or_default")]
    pub value: Option<f64>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct IntakeSubmission {
    #[serde(deserialize_with = "lenient::or_default")]
    pub id: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub business_name: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub contact_name: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub email: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub phone: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub services: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub budget: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub submitted_at: String,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient::or_default")]
    pub status: Option<String>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl IntakeSubmission {
    pub fn is_synced(&self) -> bool {
        self.status.as_deref() == Some(stage::INTAKE_SYNCED)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct SmartLead {
    #[serde(deserialize_with = "lenient::or_default")]
    pub id: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub business_name: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub contact_name: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub email: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub phone: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient::or_default")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient::or_default")]
    pub source: Option<String>,
    #[serde(deserialize_with = "lenient::or_default")]
    pub created_at: String,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    NewLead,
    InvoiceOverdue,
    ProjectDeadline,
    ClientReplied,
    IntakeSubmitted,
    MeetingReminder,
    #[default]
    #[serde(other)]
    Other,
}

impl NotificationKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::NewLead => "New Lead",
            Self::InvoiceOverdue => "Invoice Overdue",
            Self::ProjectDeadline => "Project Deadline",
            Self::ClientReplied => "Client Replied",
            Self::IntakeSubmitted => "Intake Submitted",
            Self::MeetingReminder => "Meeting Reminder",
            Self::Other => "Other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct Notification {
    #[serde(deserialize_with = "lenient::or_default")]
    pub id: String,
    #[serde(rename = "type", deserialize_with = "lenient::or_default")]
    pub kind: NotificationKind,
    #[serde(deserialize_with = "lenient::or_default")]
    pub title: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub description: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub timestamp: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub read: bool,
}

/// Entry of the explicit clients list; older pages only wrote `name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct ClientRecord {
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient::or_default")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient::or_default")]
    pub company: Option<String>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl ClientRecord {
    pub fn display_name(&self) -> Option<&str> {
        self.company
            .as_deref()
            .filter(|c| !c.is_empty())
            .or_else(|| self.name.as_deref().filter(|n| !n.is_empty()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct Meeting {
    #[serde(deserialize_with = "lenient::or_default")]
    pub id: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub date: String,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct IncomeEntry {
    #[serde(deserialize_with = "lenient::or_default")]
    pub id: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub date: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub client: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub amount: f64,
    #[serde(deserialize_with = "lenient::or_default")]
    pub description: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct ExpenseEntry {
    #[serde(deserialize_with = "lenient::or_default")]
    pub id: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub date: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub category: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub amount: f64,
    #[serde(deserialize_with = "lenient::or_default")]
    pub description: String,
}

/// Stored as a single object under `revenue` (or the older `finances` key), not a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RevenueLedger {
    #[serde(deserialize_with = "lenient::seq")]
    pub income: Vec<IncomeEntry>,
    #[serde(deserialize_with = "lenient::seq")]
    pub expenses: Vec<ExpenseEntry>,
}

impl_record! {
    PipelineDeal => Collection::Pipeline,
    Project => Collection::Projects,
    Invoice => Collection::Invoices,
    Proposal => Collection::Proposals,
    Communication => Collection::Communications,
    TimeEntry => Collection::TimeEntries,
    FeedbackEntry => Collection::Feedback,
    Referral => Collection::Referrals,
    IntakeSubmission => Collection::Intake,
    SmartLead => Collection::Leads,
    Notification => Collection::Notifications,
    ClientRecord => Collection::Clients,
    Meeting => Collection::Meetings,
}

/// Source of "now" for rules and aggregations.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// ISO-8601 with millisecond precision and a `Z` suffix.
pub fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn date_stamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d").to_string()
}

pub fn date_after_days(at: DateTime<Utc>, days: i64) -> String {
    date_stamp(at + Duration::days(days))
}

/// Accepts RFC 3339, bare `YYYY-MM-DD` and zone-less datetimes (read as UTC).
pub fn parse_timestamp(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(input) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Thousands-separated amount with at most three fraction digits, e.g. `12,500.5`.
pub fn format_amount(amount: f64) -> String {
    let rounded = (amount * 1000.0).round() / 1000.0;
    let negative = rounded < 0.0;
    let text = format!("{:.3}", rounded.abs());
    let (whole, frac) = match text.split_once('.') {
        Some(parts) => parts,
        None => (text.as_str(), ""),
    };

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3 + 1);
    if negative {
        grouped.push('-');
    }
    for (idx, ch) in whole.chars().enumerate() {
        if idx > 0 && (whole.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let frac = frac.trim_end_matches('0');
    if frac.is_empty() {
        grouped
    } else {
        format!("{grouped}.{frac}")
    }
}

/// Whole numbers print without a fraction (`72`, not `72.0`).
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

pub fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn collection_keys_are_unique_and_resolvable() {
        let mut keys = Collection::ALL.iter().map(|c| c.key()).collect::<Vec<_>>();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), Collection::ALL.len());
        assert_eq!(Collection::from_key("time_entries"), Some(Collection::TimeEntries));
        assert_eq!(Collection::from_key("nope"), None);
    }

    #[test]
    fn records_tolerate_missing_fields_and_keep_unknown_ones() {
        let raw = r#"{"id":"p1","businessName":"Acme","value":null,"pinned":true}"#;
        let deal: PipelineDeal = serde_json::from_str(raw).expect("lenient parse");
        assert_eq!(deal.business_name, "Acme");
        assert_eq!(deal.stage, "");
        assert_eq!(deal.value, None);
        assert_eq!(deal.extra.get("pinned"), Some(&JsonValue::Bool(true)));

        let back = serde_json::to_value(&deal).expect("serialize");
        assert_eq!(back["pinned"], JsonValue::Bool(true));
        assert_eq!(back["businessName"], "Acme");
        assert!(back["value"].is_null());
    }

    #[test]
    fn null_and_mistyped_fields_read_as_defaults() {
        let raw = r#"[
            {"id":"p1","clientName":"Acme","progress":null,"budget":"lots","tasks":{}},
            {"id":"p2","clientName":42,"progress":"70","projectName":"Site"}
        ]"#;
        let projects: Vec<Project> = serde_json::from_str(raw).expect("collection still reads");
        assert_eq!(projects.len(), 2);
        assert_eq!(projects[0].progress, 0.0);
        assert_eq!(projects[0].budget, None);
        assert!(projects[0].tasks.is_empty());
        assert_eq!(projects[1].client_name, "");
        assert_eq!(projects[1].project_name, "Site");

        let invoice: Invoice = serde_json::from_str(
            r#"{"number":"INV-0001","status":"paid","items":[{"description":"Build","amount":null},null,{"description":"Hosting","amount":40}]}"#,
        )
        .expect("parse");
        assert_eq!(invoice.items.len(), 2);
        assert_eq!(invoice.items[0].amount, 0.0);
        assert_eq!(invoice.items_total(), 40.0);

        let n: Notification =
            serde_json::from_str(r#"{"id":"n1","type":null,"timestamp":null,"read":"yes"}"#).expect("parse");
        assert_eq!(n.kind, NotificationKind::Other);
        assert_eq!(n.timestamp, "");
        assert!(!n.read);
    }

    #[test]
    fn unknown_notification_kinds_read_as_other() {
        let n: Notification =
            serde_json::from_str(r#"{"id":"n1","type":"weekly_digest","read":false}"#).expect("parse");
        assert_eq!(n.kind, NotificationKind::Other);

        let n: Notification = serde_json::from_str(r#"{"type":"intake_submitted"}"#).expect("parse");
        assert_eq!(n.kind, NotificationKind::IntakeSubmitted);
    }

    #[test]
    fn amounts_format_with_grouping() {
        assert_eq!(format_amount(0.0), "0");
        assert_eq!(format_amount(999.0), "999");
        assert_eq!(format_amount(2500.0), "2,500");
        assert_eq!(format_amount(1234567.5), "1,234,567.5");
        assert_eq!(format_amount(-12000.125), "-12,000.125");
        assert_eq!(format_number(72.0), "72");
        assert_eq!(format_number(7.5), "7.5");
    }

    #[test]
    fn timestamps_parse_common_shapes() {
        let midnight = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).single().expect("ts");
        assert_eq!(parse_timestamp("2026-03-01"), Some(midnight));
        assert_eq!(parse_timestamp("2026-03-01T00:00:00.000Z"), Some(midnight));
        assert_eq!(parse_timestamp("2026-03-01T00:00:00"), Some(midnight));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn date_helpers_use_utc_calendar_days() {
        let at = Utc.with_ymd_and_hms(2026, 1, 25, 23, 30, 0).single().expect("ts");
        assert_eq!(date_stamp(at), "2026-01-25");
        assert_eq!(date_after_days(at, 14), "2026-02-08");
        assert_eq!(iso_timestamp(at), "2026-01-25T23:30:00.000Z");
    }

    #[test]
    fn client_record_prefers_company() {
        let both = ClientRecord {
            name: Some("Jane".into()),
            company: Some("Acme".into()),
            ..Default::default()
        };
        let name_only = ClientRecord {
            name: Some("Jane".into()),
            company: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(both.display_name(), Some("Acme"));
        assert_eq!(name_only.display_name(), Some("Jane"));
        assert_eq!(ClientRecord::default().display_name(), None);
    }
}
