//! Typed views over the backend rows the property overview reads.

pub mod fields;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use fields::{lenient_bool, lenient_date, lenient_number, lenient_string, normalized, RowDate};

pub const TASK_CLOSED_STATUSES: &[&str] = &[
    "done",
    "completed",
    "cancelled",
    "canceled",
    "resolved",
    "closed",
];
pub const LEASE_ACTIVE_STATUSES: &[&str] = &["active", "delinquent"];
pub const ACTIVE_RESERVATION_STATUSES: &[&str] = &["pending", "confirmed", "checked_in"];
pub const APPLICATION_CLOSED_STATUSES: &[&str] = &["rejected", "lost", "contract_signed"];
pub const COLLECTION_OPEN_STATUSES: &[&str] = &["scheduled", "pending", "late", "overdue", "partial"];
pub const COLLECTION_PAID_STATUSES: &[&str] = &["paid", "completed", "settled"];
pub const URGENT_TASK_PRIORITIES: &[&str] = &["high", "critical", "urgent"];

fn status_in(value: Option<&str>, set: &[&str]) -> bool {
    set.contains(&normalized(value).as_str())
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Property {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub organization_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub public_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub code: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub district: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub neighborhood: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub city: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub address: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub street_address: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub location: Option<String>,
    /// The record exactly as returned, for key listing.
    #[serde(skip)]
    pub record: Map<String, Value>,
}

impl Property {
    pub fn from_record(record: Map<String, Value>) -> Result<Self, serde_json::Error> {
        let mut property: Property = serde_json::from_value(Value::Object(record.clone()))?;
        property.record = record;
        Ok(property)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Unit {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub code: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Lease {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub unit_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub lease_status: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub monthly_rent: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub currency: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub fx_rate_to_pyg: Option<f64>,
    #[serde(default, deserialize_with = "lenient_date")]
    pub starts_on: Option<RowDate>,
    #[serde(default, deserialize_with = "lenient_date")]
    pub ends_on: Option<RowDate>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub tenant_full_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub tenant_name: Option<String>,
}

impl Lease {
    pub fn is_active(&self) -> bool {
        status_in(self.lease_status.as_deref(), LEASE_ACTIVE_STATUSES)
    }

    pub fn tenant(&self) -> Option<&str> {
        fields::first_present([self.tenant_full_name.as_deref(), self.tenant_name.as_deref()])
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Collection {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub lease_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient_date")]
    pub due_date: Option<RowDate>,
    #[serde(default, deserialize_with = "lenient_date")]
    pub paid_at: Option<RowDate>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub amount: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub currency: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub fx_rate_to_pyg: Option<f64>,
}

impl Collection {
    pub fn is_open(&self) -> bool {
        status_in(self.status.as_deref(), COLLECTION_OPEN_STATUSES)
    }

    pub fn is_paid(&self) -> bool {
        status_in(self.status.as_deref(), COLLECTION_PAID_STATUSES)
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.is_open()
            && self
                .due_date
                .as_ref()
                .and_then(RowDate::instant)
                .is_some_and(|due| due < now)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Task {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub unit_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: Option<String>,
    #[serde(default, rename = "type", deserialize_with = "lenient_string")]
    pub task_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub priority: Option<String>,
    #[serde(default, deserialize_with = "lenient_date")]
    pub due_at: Option<RowDate>,
}

impl Task {
    pub fn is_open(&self) -> bool {
        !status_in(self.status.as_deref(), TASK_CLOSED_STATUSES)
    }

    /// Past its due time, or flagged with a high/critical/urgent priority.
    pub fn is_urgent(&self, now: DateTime<Utc>) -> bool {
        let past_due = self
            .due_at
            .as_ref()
            .and_then(RowDate::instant)
            .is_some_and(|due| due < now);
        past_due || status_in(self.priority.as_deref(), URGENT_TASK_PRIORITIES)
    }

    pub fn display_title(&self) -> Option<&str> {
        fields::first_present([
            self.title.as_deref(),
            self.task_type.as_deref(),
            self.id.as_deref(),
        ])
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Expense {
    #[serde(default, deserialize_with = "lenient_number")]
    pub amount: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub currency: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub fx_rate_to_pyg: Option<f64>,
    #[serde(default, deserialize_with = "lenient_date")]
    pub expense_date: Option<RowDate>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub vendor_name: Option<String>,
}

impl Expense {
    pub fn category_key(&self) -> &str {
        fields::first_present([self.category.as_deref(), self.vendor_name.as_deref()])
            .unwrap_or("other")
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Reservation {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub property_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub status: Option<String>,
}

impl Reservation {
    pub fn is_active(&self) -> bool {
        status_in(self.status.as_deref(), ACTIVE_RESERVATION_STATUSES)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Listing {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub property_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub is_published: Option<bool>,
}

impl Listing {
    pub fn is_published(&self) -> bool {
        self.is_published == Some(true)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Application {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub marketplace_listing_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub status: Option<String>,
}

impl Application {
    pub fn in_pipeline(&self) -> bool {
        !status_in(self.status.as_deref(), APPLICATION_CLOSED_STATUSES)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OwnerStatement {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_date")]
    pub period_end: Option<RowDate>,
    #[serde(default, deserialize_with = "lenient_date")]
    pub generated_at: Option<RowDate>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub net_payout: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub currency: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub status: Option<String>,
}

impl OwnerStatement {
    /// `period_end`, else `generated_at`; `None` when neither parses.
    pub fn reference_instant(&self) -> Option<DateTime<Utc>> {
        self.period_end
            .as_ref()
            .or(self.generated_at.as_ref())
            .and_then(RowDate::instant)
    }
}
