use std::cmp::{Ordering, Reverse};
use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::i18n::Locale;
use crate::records::fields::{first_present, undated_last};
use crate::records::{Collection, Lease, OwnerStatement, Task, Unit};
use crate::services::fx::{convert_to_pyg, FxPolicy};
use crate::services::property_attention::{build_attention_items, AttentionInputs, AttentionItem};
use crate::services::property_snapshot::PropertyRelationSnapshot;

const UNIT_CARD_LIMIT: usize = 6;
const EXPENSE_CATEGORY_LIMIT: usize = 3;

#[derive(Debug, Clone, Serialize)]
pub struct PropertyOverview {
    pub unit_count: usize,
    pub active_lease_count: usize,
    pub active_reservation_count: usize,
    pub open_task_count: usize,
    pub published_listing_count: usize,
    pub pipeline_application_count: usize,
    pub open_collection_count: usize,
    pub owner_statement_count: usize,
    pub overlapping_lease_unit_count: usize,
    pub occupancy_rate: Option<u32>,
    pub month_label: String,
    pub month_income_pyg: f64,
    pub month_expense_pyg: f64,
    pub month_net_income_pyg: f64,
    pub collected_pyg: f64,
    pub projected_rent_pyg: f64,
    pub latest_statement: Option<OwnerStatement>,
    pub attention_items: Vec<AttentionItem>,
    pub unit_cards: Vec<UnitCard>,
    pub expense_category_breakdown: Vec<ExpenseCategoryRow>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatusTone {
    Maintenance,
    Occupied,
    Vacant,
}

impl UnitStatusTone {
    fn label(self, locale: Locale) -> &'static str {
        match self {
            Self::Maintenance => locale.text("Attention", "Atención"),
            Self::Occupied => locale.text("Occupied", "Ocupada"),
            Self::Vacant => locale.text("Vacant", "Vacante"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitCard {
    pub id: String,
    pub unit_id: Option<String>,
    pub label: String,
    pub subtitle: String,
    pub status_tone: UnitStatusTone,
    pub status_label: String,
    pub tenant_name: String,
    pub monthly_rent_pyg: f64,
    pub next_collection_due: Option<String>,
    pub open_task_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpenseCategoryRow {
    pub category: String,
    pub amount: f64,
}

/// Derives the property overview from a filtered snapshot. `now` is the single
/// clock reading for the whole render; nothing here reads the system clock.
pub fn build_property_overview(
    snapshot: &PropertyRelationSnapshot,
    property_id: &str,
    locale: Locale,
    now: DateTime<Utc>,
) -> PropertyOverview {
    let open_tasks = snapshot.tasks.iter().filter(|row| row.is_open()).collect::<Vec<_>>();
    let active_leases = snapshot.leases.iter().filter(|row| row.is_active()).collect::<Vec<_>>();
    let open_collections = snapshot
        .collections
        .iter()
        .filter(|row| row.is_open())
        .collect::<Vec<_>>();
    let active_reservation_count = snapshot.reservations.iter().filter(|row| row.is_active()).count();
    let published_listing_count = snapshot.listings.iter().filter(|row| row.is_published()).count();
    let pipeline_application_count = snapshot
        .applications
        .iter()
        .filter(|row| row.in_pipeline())
        .count();

    let occupancy_rate = occupancy_rate(&snapshot.units, &active_leases);

    let month_prefix = now.format("%Y-%m").to_string();
    let month_expenses = snapshot
        .expenses
        .iter()
        .filter(|row| row.expense_date.as_ref().is_some_and(|date| date.in_month(&month_prefix)))
        .collect::<Vec<_>>();
    let expense_pyg = |amount: Option<f64>, currency: Option<&str>, fx_rate: Option<f64>| match amount {
        Some(amount) => convert_to_pyg(amount, currency, fx_rate, FxPolicy::RequireRate),
        None => 0.0,
    };
    let month_expense_pyg = month_expenses
        .iter()
        .map(|row| expense_pyg(row.amount, row.currency.as_deref(), row.fx_rate_to_pyg))
        .sum::<f64>();

    let collected_pyg = snapshot
        .collections
        .iter()
        .filter(|row| counts_toward_month(row, &month_prefix))
        .map(collection_amount_pyg)
        .sum::<f64>();
    let projected_rent_pyg = active_leases.iter().map(|lease| lease_rent_pyg(lease)).sum::<f64>();
    let month_income_pyg = if collected_pyg > 0.0 {
        collected_pyg
    } else {
        projected_rent_pyg
    };

    let (lease_by_unit, overlapping_lease_unit_count) = active_lease_by_unit(&active_leases);
    if overlapping_lease_unit_count > 0 {
        tracing::warn!(
            property_id,
            units = overlapping_lease_unit_count,
            "Units with more than one active lease; using the most recently started one"
        );
    }

    let unit_cards = build_unit_cards(
        &snapshot.units,
        &lease_by_unit,
        &open_tasks,
        &open_collections,
        locale,
        now,
    );

    let mut category_totals: Vec<(String, f64)> = Vec::new();
    let mut category_index: HashMap<&str, usize> = HashMap::new();
    for row in &month_expenses {
        let amount = expense_pyg(row.amount, row.currency.as_deref(), row.fx_rate_to_pyg);
        let key = row.category_key();
        match category_index.get(key) {
            Some(&index) => category_totals[index].1 += amount,
            None => {
                category_index.insert(key, category_totals.len());
                category_totals.push((key.to_string(), amount));
            }
        }
    }
    category_totals.sort_by(|left, right| right.1.partial_cmp(&left.1).unwrap_or(Ordering::Equal));
    let expense_category_breakdown = category_totals
        .into_iter()
        .take(EXPENSE_CATEGORY_LIMIT)
        .map(|(category, amount)| ExpenseCategoryRow { category, amount })
        .collect();

    let attention_items = build_attention_items(
        &AttentionInputs {
            open_tasks: &open_tasks,
            open_collections: &open_collections,
            active_leases: &active_leases,
        },
        property_id,
        locale,
        now,
    );

    PropertyOverview {
        unit_count: snapshot.units.len(),
        active_lease_count: active_leases.len(),
        active_reservation_count,
        open_task_count: open_tasks.len(),
        published_listing_count,
        pipeline_application_count,
        open_collection_count: open_collections.len(),
        owner_statement_count: snapshot.owner_statements.len(),
        overlapping_lease_unit_count,
        occupancy_rate,
        month_label: locale.month_label(now),
        month_income_pyg,
        month_expense_pyg,
        month_net_income_pyg: month_income_pyg - month_expense_pyg,
        collected_pyg,
        projected_rent_pyg,
        latest_statement: latest_statement(&snapshot.owner_statements).cloned(),
        attention_items,
        unit_cards,
        expense_category_breakdown,
    }
}

/// Share of the property's units covered by an active lease, as a whole percentage.
fn occupancy_rate(units: &[Unit], active_leases: &[&Lease]) -> Option<u32> {
    if units.is_empty() {
        return None;
    }
    let unit_ids = units.iter().filter_map(|unit| unit.id.as_deref()).collect::<HashSet<_>>();
    let occupied = active_leases
        .iter()
        .filter_map(|lease| lease.unit_id.as_deref())
        .filter(|unit_id| unit_ids.contains(unit_id))
        .collect::<HashSet<_>>();
    let rate = (occupied.len() as f64 / units.len() as f64 * 100.0).round();
    Some(rate.clamp(0.0, 100.0) as u32)
}

/// Paid this month (by payment or due date), or still open and due this month.
fn counts_toward_month(row: &Collection, month_prefix: &str) -> bool {
    let due_this_month = row
        .due_date
        .as_ref()
        .is_some_and(|date| date.in_month(month_prefix));
    if row.is_paid() {
        let paid_this_month = row
            .paid_at
            .as_ref()
            .is_some_and(|date| date.in_month(month_prefix));
        return paid_this_month || due_this_month;
    }
    row.is_open() && due_this_month
}

fn collection_amount_pyg(row: &Collection) -> f64 {
    convert_to_pyg(
        row.amount.unwrap_or(0.0),
        row.currency.as_deref(),
        row.fx_rate_to_pyg,
        FxPolicy::AllowEstimate,
    )
}

fn lease_rent_pyg(lease: &Lease) -> f64 {
    convert_to_pyg(
        lease.monthly_rent.unwrap_or(0.0),
        lease.currency.as_deref(),
        lease.fx_rate_to_pyg,
        FxPolicy::RequireRate,
    )
}

/// One active lease per unit: the most recently started wins (undated leases
/// rank last, ties keep input order). Also returns how many units had more
/// than one candidate.
fn active_lease_by_unit<'a>(active_leases: &[&'a Lease]) -> (HashMap<&'a str, &'a Lease>, usize) {
    let mut ordered = active_leases.to_vec();
    ordered.sort_by_key(|lease| {
        let started = lease.starts_on.as_ref().and_then(|date| date.instant());
        (started.is_none(), Reverse(started))
    });

    let mut by_unit: HashMap<&'a str, &'a Lease> = HashMap::new();
    let mut overlapping = HashSet::new();
    for lease in ordered {
        let Some(unit_id) = lease.unit_id.as_deref() else {
            continue;
        };
        if by_unit.contains_key(unit_id) {
            overlapping.insert(unit_id);
            continue;
        }
        by_unit.insert(unit_id, lease);
    }
    (by_unit, overlapping.len())
}

fn build_unit_cards(
    units: &[Unit],
    lease_by_unit: &HashMap<&str, &Lease>,
    open_tasks: &[&Task],
    open_collections: &[&Collection],
    locale: Locale,
    now: DateTime<Utc>,
) -> Vec<UnitCard> {
    let mut tasks_by_unit: HashMap<&str, Vec<&Task>> = HashMap::new();
    for task in open_tasks {
        if let Some(unit_id) = task.unit_id.as_deref() {
            tasks_by_unit.entry(unit_id).or_default().push(*task);
        }
    }

    let mut collections_by_lease: HashMap<&str, Vec<&Collection>> = HashMap::new();
    for row in open_collections {
        if let Some(lease_id) = row.lease_id.as_deref() {
            collections_by_lease.entry(lease_id).or_default().push(*row);
        }
    }
    for rows in collections_by_lease.values_mut() {
        rows.sort_by_key(|row| undated_last(row.due_date.as_ref()));
    }

    let mut ordered = units.iter().collect::<Vec<_>>();
    ordered.sort_by(|left, right| {
        let left_label = unit_label(left).unwrap_or_default();
        let right_label = unit_label(right).unwrap_or_default();
        left_label
            .to_lowercase()
            .cmp(&right_label.to_lowercase())
            .then_with(|| left_label.cmp(right_label))
    });

    ordered
        .into_iter()
        .take(UNIT_CARD_LIMIT)
        .map(|unit| {
            let unit_id = unit.id.as_deref();
            let lease = unit_id.and_then(|id| lease_by_unit.get(id).copied());
            let unit_tasks = unit_id
                .and_then(|id| tasks_by_unit.get(id))
                .map(Vec::as_slice)
                .unwrap_or_default();
            let next_collection = lease
                .and_then(|lease| lease.id.as_deref())
                .and_then(|lease_id| collections_by_lease.get(lease_id))
                .and_then(|rows| rows.first());

            let status_tone = if unit_tasks.iter().any(|task| task.is_urgent(now)) {
                UnitStatusTone::Maintenance
            } else if lease.is_some() {
                UnitStatusTone::Occupied
            } else {
                UnitStatusTone::Vacant
            };

            UnitCard {
                id: unit_id
                    .or_else(|| first_present([unit.code.as_deref(), unit.name.as_deref()]))
                    .unwrap_or("unit")
                    .to_string(),
                unit_id: unit.id.clone(),
                label: unit_label(unit).unwrap_or("-").to_string(),
                subtitle: first_present([unit.name.as_deref(), unit.code.as_deref()])
                    .unwrap_or("-")
                    .to_string(),
                status_tone,
                status_label: status_tone.label(locale).to_string(),
                tenant_name: lease
                    .and_then(Lease::tenant)
                    .unwrap_or_else(|| locale.text("No active tenant", "Sin inquilino activo"))
                    .to_string(),
                monthly_rent_pyg: lease.map(lease_rent_pyg).unwrap_or(0.0),
                next_collection_due: next_collection
                    .and_then(|row| row.due_date.as_ref())
                    .and_then(|due| locale.date_label(due.raw())),
                open_task_count: unit_tasks.len(),
            }
        })
        .collect()
}

fn unit_label(unit: &Unit) -> Option<&str> {
    first_present([unit.code.as_deref(), unit.name.as_deref(), unit.id.as_deref()])
}

/// Statement with the latest `period_end`/`generated_at`; undated ones count as
/// the epoch. The first of equally dated statements wins.
fn latest_statement(statements: &[OwnerStatement]) -> Option<&OwnerStatement> {
    let key = |statement: &OwnerStatement| {
        statement
            .reference_instant()
            .map(|instant| instant.timestamp_millis())
            .unwrap_or(0)
    };
    statements.iter().fold(None, |best, statement| match best {
        Some(current) if key(current) >= key(statement) => Some(current),
        _ => Some(statement),
    })
}
