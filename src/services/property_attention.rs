use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::i18n::Locale;
use crate::records::fields::{undated_last, RowDate};
use crate::records::{Collection, Lease, Task};
use crate::services::fx::{convert_to_pyg, FxPolicy};

const PER_CATEGORY_LIMIT: usize = 2;
const MAX_ATTENTION_ITEMS: usize = 6;
const LEASE_EXPIRY_WINDOW_DAYS: i64 = 60;
const MILLIS_PER_DAY: f64 = 86_400_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttentionTone {
    Danger,
    Warning,
    Info,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttentionItem {
    pub id: String,
    pub title: String,
    pub detail: String,
    pub href: String,
    pub tone: AttentionTone,
    pub cta_label: String,
}

/// Rows needing a human, already narrowed to open/active by the caller.
pub struct AttentionInputs<'a> {
    pub open_tasks: &'a [&'a Task],
    pub open_collections: &'a [&'a Collection],
    pub active_leases: &'a [&'a Lease],
}

/// Up to two overdue collections, then two urgent tasks, then two leases
/// ending within sixty days. Categories keep this fixed order; they are not
/// re-ranked against each other.
pub fn build_attention_items(
    inputs: &AttentionInputs<'_>,
    property_id: &str,
    locale: Locale,
    now: DateTime<Utc>,
) -> Vec<AttentionItem> {
    let mut items = Vec::with_capacity(MAX_ATTENTION_ITEMS);

    let mut overdue_collections = inputs
        .open_collections
        .iter()
        .copied()
        .filter(|row| row.is_overdue(now))
        .collect::<Vec<_>>();
    overdue_collections.sort_by_key(|row| undated_last(row.due_date.as_ref()));

    for row in overdue_collections.into_iter().take(PER_CATEGORY_LIMIT) {
        let amount = convert_to_pyg(
            row.amount.unwrap_or(0.0),
            row.currency.as_deref(),
            row.fx_rate_to_pyg,
            FxPolicy::AllowEstimate,
        );
        let due_label = row
            .due_date
            .as_ref()
            .and_then(|due| locale.date_label(due.raw()))
            .unwrap_or_else(|| locale.text("No due date", "Sin vencimiento").to_string());
        let key = row
            .id
            .clone()
            .or_else(|| row.lease_id.clone())
            .unwrap_or_else(|| items.len().to_string());
        items.push(AttentionItem {
            id: format!("collection:{key}"),
            title: locale.text("Overdue collection", "Cobro vencido").to_string(),
            detail: format!("{} · {due_label}", locale.format_pyg(amount)),
            href: deep_link("collections", row.id.as_deref(), property_id),
            tone: AttentionTone::Danger,
            cta_label: locale.text("Review", "Revisar").to_string(),
        });
    }

    let mut urgent_tasks = inputs
        .open_tasks
        .iter()
        .copied()
        .filter(|task| task.is_urgent(now))
        .collect::<Vec<_>>();
    urgent_tasks.sort_by_key(|task| undated_last(task.due_at.as_ref()));

    for task in urgent_tasks.into_iter().take(PER_CATEGORY_LIMIT) {
        let detail = match task.due_at.as_ref().and_then(|due| locale.date_label(due.raw())) {
            Some(due_label) if locale.is_en() => format!("Due {due_label}"),
            Some(due_label) => format!("Vence {due_label}"),
            None => locale
                .text("Task needs attention", "La tarea requiere atención")
                .to_string(),
        };
        let key = task.id.clone().unwrap_or_else(|| items.len().to_string());
        items.push(AttentionItem {
            id: format!("task:{key}"),
            title: task.display_title().unwrap_or("-").to_string(),
            detail,
            href: deep_link("tasks", task.id.as_deref(), property_id),
            tone: AttentionTone::Warning,
            cta_label: locale.text("Open task", "Abrir tarea").to_string(),
        });
    }

    let mut expiring_leases = inputs
        .active_leases
        .iter()
        .copied()
        .filter_map(|lease| {
            let days_left = days_until(lease.ends_on.as_ref()?, now)?;
            (0..=LEASE_EXPIRY_WINDOW_DAYS)
                .contains(&days_left)
                .then_some((lease, days_left))
        })
        .collect::<Vec<_>>();
    expiring_leases.sort_by_key(|(lease, _)| undated_last(lease.ends_on.as_ref()));

    for (lease, days_left) in expiring_leases.into_iter().take(PER_CATEGORY_LIMIT) {
        let tenant = lease.tenant().unwrap_or("-");
        let detail = if locale.is_en() {
            format!("{tenant} · {days_left} days left")
        } else {
            format!("{tenant} · faltan {days_left} días")
        };
        let key = lease.id.clone().unwrap_or_else(|| items.len().to_string());
        items.push(AttentionItem {
            id: format!("lease:{key}"),
            title: locale.text("Lease ending soon", "Contrato por vencer").to_string(),
            detail,
            href: deep_link("leases", lease.id.as_deref(), property_id),
            tone: AttentionTone::Info,
            cta_label: locale.text("Open lease", "Ver contrato").to_string(),
        });
    }

    items.truncate(MAX_ATTENTION_ITEMS);
    items
}

/// Whole days from `now` until `target`, rounded up.
pub fn days_until(target: &RowDate, now: DateTime<Utc>) -> Option<i64> {
    let target = target.instant()?;
    let diff_ms = (target - now).num_milliseconds() as f64;
    Some((diff_ms / MILLIS_PER_DAY).ceil() as i64)
}

/// Record page when the row has an id, otherwise the module list filtered to the property.
fn deep_link(module: &str, record_id: Option<&str>, property_id: &str) -> String {
    match record_id {
        Some(id) => format!("/module/{module}/{id}"),
        None => {
            let encoded = url::form_urlencoded::byte_serialize(property_id.as_bytes()).collect::<String>();
            format!("/module/{module}?property_id={encoded}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 15, 30, 0).unwrap()
    }

    fn day_offset(days: i64) -> String {
        (now() + Duration::days(days)).format("%Y-%m-%d").to_string()
    }

    fn collection(value: serde_json::Value) -> Collection {
        serde_json::from_value(value).unwrap()
    }

    fn task(value: serde_json::Value) -> Task {
        serde_json::from_value(value).unwrap()
    }

    fn lease(value: serde_json::Value) -> Lease {
        serde_json::from_value(value).unwrap()
    }

    fn build(
        tasks: &[Task],
        collections: &[Collection],
        leases: &[Lease],
        locale: Locale,
    ) -> Vec<AttentionItem> {
        let open_tasks = tasks.iter().collect::<Vec<_>>();
        let open_collections = collections.iter().collect::<Vec<_>>();
        let active_leases = leases.iter().collect::<Vec<_>>();
        build_attention_items(
            &AttentionInputs {
                open_tasks: &open_tasks,
                open_collections: &open_collections,
                active_leases: &active_leases,
            },
            "prop 1",
            locale,
            now(),
        )
    }

    #[test]
    fn overdue_collection_comes_first_with_amount_and_date() {
        let due = day_offset(-1);
        let items = build(
            &[task(json!({ "id": "t1", "priority": "high" }))],
            &[collection(json!({
                "id": "c1",
                "status": "overdue",
                "due_date": due,
                "amount": 500000,
                "currency": "PYG"
            }))],
            &[],
            Locale::EnUs,
        );

        let first = &items[0];
        assert_eq!(first.id, "collection:c1");
        assert_eq!(first.tone, AttentionTone::Danger);
        assert_eq!(first.title, "Overdue collection");
        assert_eq!(first.detail, "PYG 500,000 · Oct 18, 2026");
        assert_eq!(first.href, "/module/collections/c1");
        assert_eq!(first.cta_label, "Review");
        assert_eq!(items[1].tone, AttentionTone::Warning);
    }

    #[test]
    fn critical_task_due_tomorrow_is_urgent() {
        let items = build(
            &[task(json!({
                "id": "t1",
                "title": "Fix water heater",
                "status": "open",
                "priority": "critical",
                "due_at": "2026-10-20T12:00:00Z"
            }))],
            &[],
            &[],
            Locale::EnUs,
        );
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].tone, AttentionTone::Warning);
        assert_eq!(items[0].title, "Fix water heater");
        assert_eq!(items[0].detail, "Due Oct 20, 2026, 12:00 PM");
        assert_eq!(items[0].href, "/module/tasks/t1");
    }

    #[test]
    fn leases_ending_within_sixty_days_only() {
        let items = build(
            &[],
            &[],
            &[
                lease(json!({ "id": "l90", "tenant_full_name": "Late Tenant", "ends_on": day_offset(90) })),
                lease(json!({ "id": "l45", "tenant_full_name": "Ana Benítez", "ends_on": day_offset(45) })),
                lease(json!({ "id": "lpast", "tenant_name": "Gone", "ends_on": day_offset(-3) })),
            ],
            Locale::EnUs,
        );
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "lease:l45");
        assert_eq!(items[0].tone, AttentionTone::Info);
        assert_eq!(items[0].detail, "Ana Benítez · 45 days left");
    }

    #[test]
    fn lease_ending_today_has_zero_days_left() {
        let items = build(
            &[],
            &[],
            &[lease(json!({ "id": "l0", "tenant_name": "Hoy", "ends_on": day_offset(0) }))],
            Locale::EsPy,
        );
        assert_eq!(items[0].detail, "Hoy · faltan 0 días");
        assert_eq!(items[0].title, "Contrato por vencer");
    }

    #[test]
    fn caps_each_category_at_two_and_total_at_six() {
        let collections = (1..=4)
            .map(|index| {
                collection(json!({
                    "id": format!("c{index}"),
                    "status": "late",
                    "due_date": day_offset(-index),
                    "amount": 1000 * index
                }))
            })
            .collect::<Vec<_>>();
        let tasks = (1..=4)
            .map(|index| task(json!({ "id": format!("t{index}"), "priority": "urgent" })))
            .collect::<Vec<_>>();
        let leases = (1..=4)
            .map(|index| lease(json!({ "id": format!("l{index}"), "ends_on": day_offset(index * 5) })))
            .collect::<Vec<_>>();

        let items = build(&tasks, &collections, &leases, Locale::EnUs);
        assert_eq!(items.len(), 6);
        let tones = items.iter().map(|item| item.tone).collect::<Vec<_>>();
        assert_eq!(
            tones,
            [
                AttentionTone::Danger,
                AttentionTone::Danger,
                AttentionTone::Warning,
                AttentionTone::Warning,
                AttentionTone::Info,
                AttentionTone::Info,
            ]
        );
        // Oldest overdue first, soonest expiry first.
        assert_eq!(items[0].id, "collection:c4");
        assert_eq!(items[1].id, "collection:c3");
        assert_eq!(items[4].id, "lease:l1");
    }

    #[test]
    fn rows_without_ids_link_to_filtered_lists() {
        let items = build(
            &[task(json!({ "type": "inspection", "priority": "high" }))],
            &[collection(json!({
                "lease_id": "l7",
                "status": "pending",
                "due_date": day_offset(-10),
                "amount": 100,
                "currency": "USD"
            }))],
            &[],
            Locale::EsPy,
        );
        assert_eq!(items[0].id, "collection:l7");
        assert_eq!(items[0].href, "/module/collections?property_id=prop+1");
        assert_eq!(items[0].detail, "Gs. 730.000 · 9 oct 2026");
        assert_eq!(items[1].id, "task:1");
        assert_eq!(items[1].title, "inspection");
        assert_eq!(items[1].detail, "La tarea requiere atención");
        assert_eq!(items[1].href, "/module/tasks?property_id=prop+1");
    }

    #[test]
    fn days_until_rounds_up_partial_days() {
        assert_eq!(days_until(&RowDate::new(&day_offset(45)), now()), Some(45));
        assert_eq!(days_until(&RowDate::new(&day_offset(0)), now()), Some(0));
        assert_eq!(days_until(&RowDate::new("unknown"), now()), None);
    }
}
