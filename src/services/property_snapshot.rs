use std::collections::HashSet;

use crate::records::{
    Application, Collection, Expense, Lease, Listing, OwnerStatement, Reservation, Task, Unit,
};
use crate::services::backend_client::BackendClient;

/// Everything related to one property, fetched for a single render.
#[derive(Debug, Clone, Default)]
pub struct PropertyRelationSnapshot {
    pub units: Vec<Unit>,
    pub tasks: Vec<Task>,
    pub expenses: Vec<Expense>,
    pub owner_statements: Vec<OwnerStatement>,
    pub leases: Vec<Lease>,
    pub reservations: Vec<Reservation>,
    pub listings: Vec<Listing>,
    pub applications: Vec<Application>,
    pub collections: Vec<Collection>,
}

/// Fans out the nine list queries for `property_id` and narrows the
/// organization-wide ones to this property. Never fails: a resource whose
/// request fails is simply empty.
pub async fn load_property_relation_snapshot(
    client: &BackendClient<'_>,
    org_id: &str,
    property_id: &str,
) -> PropertyRelationSnapshot {
    let property_scope = |limit: u32| {
        vec![
            ("org_id", org_id.to_string()),
            ("property_id", property_id.to_string()),
            ("limit", limit.to_string()),
        ]
    };
    let org_scope = |limit: u32| vec![("org_id", org_id.to_string()), ("limit", limit.to_string())];

    let units_query = property_scope(400);
    let tasks_query = property_scope(400);
    let expenses_query = property_scope(600);
    let statements_query = property_scope(240);
    let leases_query = property_scope(400);
    let reservations_query = org_scope(800);
    let listings_query = org_scope(400);
    let applications_query = org_scope(600);
    let collections_query = org_scope(600);

    let (
        units,
        tasks,
        expenses,
        owner_statements,
        leases,
        reservations,
        listings,
        applications,
        collections,
    ) = tokio::join!(
        client.fetch_scoped_rows::<Unit>("/units", &units_query),
        client.fetch_scoped_rows::<Task>("/tasks", &tasks_query),
        client.fetch_scoped_rows::<Expense>("/expenses", &expenses_query),
        client.fetch_scoped_rows::<OwnerStatement>("/owner-statements", &statements_query),
        client.fetch_scoped_rows::<Lease>("/leases", &leases_query),
        client.fetch_scoped_rows::<Reservation>("/reservations", &reservations_query),
        client.fetch_scoped_rows::<Listing>("/marketplace/listings", &listings_query),
        client.fetch_scoped_rows::<Application>("/applications", &applications_query),
        client.fetch_scoped_rows::<Collection>("/collections", &collections_query),
    );

    let snapshot = filter_to_property(
        PropertyRelationSnapshot {
            units,
            tasks,
            expenses,
            owner_statements,
            leases,
            reservations,
            listings,
            applications,
            collections,
        },
        property_id,
    );

    tracing::debug!(
        property_id,
        units = snapshot.units.len(),
        leases = snapshot.leases.len(),
        collections = snapshot.collections.len(),
        tasks = snapshot.tasks.len(),
        "Loaded property relation snapshot"
    );

    snapshot
}

/// Narrows the organization-wide collections: reservations and listings by
/// `property_id`, applications by this property's listing ids, collections by
/// this property's lease ids. Input order is kept.
pub fn filter_to_property(
    mut snapshot: PropertyRelationSnapshot,
    property_id: &str,
) -> PropertyRelationSnapshot {
    snapshot
        .reservations
        .retain(|row| row.property_id.as_deref() == Some(property_id));
    snapshot
        .listings
        .retain(|row| row.property_id.as_deref() == Some(property_id));

    let listing_ids = snapshot
        .listings
        .iter()
        .filter_map(|row| row.id.as_deref())
        .collect::<HashSet<_>>();
    snapshot.applications.retain(|row| {
        row.marketplace_listing_id
            .as_deref()
            .is_some_and(|listing_id| listing_ids.contains(listing_id))
    });

    let lease_ids = snapshot
        .leases
        .iter()
        .filter_map(|row| row.id.as_deref())
        .collect::<HashSet<_>>();
    snapshot.collections.retain(|row| {
        row.lease_id
            .as_deref()
            .is_some_and(|lease_id| lease_ids.contains(lease_id))
    });

    snapshot
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::spawn_backend;
    use axum::{
        extract::Request,
        http::StatusCode,
        middleware::Next,
        response::IntoResponse,
        routing::{get, MethodRouter},
        Json, Router,
    };
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    type SeenQueries = Arc<Mutex<HashMap<String, Vec<(String, String)>>>>;

    fn rows(data: serde_json::Value) -> MethodRouter {
        get(move || {
            let data = data.clone();
            async move { Json(json!({ "data": data })) }
        })
    }

    /// Stub backend; every request's query pairs are recorded by path.
    fn backend(seen: SeenQueries) -> Router {
        Router::new()
            .route("/v1/units", rows(json!([{ "id": "u1" }, { "id": "u2" }])))
            .route(
                "/v1/tasks",
                get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response() }),
            )
            .route("/v1/expenses", get(|| async { "not json" }))
            .route("/v1/owner-statements", get(|| async { Json(json!({ "rows": [] })) }))
            .route(
                "/v1/leases",
                rows(json!([{ "id": "l1", "unit_id": "u1", "lease_status": "active" }])),
            )
            .route(
                "/v1/reservations",
                rows(json!([
                    { "id": "r1", "property_id": "p1", "status": "confirmed" },
                    { "id": "r2", "property_id": "p2", "status": "confirmed" },
                    { "id": "r3", "property_id": "P1", "status": "confirmed" }
                ])),
            )
            .route(
                "/v1/marketplace/listings",
                rows(json!([
                    { "id": "m1", "property_id": "p1", "is_published": true },
                    { "id": "m2", "property_id": "p2", "is_published": true }
                ])),
            )
            .route(
                "/v1/applications",
                rows(json!([
                    { "id": "a1", "marketplace_listing_id": "m1", "status": "new" },
                    { "id": "a2", "marketplace_listing_id": "m2", "status": "new" },
                    { "id": "a3", "status": "new" }
                ])),
            )
            .route(
                "/v1/collections",
                rows(json!([
                    { "id": "c1", "lease_id": "l1", "status": "pending" },
                    { "id": "c2", "lease_id": "l9", "status": "pending" }
                ])),
            )
            .layer(axum::middleware::from_fn(move |request: Request, next: Next| {
                let seen = seen.clone();
                async move {
                    let pairs = url::form_urlencoded::parse(
                        request.uri().query().unwrap_or_default().as_bytes(),
                    )
                    .into_owned()
                    .collect::<Vec<_>>();
                    seen.lock()
                        .unwrap()
                        .insert(request.uri().path().to_string(), pairs);
                    next.run(request).await
                }
            }))
    }

    fn scope(property_scoped: bool, limit: &str) -> Vec<(String, String)> {
        let mut pairs = vec![("org_id".to_string(), "org-1".to_string())];
        if property_scoped {
            pairs.push(("property_id".to_string(), "p1".to_string()));
        }
        pairs.push(("limit".to_string(), limit.to_string()));
        pairs
    }

    #[tokio::test]
    async fn every_resource_is_scoped_with_its_limit() {
        let seen = SeenQueries::default();
        let base_url = spawn_backend(backend(seen.clone())).await;
        let http_client = reqwest::Client::new();
        let client = BackendClient::new(&http_client, &base_url, Some("token"));

        load_property_relation_snapshot(&client, "org-1", "p1").await;

        let seen = seen.lock().unwrap();
        let expected = [
            ("/v1/units", true, "400"),
            ("/v1/tasks", true, "400"),
            ("/v1/expenses", true, "600"),
            ("/v1/owner-statements", true, "240"),
            ("/v1/leases", true, "400"),
            ("/v1/reservations", false, "800"),
            ("/v1/marketplace/listings", false, "400"),
            ("/v1/applications", false, "600"),
            ("/v1/collections", false, "600"),
        ];
        assert_eq!(seen.len(), expected.len());
        for (path, property_scoped, limit) in expected {
            assert_eq!(seen.get(path), Some(&scope(property_scoped, limit)), "{path}");
        }
    }

    #[tokio::test]
    async fn failed_resources_degrade_to_empty_lists() {
        let base_url = spawn_backend(backend(SeenQueries::default())).await;
        let http_client = reqwest::Client::new();
        let client = BackendClient::new(&http_client, &base_url, Some("token"));

        let snapshot = load_property_relation_snapshot(&client, "org-1", "p1").await;

        assert_eq!(snapshot.units.len(), 2);
        assert!(snapshot.tasks.is_empty());
        assert!(snapshot.expenses.is_empty());
        assert!(snapshot.owner_statements.is_empty());
        assert_eq!(snapshot.leases.len(), 1);
        assert_eq!(
            snapshot.reservations.iter().map(|row| row.id.as_deref()).collect::<Vec<_>>(),
            [Some("r1")]
        );
        assert_eq!(snapshot.listings.len(), 1);
        assert_eq!(
            snapshot.applications.iter().map(|row| row.id.as_deref()).collect::<Vec<_>>(),
            [Some("a1")]
        );
        assert_eq!(
            snapshot.collections.iter().map(|row| row.id.as_deref()).collect::<Vec<_>>(),
            [Some("c1")]
        );
    }

    #[tokio::test]
    async fn unreachable_backend_yields_empty_snapshot() {
        let http_client = reqwest::Client::new();
        let client = BackendClient::new(&http_client, "http://127.0.0.1:9/v1", None);
        let snapshot = load_property_relation_snapshot(&client, "org-1", "p1").await;
        assert!(snapshot.units.is_empty());
        assert!(snapshot.collections.is_empty());
    }

    #[test]
    fn filter_keeps_input_order() {
        let snapshot = PropertyRelationSnapshot {
            leases: vec![
                Lease { id: Some("l2".into()), ..Default::default() },
                Lease { id: Some("l1".into()), ..Default::default() },
            ],
            collections: vec![
                Collection { id: Some("c3".into()), lease_id: Some("l1".into()), ..Default::default() },
                Collection { id: Some("c1".into()), lease_id: Some("l2".into()), ..Default::default() },
                Collection { id: Some("c2".into()), lease_id: None, ..Default::default() },
            ],
            ..Default::default()
        };
        let filtered = filter_to_property(snapshot, "p1");
        assert_eq!(
            filtered.collections.iter().map(|row| row.id.as_deref()).collect::<Vec<_>>(),
            [Some("c3"), Some("c1")]
        );
    }
}
