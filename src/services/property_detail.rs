use std::cmp::Ordering;

use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::i18n::Locale;
use crate::records::fields::first_present;
use crate::records::Property;
use crate::services::backend_client::BackendClient;
use crate::services::property_overview::{build_property_overview, PropertyOverview};
use crate::services::property_snapshot::load_property_relation_snapshot;

const KEY_PRIORITY: &[&str] = &[
    "id",
    "name",
    "title",
    "code",
    "status",
    "kind",
    "organization_id",
    "property_id",
    "unit_id",
    "created_at",
    "updated_at",
];

/// Related module links shown beside a property: module slug, English and
/// Spanish labels.
const RELATED_MODULES: &[(&str, &str, &str)] = &[
    ("units", "Units in this property", "Unidades en esta propiedad"),
    ("tasks", "Tasks in this property", "Tareas de esta propiedad"),
    ("expenses", "Expenses in this property", "Gastos de esta propiedad"),
    (
        "owner-statements",
        "Owner statements in this property",
        "Estados del propietario de esta propiedad",
    ),
    ("leases", "Related leases", "Contratos relacionados"),
    ("applications", "Related applications", "Aplicaciones relacionadas"),
    ("collections", "Related collections", "Cobros relacionados"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelatedLink {
    pub href: String,
    pub label: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PropertyDetail {
    pub record: Map<String, Value>,
    pub record_id: String,
    pub title: String,
    pub property_code_label: Option<String>,
    pub property_location_label: Option<String>,
    pub keys: Vec<String>,
    pub related_links: Vec<RelatedLink>,
    pub overview: Option<PropertyOverview>,
}

/// Loads the property record and, when it belongs to an organization, its
/// overview.
pub async fn load_property_detail(
    client: &BackendClient<'_>,
    property_id: &str,
    locale: Locale,
) -> AppResult<PropertyDetail> {
    let property_id = property_id.trim();
    if Uuid::parse_str(property_id).is_err() {
        return Err(AppError::NotFound("Property not found.".to_string()));
    }

    let record = client.fetch_record("/properties", property_id).await?;
    let property = Property::from_record(record).map_err(|error| {
        AppError::Dependency(format!("Backend returned an unreadable property: {error}"))
    })?;

    let record_id = property.id.clone().unwrap_or_else(|| property_id.to_string());
    let now = Utc::now();

    let overview = match property.organization_id.as_deref() {
        Some(org_id) => {
            let snapshot = load_property_relation_snapshot(client, org_id, &record_id).await;
            Some(build_property_overview(&snapshot, &record_id, locale, now))
        }
        None => {
            tracing::info!(property_id = %record_id, "Property has no organization, skipping overview");
            None
        }
    };

    Ok(PropertyDetail {
        title: property_title(&property, locale),
        property_code_label: first_present([
            property.code.as_deref(),
            property.public_name.as_deref(),
            property.id.as_deref(),
        ])
        .map(ToOwned::to_owned),
        property_location_label: location_label(&property),
        keys: sort_keys(property.record.keys().map(String::as_str)),
        related_links: related_links(&record_id, locale),
        record_id,
        overview,
        record: property.record,
    })
}

fn property_title(property: &Property, locale: Locale) -> String {
    first_present([
        property.name.as_deref(),
        property.title.as_deref(),
        property.public_name.as_deref(),
        property.code.as_deref(),
        property.id.as_deref(),
    ])
    .unwrap_or(locale.text("Property details", "Detalles de propiedad"))
    .to_string()
}

fn location_label(property: &Property) -> Option<String> {
    let area = first_present([
        property.district.as_deref(),
        property.neighborhood.as_deref(),
        property.city.as_deref(),
    ]);
    let street = first_present([
        property.address.as_deref(),
        property.street_address.as_deref(),
        property.location.as_deref(),
    ]);
    let parts = [area, street].into_iter().flatten().collect::<Vec<_>>();
    (!parts.is_empty()).then(|| parts.join(" · "))
}

fn key_rank(key: &str) -> Option<usize> {
    if let Some(index) = KEY_PRIORITY.iter().position(|candidate| *candidate == key) {
        return Some(index * 10);
    }
    let stem = key.strip_suffix("_name")?;
    let id_key = format!("{stem}_id");
    KEY_PRIORITY
        .iter()
        .position(|candidate| *candidate == id_key)
        .map(|index| index * 10 + 1)
}

/// Record keys in display order: known keys first, `*_name` right after its
/// `*_id`, then everything else alphabetically.
pub fn sort_keys<'a>(keys: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut keys = keys.into_iter().collect::<Vec<_>>();
    keys.sort_by(|left, right| match (key_rank(left), key_rank(right)) {
        (Some(left_rank), Some(right_rank)) => left_rank.cmp(&right_rank),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => left.cmp(right),
    });
    keys.into_iter().map(ToOwned::to_owned).collect()
}

pub fn related_links(property_id: &str, locale: Locale) -> Vec<RelatedLink> {
    let encoded = url::form_urlencoded::byte_serialize(property_id.as_bytes()).collect::<String>();
    RELATED_MODULES
        .iter()
        .map(|(module, en, es)| RelatedLink {
            href: format!("/module/{module}?property_id={encoded}"),
            label: locale.text(en, es).to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::spawn_backend;
    use axum::{extract::Path, http::StatusCode, routing::get, Json, Router};
    use serde_json::json;

    const PROPERTY_ID: &str = "6f1c2a8e-8d4b-4a52-9d57-0b3e6f2d9c11";

    #[test]
    fn keys_follow_display_priority() {
        let keys = sort_keys([
            "zeta",
            "unit_name",
            "updated_at",
            "organization_name",
            "alpha",
            "name",
            "organization_id",
            "id",
            "unit_id",
        ]);
        assert_eq!(
            keys,
            [
                "id",
                "name",
                "organization_id",
                "organization_name",
                "unit_id",
                "unit_name",
                "updated_at",
                "alpha",
                "zeta"
            ]
        );
    }

    #[test]
    fn related_links_are_localized_and_scoped() {
        let links = related_links("p 1", Locale::EsPy);
        assert_eq!(links.len(), 7);
        assert_eq!(links[0].href, "/module/units?property_id=p+1");
        assert_eq!(links[3].label, "Estados del propietario de esta propiedad");

        let links = related_links(PROPERTY_ID, Locale::EnUs);
        assert_eq!(links[6].label, "Related collections");
        assert_eq!(links[6].href, format!("/module/collections?property_id={PROPERTY_ID}"));
    }

    #[test]
    fn labels_fall_back_through_columns() {
        let Value::Object(record) = json!({
            "id": PROPERTY_ID,
            "public_name": "Edificio Sol",
            "neighborhood": "Villa Morra",
            "street_address": "Av. España 123"
        }) else {
            unreachable!()
        };
        let property = Property::from_record(record).unwrap();
        assert_eq!(property_title(&property, Locale::EnUs), "Edificio Sol");
        assert_eq!(
            location_label(&property).as_deref(),
            Some("Villa Morra · Av. España 123")
        );

        let bare = Property::default();
        assert_eq!(property_title(&bare, Locale::EsPy), "Detalles de propiedad");
        assert_eq!(location_label(&bare), None);
    }

    #[tokio::test]
    async fn non_uuid_ids_are_not_found_without_a_request() {
        let http_client = reqwest::Client::new();
        let client = BackendClient::new(&http_client, "http://127.0.0.1:9/v1", None);
        let result = load_property_detail(&client, "not-a-uuid", Locale::EnUs).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn loads_record_and_overview() {
        let router = Router::new()
            .route(
                "/v1/properties/{id}",
                get(|Path(id): Path<String>| async move {
                    Json(json!({
                        "id": id,
                        "organization_id": "org-1",
                        "name": "Torre Norte",
                        "code": "TN-01",
                        "city": "Asunción"
                    }))
                }),
            )
            .route(
                "/v1/units",
                get(|| async { Json(json!({ "data": [{ "id": "u1", "code": "101" }] })) }),
            )
            .route(
                "/v1/leases",
                get(|| async {
                    Json(json!({ "data": [{
                        "id": "l1",
                        "unit_id": "u1",
                        "lease_status": "active",
                        "monthly_rent": 1500000,
                        "currency": "PYG"
                    }] }))
                }),
            );
        let base_url = spawn_backend(router).await;
        let http_client = reqwest::Client::new();
        let client = BackendClient::new(&http_client, &base_url, Some("token"));

        let detail = load_property_detail(&client, PROPERTY_ID, Locale::EnUs).await.unwrap();
        assert_eq!(detail.record_id, PROPERTY_ID);
        assert_eq!(detail.title, "Torre Norte");
        assert_eq!(detail.property_code_label.as_deref(), Some("TN-01"));
        assert_eq!(detail.property_location_label.as_deref(), Some("Asunción"));
        assert_eq!(detail.keys[..3], ["id", "name", "code"]);

        let overview = detail.overview.expect("overview for organization property");
        assert_eq!(overview.unit_count, 1);
        assert_eq!(overview.occupancy_rate, Some(100));
        assert_eq!(overview.projected_rent_pyg, 1_500_000.0);
        assert!(overview.attention_items.is_empty());
    }

    #[tokio::test]
    async fn property_without_organization_has_no_overview() {
        let router = Router::new().route(
            "/v1/properties/{id}",
            get(|Path(id): Path<String>| async move { Json(json!({ "id": id })) }),
        );
        let base_url = spawn_backend(router).await;
        let http_client = reqwest::Client::new();
        let client = BackendClient::new(&http_client, &base_url, None);

        let detail = load_property_detail(&client, PROPERTY_ID, Locale::EsPy).await.unwrap();
        assert!(detail.overview.is_none());
        assert_eq!(detail.title, PROPERTY_ID);
    }

    #[tokio::test]
    async fn backend_failures_surface_as_errors() {
        let router = Router::new().route(
            "/v1/properties/{id}",
            get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "maintenance") }),
        );
        let base_url = spawn_backend(router).await;
        let http_client = reqwest::Client::new();
        let client = BackendClient::new(&http_client, &base_url, None);

        match load_property_detail(&client, PROPERTY_ID, Locale::EnUs).await {
            Err(AppError::Backend { status, message, membership_error }) => {
                assert_eq!(status, 503);
                assert_eq!(message, "HTTP 503 for /properties: maintenance");
                assert!(!membership_error);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
