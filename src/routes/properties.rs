use axum::{
    extract::{Path, Query, State},
    http::{header::ACCEPT_LANGUAGE, HeaderMap},
    Json,
};

use crate::{
    auth::bearer_token,
    error::{AppError, AppResult},
    i18n::Locale,
    schemas::{OverviewQuery, PropertyPath},
    services::{
        backend_client::BackendClient,
        property_detail::{load_property_detail, PropertyDetail},
    },
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new().route(
        "/properties/{property_id}/overview",
        axum::routing::get(get_property_overview),
    )
}

async fn get_property_overview(
    State(state): State<AppState>,
    Path(path): Path<PropertyPath>,
    Query(query): Query<OverviewQuery>,
    headers: HeaderMap,
) -> AppResult<Json<PropertyDetail>> {
    let locale = resolve_locale(&query, &headers, state.config.default_locale)?;
    let access_token = bearer_token(&headers);
    let client = BackendClient::new(
        &state.http_client,
        &state.config.api_base_url,
        access_token.as_deref(),
    );

    tracing::debug!(
        property_id = %path.property_id,
        locale = locale.as_str(),
        authenticated = access_token.is_some(),
        "Building property overview"
    );

    let detail = load_property_detail(&client, &path.property_id, locale).await?;
    Ok(Json(detail))
}

/// `?locale=` wins; otherwise `Accept-Language`, then the configured default.
fn resolve_locale(query: &OverviewQuery, headers: &HeaderMap, fallback: Locale) -> AppResult<Locale> {
    if let Some(raw) = query
        .locale
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        return Locale::parse(raw)
            .ok_or_else(|| AppError::BadRequest(format!("Unsupported locale '{raw}'.")));
    }

    Ok(headers
        .get(ACCEPT_LANGUAGE)
        .and_then(|value| value.to_str().ok())
        .and_then(Locale::from_accept_language)
        .unwrap_or(fallback))
}
