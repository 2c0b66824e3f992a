use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct PropertyPath {
    pub property_id: String,
}

#[derive(Debug, Clone, Default, Deserialize, serde::Serialize)]
pub struct OverviewQuery {
    pub locale: Option<String>,
}
