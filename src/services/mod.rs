pub mod backend_client;
pub mod fx;
pub mod property_attention;
pub mod property_detail;
pub mod property_overview;
pub mod property_snapshot;
