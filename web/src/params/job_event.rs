use events::JobEventKind;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

/// Body of an ingest call from the rest of the application. The server stamps
/// `occurred_at` itself; callers never supply timestamps.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateParams {
    pub kind: JobEventKind,
    pub title: String,
    pub company: String,
    #[serde(default)]
    pub posted_by: Option<String>,
    #[serde(default)]
    pub job_id: Option<String>,
}

/// Watermark query shared by the poll and stream endpoints.
#[derive(Debug, Clone, Copy, Deserialize, IntoParams)]
pub struct WatermarkParams {
    /// Epoch milliseconds; only events strictly newer than this are returned.
    #[serde(default)]
    pub last_seen: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_params_rejects_unknown_kind() {
        let result = serde_json::from_str::<CreateParams>(
            r#"{"kind":"promoted","title":"Engineer","company":"Acme"}"#,
        );
        assert!(result.is_err(), "kinds outside the allowed set must fail");
    }

    #[test]
    fn test_create_params_optional_fields_default_to_none() {
        let params: CreateParams =
            serde_json::from_str(r#"{"kind":"created","title":"Engineer","company":"Acme"}"#)
                .unwrap();
        assert!(params.posted_by.is_none());
        assert!(params.job_id.is_none());
    }

    #[test]
    fn test_watermark_defaults_to_zero() {
        let params: WatermarkParams = serde_json::from_str("{}").unwrap();
        assert_eq!(params.last_seen, 0);
    }
}
