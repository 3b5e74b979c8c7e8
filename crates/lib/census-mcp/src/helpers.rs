use std::borrow::Cow;

use census_core::control::CensusError;
use rmcp::ErrorData;
use rmcp::model::ErrorCode;
use serde_json::{Value, json};

pub fn mcp_err(
    code: ErrorCode,
    message: impl Into<Cow<'static, str>>,
    data: Option<Value>,
) -> ErrorData {
    ErrorData {
        code,
        message: message.into(),
        data,
    }
}

/// Maps a census error to an MCP error carrying `{"kind", "message"}` data.
#[allow(clippy::needless_pass_by_value)]
pub fn map_census_err(err: CensusError) -> ErrorData {
    let code = match err {
        CensusError::UpstreamUnavailable(_) => ErrorCode::INTERNAL_ERROR,
        CensusError::InvalidOrganism(_)
        | CensusError::InvalidFilter { .. }
        | CensusError::LimitExceeded { .. } => ErrorCode::INVALID_PARAMS,
    };
    let message = err.to_string();
    mcp_err(
        code,
        message.clone(),
        Some(json!({ "kind": err.kind(), "message": message })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caller_errors_are_invalid_params() {
        let err = map_census_err(CensusError::InvalidOrganism("zebrafish".to_string()));
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
        let data = err.data.expect("error data");
        assert_eq!(data["kind"], "invalid_organism");
        assert!(data["message"].as_str().is_some_and(|message| message.contains("zebrafish")));

        let err = map_census_err(CensusError::LimitExceeded {
            name: "limit",
            value: 0,
            max: 100_000,
        });
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
        assert_eq!(err.data.expect("error data")["kind"], "limit_exceeded");
    }

    #[test]
    fn filter_errors_keep_the_expression() {
        let err = map_census_err(CensusError::InvalidFilter {
            expression: "tissue = 'lung'".to_string(),
            reason: "unexpected character '='".to_string(),
        });
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
        assert!(err.message.contains("tissue = 'lung'"));
        assert_eq!(err.data.expect("error data")["kind"], "invalid_filter");
    }

    #[test]
    fn upstream_failures_are_internal_errors() {
        let err = map_census_err(CensusError::UpstreamUnavailable("timed out".to_string()));
        assert_eq!(err.code, ErrorCode::INTERNAL_ERROR);
        assert_eq!(err.data.expect("error data")["kind"], "upstream_unavailable");
    }
}
