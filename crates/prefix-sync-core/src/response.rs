//! Structured invocation response
//!
//! A run is reported as `{"statusCode": 200, "body": {...counts}}` on
//! success and `{"statusCode": 500, "body": {"error": "..."}}` on failure.

use serde::{Deserialize, Serialize};

use crate::engine::SyncSummary;
use crate::error::{Error, Result};
use crate::family::AddressFamily;

/// Status code reported for a successful run
pub const STATUS_OK: u16 = 200;

/// Status code reported for a failed run
pub const STATUS_ERROR: u16 = 500;

/// Response of one invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationResponse {
    /// 200 or 500
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    /// Counts or error message
    pub body: ResponseBody,
}

/// Body of an invocation response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseBody {
    /// Successful run
    Success {
        message: String,
        ipv4_cidrs: usize,
        ipv6_cidrs: usize,
        total_ipv4_addresses: usize,
        total_ipv6_addresses: usize,
    },
    /// Failed run
    Failure { error: String },
}

impl InvocationResponse {
    /// Build the success response from a summary
    pub fn success(summary: &SyncSummary) -> Self {
        Self {
            status_code: STATUS_OK,
            body: ResponseBody::Success {
                message: "Successfully updated UptimeRobot prefix lists".to_string(),
                ipv4_cidrs: summary.cidr_count(AddressFamily::V4),
                ipv6_cidrs: summary.cidr_count(AddressFamily::V6),
                total_ipv4_addresses: summary.total_ipv4_addresses,
                total_ipv6_addresses: summary.total_ipv6_addresses,
            },
        }
    }

    /// Build the failure response from an error
    pub fn failure(error: &Error) -> Self {
        Self {
            status_code: STATUS_ERROR,
            body: ResponseBody::Failure {
                error: format!("Failed to update UptimeRobot prefix lists: {}", error),
            },
        }
    }

    /// Build the response matching a run result
    pub fn from_result(result: &Result<SyncSummary>) -> Self {
        match result {
            Ok(summary) => Self::success(summary),
            Err(e) => Self::failure(e),
        }
    }

    /// Whether the run succeeded
    pub fn is_success(&self) -> bool {
        self.status_code == STATUS_OK
    }

    /// Serialize to a JSON string
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_shape() {
        let summary = SyncSummary {
            hostname: "ip.uptimerobot.com".to_string(),
            total_ipv4_addresses: 4,
            total_ipv6_addresses: 2,
            families: Vec::new(),
        };

        let value = serde_json::to_value(InvocationResponse::success(&summary)).unwrap();
        assert_eq!(
            value,
            json!({
                "statusCode": 200,
                "body": {
                    "message": "Successfully updated UptimeRobot prefix lists",
                    "ipv4_cidrs": 0,
                    "ipv6_cidrs": 0,
                    "total_ipv4_addresses": 4,
                    "total_ipv6_addresses": 2
                }
            })
        );
    }

    #[test]
    fn test_failure_shape() {
        let response = InvocationResponse::failure(&Error::resolution("NXDOMAIN"));
        assert!(!response.is_success());

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["statusCode"], 500);
        assert_eq!(
            value["body"]["error"],
            "Failed to update UptimeRobot prefix lists: Resolution error: NXDOMAIN"
        );
    }

    #[test]
    fn test_round_trip_picks_right_variant() {
        let response = InvocationResponse::failure(&Error::config("bad"));
        let parsed: InvocationResponse =
            serde_json::from_str(&response.to_json().unwrap()).unwrap();
        assert_eq!(parsed, response);
    }
}
