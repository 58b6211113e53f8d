//! Discovery and quota records: generators, probes, service info and quota.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A generator (model backend adapter) supported by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorInfo {
    /// Identifier used in scan requests (e.g. `openai`).
    pub name: String,
    /// Display name.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Whether the generator needs a provider API key.
    #[serde(default)]
    pub requires_api_key: bool,
    /// Environment variable the provider key is passed as.
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// Models known to work with this generator.
    #[serde(default)]
    pub supported_models: Vec<String>,
}

/// A single probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeInfo {
    /// Probe identifier.
    pub name: String,
    /// Display name.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Category the probe belongs to.
    #[serde(default)]
    pub category: Option<String>,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Detectors recommended for this probe.
    #[serde(default)]
    pub recommended_detectors: Vec<String>,
}

/// A category of probes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeCategory {
    /// Category identifier (e.g. `dan`).
    pub name: String,
    /// Display name.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Probes in the category.
    #[serde(default)]
    pub probes: Vec<ProbeInfo>,
}

/// Service description returned by `GET /info`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiInfo {
    /// API version (e.g. `v1`).
    pub api_version: String,
    /// Service name.
    #[serde(default)]
    pub service: Option<String>,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Documentation URL.
    #[serde(default)]
    pub documentation_url: Option<String>,
    /// Capability flags.
    #[serde(default)]
    pub capabilities: serde_json::Map<String, serde_json::Value>,
    /// Generator names.
    #[serde(default)]
    pub supported_generators: Vec<String>,
    /// Probe category names.
    #[serde(default)]
    pub supported_probe_categories: Vec<String>,
}

/// Service health returned by `GET /health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Overall status (`healthy`, `degraded`, ...).
    pub status: String,
    /// Server timestamp.
    #[serde(default)]
    pub timestamp: Option<String>,
    /// Server version.
    #[serde(default)]
    pub version: Option<String>,
    /// Per-dependency status.
    #[serde(default)]
    pub services: BTreeMap<String, String>,
}

impl HealthStatus {
    /// Returns `true` when the service reports itself healthy.
    pub fn is_healthy(&self) -> bool {
        self.status.eq_ignore_ascii_case("healthy")
    }
}

/// Per-caller scan quota counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaStatus {
    /// Scans used in the current period.
    pub total_scans_used: u64,
    /// Scan limit for the current period.
    pub total_scans_limit: u64,
    /// Scans remaining.
    #[serde(default)]
    pub remaining_total_scans: Option<u64>,
    /// Free-tier scans used.
    #[serde(default)]
    pub free_scans_used: u64,
    /// Free-tier scan limit.
    #[serde(default)]
    pub free_scans_limit: u64,
    /// Free-tier scans remaining.
    #[serde(default)]
    pub remaining_free_scans: Option<u64>,
    /// Whether a free-tier scan may be created now.
    #[serde(default)]
    pub can_use_free_tier: Option<bool>,
    /// Whether a paid scan may be created now.
    #[serde(default)]
    pub can_use_paid_tier: Option<bool>,
    /// Owner of the quota.
    #[serde(default)]
    pub user_id: Option<String>,
}

impl QuotaStatus {
    /// Scans remaining, derived from counters when not reported.
    pub fn remaining_scans(&self) -> u64 {
        self.remaining_total_scans
            .unwrap_or_else(|| self.total_scans_limit.saturating_sub(self.total_scans_used))
    }

    /// Free-tier scans remaining, derived from counters when not reported.
    pub fn remaining_free(&self) -> u64 {
        self.remaining_free_scans
            .unwrap_or_else(|| self.free_scans_limit.saturating_sub(self.free_scans_used))
    }

    /// Returns `true` if a scan on the requested tier would be accepted.
    pub fn can_create_scan(&self, use_free_tier: bool) -> bool {
        if use_free_tier {
            self.can_use_free_tier.unwrap_or(self.remaining_free() > 0)
        } else {
            self.can_use_paid_tier.unwrap_or(self.remaining_scans() > 0)
        }
    }
}

/// Response of `GET /scans/quota`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaResponse {
    /// Quota counters.
    pub quota_status: QuotaStatus,
    /// Server message.
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_derivations() {
        let json = r#"{
            "quota_status": {
                "total_scans_used": 5,
                "total_scans_limit": 10,
                "free_scans_used": 2,
                "free_scans_limit": 2
            },
            "message": "Quota information retrieved successfully"
        }"#;
        let quota: QuotaResponse = serde_json::from_str(json).unwrap();
        assert_eq!(quota.quota_status.remaining_scans(), 5);
        assert_eq!(quota.quota_status.remaining_free(), 0);
        assert!(quota.quota_status.can_create_scan(false));
        assert!(!quota.quota_status.can_create_scan(true));
    }

    #[test]
    fn test_quota_explicit_flags_win() {
        let status = QuotaStatus {
            total_scans_used: 0,
            total_scans_limit: 10,
            remaining_total_scans: Some(10),
            free_scans_used: 0,
            free_scans_limit: 2,
            remaining_free_scans: Some(2),
            can_use_free_tier: Some(false),
            can_use_paid_tier: Some(true),
            user_id: None,
        };
        assert!(!status.can_create_scan(true));
    }

    #[test]
    fn test_health_status() {
        let health: HealthStatus = serde_json::from_str(
            r#"{"status": "healthy", "services": {"redis": "healthy"}}"#,
        )
        .unwrap();
        assert!(health.is_healthy());
        assert!(health.services.contains_key("redis"));
    }

    #[test]
    fn test_generator_requires_name() {
        assert!(serde_json::from_str::<GeneratorInfo>(r#"{"display_name": "X"}"#).is_err());
    }
}
