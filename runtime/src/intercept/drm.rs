//! DRM key-system and output-protection hooks.

use crate::capability::Classifier;
use crate::error::{HostError, HostResult};
use crate::host::json::{from_json, to_json};
use crate::host::{Deferred, HostValue};
use crate::intercept::{HdcpPolicy, KeySystemAccess};
use std::sync::Arc;
use tracing::{debug, info};

/// Robustness levels tried in order before the untouched request.
const ROBUSTNESS_LADDER: &[&str] = &["HW_SECURE_ALL", "SW_SECURE_DECODE"];

/// Deep copy of `configs` with every video capability asking for `robustness`.
fn with_robustness(configs: &[HostValue], robustness: &str) -> HostResult<Vec<HostValue>> {
    configs
        .iter()
        .map(|config| {
            let copy = from_json(&to_json(config)?);
            if let Some(HostValue::Array(caps)) =
                copy.as_object().and_then(|c| c.get("videoCapabilities").ok().flatten())
            {
                for cap in caps.iter().filter_map(HostValue::as_object) {
                    cap.set("robustness", HostValue::from(robustness))?;
                }
            }
            Ok(copy)
        })
        .collect()
}

/// Escalates key-system requests to the strongest robustness the platform
/// grants, falling back to the page's own request.
pub struct KeySystemAccessHook {
    original: Arc<dyn KeySystemAccess>,
}

impl KeySystemAccessHook {
    pub fn new(original: Arc<dyn KeySystemAccess>) -> Self {
        Self { original }
    }
}

impl KeySystemAccess for KeySystemAccessHook {
    fn request_access(&self, key_system: &str, configs: &[HostValue]) -> Deferred {
        let original = self.original.clone();
        let key_system = key_system.to_string();
        let configs = configs.to_vec();

        Deferred::new(async move {
            for &robustness in ROBUSTNESS_LADDER {
                let escalated = match with_robustness(&configs, robustness) {
                    Ok(escalated) => escalated,
                    Err(e) => {
                        debug!(error = %e, "key system configs not copyable");
                        break;
                    }
                };
                match original.request_access(&key_system, &escalated).settle().await {
                    Ok(access) => {
                        info!(%key_system, robustness, "key system access granted");
                        return Ok(access);
                    }
                    Err(e) => debug!(%key_system, robustness, error = %e, "robustness refused"),
                }
            }
            original.request_access(&key_system, &configs).settle().await
        })
    }
}

/// Answers output-protection queries with the target HDCP version.
pub struct HdcpPolicyHook {
    classifier: Arc<Classifier>,
}

impl HdcpPolicyHook {
    pub fn new(classifier: Arc<Classifier>) -> Self {
        Self { classifier }
    }
}

impl HdcpPolicy for HdcpPolicyHook {
    fn check(&self) -> Deferred {
        let version = format!("hdcp-{}", self.classifier.targets().hdcp_version);
        debug!(%version, "hdcp policy answered");
        Deferred::resolved(HostValue::object([("hdcp", HostValue::from(version))]))
    }
}

/// Rejection raised when a key system grants none of the configurations.
pub fn not_supported(key_system: &str) -> HostError {
    HostError::Rejected(format!(
        "NotSupportedError: no supported configuration for {key_system}"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intercept::native::SoftwareMedia;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    /// Grants only the listed robustness levels and records every attempt.
    struct Platform {
        grants: Vec<&'static str>,
        attempts: Mutex<Vec<String>>,
    }

    impl Platform {
        fn new(grants: &[&'static str]) -> Arc<Self> {
            Arc::new(Self {
                grants: grants.to_vec(),
                attempts: Mutex::new(Vec::new()),
            })
        }

        fn attempts(&self) -> Vec<String> {
            self.attempts.lock().unwrap().clone()
        }
    }

    impl KeySystemAccess for Platform {
        fn request_access(&self, key_system: &str, configs: &[HostValue]) -> Deferred {
            let json = to_json(&configs[0]).unwrap();
            let robustness = json["videoCapabilities"][0]["robustness"]
                .as_str()
                .unwrap_or_default()
                .to_string();
            self.attempts.lock().unwrap().push(robustness.clone());
            if self.grants.iter().any(|g| *g == robustness) {
                Deferred::resolved(HostValue::object([
                    ("keySystem", HostValue::from(key_system)),
                    ("configuration", from_json(&json)),
                ]))
            } else {
                Deferred::rejected(not_supported(key_system))
            }
        }
    }

    fn request() -> Vec<HostValue> {
        vec![from_json(&json!({
            "initDataTypes": ["cenc"],
            "videoCapabilities": [{"contentType": "video/mp4; codecs=\"avc1.640028\"", "robustness": ""}]
        }))]
    }

    fn granted_robustness(access: &HostValue) -> Value {
        to_json(access).unwrap()["configuration"]["videoCapabilities"][0]["robustness"].clone()
    }

    #[tokio::test]
    async fn test_hardware_robustness_accepted() {
        let platform = Platform::new(&["HW_SECURE_ALL", "SW_SECURE_DECODE", ""]);
        let hook = KeySystemAccessHook::new(platform.clone());

        let access = hook.request_access("com.widevine.alpha", &request()).settle().await.unwrap();
        assert_eq!(granted_robustness(&access), json!("HW_SECURE_ALL"));
        assert_eq!(platform.attempts(), vec!["HW_SECURE_ALL"]);
    }

    #[tokio::test]
    async fn test_hardware_refused_software_accepted() {
        let hook = KeySystemAccessHook::new(Arc::new(SoftwareMedia::default()));
        let configs = request();

        let access = hook.request_access("com.widevine.alpha", &configs).settle().await.unwrap();
        assert_eq!(granted_robustness(&access), json!("SW_SECURE_DECODE"));
        assert_eq!(to_json(&access).unwrap()["keySystem"], json!("com.widevine.alpha"));
        // The caller's configs are not mutated by the escalation.
        assert_eq!(to_json(&configs[0]).unwrap()["videoCapabilities"][0]["robustness"], json!(""));
    }

    #[tokio::test]
    async fn test_both_refused_falls_back_to_original_request() {
        let platform = Platform::new(&[""]);
        let hook = KeySystemAccessHook::new(platform.clone());

        let access = hook.request_access("com.widevine.alpha", &request()).settle().await.unwrap();
        assert_eq!(granted_robustness(&access), json!(""));
        assert_eq!(platform.attempts(), vec!["HW_SECURE_ALL", "SW_SECURE_DECODE", ""]);
    }

    #[tokio::test]
    async fn test_final_rejection_passes_through() {
        let platform = Platform::new(&[]);
        let hook = KeySystemAccessHook::new(platform.clone());

        let err = hook.request_access("org.w3.clearkey", &request()).settle().await.unwrap_err();
        assert_eq!(err, not_supported("org.w3.clearkey"));
        assert_eq!(platform.attempts().len(), 3);
    }

    #[tokio::test]
    async fn test_hdcp_policy_reports_target_version() {
        let hook = HdcpPolicyHook::new(Arc::new(Classifier::default()));
        let answer = hook.check().settle().await.unwrap();
        assert_eq!(to_json(&answer).unwrap(), json!({"hdcp": "hdcp-2.2"}));
    }
}
