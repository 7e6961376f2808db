//! Manifest-request rewriting shared by the encode hooks.

use crate::capability::classifier::Classifier;
use crate::error::HostResult;
use crate::host::HostValue;
use tracing::debug;

/// Advertise full HDCP support on every object in a top-level
/// `videoOutputInfo` array. Returns true if any entry changed.
pub fn engage_output_hdcp(root: &HostValue, versions: &[String]) -> HostResult<bool> {
    let Some(obj) = root.as_object() else {
        return Ok(false);
    };
    let Some(HostValue::Array(infos)) = obj.get("videoOutputInfo")? else {
        return Ok(false);
    };

    let supported = HostValue::Array(versions.iter().map(|v| HostValue::from(v.as_str())).collect());
    let mut modified = false;
    for info in infos.iter().filter_map(HostValue::as_object) {
        if info.get("supportedHdcpVersions")?.as_ref() != Some(&supported) {
            info.set("supportedHdcpVersions", supported.clone())?;
            modified = true;
        }
        if info.get("isHdcpEngaged")? != Some(HostValue::Bool(true)) {
            info.set("isHdcpEngaged", HostValue::Bool(true))?;
            modified = true;
        }
    }
    Ok(modified)
}

/// Rewrite a decoded manifest request in place: output HDCP plus a full
/// patch pass. Returns true if anything changed.
pub fn rewrite_request(classifier: &Classifier, root: &HostValue) -> bool {
    let hdcp = engage_output_hdcp(root, &classifier.targets().supported_hdcp_versions)
        .unwrap_or_else(|e| {
            debug!("output info left unpatched: {e}");
            false
        });
    let report = classifier.patch(root);
    hdcp || report.changed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::json::{from_json, to_json};
    use serde_json::json;

    #[test]
    fn test_output_info_engaged() {
        let classifier = Classifier::default();
        let host = from_json(&json!({
            "videoOutputInfo": [{"type": "DigitalHDMI", "supportedHdcpVersions": ["1.4"], "isHdcpEngaged": false}, 7]
        }));
        assert!(rewrite_request(&classifier, &host));

        let out = to_json(&host).unwrap();
        assert_eq!(
            out["videoOutputInfo"][0]["supportedHdcpVersions"],
            json!(["2.2", "2.1", "2.0", "1.4"])
        );
        assert_eq!(out["videoOutputInfo"][0]["isHdcpEngaged"], json!(true));
        assert_eq!(out["videoOutputInfo"][1], json!(7));
    }

    #[test]
    fn test_rewrite_reports_no_change_on_complete_request() {
        let classifier = Classifier::default();
        let host = from_json(&json!({"profiles": [], "videoOutputInfo": [{}]}));
        assert!(rewrite_request(&classifier, &host));
        assert!(!rewrite_request(&classifier, &host));
    }

    #[test]
    fn test_non_object_root() {
        assert!(!engage_output_hdcp(&HostValue::from(1), &[]).unwrap());
    }
}
