//! Media capability query hooks.

use crate::capability::catalog::UHD_CODEC_MARKERS;
use crate::capability::Classifier;
use crate::host::{Deferred, HostValue};
use crate::intercept::{DecodingInfo, TypeSupport};
use std::sync::Arc;
use tracing::debug;

fn names_uhd_codec(mime: &str) -> bool {
    let lower = mime.to_lowercase();
    UHD_CODEC_MARKERS.iter().any(|c| lower.contains(c))
}

/// Reports every 4K codec family as playable.
pub struct TypeSupportHook {
    original: Arc<dyn TypeSupport>,
}

impl TypeSupportHook {
    pub fn new(original: Arc<dyn TypeSupport>) -> Self {
        Self { original }
    }
}

impl TypeSupport for TypeSupportHook {
    fn is_type_supported(&self, mime: &str) -> bool {
        names_uhd_codec(mime) || self.original.is_type_supported(mime)
    }
}

/// Forces decoding-info results for 4K configurations to "supported, smooth,
/// power efficient".
pub struct DecodingInfoHook {
    original: Arc<dyn DecodingInfo>,
    classifier: Arc<Classifier>,
}

/// What a decoding configuration asks for.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct VideoRequest {
    uhd_codec: bool,
    width: Option<f64>,
}

impl VideoRequest {
    fn from_config(config: &HostValue) -> Self {
        let video = config
            .as_object()
            .and_then(|c| c.get("video").ok().flatten());
        let Some(video) = video.as_ref().and_then(HostValue::as_object) else {
            return Self::default();
        };
        let content_type = video
            .get("contentType")
            .ok()
            .flatten()
            .and_then(|v| v.as_str().map(str::to_lowercase))
            .unwrap_or_default();
        Self {
            uhd_codec: names_uhd_codec(&content_type) || content_type.contains("av1"),
            width: video.get("width").ok().flatten().and_then(|v| v.as_number()),
        }
    }
}

fn forced_result(key_system_access: Option<HostValue>) -> HostValue {
    let mut entries = vec![
        ("supported", HostValue::Bool(true)),
        ("smooth", HostValue::Bool(true)),
        ("powerEfficient", HostValue::Bool(true)),
    ];
    if let Some(access) = key_system_access {
        entries.push(("keySystemAccess", access));
    }
    HostValue::object(entries)
}

impl DecodingInfoHook {
    pub fn new(original: Arc<dyn DecodingInfo>, classifier: Arc<Classifier>) -> Self {
        Self {
            original,
            classifier,
        }
    }
}

impl DecodingInfo for DecodingInfoHook {
    fn decoding_info(&self, config: &HostValue) -> Deferred {
        let request = VideoRequest::from_config(config);
        let uhd_width = matches!(request.width, Some(w) if w >= self.classifier.targets().max_width);
        let pending = self.original.decoding_info(config);

        Deferred::new(async move {
            match pending.settle().await {
                Ok(result) if request.uhd_codec || uhd_width => {
                    let access = result
                        .as_object()
                        .and_then(|r| r.get("keySystemAccess").ok().flatten());
                    debug!("decoding info forced to supported");
                    Ok(forced_result(access))
                }
                Ok(result) => Ok(result),
                Err(_) if request.uhd_codec => Ok(forced_result(None)),
                Err(e) => Err(e),
            }
        })
    }
}
