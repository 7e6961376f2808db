//! Built-in catalog of high-tier codec/robustness profile identifiers.
//!
//! Groups are kept in preference order (HEVC HDR, VP9 HDR, AV1, high-bitrate
//! H.264) so prepending the flattened list puts the best profiles first.

use serde::Deserialize;
use std::sync::OnceLock;

const PROFILES_JSON: &str = include_str!("profiles.json");

#[derive(Debug, Clone, Deserialize)]
struct ProfileFamily {
    #[allow(dead_code)]
    family: String,
    profiles: Vec<String>,
}

/// Flattened built-in catalog, in preference order.
pub fn builtin_profiles() -> &'static [String] {
    static CATALOG: OnceLock<Vec<String>> = OnceLock::new();
    CATALOG.get_or_init(|| {
        let families: Vec<ProfileFamily> = serde_json::from_str(PROFILES_JSON).unwrap_or_default();
        families.into_iter().flat_map(|f| f.profiles).collect()
    })
}

/// Substrings that mark encoded text as carrying profile identifiers.
pub const PROFILE_MARKERS: &[&str] = &[
    "dash-cenc",
    "hevc-main",
    "vp9-profile",
    "av1-main",
    "playready-h264",
];

/// Codec families that only matter for 4K playback.
pub const UHD_CODEC_MARKERS: &[&str] = &["hev1", "hvc1", "dvh1", "dvhe", "vp09", "vp9", "av01"];
