//! Capability classifier: decide whether a field caps playback quality.
//!
//! Rules are a static table of (key pattern, exclusion predicate, correction).
//! Each rule is evaluated against the field as found; when several rules fire
//! on one field the last one in table order wins.

use crate::capability::patcher::{PatchReport, Patcher};
use crate::config::CapabilityTargets;
use crate::error::HostResult;
use crate::host::{HostValue, ObjectRef};
use std::collections::HashSet;

/// Bitrates below this without a video/max/init hint are treated as audio.
const AUDIO_BITRATE_CEILING: f64 = 500.0;
/// Heights below HD are left alone.
const HD_HEIGHT_FLOOR: f64 = 720.0;
/// Widths below HD are left alone.
const HD_WIDTH_FLOOR: f64 = 1280.0;

/// Key markers that make a merged object worth a full patch pass.
pub const MERGE_MARKERS: &[&str] = &["bitrate", "height", "width", "profile", "hdcp"];

/// Key markers that make a decoded object look like a manifest or playback config.
pub const DECODE_MARKERS: &[&str] = &[
    "bitrate",
    "resolution",
    "maxheight",
    "maxwidth",
    "profile",
    "drm",
    "manifest",
    "playback",
    "video",
];

/// A field under inspection, with its key lowercased once.
#[derive(Debug)]
pub struct Field<'a> {
    pub key: &'a str,
    pub lower: String,
    pub value: &'a HostValue,
}

impl<'a> Field<'a> {
    pub fn new(key: &'a str, value: &'a HostValue) -> Self {
        Self {
            key,
            lower: key.to_lowercase(),
            value,
        }
    }

    fn has(&self, needle: &str) -> bool {
        self.lower.contains(needle)
    }
}

/// How a rule selects keys (case-insensitive).
#[derive(Debug, Clone, Copy)]
pub enum KeyPattern {
    Contains(&'static [&'static str]),
    Exact(&'static [&'static str]),
}

impl KeyPattern {
    pub fn matches(&self, lower: &str) -> bool {
        match self {
            KeyPattern::Contains(needles) => needles.iter().any(|n| lower.contains(n)),
            KeyPattern::Exact(names) => names.iter().any(|n| lower == *n),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            KeyPattern::Contains(needles) => format!("contains {}", needles.join("|")),
            KeyPattern::Exact(names) => format!("equals {}", names.join("|")),
        }
    }
}

/// What to do with a matching field.
#[derive(Debug, Clone)]
pub enum Correction {
    /// Replace the field's value.
    Replace(HostValue),
    /// Raise numeric sub-fields of the field's object value in place.
    RaiseFields(ObjectRef, Vec<(&'static str, f64)>),
}

/// A rule's decision for one field.
#[derive(Debug, Clone)]
pub struct Verdict {
    pub rule: &'static str,
    pub correction: Correction,
}

impl Verdict {
    /// Carry out the correction. Returns the replacement value, if any; a
    /// `RaiseFields` correction mutates the object and returns `None`.
    pub fn apply(self) -> HostResult<Option<HostValue>> {
        match self.correction {
            Correction::Replace(value) => Ok(Some(value)),
            Correction::RaiseFields(obj, fields) => {
                for (name, target) in fields {
                    obj.set(name, HostValue::Number(target))?;
                }
                Ok(None)
            }
        }
    }
}

/// One entry of the rule table.
pub struct PatchRule {
    pub name: &'static str,
    pub pattern: KeyPattern,
    exclude: fn(&Field<'_>) -> bool,
    correct: fn(&Field<'_>, &CapabilityTargets) -> Option<Correction>,
}

impl PatchRule {
    pub fn evaluate(&self, field: &Field<'_>, targets: &CapabilityTargets) -> Option<Verdict> {
        if !self.pattern.matches(&field.lower) || (self.exclude)(field) {
            return None;
        }
        (self.correct)(field, targets).map(|correction| Verdict {
            rule: self.name,
            correction,
        })
    }
}

/// The shared rule table, in evaluation order.
pub static RULES: &[PatchRule] = &[
    PatchRule {
        name: "bitrate",
        pattern: KeyPattern::Contains(&["bitrate", "bandwidth"]),
        exclude: exclude_bitrate,
        correct: raise_bitrate,
    },
    PatchRule {
        name: "height",
        pattern: KeyPattern::Contains(&["height"]),
        exclude: excludes_min,
        correct: raise_height,
    },
    PatchRule {
        name: "width",
        pattern: KeyPattern::Contains(&["width"]),
        exclude: excludes_min,
        correct: raise_width,
    },
    PatchRule {
        name: "hdcp",
        pattern: KeyPattern::Contains(&["hdcp"]),
        exclude: never,
        correct: set_hdcp,
    },
    PatchRule {
        name: "resolution",
        pattern: KeyPattern::Contains(&["resolution"]),
        exclude: never,
        correct: raise_resolution,
    },
    PatchRule {
        name: "profiles",
        pattern: KeyPattern::Exact(&["profiles", "videoprofiles"]),
        exclude: never,
        correct: prepend_profiles,
    },
];

/// Audio-only keys are never touched. Checked before any rule.
pub fn is_audio_only_key(lower: &str) -> bool {
    lower.contains("audio") && !lower.contains("video")
}

fn never(_: &Field<'_>) -> bool {
    false
}

fn excludes_min(field: &Field<'_>) -> bool {
    field.has("min")
}

fn exclude_bitrate(field: &Field<'_>) -> bool {
    field.has("min") || field.lower == "abitrate" || field.has("audio") || likely_audio(field)
}

/// Small ceilings on keys with no video hint are almost always audio.
fn likely_audio(field: &Field<'_>) -> bool {
    matches!(field.value.as_number(), Some(v) if v < AUDIO_BITRATE_CEILING)
        && !field.has("video")
        && !field.has("max")
        && !field.has("init")
}

fn raise_bitrate(field: &Field<'_>, targets: &CapabilityTargets) -> Option<Correction> {
    let v = field.value.as_number()?;
    (v > 0.0 && v < targets.max_bitrate)
        .then(|| Correction::Replace(HostValue::Number(targets.max_bitrate)))
}

fn raise_height(field: &Field<'_>, targets: &CapabilityTargets) -> Option<Correction> {
    let v = field.value.as_number()?;
    (v >= HD_HEIGHT_FLOOR && v < targets.max_height)
        .then(|| Correction::Replace(HostValue::Number(targets.max_height)))
}

fn raise_width(field: &Field<'_>, targets: &CapabilityTargets) -> Option<Correction> {
    let v = field.value.as_number()?;
    (v >= HD_WIDTH_FLOOR && v < targets.max_width)
        .then(|| Correction::Replace(HostValue::Number(targets.max_width)))
}

fn set_hdcp(field: &Field<'_>, targets: &CapabilityTargets) -> Option<Correction> {
    let current = field.value.as_str()?;
    (current != targets.hdcp_version)
        .then(|| Correction::Replace(HostValue::String(targets.hdcp_version.clone())))
}

fn raise_resolution(field: &Field<'_>, targets: &CapabilityTargets) -> Option<Correction> {
    let obj = field.value.as_object()?;
    let mut fields = Vec::new();
    for (name, target) in [("width", targets.max_width), ("height", targets.max_height)] {
        if let Ok(Some(HostValue::Number(v))) = obj.get(name) {
            if v < target {
                fields.push((name, target));
            }
        }
    }
    (!fields.is_empty()).then(|| Correction::RaiseFields(obj.clone(), fields))
}

fn prepend_profiles(field: &Field<'_>, targets: &CapabilityTargets) -> Option<Correction> {
    let existing = field.value.as_array()?;
    prepend_missing(existing, &targets.profile_catalog).map(Correction::Replace)
}

/// Catalog entries not already present, followed by the original entries.
/// `None` when every catalog entry is already there.
pub fn prepend_missing(existing: &[HostValue], catalog: &[String]) -> Option<HostValue> {
    let present: HashSet<&str> = existing.iter().filter_map(HostValue::as_str).collect();
    let mut merged: Vec<HostValue> = catalog
        .iter()
        .filter(|p| !present.contains(p.as_str()))
        .map(|p| HostValue::String(p.clone()))
        .collect();
    if merged.is_empty() {
        return None;
    }
    merged.extend(existing.iter().cloned());
    Some(HostValue::Array(merged))
}

/// True if any key contains one of `markers` (case-insensitive).
pub fn has_marker_key(keys: &[String], markers: &[&str]) -> bool {
    keys.iter().any(|k| {
        let lower = k.to_lowercase();
        markers.iter().any(|m| lower.contains(m))
    })
}

/// Classifier over the shared rule table with a fixed set of targets.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    targets: CapabilityTargets,
}

impl Classifier {
    pub fn new(targets: CapabilityTargets) -> Self {
        Self { targets }
    }

    pub fn targets(&self) -> &CapabilityTargets {
        &self.targets
    }

    pub fn rules(&self) -> &'static [PatchRule] {
        RULES
    }

    /// Decide whether `key: value` limits quality, and how to correct it.
    pub fn classify(&self, key: &str, value: &HostValue) -> Option<Verdict> {
        let field = Field::new(key, value);
        if is_audio_only_key(&field.lower) {
            return None;
        }
        RULES
            .iter()
            .filter_map(|rule| rule.evaluate(&field, &self.targets))
            .last()
    }

    /// Start a patch traversal.
    pub fn patcher(&self) -> Patcher<'_> {
        Patcher::new(self)
    }

    /// Patch `root` in place with a fresh traversal.
    pub fn patch(&self, root: &HostValue) -> PatchReport {
        self.patcher().patch(root)
    }
}
