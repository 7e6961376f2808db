//! Interception layer: capability-aware wrappers around host primitives.
//!
//! Each primitive is a trait object held in [`HostPrimitives`]. An
//! [`Interceptor`] turns an original primitive into a wrapped one with the same
//! signature; [`InterceptorRegistry`] installs the whole set and keeps the
//! originals so it can be uninstalled again.
//!
//! Every hook is transparent on inputs no rule matches: the original is
//! called with the original arguments and its result or error is returned
//! unchanged.

pub mod decode;
pub mod drm;
pub mod encode;
pub mod envelope;
pub mod media;
pub mod merge;
pub mod native;
pub mod property;

use crate::capability::Classifier;
use crate::error::HostResult;
use crate::host::{Deferred, HostValue, ObjectRef};
use std::sync::Arc;

/// A data property descriptor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyDescriptor {
    pub value: Option<HostValue>,
}

impl PropertyDescriptor {
    pub fn data(value: impl Into<HostValue>) -> Self {
        Self {
            value: Some(value.into()),
        }
    }
}

/// Single-property definition.
pub trait PropertyDefiner: Send + Sync {
    fn define_property(
        &self,
        target: &ObjectRef,
        key: &str,
        descriptor: PropertyDescriptor,
    ) -> HostResult<ObjectRef>;
}

/// Bulk property definition over an ordered descriptor map.
pub trait BulkPropertyDefiner: Send + Sync {
    fn define_properties(
        &self,
        target: &ObjectRef,
        descriptors: Vec<(String, PropertyDescriptor)>,
    ) -> HostResult<ObjectRef>;
}

/// Shallow merge of sources into a target.
pub trait ObjectMerger: Send + Sync {
    fn assign(&self, target: &ObjectRef, sources: &[HostValue]) -> HostResult<ObjectRef>;
}

/// Structured encode (value to text).
pub trait StructuredEncoder: Send + Sync {
    fn stringify(&self, value: &HostValue, indent: Option<usize>) -> HostResult<String>;
}

/// Structured decode (text to value).
pub trait StructuredDecoder: Send + Sync {
    fn parse(&self, text: &str) -> HostResult<HostValue>;
}

/// Text-to-bytes encoding, used ahead of the encryption boundary.
pub trait TextEncoder: Send + Sync {
    fn encode(&self, input: &str) -> Vec<u8>;
}

/// MIME-type support query.
pub trait TypeSupport: Send + Sync {
    fn is_type_supported(&self, mime: &str) -> bool;
}

/// Decoding capability query with an asynchronous result.
pub trait DecodingInfo: Send + Sync {
    fn decoding_info(&self, config: &HostValue) -> Deferred;
}

/// Key-system access request over an ordered list of candidate configurations.
pub trait KeySystemAccess: Send + Sync {
    fn request_access(&self, key_system: &str, configs: &[HostValue]) -> Deferred;
}

/// Output-protection status query, answered as `{hdcp: "hdcp-<version>"}`.
pub trait HdcpPolicy: Send + Sync {
    fn check(&self) -> Deferred;
}

/// The set of host primitives the interception layer can wrap.
#[derive(Clone)]
pub struct HostPrimitives {
    pub define_property: Arc<dyn PropertyDefiner>,
    pub define_properties: Arc<dyn BulkPropertyDefiner>,
    pub assign: Arc<dyn ObjectMerger>,
    pub stringify: Arc<dyn StructuredEncoder>,
    pub parse: Arc<dyn StructuredDecoder>,
    pub text_encoder: Arc<dyn TextEncoder>,
    pub type_support: Arc<dyn TypeSupport>,
    pub decoding_info: Arc<dyn DecodingInfo>,
    pub key_system_access: Arc<dyn KeySystemAccess>,
    pub hdcp_policy: Arc<dyn HdcpPolicy>,
}

impl HostPrimitives {
    /// Unwrapped in-process primitives.
    pub fn native() -> Self {
        let object = Arc::new(native::NativeObject);
        let json = Arc::new(native::NativeJson);
        let media = Arc::new(native::SoftwareMedia::default());
        Self {
            define_property: object.clone(),
            define_properties: object.clone(),
            assign: object,
            stringify: json.clone(),
            parse: json,
            text_encoder: Arc::new(native::Utf8TextEncoder),
            type_support: media.clone(),
            decoding_info: media.clone(),
            key_system_access: media.clone(),
            hdcp_policy: media,
        }
    }

    /// Replace every primitive with the policy's wrapper around it.
    pub fn wrap_with<P: PrimitivePolicy + ?Sized>(&self, policy: &P) -> Self {
        Self {
            define_property: <P as Interceptor<dyn PropertyDefiner>>::wrap(
                policy,
                self.define_property.clone(),
            ),
            define_properties: <P as Interceptor<dyn BulkPropertyDefiner>>::wrap(
                policy,
                self.define_properties.clone(),
            ),
            assign: <P as Interceptor<dyn ObjectMerger>>::wrap(policy, self.assign.clone()),
            stringify: <P as Interceptor<dyn StructuredEncoder>>::wrap(
                policy,
                self.stringify.clone(),
            ),
            parse: <P as Interceptor<dyn StructuredDecoder>>::wrap(policy, self.parse.clone()),
            text_encoder: <P as Interceptor<dyn TextEncoder>>::wrap(
                policy,
                self.text_encoder.clone(),
            ),
            type_support: <P as Interceptor<dyn TypeSupport>>::wrap(
                policy,
                self.type_support.clone(),
            ),
            decoding_info: <P as Interceptor<dyn DecodingInfo>>::wrap(
                policy,
                self.decoding_info.clone(),
            ),
            key_system_access: <P as Interceptor<dyn KeySystemAccess>>::wrap(
                policy,
                self.key_system_access.clone(),
            ),
            hdcp_policy: <P as Interceptor<dyn HdcpPolicy>>::wrap(policy, self.hdcp_policy.clone()),
        }
    }
}

/// Common `wrap(original) -> wrapped` contract for one primitive kind.
pub trait Interceptor<P: ?Sized> {
    fn wrap(&self, original: Arc<P>) -> Arc<P>;
}

/// A policy that can wrap every primitive kind.
pub trait PrimitivePolicy:
    Interceptor<dyn PropertyDefiner>
    + Interceptor<dyn BulkPropertyDefiner>
    + Interceptor<dyn ObjectMerger>
    + Interceptor<dyn StructuredEncoder>
    + Interceptor<dyn StructuredDecoder>
    + Interceptor<dyn TextEncoder>
    + Interceptor<dyn TypeSupport>
    + Interceptor<dyn DecodingInfo>
    + Interceptor<dyn KeySystemAccess>
    + Interceptor<dyn HdcpPolicy>
{
}

impl<T> PrimitivePolicy for T where
    T: Interceptor<dyn PropertyDefiner>
        + Interceptor<dyn BulkPropertyDefiner>
        + Interceptor<dyn ObjectMerger>
        + Interceptor<dyn StructuredEncoder>
        + Interceptor<dyn StructuredDecoder>
        + Interceptor<dyn TextEncoder>
        + Interceptor<dyn TypeSupport>
        + Interceptor<dyn DecodingInfo>
        + Interceptor<dyn KeySystemAccess>
        + Interceptor<dyn HdcpPolicy>
{
}

/// The capability policy: every wrapper routes values through one classifier.
#[derive(Clone)]
pub struct CapabilityInterceptors {
    classifier: Arc<Classifier>,
}

impl CapabilityInterceptors {
    pub fn new(classifier: Arc<Classifier>) -> Self {
        Self { classifier }
    }
}

impl Interceptor<dyn PropertyDefiner> for CapabilityInterceptors {
    fn wrap(&self, original: Arc<dyn PropertyDefiner>) -> Arc<dyn PropertyDefiner> {
        Arc::new(property::DefinePropertyHook::new(original, self.classifier.clone()))
    }
}

impl Interceptor<dyn BulkPropertyDefiner> for CapabilityInterceptors {
    fn wrap(&self, original: Arc<dyn BulkPropertyDefiner>) -> Arc<dyn BulkPropertyDefiner> {
        Arc::new(property::DefinePropertiesHook::new(original, self.classifier.clone()))
    }
}

impl Interceptor<dyn ObjectMerger> for CapabilityInterceptors {
    fn wrap(&self, original: Arc<dyn ObjectMerger>) -> Arc<dyn ObjectMerger> {
        Arc::new(merge::AssignHook::new(original, self.classifier.clone()))
    }
}

impl Interceptor<dyn StructuredEncoder> for CapabilityInterceptors {
    fn wrap(&self, original: Arc<dyn StructuredEncoder>) -> Arc<dyn StructuredEncoder> {
        Arc::new(encode::StringifyHook::new(original, self.classifier.clone()))
    }
}

impl Interceptor<dyn StructuredDecoder> for CapabilityInterceptors {
    fn wrap(&self, original: Arc<dyn StructuredDecoder>) -> Arc<dyn StructuredDecoder> {
        Arc::new(decode::ParseHook::new(original, self.classifier.clone()))
    }
}

impl Interceptor<dyn TextEncoder> for CapabilityInterceptors {
    fn wrap(&self, original: Arc<dyn TextEncoder>) -> Arc<dyn TextEncoder> {
        Arc::new(encode::TextEncodeHook::new(original, self.classifier.clone()))
    }
}

impl Interceptor<dyn TypeSupport> for CapabilityInterceptors {
    fn wrap(&self, original: Arc<dyn TypeSupport>) -> Arc<dyn TypeSupport> {
        Arc::new(media::TypeSupportHook::new(original))
    }
}

impl Interceptor<dyn DecodingInfo> for CapabilityInterceptors {
    fn wrap(&self, original: Arc<dyn DecodingInfo>) -> Arc<dyn DecodingInfo> {
        Arc::new(media::DecodingInfoHook::new(original, self.classifier.clone()))
    }
}

impl Interceptor<dyn KeySystemAccess> for CapabilityInterceptors {
    fn wrap(&self, original: Arc<dyn KeySystemAccess>) -> Arc<dyn KeySystemAccess> {
        Arc::new(drm::KeySystemAccessHook::new(original))
    }
}

impl Interceptor<dyn HdcpPolicy> for CapabilityInterceptors {
    fn wrap(&self, _original: Arc<dyn HdcpPolicy>) -> Arc<dyn HdcpPolicy> {
        Arc::new(drm::HdcpPolicyHook::new(self.classifier.clone()))
    }
}

/// Tracks installation so primitives are wrapped at most once and can be restored.
#[derive(Default)]
pub struct InterceptorRegistry {
    originals: Option<HostPrimitives>,
}

impl InterceptorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap `host` in place. Returns false if already installed.
    pub fn install<P: PrimitivePolicy + ?Sized>(&mut self, host: &mut HostPrimitives, policy: &P) -> bool {
        if self.originals.is_some() {
            return false;
        }
        let wrapped = host.wrap_with(policy);
        self.originals = Some(std::mem::replace(host, wrapped));
        true
    }

    /// Restore the original primitives. Returns false if nothing was installed.
    pub fn uninstall(&mut self, host: &mut HostPrimitives) -> bool {
        match self.originals.take() {
            Some(originals) => {
                *host = originals;
                true
            }
            None => false,
        }
    }

    pub fn is_installed(&self) -> bool {
        self.originals.is_some()
    }
}
