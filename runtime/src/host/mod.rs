//! Host boundary: the value model and the environment the runtime observes.
//!
//! Everything the interception layer touches is expressed in these types so
//! the classifier, patcher and hooks can be driven by real bindings or by the
//! in-memory [`sandbox::SandboxHost`].

pub mod json;
pub mod sandbox;
pub mod value;

pub use value::{Deferred, HostFunction, HostValue, ObjectRef, Settled};

use serde::{Deserialize, Serialize};
use url::Url;

/// Origin used to resolve relative locations.
const DEFAULT_ORIGIN: &str = "https://localhost/";

/// The current document location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub href: String,
    pub pathname: String,
}

impl Location {
    /// Parse an absolute URL or a path relative to `base`.
    pub fn resolve(base: &str, target: &str) -> Self {
        let base = Url::parse(base).unwrap_or_else(|_| default_origin());
        match base.join(target) {
            Ok(url) => Self {
                pathname: url.path().to_string(),
                href: url.to_string(),
            },
            Err(_) => Self {
                href: target.to_string(),
                pathname: target.to_string(),
            },
        }
    }

    /// Parse a location against the default origin.
    pub fn parse(target: &str) -> Self {
        Self::resolve(DEFAULT_ORIGIN, target)
    }
}

fn default_origin() -> Url {
    Url::parse(DEFAULT_ORIGIN).expect("default origin is a valid URL")
}

/// Read access to the host page.
pub trait HostEnvironment: Send + Sync {
    /// Current location of the document.
    fn location(&self) -> Location;

    /// The well-known global capability namespace, once the application has
    /// created it. Its `player` member is the late-bound player object.
    fn namespace(&self) -> Option<ObjectRef>;
}
