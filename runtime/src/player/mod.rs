//! Late-bound player object support: method wrapping and namespace walks.

pub mod hook;

pub use hook::MethodHook;
