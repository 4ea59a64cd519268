//! Shared configuration trait.
//!
//! **What**: Defines [`Configurable`], the trait implemented by every
//! configuration struct in this workspace (depup-core's `UpdateCfg`, host
//! overrides, and any future per-ecosystem settings).
//!
//! **How**: Ported directly from the teacher's `config::traits::Configurable`
//! — `validate()` + `merge_with()`, with a `default_values()` hook defaulted
//! from `Default` where available. Pointer-presence semantics (an override
//! field is only applied when `Some`) live in each implementor, not here.
//!
//! **Why**: Keeping validation and merge logic behind one trait means the
//! config resolver (see `depup-core::config`) can treat "defaults + global
//! overrides + per-package overrides" uniformly regardless of which concrete
//! config type it's folding.

use crate::error::ConfigResult;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Trait for types that can be validated and merged as configuration.
pub trait Configurable: Serialize + DeserializeOwned + Send + Sync {
    /// Checks that the configuration is internally consistent.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::ConfigError`] if a value is out of range or
    /// the configuration is otherwise inconsistent.
    fn validate(&self) -> ConfigResult<()>;

    /// Merges `other` into `self`, with `other`'s explicitly-set fields
    /// taking precedence.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::ConfigError`] if the merged result would fail
    /// [`Configurable::validate`].
    fn merge_with(&mut self, other: Self) -> ConfigResult<()>;

    /// Returns default values for this configuration, if any.
    fn default_values() -> Option<Self>
    where
        Self: Sized + Default,
    {
        Some(Self::default())
    }
}
