//! Type-state markers for the builder pattern
//!
//! These types track at compile time whether the manager has been given
//! its endpoint configuration.

use std::marker::PhantomData;

/// Marker trait for configuration state
pub trait ConfigState {}

/// No endpoint or configuration set yet
pub struct NoConfig;
impl ConfigState for NoConfig {}

/// Configuration has been set
pub struct HasConfig;
impl ConfigState for HasConfig {}

/// Phantom marker to prevent direct construction
#[derive(Debug, Clone, Copy)]
pub struct TypeState<C> {
    _config: PhantomData<C>,
}

impl<C> TypeState<C> {
    pub(crate) fn new() -> Self {
        Self {
            _config: PhantomData,
        }
    }
}

impl<C> Default for TypeState<C> {
    fn default() -> Self {
        Self::new()
    }
}
