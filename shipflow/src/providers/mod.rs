//! Provider contracts and the variant registry.
//!
//! The engine only talks to sources, modifiers, destinations and actions
//! through the traits defined here. Concrete providers are registered under
//! a variant tag in a [`ProviderRegistry`].

mod contracts;
pub mod local;
mod registry;

pub use contracts::{
    Action, Destination, Modifier, ModifierTarget, Persist, ProviderBlob, Source,
    ValidationIssues, WhenToRun,
};
pub use registry::{
    ActionFactory, DestinationFactory, ModifierFactory, ProviderRegistry, SourceFactory,
};
