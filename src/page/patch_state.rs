//! What the page looked like before any instrumentation patched it.

use std::collections::HashMap;

use super::listeners::RegistrationEntryPoints;
use super::properties::{PropertyDescriptor, PrototypeId, PrototypeRegistry};

/// Pre-patch registration entry points and inline handler descriptors.
///
/// Each slot is filled on first use and never re-captured, so every instrumentation on the page
/// restores the same values no matter how many patch/restore cycles ran before it.
#[derive(Debug, Default)]
pub(crate) struct PatchState {
    entry_points: Option<RegistrationEntryPoints>,
    descriptors: HashMap<String, PropertyDescriptor>,
}

impl PatchState {
    pub(crate) fn entry_points(
        &mut self,
        current: impl FnOnce() -> RegistrationEntryPoints,
    ) -> RegistrationEntryPoints {
        self.entry_points.get_or_insert_with(current).clone()
    }

    pub(crate) fn has_entry_points(&self) -> bool {
        self.entry_points.is_some()
    }

    /// Keyed by property name: the first prototype that resolves `prop` decides for all.
    pub(crate) fn descriptor(
        &mut self,
        registry: &PrototypeRegistry,
        prototype: PrototypeId,
        prop: &str,
    ) -> Option<PropertyDescriptor> {
        if let Some(descriptor) = self.descriptors.get(prop) {
            return Some(descriptor.clone());
        }
        let descriptor = registry.lookup(prototype, prop)?.clone();
        self.descriptors.insert(prop.to_string(), descriptor.clone());
        Some(descriptor)
    }
}
