//! Backend selection
//!
//! Read queries may go to either backend (local preferred). Mutating
//! per-item operations (open, reply, forward) only go to the local backend,
//! regardless of which backend produced the item.

use super::BackendAvailability;
use crate::models::ItemId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Local,
    Remote,
}

/// Which backends are usable for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BackendSelection {
    pub local: bool,
    pub remote: bool,
}

impl BackendSelection {
    pub fn any(&self) -> bool {
        self.local || self.remote
    }

    /// Usable backends, local first
    pub fn usable(&self) -> Vec<Backend> {
        let mut backends = Vec::with_capacity(2);
        if self.local {
            backends.push(Backend::Local);
        }
        if self.remote {
            backends.push(Backend::Remote);
        }
        backends
    }

    /// Backend to query for emails and events
    pub fn for_query(&self) -> Option<Backend> {
        self.usable().into_iter().next()
    }

    /// Backend allowed to run mutating item operations
    pub fn for_mutation(&self) -> Option<Backend> {
        self.local.then_some(Backend::Local)
    }

    /// Whether open/reply/forward can be offered for an item. Depends only on
    /// local usability and the item carrying a local identifier.
    pub fn supports_item_operations(&self, id: Option<&ItemId>) -> bool {
        self.for_mutation().is_some() && id.is_some_and(|id| !id.as_str().is_empty())
    }
}

/// Picks backends from availability and auth state
pub struct BackendSelector;

impl BackendSelector {
    pub fn select(availability: BackendAvailability, remote_authenticated: bool) -> BackendSelection {
        BackendSelection {
            local: availability.local_usable(),
            remote: remote_authenticated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn availability(usable: bool) -> BackendAvailability {
        BackendAvailability {
            local_available: usable,
            local_connected: usable,
        }
    }

    #[test]
    fn test_none_usable() {
        let selection = BackendSelector::select(availability(false), false);
        assert!(!selection.any());
        assert_eq!(selection.for_query(), None);
        assert_eq!(selection.for_mutation(), None);
    }

    #[test]
    fn test_local_preferred_for_queries() {
        let selection = BackendSelector::select(availability(true), true);
        assert_eq!(selection.usable(), vec![Backend::Local, Backend::Remote]);
        assert_eq!(selection.for_query(), Some(Backend::Local));
    }

    #[test]
    fn test_remote_only_cannot_mutate() {
        let selection = BackendSelector::select(availability(false), true);
        assert_eq!(selection.for_query(), Some(Backend::Remote));
        assert_eq!(selection.for_mutation(), None);
        assert!(!selection.supports_item_operations(Some(&ItemId::new("abc"))));
    }

    #[test]
    fn test_available_but_not_connected_is_unusable() {
        let availability = BackendAvailability {
            local_available: true,
            local_connected: false,
        };
        assert!(!BackendSelector::select(availability, false).local);
    }

    #[test]
    fn test_item_operations_need_identifier() {
        let selection = BackendSelector::select(availability(true), false);
        assert!(selection.supports_item_operations(Some(&ItemId::new("00000000AB"))));
        assert!(!selection.supports_item_operations(Some(&ItemId::new(""))));
        assert!(!selection.supports_item_operations(None));
    }
}
