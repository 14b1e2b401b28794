//! # Authority Arbitrator
//!
//! Decides, per document and view, which representation owns the truth.
//!
//! ## Modes
//!
//! - `CANONICAL` (initial): any validated operation is accepted.
//! - `MARKDOWN` / `LATEX`: the text view is authoritative. Operations are
//!   accepted only while that view carries a live source tag matching its
//!   authority, i.e. while the edit is known to originate from the text.
//!
//! ## Source tags
//!
//! [`AuthorityArbitrator::prevent_circular_update`] tags a view with the
//! source of an update in flight. The tag expires after the suppression
//! window. There is one tag per view: the most recent tag wins.
//!
//! The window is a timing heuristic. An unrelated update landing inside it
//! is treated as coming from the tagged source.

use crate::clock::{Clock, SystemClock};
use crate::events::{EditorEvent, EventBus, ViewId};
use crate::operations::Operation;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use twodo_model::{Document, DocumentId};

pub const DEFAULT_SUPPRESSION_WINDOW: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Authority {
    #[default]
    Canonical,
    Markdown,
    Latex,
}

impl Authority {
    pub fn as_str(self) -> &'static str {
        match self {
            Authority::Canonical => "CANONICAL",
            Authority::Markdown => "MARKDOWN",
            Authority::Latex => "LATEX",
        }
    }

    /// Update source that speaks for this authority
    pub fn source(self) -> UpdateSource {
        match self {
            Authority::Canonical => UpdateSource::Canonical,
            Authority::Markdown => UpdateSource::Markdown,
            Authority::Latex => UpdateSource::Latex,
        }
    }

    pub fn is_canonical(self) -> bool {
        self == Authority::Canonical
    }
}

impl fmt::Display for Authority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Origin of an update in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateSource {
    Canonical,
    Markdown,
    Latex,
}

#[derive(Debug, Clone, Copy)]
struct SourceTag {
    source: UpdateSource,
    expires_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorityDecision {
    Allowed,
    Rejected { authority: Authority },
}

impl AuthorityDecision {
    pub fn is_allowed(self) -> bool {
        self == AuthorityDecision::Allowed
    }
}

type ViewKey = (DocumentId, ViewId);

fn key(document_id: &str, view_id: &str) -> ViewKey {
    (document_id.to_string(), view_id.to_string())
}

#[derive(Debug)]
pub struct AuthorityArbitrator {
    modes: BTreeMap<ViewKey, Authority>,
    tags: HashMap<ViewKey, SourceTag>,
    window: Duration,
    clock: Arc<dyn Clock>,
    events: EventBus,
}

impl AuthorityArbitrator {
    pub fn new(events: EventBus, clock: Arc<dyn Clock>) -> Self {
        Self {
            modes: BTreeMap::new(),
            tags: HashMap::new(),
            window: DEFAULT_SUPPRESSION_WINDOW,
            clock,
            events,
        }
    }

    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn get_authority(&self, document_id: &str, view_id: &str) -> Authority {
        self.modes
            .get(&key(document_id, view_id))
            .copied()
            .unwrap_or_default()
    }

    /// First non-canonical view of a document, in view-id order
    pub fn document_authority(&self, document_id: &str) -> Option<(&str, Authority)> {
        self.modes
            .iter()
            .filter(|((doc, _), mode)| doc == document_id && !mode.is_canonical())
            .map(|((_, view), mode)| (view.as_str(), *mode))
            .next()
    }

    /// The only mode transition. Clears the view's source tag.
    pub fn set_authority(&mut self, document_id: &str, view_id: &str, mode: Authority) -> Authority {
        let key = key(document_id, view_id);
        self.tags.remove(&key);
        let old_mode = match mode {
            Authority::Canonical => self.modes.remove(&key),
            _ => self.modes.insert(key, mode),
        }
        .unwrap_or_default();

        info!(document_id, view_id, %old_mode, new_mode = %mode, "Authority changed");
        self.events.emit(EditorEvent::AuthorityModeChanged {
            document_id: document_id.to_string(),
            view_id: view_id.to_string(),
            old_mode,
            new_mode: mode,
        });
        old_mode
    }

    /// Tag the view with the source of an update about to be applied
    pub fn prevent_circular_update(&mut self, document_id: &str, view_id: &str, source: UpdateSource) {
        let now = self.clock.now();
        self.tags.retain(|_, tag| tag.expires_at > now);
        self.tags.insert(
            key(document_id, view_id),
            SourceTag {
                source,
                expires_at: now + self.window,
            },
        );
        debug!(document_id, view_id, ?source, "Source tag set");
    }

    /// Drop a view's tag before it expires
    pub fn clear_source(&mut self, document_id: &str, view_id: &str) {
        self.tags.remove(&key(document_id, view_id));
    }

    /// Forget everything held for a view that is going away. A view that
    /// owned its document hands it back to `CANONICAL`.
    pub fn clear_view(&mut self, document_id: &str, view_id: &str) {
        let key = key(document_id, view_id);
        self.tags.remove(&key);
        let Some(old_mode) = self.modes.remove(&key) else {
            return;
        };

        info!(document_id, view_id, %old_mode, "Authority released with view");
        self.events.emit(EditorEvent::AuthorityModeChanged {
            document_id: document_id.to_string(),
            view_id: view_id.to_string(),
            old_mode,
            new_mode: Authority::Canonical,
        });
    }

    fn live_source(&self, document_id: &str, view_id: &str) -> Option<UpdateSource> {
        let now = self.clock.now();
        self.tags
            .get(&key(document_id, view_id))
            .filter(|tag| tag.expires_at > now)
            .map(|tag| tag.source)
    }

    /// True while the view is authoritative and carries a live tag for its own source
    pub fn is_update_from_authoritative_source(&self, document_id: &str, view_id: &str) -> bool {
        let authority = self.get_authority(document_id, view_id);
        !authority.is_canonical() && self.live_source(document_id, view_id) == Some(authority.source())
    }

    /// Decide whether an operation on `document_id` may proceed.
    ///
    /// Without a view the document's first non-canonical view is consulted.
    pub fn validate_operation(
        &self,
        operation: &Operation,
        document_id: &str,
        view_id: Option<&str>,
    ) -> AuthorityDecision {
        let (view_id, authority) = match view_id {
            Some(view_id) => (view_id, self.get_authority(document_id, view_id)),
            None => match self.document_authority(document_id) {
                Some(found) => found,
                None => return AuthorityDecision::Allowed,
            },
        };

        if authority.is_canonical() || self.is_update_from_authoritative_source(document_id, view_id) {
            return AuthorityDecision::Allowed;
        }

        warn!(
            document_id,
            view_id,
            %authority,
            op = operation.op_type(),
            item_id = %operation.item_id,
            "Operation conflicts with view authority"
        );
        AuthorityDecision::Rejected { authority }
    }

    /// Signal that a text view and the canonical model disagree
    pub fn reconcile(
        &self,
        document_id: &str,
        view_id: &str,
        source_text: &str,
        canonical: Option<&Document>,
    ) {
        let authority = self.get_authority(document_id, view_id);
        warn!(document_id, view_id, %authority, "Drift detected between text and model");
        self.events.emit(EditorEvent::DriftDetected {
            document_id: document_id.to_string(),
            view_id: view_id.to_string(),
            authority,
            source_text: source_text.to_string(),
            canonical_model: canonical.cloned(),
        });
    }
}

impl Default for AuthorityArbitrator {
    fn default() -> Self {
        Self::new(EventBus::new(), Arc::new(SystemClock))
    }
}
