// ── Realtime reconciliation ──
//
// Folds row-change events into the result set a search view holds.
// `ResultSet::apply` is a pure reducer; `LiveSearch` drives it from the
// realtime channel and re-runs the query when the reducer asks for it.

mod live;

use indexmap::IndexSet;
use serde_json::Value;

use handover_api::{ChangeRecord, ChangeType, RealtimeMessage};

use crate::model::{Listing, ListingId};
use crate::search::{LISTINGS_TABLE, SearchCriteria, SearchPage};

pub use live::{ListingSource, LiveSearch, LiveSnapshot, LiveStream};

/// How many deleted ids a result set remembers; the oldest go first.
const DELETED_ID_MEMORY: usize = 512;

// ── Events ──────────────────────────────────────────────────────────

/// One unit of work for the reducer, in channel arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    Insert { new: Value },
    Update { new: Value, old: Option<Value> },
    Delete { old: Value },
    /// Updates may have been missed (reconnect, lagging consumer).
    Resync,
}

impl ChangeEvent {
    /// Convert a raw row change. Changes to other tables, or changes
    /// missing the row they describe, yield `None`.
    pub fn from_record(record: &ChangeRecord) -> Option<Self> {
        if record.table != LISTINGS_TABLE {
            return None;
        }
        match record.event_type {
            ChangeType::Insert => record.record.clone().map(|new| Self::Insert { new }),
            ChangeType::Update => record.record.clone().map(|new| Self::Update {
                new,
                old: record.old_record.clone(),
            }),
            ChangeType::Delete => record.old_record.clone().map(|old| Self::Delete { old }),
        }
    }

    /// Convert a realtime channel message. Every (re)subscription is a
    /// resync point; a bare disconnect carries no work.
    pub fn from_message(message: &RealtimeMessage) -> Option<Self> {
        match message {
            RealtimeMessage::Subscribed => Some(Self::Resync),
            RealtimeMessage::Change(record) => Self::from_record(record),
            RealtimeMessage::Disconnected => None,
        }
    }
}

/// What applying an event did to the result set.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    Unchanged,
    /// The held page can no longer be patched locally; re-run the query.
    RefreshRequired,
}

// ── ResultSet ───────────────────────────────────────────────────────

/// The locally held page for one search, plus the most recent
/// few hundred ids seen deleted so a repeated DELETE is a no-op.
#[derive(Debug, Clone)]
pub struct ResultSet {
    criteria: SearchCriteria,
    items: Vec<Listing>,
    total: u64,
    page: u32,
    deleted: IndexSet<ListingId>,
}

impl ResultSet {
    pub fn new(criteria: SearchCriteria, page: SearchPage) -> Self {
        Self {
            criteria,
            items: page.items,
            total: page.total,
            page: page.page,
            deleted: IndexSet::new(),
        }
    }

    /// Install a freshly queried page. Seen deletions are kept.
    pub fn replace(&mut self, criteria: SearchCriteria, page: SearchPage) {
        self.criteria = criteria;
        self.items = page
            .items
            .into_iter()
            .filter(|l| !self.deleted.contains(&l.id))
            .collect();
        self.total = page.total;
        self.page = page.page;
    }

    pub fn criteria(&self) -> &SearchCriteria {
        &self.criteria
    }

    pub fn items(&self) -> &[Listing] {
        &self.items
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn to_page(&self) -> SearchPage {
        SearchPage {
            items: self.items.clone(),
            total: self.total,
            page: self.page,
        }
    }

    pub fn apply(&mut self, event: &ChangeEvent) -> Outcome {
        match event {
            ChangeEvent::Insert { .. } | ChangeEvent::Resync => Outcome::RefreshRequired,
            ChangeEvent::Update { new, .. } => self.apply_update(new),
            ChangeEvent::Delete { old } => self.apply_delete(old),
        }
    }

    fn apply_delete(&mut self, old: &Value) -> Outcome {
        let Some(id) = row_id(old) else {
            return Outcome::Unchanged;
        };
        if !self.remember_deleted(id.clone()) {
            return Outcome::Unchanged;
        }

        if let Some(pos) = self.items.iter().position(|l| l.id == id) {
            self.items.remove(pos);
            self.total = self.total.saturating_sub(1);
            return Outcome::Applied;
        }

        // Off this page. Usually only the key is known; a full prior row
        // that fails the filter was never part of the total.
        let never_counted = serde_json::from_value::<Listing>(old.clone())
            .is_ok_and(|listing| !self.criteria.matches(&listing));
        if never_counted || self.total == 0 {
            return Outcome::Unchanged;
        }
        self.total -= 1;
        Outcome::Applied
    }

    /// `false` when `id` was already known to be deleted.
    fn remember_deleted(&mut self, id: ListingId) -> bool {
        if !self.deleted.insert(id) {
            return false;
        }
        if self.deleted.len() > DELETED_ID_MEMORY {
            self.deleted.shift_remove_index(0);
        }
        true
    }

    fn apply_update(&mut self, new: &Value) -> Outcome {
        let Some(id) = row_id(new) else {
            return Outcome::Unchanged;
        };
        if self.deleted.contains(&id) {
            return Outcome::Unchanged;
        }
        let Some(pos) = self.items.iter().position(|l| l.id == id) else {
            return Outcome::Unchanged;
        };

        let Some(merged) = merge_row(&self.items[pos], new) else {
            return Outcome::RefreshRequired;
        };
        if !self.criteria.matches(&merged) {
            return Outcome::RefreshRequired;
        }
        if merged == self.items[pos] {
            return Outcome::Unchanged;
        }
        self.items[pos] = merged;
        Outcome::Applied
    }
}

fn row_id(row: &Value) -> Option<ListingId> {
    match row.get("id")? {
        Value::String(s) => Some(ListingId::from(s.as_str())),
        Value::Number(n) => Some(ListingId::from(n.to_string())),
        _ => None,
    }
}

/// Overlay the changed row's columns on the held listing.
fn merge_row(held: &Listing, new: &Value) -> Option<Listing> {
    let Value::Object(changes) = new else {
        return None;
    };
    let mut row = serde_json::to_value(held).ok()?;
    let fields = row.as_object_mut()?;
    for (key, value) in changes {
        fields.insert(key.clone(), value.clone());
    }
    serde_json::from_value(row).ok()
}
