//! Streaming-time term dictionary.
//!
//! Every distinct term gets a provisional ID the first time it is seen under a
//! role. IDs are 1-based and sequential per role; the reorganizer later turns
//! them into final section IDs.

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::Role;
use crate::error::{Error, Result};

#[derive(Debug, Default)]
struct RoleTable {
    string_to_id: HashMap<Arc<str>, u32>,
    id_to_string: Vec<Arc<str>>,
}

impl RoleTable {
    fn insert(&mut self, value: &str, role: Role) -> Result<u32> {
        if let Some(&id) = self.string_to_id.get(value) {
            return Ok(id);
        }
        let id = u32::try_from(self.id_to_string.len() + 1).map_err(|_| {
            Error::ResourceExhausted(format!("more than {} distinct {} terms", u32::MAX, role))
        })?;
        let term: Arc<str> = Arc::from(value);
        self.string_to_id.insert(Arc::clone(&term), id);
        self.id_to_string.push(term);
        Ok(id)
    }
}

/// Role-scoped provisional term tables.
///
/// Single writer: provisional IDs depend on insertion order, so concurrent
/// inserts need external synchronization.
#[derive(Debug, Default)]
pub struct TempDictionary {
    tables: [RoleTable; 3],
}

impl TempDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look `value` up under `role`, assigning the next provisional ID if absent.
    ///
    /// Terms are opaque: empty or malformed text is accepted as-is.
    pub fn insert(&mut self, value: &str, role: Role) -> Result<u32> {
        self.tables[role.index()].insert(value, role)
    }

    pub fn lookup(&self, value: &str, role: Role) -> Option<u32> {
        self.tables[role.index()].string_to_id.get(value).copied()
    }

    pub fn decode(&self, id: u32, role: Role) -> Option<&str> {
        let index = usize::try_from(id).ok()?.checked_sub(1)?;
        self.tables[role.index()].id_to_string.get(index).map(|s| &**s)
    }

    /// Terms of `role` in provisional ID order: element `i` has ID `i + 1`.
    pub fn terms(&self, role: Role) -> &[Arc<str>] {
        &self.tables[role.index()].id_to_string
    }

    pub fn len(&self, role: Role) -> usize {
        self.tables[role.index()].id_to_string.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.iter().all(|t| t.id_to_string.is_empty())
    }
}
