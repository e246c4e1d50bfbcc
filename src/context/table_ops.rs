//! Table operations: name-keyed membership with insertion order preserved.

use crate::container::{member_hash, MemberName};
use crate::context::Context;
use crate::node::{NodeHandle, Repr, TableHandle};
use crate::types::SubType;

impl Context {
    fn table_handle(&self, handle: NodeHandle) -> Option<TableHandle> {
        match self.try_node(handle)?.repr {
            Repr::Table(table) => Some(table),
            _ => None,
        }
    }

    /// Retypes the node into an empty table unless it already is one.
    fn ensure_table(&mut self, handle: NodeHandle) -> TableHandle {
        if let Repr::Table(table) = self.node(handle).repr {
            return table;
        }
        self.set_to_null(handle);
        let table = self.tables.alloc();
        self.node_mut(handle)
            .install(Repr::Table(table), SubType::Unspecified);
        table
    }

    /// Member count; 0 for non-tables.
    pub fn member_count(&self, handle: NodeHandle) -> usize {
        self.table_handle(handle)
            .and_then(|table| self.tables.get(table))
            .map_or(0, |t| t.len())
    }

    /// Member node by insertion-order index.
    pub fn member(&self, handle: NodeHandle, index: usize) -> Option<NodeHandle> {
        let table = self.table_handle(handle)?;
        self.tables.get(table)?.member(index)
    }

    pub fn member_name(&self, handle: NodeHandle, index: usize) -> Option<&str> {
        let table = self.table_handle(handle)?;
        self.tables.get(table)?.member_name(index)
    }

    pub fn member_name_hash(&self, handle: NodeHandle, index: usize) -> Option<u32> {
        let table = self.table_handle(handle)?;
        self.tables.get(table)?.member_hash_at(index)
    }

    /// Member handles in insertion order; empty for non-tables.
    pub fn member_handles(&self, handle: NodeHandle) -> &[NodeHandle] {
        self.table_handle(handle)
            .and_then(|table| self.tables.get(table))
            .map_or(&[], |t| t.handles())
    }

    /// Finds a member by name. Takes `&mut self` because a lookup against a
    /// stale hash index counts toward the rebuild bound.
    pub fn find_member(&mut self, handle: NodeHandle, name: &str) -> Option<NodeHandle> {
        let table = self.table_handle(handle)?;
        let container = self.tables.get_mut(table)?;
        let index = container.find(member_hash(name))?;
        container.member(index)
    }

    /// Finds a member, creating a null one when absent. Retypes a non-table
    /// node into an empty table first. The flag is `true` when the member
    /// was created by this call.
    pub fn find_or_create_member(&mut self, handle: NodeHandle, name: &str) -> (NodeHandle, bool) {
        let table = self.ensure_table(handle);
        let hash = member_hash(name);

        let container = self.tables.get_mut(table).expect("table just resolved");
        if let Some(existing) = container.find(hash).and_then(|i| container.member(i)) {
            return (existing, false);
        }

        let symbol = self.intern(name);
        let member = self.alloc_node();
        self.tables
            .get_mut(table)
            .expect("table just resolved")
            .push(hash, member, MemberName::Interned(symbol));
        (member, true)
    }

    /// Same as [`find_or_create_member`](Self::find_or_create_member), but
    /// the name borrows caller-owned memory instead of being interned.
    pub fn find_or_create_member_external(
        &mut self,
        handle: NodeHandle,
        name: &'static str,
    ) -> (NodeHandle, bool) {
        let table = self.ensure_table(handle);
        let hash = member_hash(name);

        let container = self.tables.get_mut(table).expect("table just resolved");
        if let Some(existing) = container.find(hash).and_then(|i| container.member(i)) {
            return (existing, false);
        }

        let member = self.alloc_node();
        self.tables
            .get_mut(table)
            .expect("table just resolved")
            .push(hash, member, MemberName::External(name));
        (member, true)
    }

    /// Removes the member at `index`, freeing its node. Later members shift
    /// down one index.
    pub fn remove_member_at(&mut self, handle: NodeHandle, index: usize) -> bool {
        let Some(table) = self.table_handle(handle) else {
            return false;
        };
        let Some(container) = self.tables.get_mut(table) else {
            return false;
        };
        if index >= container.len() {
            return false;
        }
        let member = container.remove(index);
        self.free_node(member);
        true
    }

    pub fn remove_member(&mut self, handle: NodeHandle, name: &str) -> bool {
        let Some(table) = self.table_handle(handle) else {
            return false;
        };
        let index = match self.tables.get_mut(table).and_then(|t| t.find(member_hash(name))) {
            Some(index) => index,
            None => return false,
        };
        self.remove_member_at(handle, index)
    }

    pub fn remove_member_by_handle(&mut self, handle: NodeHandle, member: NodeHandle) -> bool {
        let Some(table) = self.table_handle(handle) else {
            return false;
        };
        let index = match self.tables.get(table).and_then(|t| t.find_by_handle(member)) {
            Some(index) => index,
            None => return false,
        };
        self.remove_member_at(handle, index)
    }

    /// Retypes the node into a table and drops any existing members.
    pub fn set_to_empty_table(&mut self, handle: NodeHandle) {
        let table = self.ensure_table(handle);
        let members = self
            .tables
            .get_mut(table)
            .expect("table just resolved")
            .take_all();
        for member in members {
            self.free_node(member);
        }
    }

    /// Builds the hash index now instead of waiting for the membership
    /// threshold.
    pub fn enable_fast_search(&mut self, handle: NodeHandle) {
        if let Some(table) = self.table_handle(handle) {
            if let Some(container) = self.tables.get_mut(table) {
                container.enable_fast_search();
            }
        }
    }
}
