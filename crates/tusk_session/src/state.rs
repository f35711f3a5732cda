//! Session state snapshot.
//!
//! Every field below the current profile is scoped: the database list and the
//! selected database belong to the connection, tables and the selected table
//! belong to the database, and query state belongs to the table. Resetting a
//! scope resets every narrower scope with it.

use crate::models::{ConnectionStatus, DatabaseInfo, ProfileId, QueryState, TableInfo};

/// UI-facing state of the single active session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    /// Profile the session belongs to
    pub current_profile: Option<ProfileId>,
    /// Connection state machine position
    pub status: ConnectionStatus,
    /// Databases on the connected server
    pub databases: Vec<DatabaseInfo>,
    /// Selected database, always a member of `databases`
    pub selected_database: Option<DatabaseInfo>,
    /// Tables in the selected database
    pub tables: Vec<TableInfo>,
    /// Selected table, always a member of `tables`
    pub selected_table: Option<TableInfo>,
    /// A table load is in flight
    pub is_loading_tables: bool,
    /// Query editor and results
    pub query: QueryState,
}

impl SessionState {
    /// Check if a live connection is up.
    pub fn is_connected(&self) -> bool {
        self.status.is_connected()
    }

    /// Look up a database by id in the current list.
    pub fn database(&self, id: u32) -> Option<&DatabaseInfo> {
        self.databases.iter().find(|db| db.id == id)
    }

    /// Look up a database by name in the current list.
    pub fn database_named(&self, name: &str) -> Option<&DatabaseInfo> {
        self.databases.iter().find(|db| db.name == name)
    }

    /// Clear everything scoped to the connection.
    pub fn reset_connection_scope(&mut self) {
        self.databases.clear();
        self.reset_database_scope();
    }

    /// Clear the selected database and everything below it.
    pub fn reset_database_scope(&mut self) {
        self.selected_database = None;
        self.reset_table_scope();
    }

    /// Clear tables and everything below them.
    pub fn reset_table_scope(&mut self) {
        self.tables.clear();
        self.selected_table = None;
        self.is_loading_tables = false;
        self.query.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn populated() -> SessionState {
        let shop = DatabaseInfo::new(1, "shop");
        let orders = TableInfo::new("public", "orders");
        let mut state = SessionState {
            current_profile: Some(uuid::Uuid::new_v4()),
            status: ConnectionStatus::Connected,
            databases: vec![shop.clone(), DatabaseInfo::new(2, "crm")],
            selected_database: Some(shop),
            tables: vec![orders.clone()],
            selected_table: Some(orders),
            is_loading_tables: true,
            query: QueryState::default(),
        };
        state.query.sql = "SELECT 1".to_string();
        state
    }

    #[test]
    fn test_database_scope_reset_keeps_connection() {
        let mut state = populated();
        state.reset_database_scope();

        assert_eq!(state.databases.len(), 2);
        assert!(state.selected_database.is_none());
        assert!(state.tables.is_empty());
        assert!(state.selected_table.is_none());
        assert!(!state.is_loading_tables);
        assert!(state.query.is_empty());
        assert!(state.is_connected());
    }

    #[test]
    fn test_connection_scope_reset_cascades() {
        let mut state = populated();
        let profile = state.current_profile;
        state.reset_connection_scope();

        assert!(state.databases.is_empty());
        assert!(state.selected_database.is_none());
        assert!(state.tables.is_empty());
        assert_eq!(state.current_profile, profile);
    }

    #[test]
    fn test_lookup() {
        let state = populated();
        assert_eq!(state.database(2).map(|db| db.name.as_str()), Some("crm"));
        assert_eq!(state.database_named("shop").map(|db| db.id), Some(1));
        assert!(state.database(9).is_none());
    }
}
