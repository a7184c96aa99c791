use redb::TableDefinition;

/// Score records: "{owner_id}_{name}" -> ScoreRecord (msgpack)
pub const SCORES: TableDefinition<&str, &[u8]> = TableDefinition::new("scores");

/// Owner index: owner_id -> msgpack Vec of record keys
pub const OWNER_SCORES: TableDefinition<&str, &[u8]> = TableDefinition::new("owner_scores");

/// Accounts: lower-cased email -> AccountRecord (msgpack)
pub const ACCOUNTS: TableDefinition<&str, &[u8]> = TableDefinition::new("accounts");

/// Sessions: bearer token -> SessionRecord (msgpack)
pub const SESSIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("sessions");
