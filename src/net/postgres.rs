//! Postgres host allow-list.
//!
//! Parallel to the URL allow-list: an entry is either a bare host, in
//! which case the caller's own credentials pass through, or a full
//! connection record whose credentials replace whatever the guest
//! supplied. The guest never sees the real password either way.

/// One configured entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostgresEntry {
    /// Bare host: connections to it are allowed with caller credentials.
    Host(String),
    /// Full record: overrides caller-supplied connection parameters.
    Full {
        host: String,
        port: Option<u16>,
        database: Option<String>,
        username: Option<String>,
        password: Option<String>,
        ssl: Option<bool>,
    },
}

impl PostgresEntry {
    pub fn host(&self) -> &str {
        match self {
            Self::Host(h) => h,
            Self::Full { host, .. } => host,
        }
    }
}

/// The parameters a connection attempt should actually dial with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostgresTarget {
    pub host: String,
    pub port: u16,
    pub database: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub ssl: bool,
}

/// Resolve a requested host against the allow-list. `None` means the
/// host is not allowed. For a `Full` entry, configured values win over
/// whatever the caller passed in.
pub fn resolve_postgres_target(
    entries: &[PostgresEntry],
    requested_host: &str,
    requested_port: Option<u16>,
    requested_database: Option<&str>,
    requested_username: Option<&str>,
) -> Option<PostgresTarget> {
    let entry = entries.iter().find(|e| e.host() == requested_host)?;
    match entry {
        PostgresEntry::Host(host) => Some(PostgresTarget {
            host: host.clone(),
            port: requested_port.unwrap_or(5432),
            database: requested_database.map(str::to_string),
            username: requested_username.map(str::to_string),
            password: None,
            ssl: false,
        }),
        PostgresEntry::Full { host, port, database, username, password, ssl } => {
            Some(PostgresTarget {
                host: host.clone(),
                port: port.or(requested_port).unwrap_or(5432),
                database: database
                    .clone()
                    .or_else(|| requested_database.map(str::to_string)),
                username: username
                    .clone()
                    .or_else(|| requested_username.map(str::to_string)),
                password: password.clone(),
                ssl: ssl.unwrap_or(false),
            })
        }
    }
}
