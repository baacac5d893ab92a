//! The four provisioning scripts and how they are turned into statements.
//!
//! Scripts are plain SQL shared by PostgreSQL and SQLite. Values are never
//! spliced into the text: `:name` placeholders are rewritten into the
//! backend's positional form and bound separately.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use sea_orm::{DbBackend, Value};

use crate::error::{ConfigError, SqlError};

/// Stable identifiers of the bundled scripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptId {
    AdminUser,
    OdbTables,
    OdbCluster,
    ServerCluster,
}

impl ScriptId {
    pub const ALL: [ScriptId; 4] = [
        ScriptId::AdminUser,
        ScriptId::OdbTables,
        ScriptId::OdbCluster,
        ScriptId::ServerCluster,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ScriptId::AdminUser => "admin-user",
            ScriptId::OdbTables => "odb-tables",
            ScriptId::OdbCluster => "odb-cluster",
            ScriptId::ServerCluster => "server-cluster",
        }
    }

    fn bundled(self) -> &'static str {
        match self {
            ScriptId::AdminUser => include_str!("../../sql/admin-user.sql"),
            ScriptId::OdbTables => include_str!("../../sql/odb-tables.sql"),
            ScriptId::OdbCluster => include_str!("../../sql/odb-cluster.sql"),
            ScriptId::ServerCluster => include_str!("../../sql/server-cluster.sql"),
        }
    }
}

/// Bundled scripts, optionally replaced per script from a directory.
#[derive(Debug, Clone, Default)]
pub struct ScriptCatalog {
    overrides: HashMap<ScriptId, String>,
}

impl ScriptCatalog {
    pub fn bundled() -> Self {
        Self::default()
    }

    /// Bundled scripts, with `<dir>/<name>.sql` taking precedence when present.
    pub fn load(dir: Option<&Path>) -> Result<Self, ConfigError> {
        let mut catalog = Self::bundled();
        let Some(dir) = dir else {
            return Ok(catalog);
        };

        for id in ScriptId::ALL {
            let path = dir.join(format!("{}.sql", id.name()));
            match std::fs::read_to_string(&path) {
                Ok(sql) => {
                    tracing::info!("Using SQL script override {}", path.display());
                    catalog.overrides.insert(id, sql);
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(source) => return Err(ConfigError::Scripts { path, source }),
            }
        }
        Ok(catalog)
    }

    pub fn with_override(mut self, id: ScriptId, sql: impl Into<String>) -> Self {
        self.overrides.insert(id, sql.into());
        self
    }

    pub fn get(&self, id: ScriptId) -> &str {
        self.overrides
            .get(&id)
            .map(String::as_str)
            .unwrap_or_else(|| id.bundled())
    }
}

/// Named values for a script's placeholders.
#[derive(Debug, Clone, Default)]
pub struct ScriptParams {
    values: BTreeMap<&'static str, Value>,
}

impl ScriptParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &'static str, value: impl Into<Value>) -> Self {
        self.values.insert(name, value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }
}

/// One executable statement with its bound values in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedStatement {
    pub sql: String,
    pub values: Vec<Value>,
}

/// Split `script` into statements and bind `params` for `backend`.
pub fn render(
    id: ScriptId,
    script: &str,
    params: &ScriptParams,
    backend: DbBackend,
) -> Result<Vec<RenderedStatement>, SqlError> {
    split_statements(script)
        .into_iter()
        .map(|statement| bind(&statement, params, backend))
        .collect::<Result<Vec<_>, String>>()
        .map_err(|name| SqlError::UnboundParameter {
            script: id.name(),
            name,
        })
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Lexical {
    Code,
    SingleQuoted,
    DoubleQuoted,
    LineComment,
    BlockComment,
}

/// Split on `;` outside quotes, dropping comments and empty statements.
fn split_statements(script: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut state = Lexical::Code;
    let mut chars = script.chars().peekable();

    while let Some(c) = chars.next() {
        match state {
            Lexical::Code => match c {
                '-' if chars.peek() == Some(&'-') => {
                    chars.next();
                    state = Lexical::LineComment;
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    state = Lexical::BlockComment;
                }
                ';' => {
                    push_statement(&mut statements, &mut current);
                }
                '\'' => {
                    state = Lexical::SingleQuoted;
                    current.push(c);
                }
                '"' => {
                    state = Lexical::DoubleQuoted;
                    current.push(c);
                }
                _ => current.push(c),
            },
            Lexical::SingleQuoted => {
                current.push(c);
                if c == '\'' {
                    state = Lexical::Code;
                }
            }
            Lexical::DoubleQuoted => {
                current.push(c);
                if c == '"' {
                    state = Lexical::Code;
                }
            }
            Lexical::LineComment => {
                if c == '\n' {
                    current.push('\n');
                    state = Lexical::Code;
                }
            }
            Lexical::BlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    current.push(' ');
                    state = Lexical::Code;
                }
            }
        }
    }
    push_statement(&mut statements, &mut current);
    statements
}

fn push_statement(statements: &mut Vec<String>, current: &mut String) {
    let statement = current.trim();
    if !statement.is_empty() {
        statements.push(statement.to_string());
    }
    current.clear();
}

/// Rewrite `:name` placeholders. PostgreSQL reuses `$n` for a repeated
/// name; SQLite gets one `?` per occurrence. `::` casts are left alone.
/// Returns the first unknown name as the error.
fn bind(
    statement: &str,
    params: &ScriptParams,
    backend: DbBackend,
) -> Result<RenderedStatement, String> {
    let mut sql = String::with_capacity(statement.len());
    let mut values: Vec<Value> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut quote: Option<char> = None;
    let mut chars = statement.chars().peekable();

    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            sql.push(c);
            if c == q {
                quote = None;
            }
            continue;
        }

        match c {
            '\'' | '"' => {
                quote = Some(c);
                sql.push(c);
            }
            ':' if chars.peek() == Some(&':') => {
                chars.next();
                sql.push_str("::");
            }
            ':' if chars
                .peek()
                .is_some_and(|n| n.is_ascii_alphabetic() || *n == '_') =>
            {
                let mut name = String::new();
                while let Some(&n) = chars.peek() {
                    if n.is_ascii_alphanumeric() || n == '_' {
                        name.push(n);
                        chars.next();
                    } else {
                        break;
                    }
                }

                let value = params.get(&name).ok_or_else(|| name.clone())?;
                match backend {
                    DbBackend::Postgres => {
                        let position = match positions.get(&name) {
                            Some(position) => *position,
                            None => {
                                values.push(value.clone());
                                positions.insert(name, values.len());
                                values.len()
                            }
                        };
                        sql.push('$');
                        sql.push_str(&position.to_string());
                    }
                    _ => {
                        values.push(value.clone());
                        sql.push('?');
                    }
                }
            }
            _ => sql.push(c),
        }
    }

    Ok(RenderedStatement { sql, values })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ScriptParams {
        ScriptParams::new()
            .with("cluster_name", "quickstart")
            .with("server_name", "server1")
    }

    #[test]
    fn test_split_ignores_semicolons_in_strings_and_comments() {
        let script = "-- header; not a statement\n\
                      CREATE TABLE a (x VARCHAR(10) DEFAULT 'a;b');\n\
                      /* block; comment */ INSERT INTO a (x) VALUES ('c');\n\n;";
        let statements = split_statements(script);
        assert_eq!(statements.len(), 2);
        assert!(statements[0].starts_with("CREATE TABLE a"));
        assert!(statements[0].contains("'a;b'"));
        assert_eq!(statements[1], "INSERT INTO a (x) VALUES ('c')");
    }

    #[test]
    fn test_postgres_reuses_positions_for_repeated_names() {
        let rendered = bind(
            "SELECT :cluster_name, :server_name, :cluster_name",
            &params(),
            DbBackend::Postgres,
        )
        .unwrap();
        assert_eq!(rendered.sql, "SELECT $1, $2, $1");
        assert_eq!(rendered.values.len(), 2);
    }

    #[test]
    fn test_sqlite_binds_each_occurrence() {
        let rendered = bind(
            "SELECT :cluster_name, :server_name, :cluster_name",
            &params(),
            DbBackend::Sqlite,
        )
        .unwrap();
        assert_eq!(rendered.sql, "SELECT ?, ?, ?");
        assert_eq!(rendered.values.len(), 3);
        assert_eq!(rendered.values[0], rendered.values[2]);
    }

    #[test]
    fn test_casts_and_quoted_colons_are_untouched() {
        let rendered = bind(
            "SELECT '10:30'::time, :server_name",
            &params(),
            DbBackend::Postgres,
        )
        .unwrap();
        assert_eq!(rendered.sql, "SELECT '10:30'::time, $1");
    }

    #[test]
    fn test_unknown_placeholder_is_reported() {
        let err = render(
            ScriptId::OdbCluster,
            "INSERT INTO cluster (name) VALUES (:nope);",
            &params(),
            DbBackend::Sqlite,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SqlError::UnboundParameter { script: "odb-cluster", ref name } if name == "nope"
        ));
    }

    #[test]
    fn test_bundled_scripts_render_for_both_backends() {
        let params = ScriptParams::new()
            .with("admin_username", "zato")
            .with("password_hash", "hash")
            .with("created_at", chrono::Utc::now())
            .with("cluster_name", "quickstart")
            .with("description", Some("desc".to_string()))
            .with("odb_type", "sqlite")
            .with("odb_host", Option::<String>::None)
            .with("odb_port", Option::<i32>::None)
            .with("odb_db_name", Option::<String>::None)
            .with("lb_host", "127.0.0.1")
            .with("lb_port", 11223)
            .with("lb_agent_port", 20151)
            .with("owner", "zato")
            .with("server_name", "server1")
            .with("bind_host", "0.0.0.0")
            .with("bind_port", 17010)
            .with("token", "abc");
        let catalog = ScriptCatalog::bundled();
        for backend in [DbBackend::Postgres, DbBackend::Sqlite] {
            for id in ScriptId::ALL {
                let statements = render(id, catalog.get(id), &params, backend)
                    .unwrap_or_else(|e| panic!("{} must render: {}", id.name(), e));
                assert!(!statements.is_empty(), "{} has no statements", id.name());
            }
        }
    }

    #[test]
    fn test_override_replaces_only_its_script() {
        let catalog = ScriptCatalog::bundled().with_override(ScriptId::OdbCluster, "SELECT 1;");
        assert_eq!(catalog.get(ScriptId::OdbCluster), "SELECT 1;");
        assert_eq!(
            catalog.get(ScriptId::AdminUser),
            ScriptId::AdminUser.bundled()
        );
    }
}
