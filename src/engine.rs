use std::path::Path;

use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};

use crate::errors::ProtoResult;
use crate::sql_type::{ColumnMeta, SqlResult, Value};

/// One column of `PRAGMA table_info`.
pub struct TableColumn {
    pub name: String,
    pub declared: String,
    pub not_null: bool,
    pub default: Option<String>,
    pub primary: bool,
}

/// One index of `PRAGMA index_list`, narrowed to its first key column
/// via `PRAGMA index_xinfo`.
pub struct TableIndex {
    pub name: String,
    pub unique: bool,
    // "c" for CREATE INDEX, "u" for UNIQUE constraints, "pk" for the
    // primary key.
    pub origin: String,
    pub column: String,
    // 1 ascending, -1 descending
    pub order: i32,
}

/// One relation of `PRAGMA foreign_key_list`.
pub struct ForeignKey {
    pub column: String,
    pub ref_table: String,
    pub ref_column: Option<String>,
}

/// Read-only handle on the embedded engine. Every connection handler
/// opens its own; handles are never shared across threads.
pub struct Engine {
    conn: Connection,
}

impl Engine {
    pub fn open<P: AsRef<Path>>(path: P) -> ProtoResult<Engine> {
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        Ok(Engine { conn })
    }

    /// Version token advertised in the handshake.
    pub fn version(&self) -> &'static str {
        crate::constants::SERVER_VERSION
    }

    /// The single logical schema served by the gateway.
    pub fn databases(&self) -> Vec<String> {
        vec!["main".to_string()]
    }

    /// User tables, internal bookkeeping excluded.
    pub fn tables(&self) -> ProtoResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
        )?;
        let mut rows = stmt.query([])?;
        let mut tables = vec![];
        while let Some(row) = rows.next()? {
            tables.push(row.get(0)?);
        }
        Ok(tables)
    }

    /// Run one statement and collect the result. The column descriptions
    /// are captured from the prepared statement before any row is
    /// stepped, so empty result sets still carry a schema.
    pub fn execute(&self, sql: &str) -> ProtoResult<SqlResult> {
        let mut stmt = self.conn.prepare(sql)?;
        let columns: Vec<ColumnMeta> = stmt
            .columns()
            .iter()
            .map(|column| ColumnMeta::from_declared(column.name(), column.decl_type()))
            .collect();

        let count = columns.len();
        let mut rows = stmt.query([])?;
        let mut data = vec![];
        while let Some(row) = rows.next()? {
            let mut record = Vec::with_capacity(count);
            for index in 0..count {
                record.push(match row.get_ref(index)? {
                    ValueRef::Null => Value::Null,
                    ValueRef::Integer(v) => Value::Int(v),
                    ValueRef::Real(v) => Value::Float(v),
                    ValueRef::Text(v) => Value::Text(String::from_utf8_lossy(v).into_owned()),
                    ValueRef::Blob(v) => Value::Blob(v.to_vec()),
                });
            }
            data.push(record);
        }

        Ok(SqlResult::new(columns, data))
    }

    pub fn table_info(&self, table: &str) -> ProtoResult<Vec<TableColumn>> {
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info([{}])", table))?;
        let mut rows = stmt.query([])?;
        let mut columns = vec![];
        while let Some(row) = rows.next()? {
            columns.push(TableColumn {
                name: row.get(1)?,
                declared: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                not_null: row.get::<_, i64>(3)? != 0,
                default: row.get(4)?,
                primary: row.get::<_, i64>(5)? != 0,
            });
        }
        Ok(columns)
    }

    pub fn index_list(&self, table: &str) -> ProtoResult<Vec<TableIndex>> {
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA index_list([{}])", table))?;
        let mut rows = stmt.query([])?;
        let mut names = vec![];
        while let Some(row) = rows.next()? {
            let name: String = row.get(1)?;
            let unique: bool = row.get::<_, i64>(2)? != 0;
            let origin: String = row.get(3)?;
            names.push((name, unique, origin));
        }
        drop(rows);
        drop(stmt);

        let mut indexes = vec![];
        for (name, unique, origin) in names {
            if let Some((column, order)) = self.index_key_column(&name)? {
                indexes.push(TableIndex {
                    name,
                    unique,
                    origin,
                    column,
                    order,
                });
            }
        }
        Ok(indexes)
    }

    // First key column of an index. Rowid and expression members have no
    // column name and are skipped.
    fn index_key_column(&self, index: &str) -> ProtoResult<Option<(String, i32)>> {
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA index_xinfo([{}])", index))?;
        let mut rows = stmt.query([])?;
        if let Some(row) = rows.next()? {
            let column: Option<String> = row.get(2)?;
            let descending: bool = row.get::<_, i64>(3)? != 0;
            return Ok(column.map(|c| (c, if descending { -1 } else { 1 })));
        }
        Ok(None)
    }

    pub fn foreign_key_list(&self, table: &str) -> ProtoResult<Vec<ForeignKey>> {
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA foreign_key_list([{}])", table))?;
        let mut rows = stmt.query([])?;
        let mut foreigns = vec![];
        while let Some(row) = rows.next()? {
            foreigns.push(ForeignKey {
                ref_table: row.get(2)?,
                column: row.get(3)?,
                ref_column: row.get(4)?,
            });
        }
        Ok(foreigns)
    }

    pub fn count_distinct(&self, table: &str, column: &str) -> ProtoResult<i64> {
        let sql = format!("SELECT COUNT(DISTINCT([{}])) FROM [{}]", column, table);
        Ok(self.conn.query_row(&sql, [], |row| row.get(0))?)
    }

    pub fn count_rows(&self, table: &str) -> ProtoResult<i64> {
        let sql = format!("SELECT COUNT(1) FROM [{}]", table);
        Ok(self.conn.query_row(&sql, [], |row| row.get(0))?)
    }
}
