//! Translates the engine's introspection into the result sets the
//! protocol's administrative statements are expected to produce. All of
//! the impedance mismatch between the two models lives here.

use std::collections::HashMap;

use crate::constants::UTF8_GENERAL_CI;
use crate::engine::Engine;
use crate::errors::ProtoResult;
use crate::sql_type::{result_columns, visible_type, SqlResult, Value};

/// Everything known about one table column after joining the column,
/// index and foreign-key introspections.
pub struct ColumnInfo {
    pub name: String,
    pub type_text: String,
    pub nullable: bool,
    pub primary: bool,
    pub default: Option<String>,
    pub index_name: Option<String>,
    pub index_origin: Option<String>,
    pub unique: bool,
    // 1 ascending, -1 descending; meaningful only when indexed
    pub order: i32,
    pub fk_table: Option<String>,
    pub fk_column: Option<String>,
    pub serial: bool,
}

const DATABASES_SHAPE: &[(&str, &str)] = &[("Database", "VARCHAR(64)")];

const TABLES_SHAPE: &[(&str, &str)] = &[("Table", "VARCHAR(64)")];

const COLUMNS_SHAPE: &[(&str, &str)] = &[
    ("Field", "VARCHAR(64)"),
    ("Type", "VARCHAR(40)"),
    ("Null", "VARCHAR(1)"),
    ("Key", "VARCHAR(3)"),
    ("Default", "VARCHAR(64)"),
    ("Extra", "VARCHAR(255)"),
];

const FULL_COLUMNS_SHAPE: &[(&str, &str)] = &[
    ("Field", "VARCHAR(64)"),
    ("Type", "VARCHAR(40)"),
    ("Collation", "VARCHAR(40)"),
    ("Null", "VARCHAR(1)"),
    ("Key", "VARCHAR(3)"),
    ("Default", "VARCHAR(64)"),
    ("Extra", "VARCHAR(20)"),
    ("Privileges", "VARCHAR(80)"),
    ("Comment", "VARCHAR(255)"),
];

const CREATE_TABLE_SHAPE: &[(&str, &str)] = &[("Table", "VARCHAR(64)"), ("Create Table", "TEXT")];

const INDEX_SHAPE: &[(&str, &str)] = &[
    ("Table", "VARCHAR(64)"),
    ("Non_unique", "INTEGER"),
    ("Key_name", "VARCHAR(64)"),
    ("Seq_in_index", "INTEGER"),
    ("Column_name", "VARCHAR(64)"),
    ("Collation", "VARCHAR(1)"),
    ("Cardinality", "INTEGER"),
    ("Sub_part", "INTEGER"),
    ("Packed", "VARCHAR(10)"),
    ("Null", "VARCHAR(3)"),
    ("Index_type", "VARCHAR(16)"),
    ("Comment", "VARCHAR(255)"),
    ("Index_comment", "VARCHAR(255)"),
];

const TABLE_STATUS_SHAPE: &[(&str, &str)] = &[
    ("Name", "VARCHAR(64)"),
    ("Engine", "VARCHAR(10)"),
    ("Version", "INTEGER"),
    ("Row_format", "VARCHAR(10)"),
    ("Rows", "INTEGER"),
    ("Avg_row_length", "INTEGER"),
    ("Data_length", "INTEGER"),
    ("Max_data_length", "INTEGER"),
    ("Index_length", "INTEGER"),
    ("Data_free", "INTEGER"),
    ("Auto_increment", "INTEGER"),
    ("Create_time", "VARCHAR(19)"),
    ("Update_time", "VARCHAR(19)"),
    ("Check_time", "VARCHAR(19)"),
    ("Collation", "VARCHAR(32)"),
    ("Checksum", "INTEGER"),
    ("Create_options", "VARCHAR(255)"),
    ("Comment", "VARCHAR(80)"),
];

const CHARSET_SHAPE: &[(&str, &str)] = &[
    ("Charset", "VARCHAR(30)"),
    ("Description", "VARCHAR(60)"),
    ("Default collation", "VARCHAR(60)"),
    ("Maxlen", "INTEGER"),
];

const COLLATION_SHAPE: &[(&str, &str)] = &[
    ("Collation", "VARCHAR(30)"),
    ("Charset", "VARCHAR(30)"),
    ("Id", "INTEGER"),
    ("Default", "VARCHAR(30)"),
    ("Compiled", "VARCHAR(30)"),
    ("Sortlen", "INTEGER"),
];

const ENGINES_SHAPE: &[(&str, &str)] = &[
    ("Engine", "VARCHAR(10)"),
    ("Support", "VARCHAR(10)"),
    ("Comment", "VARCHAR(80)"),
];

const VARIABLES_SHAPE: &[(&str, &str)] = &[
    ("Variable_name", "VARCHAR(30)"),
    ("Value", "VARCHAR(255)"),
];

fn text(value: &str) -> Value {
    Value::Text(value.to_string())
}

fn opt_text(value: Option<&str>) -> Value {
    match value {
        Some(v) => Value::Text(v.to_string()),
        None => Value::Null,
    }
}

/// Join columns, indexes and foreign keys of a table into one list.
pub fn column_list(engine: &Engine, table: &str) -> ProtoResult<Vec<ColumnInfo>> {
    let mut indexes = HashMap::new();
    for index in engine.index_list(table)? {
        indexes.insert(index.column.clone(), index);
    }

    let mut foreigns = HashMap::new();
    for foreign in engine.foreign_key_list(table)? {
        foreigns.insert(foreign.column.clone(), foreign);
    }

    let mut columns = vec![];
    for info in engine.table_info(table)? {
        let type_text = visible_type(if info.declared.is_empty() {
            None
        } else {
            Some(info.declared.as_str())
        });
        // the engine hands back the literal string "NULL" for some
        // no-default cases; it means absence, not a default
        let default = info.default.filter(|d| d != "NULL");
        // primary keys can never hold NULL on the wire side, whatever
        // the lenient engine reports
        let nullable = !info.not_null && !info.primary;
        let serial = type_text.contains("int") && info.primary && !nullable;

        let mut column = ColumnInfo {
            name: info.name,
            type_text,
            nullable,
            primary: info.primary,
            default,
            index_name: None,
            index_origin: None,
            unique: false,
            order: 1,
            fk_table: None,
            fk_column: None,
            serial,
        };

        if let Some(index) = indexes.get(&column.name) {
            column.index_name = Some(index.name.clone());
            column.index_origin = Some(index.origin.clone());
            column.unique = index.unique;
            column.order = index.order;
        }
        if let Some(foreign) = foreigns.get(&column.name) {
            column.fk_table = Some(foreign.ref_table.clone());
            column.fk_column = foreign.ref_column.clone();
        }

        columns.push(column);
    }
    Ok(columns)
}

pub fn show_databases(engine: &Engine) -> ProtoResult<SqlResult> {
    let rows = engine
        .databases()
        .into_iter()
        .map(|name| vec![Value::Text(name)])
        .collect();
    Ok(SqlResult::new(result_columns(DATABASES_SHAPE), rows))
}

pub fn show_tables(engine: &Engine) -> ProtoResult<SqlResult> {
    let rows = engine
        .tables()?
        .into_iter()
        .map(|name| vec![Value::Text(name)])
        .collect();
    Ok(SqlResult::new(result_columns(TABLES_SHAPE), rows))
}

pub fn show_columns(engine: &Engine, table: &str, full: bool) -> ProtoResult<SqlResult> {
    let shape = if full { FULL_COLUMNS_SHAPE } else { COLUMNS_SHAPE };
    let mut rows = vec![];

    for column in column_list(engine, table)? {
        let null = if column.nullable { "YES" } else { "NO" };
        let extra = if column.serial { "auto_increment" } else { "" };
        let mut key = if column.primary { "PRI" } else { "" };
        if key.is_empty() && column.index_name.is_some() {
            key = if column.unique { "UNI" } else { "MUL" };
        }
        let collation = if column.type_text == "text" || column.type_text.contains("char") {
            UTF8_GENERAL_CI
        } else {
            ""
        };

        let row = if full {
            vec![
                Value::Text(column.name),
                Value::Text(column.type_text),
                text(collation),
                text(null),
                text(key),
                opt_text(column.default.as_deref()),
                text(extra),
                text(""),
                text(""),
            ]
        } else {
            vec![
                Value::Text(column.name),
                Value::Text(column.type_text),
                text(null),
                text(key),
                opt_text(column.default.as_deref()),
                text(extra),
            ]
        };
        rows.push(row);
    }

    Ok(SqlResult::new(result_columns(shape), rows))
}

/// Rebuild a CREATE TABLE statement in the dialect the clients expect.
/// The engine's own stored DDL is never echoed: it is SQLite syntax.
pub fn show_create_table(engine: &Engine, table: &str) -> ProtoResult<SqlResult> {
    let mut lines = vec![];
    let mut primaries = vec![];
    let mut extra = vec![];

    for column in column_list(engine, table)? {
        let mut line = format!("  {} {}", column.name, column.type_text);

        if !column.nullable {
            line += " NOT NULL";
        }
        if column.nullable || column.default.is_some() {
            match &column.default {
                Some(default) => line += &format!(" DEFAULT '{}'", default),
                None => line += " DEFAULT NULL",
            }
        }
        if column.serial {
            line += " AUTO_INCREMENT";
        }
        lines.push(line);

        if column.primary {
            primaries.push(column.name.clone());
        }

        if let Some(index) = &column.index_name {
            let unique = if column.unique { " UNIQUE" } else { "" };
            let order = if column.order == 1 { " ASC" } else { "" };
            extra.push(format!(" {} KEY {} ({}{})", unique, index, column.name, order));
        }

        if let Some(fk_column) = &column.fk_column {
            let fk_table = column.fk_table.as_deref().unwrap_or_default();
            extra.push(format!(
                "  CONSTRAINT fk_{0}_{1} FOREIGN KEY ({1}) REFERENCES {2} ({3})",
                table, column.name, fk_table, fk_column
            ));
        }
    }

    if !primaries.is_empty() {
        lines.push(format!("  PRIMARY KEY ({})", primaries.join(", ")));
    }

    // descending lexical order puts UNIQUE keys ahead of plain keys
    extra.sort_by(|a, b| b.cmp(a));
    lines.extend(extra);

    let definition = format!("CREATE TABLE {} (\n{}\n) ENGINE=SQLite", table, lines.join(",\n"));
    let rows = vec![vec![text(table), Value::Text(definition)]];
    Ok(SqlResult::new(result_columns(CREATE_TABLE_SHAPE), rows))
}

pub fn show_indexes(engine: &Engine, table: &str) -> ProtoResult<SqlResult> {
    let mut rows = vec![];

    for column in column_list(engine, table)? {
        let index = match &column.index_name {
            Some(index) => index.clone(),
            None => continue,
        };
        // plain CREATE INDEX entries still drive the Key column of
        // SHOW COLUMNS but are not listed here
        if column.index_origin.as_deref() == Some("c") {
            continue;
        }

        let non_unique = if column.unique { 0 } else { 1 };
        let key_name = if column.primary { "PRIMARY".to_string() } else { index };
        let collation = if column.order == 1 { text("A") } else { Value::Null };
        let cardinality = engine.count_distinct(table, &column.name)?;
        let null = if column.nullable { text("YES") } else { Value::Null };

        rows.push(vec![
            text(table),
            Value::Int(non_unique),
            Value::Text(key_name),
            Value::Int(1),
            Value::Text(column.name),
            collation,
            Value::Int(cardinality),
            Value::Null,
            Value::Null,
            null,
            text("BTREE"),
            text(""),
            text(""),
        ]);
    }

    Ok(SqlResult::new(result_columns(INDEX_SHAPE), rows))
}

pub fn show_table_status(engine: &Engine, name: Option<&str>) -> ProtoResult<SqlResult> {
    let tables = match name {
        Some(name) => vec![name.to_string()],
        None => engine.tables()?,
    };

    let mut rows = vec![];
    for table in tables {
        let count = engine.count_rows(&table)?;
        let auto = next_auto_increment(engine, &table)?;
        rows.push(vec![
            Value::Text(table),
            text("SQLite"),
            Value::Int(9),
            text("Dynamic"),
            Value::Int(count),
            Value::Int(0),
            Value::Int(0),
            Value::Null,
            Value::Int(0),
            Value::Int(0),
            auto.map(Value::Int).unwrap_or(Value::Null),
            Value::Null,
            Value::Null,
            Value::Null,
            text(UTF8_GENERAL_CI),
            Value::Null,
            text(""),
            text(""),
        ]);
    }

    Ok(SqlResult::new(result_columns(TABLE_STATUS_SHAPE), rows))
}

// The id the next inserted row would get, for tables with a serial
// column. The primary key is NOT NULL so the row count stands in for
// the column count.
fn next_auto_increment(engine: &Engine, table: &str) -> ProtoResult<Option<i64>> {
    for column in column_list(engine, table)? {
        if column.serial {
            return Ok(Some(engine.count_rows(table)? + 1));
        }
    }
    Ok(None)
}

pub fn show_charset(_engine: &Engine) -> ProtoResult<SqlResult> {
    let rows = vec![vec![
        text("utf8"),
        text("UTF-8 Unicode"),
        text(UTF8_GENERAL_CI),
        Value::Int(3),
    ]];
    Ok(SqlResult::new(result_columns(CHARSET_SHAPE), rows))
}

pub fn show_collation(_engine: &Engine) -> ProtoResult<SqlResult> {
    let rows = vec![vec![
        text(UTF8_GENERAL_CI),
        text("utf8"),
        Value::Int(crate::constants::CHARACTER_SET_UTF8 as i64),
        text("Yes"),
        text("Yes"),
        Value::Int(1),
    ]];
    Ok(SqlResult::new(result_columns(COLLATION_SHAPE), rows))
}

pub fn show_engines(_engine: &Engine) -> ProtoResult<SqlResult> {
    let rows = vec![vec![
        text("SQLite"),
        text("DEFAULT"),
        text("Small. Fast. Reliable. Choose any three."),
    ]];
    Ok(SqlResult::new(result_columns(ENGINES_SHAPE), rows))
}

pub fn show_variables(_engine: &Engine) -> ProtoResult<SqlResult> {
    Ok(SqlResult::new(result_columns(VARIABLES_SHAPE), vec![]))
}
