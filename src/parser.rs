use regex::{Captures, Regex, RegexBuilder};

/// An administrative statement the dispatcher knows how to answer,
/// together with whatever the pattern captured.
#[derive(Debug, PartialEq)]
pub enum Statement {
    ShowCharacterSet { pattern: Option<String> },
    ShowCollation { pattern: Option<String> },
    ShowColumns { full: bool, table: String, database: Option<String>, pattern: Option<String> },
    ShowCreateDatabase { name: String },
    ShowCreateTable { name: String },
    ShowDatabases { pattern: Option<String> },
    ShowEngines,
    ShowIndex { table: String, database: Option<String> },
    ShowProcesslist { full: bool },
    ShowTableStatus { database: Option<String>, pattern: Option<String> },
    ShowTables { database: Option<String>, pattern: Option<String> },
    ShowStatus { pattern: Option<String> },
    ShowVariables { pattern: Option<String> },
    Help { search: String },
    Use { database: String },
}

#[derive(Copy, Clone)]
enum Tag {
    ShowCharacterSet,
    ShowCollation,
    ShowColumns,
    ShowCreateDatabase,
    ShowCreateTable,
    ShowDatabases,
    ShowEngines,
    ShowIndex,
    ShowProcesslist,
    ShowTableStatus,
    ShowTables,
    ShowStatus,
    ShowVariables,
    Help,
    Use,
}

fn statement_pattern(pattern: &str) -> Regex {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .multi_line(true)
        .build()
        .unwrap()
}

lazy_static! {
    // Order matters: the patterns share the SHOW prefix and the first
    // match wins.
    static ref STATEMENTS: Vec<(Tag, Regex)> = vec![
        (
            Tag::ShowCharacterSet,
            statement_pattern(r"^SHOW\s+CHARACTER\s+SET(?:\s+LIKE\s+'(?P<pattern>[^']+)')?$"),
        ),
        (
            Tag::ShowCollation,
            statement_pattern(r"^SHOW\s+COLLATION(?:\s+LIKE\s+'(?P<pattern>[^']+)')?$"),
        ),
        (
            Tag::ShowColumns,
            statement_pattern(
                r"^SHOW(?:\s+(?P<modifier>FULL))?\s+COLUMNS\s+FROM\s+(?P<table>\w+|`.*?`)(?:\s+FROM\s+(?P<database>\w+|`[^`]+`))?(?:\s+LIKE\s+'(?P<pattern>[^']+)')?$",
            ),
        ),
        (
            Tag::ShowCreateDatabase,
            statement_pattern(r"^SHOW\s+CREATE\s+DATABASE\s+(?P<name>\w+|`[^`]+`)$"),
        ),
        (
            Tag::ShowCreateTable,
            statement_pattern(r"^SHOW\s+CREATE\s+TABLE\s+(?P<name>\w+|`[^`]+`)$"),
        ),
        (
            Tag::ShowDatabases,
            statement_pattern(r"^SHOW\s+DATABASES(?:\s+LIKE\s+'(?P<pattern>[^']+)')?$"),
        ),
        (
            Tag::ShowEngines,
            statement_pattern(r"^SHOW(?:\s+(?P<modifier>STORAGE))?\s+ENGINES$"),
        ),
        (
            Tag::ShowIndex,
            statement_pattern(
                r"^SHOW\s+INDEX\s+FROM\s+(?P<table>\w+|`.*?`)(?:\s+FROM\s+(?P<database>\w+|`[^`]+`))?$",
            ),
        ),
        (
            Tag::ShowProcesslist,
            statement_pattern(r"^SHOW(?:\s+(?P<modifier>FULL))?\s+PROCESSLIST$"),
        ),
        (
            Tag::ShowTableStatus,
            statement_pattern(
                r"^SHOW\s+TABLE\s+STATUS(?:\s+FROM\s+(?P<database>\w+|`[^`]+`))?(?:\s+LIKE\s+'(?P<pattern>[^']+)')?$",
            ),
        ),
        (
            Tag::ShowTables,
            statement_pattern(
                r"^SHOW\s+TABLES(?:\s+FROM\s+(?P<database>\w+|`[^`]+`))?(?:\s+LIKE\s+'(?P<pattern>[^']+)')?$",
            ),
        ),
        (
            Tag::ShowStatus,
            statement_pattern(r"^SHOW\s+STATUS(?:\s+LIKE\s+'(?P<pattern>[^']+)')?$"),
        ),
        (
            Tag::ShowVariables,
            statement_pattern(
                r"^SHOW(?:\s+(?P<modifier>GLOBAL|SESSION))?\s+VARIABLES(?:\s+LIKE\s+'(?P<pattern>[^']+)')?$",
            ),
        ),
        (
            Tag::Help,
            statement_pattern(r"^HELP\s+'(?P<search>[^']+)'$"),
        ),
        (
            Tag::Use,
            statement_pattern(r"^USE\s+(?P<database>\w+|`[^`]+`)$"),
        ),
    ];
}

fn group(caps: &Captures, name: &str) -> Option<String> {
    caps.name(name).map(|m| m.as_str().to_string())
}

fn required(caps: &Captures, name: &str) -> String {
    caps.name(name).map(|m| m.as_str().to_string()).unwrap_or_default()
}

/// Match a statement against the administrative pattern list.
pub fn recognize(query: &str) -> Option<Statement> {
    for (tag, pattern) in STATEMENTS.iter() {
        let caps = match pattern.captures(query) {
            Some(caps) => caps,
            None => continue,
        };

        return Some(match tag {
            Tag::ShowCharacterSet => Statement::ShowCharacterSet { pattern: group(&caps, "pattern") },
            Tag::ShowCollation => Statement::ShowCollation { pattern: group(&caps, "pattern") },
            Tag::ShowColumns => Statement::ShowColumns {
                full: caps.name("modifier").is_some(),
                table: required(&caps, "table"),
                database: group(&caps, "database"),
                pattern: group(&caps, "pattern"),
            },
            Tag::ShowCreateDatabase => Statement::ShowCreateDatabase { name: required(&caps, "name") },
            Tag::ShowCreateTable => Statement::ShowCreateTable { name: required(&caps, "name") },
            Tag::ShowDatabases => Statement::ShowDatabases { pattern: group(&caps, "pattern") },
            Tag::ShowEngines => Statement::ShowEngines,
            Tag::ShowIndex => Statement::ShowIndex {
                table: required(&caps, "table"),
                database: group(&caps, "database"),
            },
            Tag::ShowProcesslist => Statement::ShowProcesslist {
                full: caps.name("modifier").is_some(),
            },
            Tag::ShowTableStatus => Statement::ShowTableStatus {
                database: group(&caps, "database"),
                pattern: group(&caps, "pattern"),
            },
            Tag::ShowTables => Statement::ShowTables {
                database: group(&caps, "database"),
                pattern: group(&caps, "pattern"),
            },
            Tag::ShowStatus => Statement::ShowStatus { pattern: group(&caps, "pattern") },
            Tag::ShowVariables => Statement::ShowVariables { pattern: group(&caps, "pattern") },
            Tag::Help => Statement::Help { search: required(&caps, "search") },
            Tag::Use => Statement::Use { database: required(&caps, "database") },
        });
    }
    None
}

/// Reduce a possibly qualified, possibly quoted table reference to the
/// bare table name.
pub fn extract_table(text: &str) -> String {
    let stripped: String = text
        .chars()
        .filter(|c| *c != '`' && *c != '[' && *c != ']')
        .collect();
    stripped
        .rsplit('.')
        .next()
        .unwrap_or_default()
        .to_string()
}
