use regex::Regex;

// Column field types of the text protocol.
// See https://dev.mysql.com/doc/internals/en/com-query-response.html#column-type
#[allow(dead_code)]
#[derive(Copy, Clone, PartialEq, Debug)]
pub enum FieldType {
    Decimal = 0x00,
    Tiny = 0x01,
    Short = 0x02,
    Long = 0x03,
    Float = 0x04,
    Double = 0x05,
    Null = 0x06,
    Timestamp = 0x07,
    LongLong = 0x08,
    Int24 = 0x09,
    Date = 0x0a,
    Time = 0x0b,
    Datetime = 0x0c,
    Year = 0x0d,
    NewDate = 0x0e,
    Varchar = 0x0f,
    Bit = 0x10,
    NewDecimal = 0xf6,
    Enum = 0xf7,
    Set = 0xf8,
    TinyBlob = 0xf9,
    MediumBlob = 0xfa,
    LongBlob = 0xfb,
    Blob = 0xfc,
    VarString = 0xfd,
    String = 0xfe,
    Geometry = 0xff,
}

// Column definition flags.
// Originally found in include/mysql/mysql_com.h
#[allow(dead_code)]
pub enum FieldFlag {
    NotNull = 1,
    PriKey = 2,
    UniqueKey = 4,
    MultipleKey = 8,
    Blob = 16,
    Unsigned = 32,
    ZeroFill = 64,
    Binary = 128,
    Enum = 256,
    AutoIncrement = 512,
    Timestamp = 1024,
    Set = 2048,
    Num = 32768,
}

// A scalar produced by the engine. The concrete type of a cell is known
// only at runtime; the wire layer stringifies whatever it gets.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        match self {
            Value::Null => true,
            _ => false,
        }
    }
}

// Wire description of one result-set column.
#[derive(Clone, Debug)]
pub struct ColumnMeta {
    pub name: String,
    pub field_type: FieldType,
    pub length: u32,
    pub decimals: u8,
}

impl ColumnMeta {
    // Build the wire description from a declared SQL type. `None` is what
    // the engine reports for computed expressions.
    pub fn from_declared(name: &str, declared: Option<&str>) -> Self {
        let (field_type, length, decimals) = internal_type(declared);
        ColumnMeta {
            name: name.to_string(),
            field_type,
            length,
            decimals,
        }
    }
}

// One result set: ordered column descriptions plus ordered rows.
#[derive(Default, Debug)]
pub struct SqlResult {
    pub columns: Vec<ColumnMeta>,
    pub rows: Vec<Vec<Value>>,
}

impl SqlResult {
    pub fn new(columns: Vec<ColumnMeta>, rows: Vec<Vec<Value>>) -> Self {
        SqlResult { columns, rows }
    }
}

// Expand a static (name, declared type) shape into column descriptions.
pub fn result_columns(shape: &[(&str, &str)]) -> Vec<ColumnMeta> {
    shape
        .iter()
        .map(|&(name, declared)| ColumnMeta::from_declared(name, Some(declared)))
        .collect()
}

lazy_static! {
    static ref TYPE_WITH_SCALE: Regex = Regex::new(r"^(\w+)\((\d+),(\d+)\)").unwrap();
    static ref TYPE_WITH_LENGTH: Regex = Regex::new(r"^(\w+)\((\d+)\)").unwrap();
}

/// Map a declared SQL type to its wire field type, display length and
/// decimal count. Every possible input lands in exactly one row of the
/// table; unparseable or missing declarations fall through to BLOB.
pub fn internal_type(declared: Option<&str>) -> (FieldType, u32, u8) {
    let declared = match declared {
        Some(d) => d.to_uppercase(),
        None => return (FieldType::Blob, (1 << 24) - 1, 0),
    };

    let mut field = declared.as_str();
    let mut length: u32 = 0;
    let mut decimals: u32 = 0;

    if let Some(caps) = TYPE_WITH_SCALE.captures(&declared) {
        field = caps.get(1).unwrap().as_str();
        length = caps[2].parse().unwrap_or(0);
        decimals = caps[3].parse().unwrap_or(0);
    } else if let Some(caps) = TYPE_WITH_LENGTH.captures(&declared) {
        field = caps.get(1).unwrap().as_str();
        length = caps[2].parse().unwrap_or(0);
    }

    if field.contains("INT") {
        (FieldType::LongLong, 21, 0)
    } else if field.contains("DECIMAL") || field.contains("NUMERIC") {
        (FieldType::Decimal, length, decimals as u8)
    } else if field.contains("FLOAT") || field.contains("DOUBLE") || field.contains("REAL") {
        if length == 0 {
            length = 53;
        }
        if decimals + length > 53 {
            length = length.saturating_sub(decimals);
        }
        (FieldType::Double, length, decimals as u8)
    } else if field.contains("CHAR") {
        if length == 0 {
            length = (1 << 8) - 1;
        }
        (FieldType::VarString, length, 0)
    } else if field.contains("STAMP") {
        (FieldType::Timestamp, 19, 0)
    } else if field.contains("DATE") {
        (FieldType::Datetime, 19, 0)
    } else if field.contains("TEXT") {
        (FieldType::VarString, (1 << 16) - 1, 0)
    } else {
        (FieldType::Blob, (1 << 24) - 1, 0)
    }
}

/// The type text shown back to clients in SHOW COLUMNS and
/// SHOW CREATE TABLE.
pub fn visible_type(declared: Option<&str>) -> String {
    let (field, length, decimals) = internal_type(declared);

    match field {
        FieldType::LongLong => format!("int({})", length),
        FieldType::Decimal => format!("decimal({},{})", length, decimals),
        FieldType::Double => format!("double({},{})", length, decimals),
        FieldType::VarString => format!("varchar({})", length),
        FieldType::Datetime => "datetime".to_string(),
        FieldType::Timestamp => "timestamp".to_string(),
        FieldType::Blob => "blob".to_string(),
        _ => "text".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_types() {
        assert_eq!(internal_type(Some("INTEGER")), (FieldType::LongLong, 21, 0));
        assert_eq!(internal_type(Some("int")), (FieldType::LongLong, 21, 0));
        assert_eq!(internal_type(Some("BIGINT")), (FieldType::LongLong, 21, 0));
        assert_eq!(
            internal_type(Some("TINYINT(1)")),
            (FieldType::LongLong, 21, 0)
        );
    }

    #[test]
    fn test_fixed_point_types() {
        assert_eq!(
            internal_type(Some("DECIMAL(10,2)")),
            (FieldType::Decimal, 10, 2)
        );
        assert_eq!(
            internal_type(Some("numeric(6,3)")),
            (FieldType::Decimal, 6, 3)
        );
    }

    #[test]
    fn test_floating_point_types() {
        // no arguments: full double precision
        assert_eq!(internal_type(Some("DOUBLE")), (FieldType::Double, 53, 0));
        assert_eq!(internal_type(Some("REAL")), (FieldType::Double, 53, 0));
        assert_eq!(
            internal_type(Some("FLOAT(10,2)")),
            (FieldType::Double, 10, 2)
        );
        // length + decimals clamped to 53 bits
        assert_eq!(
            internal_type(Some("DOUBLE(53,10)")),
            (FieldType::Double, 43, 10)
        );
    }

    #[test]
    fn test_string_types() {
        assert_eq!(
            internal_type(Some("VARCHAR(30)")),
            (FieldType::VarString, 30, 0)
        );
        assert_eq!(
            internal_type(Some("CHAR")),
            (FieldType::VarString, 255, 0)
        );
        assert_eq!(
            internal_type(Some("TEXT")),
            (FieldType::VarString, 65535, 0)
        );
    }

    #[test]
    fn test_temporal_types() {
        assert_eq!(internal_type(Some("DATE")), (FieldType::Datetime, 19, 0));
        assert_eq!(
            internal_type(Some("DATETIME")),
            (FieldType::Datetime, 19, 0)
        );
        assert_eq!(
            internal_type(Some("TIMESTAMP")),
            (FieldType::Timestamp, 19, 0)
        );
    }

    #[test]
    fn test_fallback_types() {
        assert_eq!(internal_type(None), (FieldType::Blob, 16777215, 0));
        assert_eq!(internal_type(Some("")), (FieldType::Blob, 16777215, 0));
        assert_eq!(internal_type(Some("GLOB")), (FieldType::Blob, 16777215, 0));
    }

    #[test]
    fn test_visible_type() {
        assert_eq!(visible_type(Some("INTEGER")), "int(21)");
        assert_eq!(visible_type(Some("DECIMAL(8,3)")), "decimal(8,3)");
        assert_eq!(visible_type(Some("REAL")), "double(53,0)");
        assert_eq!(visible_type(Some("VARCHAR(16)")), "varchar(16)");
        assert_eq!(visible_type(Some("TEXT")), "varchar(65535)");
        assert_eq!(visible_type(Some("DATETIME")), "datetime");
        assert_eq!(visible_type(Some("TIMESTAMP")), "timestamp");
        assert_eq!(visible_type(None), "blob");
    }
}
