use crate::constants::CapabilityFlag::{
    CapabilityClientConnectWithDB, CapabilityClientFoundRows, CapabilityClientLongFlag,
    CapabilityClientLongPassword, CapabilityClientNoSchema, CapabilityClientProtocol41,
    CapabilityClientSecureConnection,
};

// MAX_PACKET_SIZE is the maximum payload length of a packet the server supports.
pub const MAX_PACKET_SIZE: usize = (1 << 24) - 1;
// PROTOCOL_VERSION is current version of the protocol.
// Always 10.
pub const PROTOCOL_VERSION: u8 = 10;

// SERVER_VERSION is advertised in the handshake. 4.1.25 was the last 4.1
// release; the suffix tells clients what is really behind the socket.
pub const SERVER_VERSION: &'static str = "4.1.25-SQLite";

// See http://dev.mysql.com/doc/internals/en/character-set.html#packet-Protocol::CharacterSet
pub const CHARACTER_SET_UTF8: u8 = 33;
pub const CHARACTER_SET_BINARY: u16 = 63;
pub const UTF8_GENERAL_CI: &'static str = "utf8_general_ci";

// See http://dev.mysql.com/doc/internals/en/status-flags.html
pub const SERVER_STATUS_AUTOCOMMIT: u16 = 0x0002;

// Packet type headers
pub const OK_PACKET: u8 = 0x00;
pub const EOF_PACKET: u8 = 0xfe;
pub const ERR_PACKET: u8 = 0xff;

// NULL_VALUE marks a NULL cell inside a text-protocol row payload. The
// byte is reserved in the length-encoded integer space for this purpose.
pub const NULL_VALUE: u8 = 0xfb;

// Originally found in include/mysql/mysql_com.h
#[allow(dead_code)]
pub enum CapabilityFlag {
    // CapabilityClientLongPassword is CLIENT_LONG_PASSWORD.
    // New more secure passwords. Assumed to be set since 4.1.1.
    CapabilityClientLongPassword = 1,

    // CapabilityClientFoundRows is CLIENT_FOUND_ROWS.
    // Found instead of affected rows.
    CapabilityClientFoundRows = 1 << 1,

    // CapabilityClientLongFlag is CLIENT_LONG_FLAG.
    // Get all column flags.
    CapabilityClientLongFlag = 1 << 2,

    // CapabilityClientConnectWithDB is CLIENT_CONNECT_WITH_DB.
    // One can specify db on connect.
    CapabilityClientConnectWithDB = 1 << 3,

    // CapabilityClientNoSchema is CLIENT_NO_SCHEMA.
    // Don't allow database.table.column.
    CapabilityClientNoSchema = 1 << 4,

    // CLIENT_COMPRESS 1 << 5
    // We do not support compression.

    // CLIENT_LOCAL_FILES 1 << 7
    // Client can use LOCAL INFILE request of LOAD DATA|XML.
    // We do not set it.

    // CapabilityClientProtocol41 is CLIENT_PROTOCOL_41.
    // New 4.1 protocol. Enforced everywhere.
    CapabilityClientProtocol41 = 1 << 9,

    // CapabilityClientSSL is CLIENT_SSL.
    // Switch to SSL after handshake. Never advertised.
    CapabilityClientSSL = 1 << 11,

    // CapabilityClientTransactions is CLIENT_TRANSACTIONS.
    // Can send status flags in EOF_Packet.
    CapabilityClientTransactions = 1 << 13,

    // CapabilityClientSecureConnection is CLIENT_SECURE_CONNECTION.
    // New 4.1 authentication: the auth response is length-prefixed.
    CapabilityClientSecureConnection = 1 << 15,

    // CapabilityClientMultiStatements is CLIENT_MULTI_STATEMENTS.
    // Can handle multiple statements per ComQuery. Not supported.
    CapabilityClientMultiStatements = 1 << 16,

    // CapabilityClientMultiResults is CLIENT_MULTI_RESULTS.
    // Can send multiple resultsets for ComQuery. Not supported.
    CapabilityClientMultiResults = 1 << 17,
}

// DEFAULT_SERVER_CAPABILITY is what the handshake advertises. No
// PLUGIN_AUTH and no DEPRECATE_EOF: 4.1-era clients expect the plain
// scramble exchange and EOF-delimited result sets.
pub const DEFAULT_SERVER_CAPABILITY: u32 = CapabilityClientLongPassword as u32
    | CapabilityClientFoundRows as u32
    | CapabilityClientLongFlag as u32
    | CapabilityClientConnectWithDB as u32
    | CapabilityClientNoSchema as u32
    | CapabilityClientProtocol41 as u32
    | CapabilityClientSecureConnection as u32;

// See https://dev.mysql.com/doc/internals/en/command-phase.html
#[derive(Copy, Clone, PartialEq)]
pub enum Command {
    Sleep = 0x00,
    Quit = 0x01,
    InitDb = 0x02,
    Query = 0x03,
    FieldList = 0x04,
    CreateDb = 0x05,
    DropDb = 0x06,
    Refresh = 0x07,
    Shutdown = 0x08,
    Statistics = 0x09,
    ProcessInfo = 0x0a,
    Connect = 0x0b,
    ProcessKill = 0x0c,
    Debug = 0x0d,
    Ping = 0x0e,
    Time = 0x0f,
    DelayedInsert = 0x10,
    ChangeUser = 0x11,
    BinlogDump = 0x12,
    TableDump = 0x13,
    ConnectOut = 0x14,
    RegisterSlave = 0x15,
    Prepare = 0x16,
    Execute = 0x17,
    LongData = 0x18,
    CloseStmt = 0x19,
    ResetStmt = 0x1a,
    SetOption = 0x1b,
    End = 0x1c,
}

impl Command {
    pub fn from_byte(byte: u8) -> Option<Command> {
        return match byte {
            0x00 => Some(Command::Sleep),
            0x01 => Some(Command::Quit),
            0x02 => Some(Command::InitDb),
            0x03 => Some(Command::Query),
            0x04 => Some(Command::FieldList),
            0x05 => Some(Command::CreateDb),
            0x06 => Some(Command::DropDb),
            0x07 => Some(Command::Refresh),
            0x08 => Some(Command::Shutdown),
            0x09 => Some(Command::Statistics),
            0x0a => Some(Command::ProcessInfo),
            0x0b => Some(Command::Connect),
            0x0c => Some(Command::ProcessKill),
            0x0d => Some(Command::Debug),
            0x0e => Some(Command::Ping),
            0x0f => Some(Command::Time),
            0x10 => Some(Command::DelayedInsert),
            0x11 => Some(Command::ChangeUser),
            0x12 => Some(Command::BinlogDump),
            0x13 => Some(Command::TableDump),
            0x14 => Some(Command::ConnectOut),
            0x15 => Some(Command::RegisterSlave),
            0x16 => Some(Command::Prepare),
            0x17 => Some(Command::Execute),
            0x18 => Some(Command::LongData),
            0x19 => Some(Command::CloseStmt),
            0x1a => Some(Command::ResetStmt),
            0x1b => Some(Command::SetOption),
            0x1c => Some(Command::End),
            _ => None,
        };
    }

    // Titlecased form shown in the Command column of SHOW PROCESSLIST.
    pub fn title(self) -> String {
        let name: &'static str = self.into();
        let mut chars = name.chars();
        return match chars.next() {
            Some(first) => first
                .to_uppercase()
                .chain(chars.flat_map(|c| c.to_lowercase()))
                .collect(),
            None => String::new(),
        };
    }
}

impl Into<&'static str> for Command {
    fn into(self) -> &'static str {
        return match self {
            Command::Sleep => "SLEEP",
            Command::Quit => "QUIT",
            Command::InitDb => "INIT_DB",
            Command::Query => "QUERY",
            Command::FieldList => "FIELD_LIST",
            Command::CreateDb => "CREATE_DB",
            Command::DropDb => "DROP_DB",
            Command::Refresh => "REFRESH",
            Command::Shutdown => "SHUTDOWN",
            Command::Statistics => "STATISTICS",
            Command::ProcessInfo => "PROCESS_INFO",
            Command::Connect => "CONNECT",
            Command::ProcessKill => "PROCESS_KILL",
            Command::Debug => "DEBUG",
            Command::Ping => "PING",
            Command::Time => "TIME",
            Command::DelayedInsert => "DELAYED_INSERT",
            Command::ChangeUser => "CHANGE_USER",
            Command::BinlogDump => "BINLOG_DUMP",
            Command::TableDump => "TABLE_DUMP",
            Command::ConnectOut => "CONNECT_OUT",
            Command::RegisterSlave => "REGISTER_SLAVE",
            Command::Prepare => "PREPARE",
            Command::Execute => "EXECUTE",
            Command::LongData => "LONG_DATA",
            Command::CloseStmt => "CLOSE_STMT",
            Command::ResetStmt => "RESET_STMT",
            Command::SetOption => "SET_OPTION",
            Command::End => "END",
        };
    }
}

impl ToString for Command {
    fn to_string(&self) -> String {
        let c: &'static str = (*self).into();
        c.to_string()
    }
}

// Error codes for server-side errors this gateway raises.
// Originally found in include/mysql/mysqld_error.h and
// https://dev.mysql.com/doc/refman/5.7/en/error-messages-server.html
#[derive(Copy, Clone)]
pub enum ServerError {
    // permissions
    ERDBAccessDenied = 1044,
    // invalid arg
    ERParseError = 1064,
    // unimplemented
    ERNotSupportedYet = 1235,
    // not found
    ERCorruptHelpDB = 1244,
}

// Sql states for errors.
// Originally found in include/mysql/sql_state.h
pub enum StateError {
    // SSUnknownSQLState is ER_SIGNAL_EXCEPTION in
    // include/mysql/sql_state.h, but:
    // const char *unknown_sqlstate= "HY000"
    // in client.c. So using that one.
    SSUnknownSQLState,
    // SSSyntaxError is ER_PARSE_ERROR
    SSSyntaxError,
}

impl Into<&'static str> for StateError {
    fn into(self) -> &'static str {
        return match self {
            StateError::SSUnknownSQLState => "HY000",
            StateError::SSSyntaxError => "42000",
        };
    }
}
