use std::net::{SocketAddr, TcpStream};

use dakv_logger::prelude::*;

use crate::constants::{Command, ServerError, StateError, SERVER_STATUS_AUTOCOMMIT};
use crate::engine::Engine;
use crate::errors::{ProtoError, ProtoResult};
use crate::parser::{self, Statement};
use crate::proto::packets::Packets;
use crate::proto::process::ProcessSlot;
use crate::proto::{process, Auth, Greeting};
use crate::schema;
use crate::sql_type::{result_columns, SqlResult, Value};

const PROCESSLIST_SHAPE: &[(&str, &str)] = &[
    ("Id", "INTEGER"),
    ("User", "VARCHAR(16)"),
    ("Host", "VARCHAR(64)"),
    ("db", "VARCHAR(64)"),
    ("Command", "VARCHAR(16)"),
    ("Time", "INTEGER"),
    ("State", "VARCHAR(30)"),
    ("Info", "TEXT"),
];

/// One client connection: greeting, handshake response, then the
/// command loop, all blocking on the socket.
pub struct Connection {
    thread_id: u32,
    peer: SocketAddr,
    engine: Engine,
    packets: Packets,
    auth: Auth,
    schema: String,
    connected: bool,
    slot: ProcessSlot,
}

// Bytes up to the first NUL, or all of them. Command payloads carry
// their strings both ways.
fn payload_string(data: &[u8]) -> String {
    let data = match data.iter().position(|byte| *byte == 0) {
        Some(nul) => &data[..nul],
        None => data,
    };
    String::from_utf8_lossy(data).into_owned()
}

impl Connection {
    pub fn new(thread_id: u32, stream: TcpStream, engine: Engine) -> ProtoResult<Self> {
        let peer = stream.peer_addr()?;
        let slot = ProcessSlot::register(peer.port(), thread_id, peer.to_string());
        Ok(Connection {
            thread_id,
            peer,
            engine,
            packets: Packets::new(stream),
            auth: Auth::new(),
            schema: String::new(),
            connected: false,
            slot,
        })
    }

    pub fn handle(&mut self) -> ProtoResult<()> {
        let greeting = Greeting::new(self.thread_id, self.engine.version());
        let payload = greeting.write_handshake_v10()?;
        self.packets.write_packet(payload.as_slice())?;
        self.packets.flush()?;

        loop {
            let payload = self.packets.read_packet()?;

            if !self.connected {
                self.handle_handshake(payload.as_slice())?;
                continue;
            }

            let command = payload[0];
            self.slot.touch(command);

            match self.dispatch(command, &payload[1..]) {
                Err(ProtoError::ComQuit) => {
                    debug!("[{}] quit", self.thread_id);
                    return Ok(());
                }
                other => other?,
            }

            self.slot.touch(Command::Sleep as u8);
        }
    }

    fn handle_handshake(&mut self, payload: &[u8]) -> ProtoResult<()> {
        self.auth.parse_client_handshake_packet(payload)?;
        self.packets.set_capabilities(self.auth.capabilities());
        self.slot.set_username(self.auth.user());
        debug!("[{}] {}", self.thread_id, self.auth);

        if self.auth.wants_database() {
            let database = self.auth.database().to_string();
            self.use_schema(database.as_str())?;
        } else {
            self.packets.write_ok_packet(SERVER_STATUS_AUTOCOMMIT)?;
        }

        self.connected = true;
        self.slot.touch(Command::Sleep as u8);
        Ok(())
    }

    fn dispatch(&mut self, command: u8, payload: &[u8]) -> ProtoResult<()> {
        match Command::from_byte(command) {
            Some(Command::Quit) => Err(ProtoError::ComQuit),
            Some(Command::InitDb) => {
                let name = payload_string(payload);
                self.use_schema(name.as_str())
            }
            Some(Command::Query) => {
                let text = payload_string(payload);
                self.run_query(text.as_str())
            }
            Some(Command::Ping) => {
                self.packets.write_ok_packet(SERVER_STATUS_AUTOCOMMIT)?;
                Ok(())
            }
            Some(other) => {
                let name: &'static str = other.into();
                self.unsupported(name)
            }
            None => self.unsupported("UNKNOWN"),
        }
    }

    fn unsupported(&mut self, command: &str) -> ProtoResult<()> {
        error!("[{}] unsupported command {}", self.thread_id, command);
        self.packets.write_err_packet(
            ServerError::ERNotSupportedYet,
            StateError::SSSyntaxError,
            &format!("This version of SQLite doesn't yet support '{}'", command),
        )?;
        Ok(())
    }

    fn use_schema(&mut self, name: &str) -> ProtoResult<()> {
        if self.engine.databases().iter().any(|db| db == name) {
            self.packets.write_ok_packet(SERVER_STATUS_AUTOCOMMIT)?;
            self.schema = name.to_string();
            self.slot.set_schema(name);
        } else {
            self.access_denied(name)?;
        }
        Ok(())
    }

    fn access_denied(&mut self, database: &str) -> ProtoResult<()> {
        let message = format!(
            "Access denied for user '{}'@'{}' to database '{}'",
            self.auth.user(),
            self.peer.ip(),
            database
        );
        self.packets.write_err_packet(
            ServerError::ERDBAccessDenied,
            StateError::SSSyntaxError,
            message.as_str(),
        )?;
        Ok(())
    }

    fn run_query(&mut self, text: &str) -> ProtoResult<()> {
        let query = text.trim().trim_matches(';');
        info!("[{}] QUERY: {}", self.thread_id, query);

        let keyword = query.splitn(2, ' ').next().unwrap_or("").to_uppercase();

        if keyword == "SELECT" {
            return match self.engine.execute(query) {
                Ok(result) => {
                    self.packets
                        .write_result_set(&result, SERVER_STATUS_AUTOCOMMIT)?;
                    Ok(())
                }
                Err(ProtoError::Sql(err)) => self.engine_error(err),
                Err(err) => Err(err),
            };
        }

        let handled = match self.dispatch_admin(query) {
            Ok(handled) => handled,
            // a vanished table or broken file surfaces like any other
            // failed statement; the command loop survives
            Err(ProtoError::Sql(err)) => return self.engine_error(err),
            Err(err) => return Err(err),
        };

        if !handled {
            if keyword == "SET" {
                // session variables are accepted and ignored
                self.packets.write_ok_packet(SERVER_STATUS_AUTOCOMMIT)?;
            } else {
                let schema = self.schema.clone();
                self.access_denied(schema.as_str())?;
            }
        }
        Ok(())
    }

    fn engine_error(&mut self, err: rusqlite::Error) -> ProtoResult<()> {
        self.packets.write_err_packet(
            ServerError::ERParseError,
            StateError::SSSyntaxError,
            err.to_string().as_str(),
        )?;
        Ok(())
    }

    /// Answer a recognized administrative statement. `false` means the
    /// statement fell through to the refusal path.
    fn dispatch_admin(&mut self, query: &str) -> ProtoResult<bool> {
        let statement = match parser::recognize(query) {
            Some(statement) => statement,
            None => return Ok(false),
        };

        let result = match statement {
            Statement::ShowDatabases { .. } => schema::show_databases(&self.engine)?,
            Statement::ShowTables { .. } => schema::show_tables(&self.engine)?,
            Statement::ShowColumns { full, table, .. } => {
                let table = parser::extract_table(table.as_str());
                schema::show_columns(&self.engine, table.as_str(), full)?
            }
            Statement::ShowCreateTable { name } => {
                let table = parser::extract_table(name.as_str());
                schema::show_create_table(&self.engine, table.as_str())?
            }
            Statement::ShowIndex { table, .. } => {
                let table = parser::extract_table(table.as_str());
                schema::show_indexes(&self.engine, table.as_str())?
            }
            Statement::ShowVariables { .. } | Statement::ShowStatus { .. } => {
                schema::show_variables(&self.engine)?
            }
            Statement::ShowEngines => schema::show_engines(&self.engine)?,
            Statement::ShowCollation { .. } => schema::show_collation(&self.engine)?,
            Statement::ShowCharacterSet { .. } => schema::show_charset(&self.engine)?,
            Statement::ShowTableStatus { pattern, .. } => {
                schema::show_table_status(&self.engine, pattern.as_deref())?
            }
            Statement::ShowProcesslist { full } => self.process_list(full),
            Statement::Use { database } => {
                self.use_schema(database.as_str())?;
                return Ok(true);
            }
            Statement::Help { .. } => {
                self.packets.write_err_packet(
                    ServerError::ERCorruptHelpDB,
                    StateError::SSUnknownSQLState,
                    "Help database is corrupt or does not exist",
                )?;
                return Ok(true);
            }
            // recognized, but nothing answers it
            Statement::ShowCreateDatabase { .. } => return Ok(false),
        };

        self.packets
            .write_result_set(&result, SERVER_STATUS_AUTOCOMMIT)?;
        Ok(true)
    }

    fn process_list(&self, full: bool) -> SqlResult {
        let mut rows = vec![];
        for entry in process::snapshot() {
            if !full && entry.username.as_deref() != Some(self.auth.user()) {
                continue;
            }

            let command = match Command::from_byte(entry.command) {
                Some(command) => Value::Text(command.title()),
                None => Value::Null,
            };
            rows.push(vec![
                Value::Int(entry.thread_id as i64),
                entry.username.map(Value::Text).unwrap_or(Value::Null),
                Value::Text(entry.host),
                entry.schema.map(Value::Text).unwrap_or(Value::Null),
                command,
                Value::Int(entry.since.elapsed().as_secs() as i64),
                Value::Text(String::new()),
                Value::Null,
            ]);
        }

        SqlResult::new(result_columns(PROCESSLIST_SHAPE), rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_string() {
        assert_eq!(payload_string(b"main\0"), "main");
        assert_eq!(payload_string(b"SELECT 1"), "SELECT 1");
        assert_eq!(payload_string(b""), "");
    }
}
