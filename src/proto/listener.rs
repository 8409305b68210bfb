use std::net::{SocketAddr, TcpListener, ToSocketAddrs};
use std::path::PathBuf;
use std::thread;

use dakv_logger::prelude::*;

use crate::engine::Engine;
use crate::errors::{ProtoError, ProtoResult};
use crate::proto::Connection;

/// Accepts clients and runs one handler thread per connection. Every
/// handler opens its own read-only engine handle on the same file.
pub struct Listener {
    listener: TcpListener,
    filename: PathBuf,
    connection_id: u32,
}

impl Listener {
    pub fn bind<Addr: ToSocketAddrs>(addr: Addr, filename: PathBuf) -> ProtoResult<Self> {
        let listener = TcpListener::bind(addr)?;
        Ok(Listener {
            listener,
            filename,
            connection_id: 0,
        })
    }

    pub fn local_addr(&self) -> ProtoResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn accept(&mut self) {
        info!("listening on {:?}", self.listener.local_addr());
        for stream in self.listener.incoming() {
            let connection_id = self.connection_id;
            self.connection_id = self.connection_id.wrapping_add(1);
            let filename = self.filename.clone();

            match stream {
                Ok(stream) => {
                    thread::spawn(move || {
                        let engine = match Engine::open(filename.as_path()) {
                            Ok(engine) => engine,
                            Err(err) => {
                                error!("[{}] engine open failed: {}", connection_id, err);
                                return;
                            }
                        };
                        let result = Connection::new(connection_id, stream, engine)
                            .and_then(|mut conn| conn.handle());
                        match result {
                            Ok(()) => debug!("[{}] closed", connection_id),
                            // short reads mean the peer just went away
                            Err(ProtoError::Io(err)) => {
                                debug!("[{}] disconnected: {}", connection_id, err)
                            }
                            Err(err) => error!("[{}] handler failed: {}", connection_id, err),
                        }
                    });
                }
                Err(err) => {
                    error!("accept failed: {}", err);
                }
            }
        }
    }
}
