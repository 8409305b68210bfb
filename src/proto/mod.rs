mod auth;
mod connection;
mod greeting;
mod listener;
mod packets;
pub mod process;

pub use self::auth::Auth;
pub use self::connection::Connection;
pub use self::greeting::Greeting;
pub use self::listener::Listener;
pub use self::packets::Packets;
