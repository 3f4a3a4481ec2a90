//! Network front end for ArborDB.
//!
//! Clients send one statement per line; the server parses it, runs it
//! against the shared catalog and answers with zero or more text lines
//! followed by `END`.

mod codec;
mod executor;
mod listener;
mod parser;
mod statement;
mod users;

pub use codec::{unescape_line, CodecError, LineCodec, END_MARKER};
pub use executor::{ClientState, Executor, Response};
pub use listener::Server;
pub use parser::parse;
pub use statement::{KeyFilter, Statement};
pub use users::{UserStore, DEFAULT_ACCOUNT};
