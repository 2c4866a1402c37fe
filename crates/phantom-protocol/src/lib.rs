//! Text protocol of the Phantom camera control connection.
//!
//! - [`value`]: the parameter language (`Value`, `TaggedList`) and its renderer
//! - [`parser`]: recursive-descent parser for the same language
//! - [`command`]: command lines and their builder
//! - [`response`]: success/error markers and multi-line splitting
//! - [`codec`]: CRLF line framing for `tokio_util::codec::Framed`
//! - [`discovery`]: the UDP discovery datagram format

pub mod codec;
pub mod command;
pub mod discovery;
pub mod parser;
pub mod response;
pub mod value;

pub use codec::ControlCodec;
pub use command::{Arguments, Command, CommandBuilder};
pub use discovery::CameraInfo;
pub use parser::{parse, parse_tagged_list};
pub use response::{format_error, format_ok, is_ack, parse_response, parse_response_params, strip_marker};
pub use value::{DottedName, TaggedList, Value};
