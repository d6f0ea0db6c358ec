mod codec;
#[expect(clippy::module_inception)]
mod connection;
mod response_stream;
mod tag_generator;

pub use codec::ResponseCode;
pub use codec::ResponseData;
pub use codec::Status;
pub use connection::Connection;
pub use connection::ImapTransport;
