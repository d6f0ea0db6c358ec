mod capability;
mod not_authenticated;
mod session;

pub use capability::Capabilities;
pub use not_authenticated::Client;
pub use session::Session;
