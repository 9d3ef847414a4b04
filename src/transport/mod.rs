//! Concrete adapters for the capability traits in `core`.

pub mod http_im;
pub mod http_mailer;
pub mod sqlite;

pub use http_im::HttpImGateway;
pub use http_mailer::HttpMailer;
pub use sqlite::SqliteEventStore;
