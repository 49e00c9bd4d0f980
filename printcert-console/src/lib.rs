pub mod activate;
pub mod bundle;
pub mod delete;
pub mod handshake;
pub mod inventory;
pub mod resolver;
pub mod session;
pub mod submit;
pub mod token;
pub mod upload;

pub use activate::activate;
pub use bundle::{Bundle, build_bundle};
pub use delete::delete;
pub use inventory::{list_identifiers, list_records};
pub use resolver::{Strategy, resolve_active, resolve_with};
pub use session::{ConnectOptions, Session};
pub use upload::{upload, upload_bundle};
