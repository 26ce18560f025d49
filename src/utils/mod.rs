//! Stateless helpers the executor builds requests with.

pub mod headers;
pub mod key;
pub mod path;
pub mod plural;
pub mod query;

pub use headers::default_headers;
pub use key::{default_minter, mint_key, KeyMinter, RequestKey, SequentialKeyMinter};
pub use path::join_path;
pub use plural::pluralize;
pub use query::serialize_query;
