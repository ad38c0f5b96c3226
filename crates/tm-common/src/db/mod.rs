pub mod pool;
pub mod reference;
pub mod util;

pub use pool::{DbPoolError, PgPool, create_pool_from_url, ping};
pub use reference::{ReferenceFetchError, load_reference_snapshot};
