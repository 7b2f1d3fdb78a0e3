mod header;
mod host;
mod jwt;

pub use header::{HeaderStrategy, TENANT_HEADER};
pub use host::HostStrategy;
pub use jwt::{JwtStrategy, TENANT_CLAIM};
