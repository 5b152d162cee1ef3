mod acl;
mod jwt;
mod signature;

pub use acl::{AclMiddlewareFactory, AclMiddlewareService};
pub use jwt::{JwtAuthMiddlewareFactory, JwtAuthMiddlewareService};
pub use signature::{SignatureMiddlewareFactory, SignatureMiddlewareService};
