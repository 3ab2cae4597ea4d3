pub mod config;
pub mod error;
pub mod infra;
pub mod resolver;

pub use config::ResolverOptions;
pub use error::{LookupError, ResolverError};
pub use resolver::{
    AddressRecord, ResolutionOutcome, Resolver, ResolverRegistry, ResultListener, Status,
    StatusCode,
};
