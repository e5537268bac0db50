pub mod config_snapshot;
pub mod database;
pub mod decryption;
pub mod error;
pub mod jwt;
pub mod memory;
pub mod metrics;
pub mod profile;
pub mod redis;
pub mod search;
pub mod store;

pub use config_snapshot::{ConfigRefresher, SnapshotStore};
pub use database::Database;
pub use decryption::{Decryptor, HttpDecryptor, MockDecryptor};
pub use error::ServiceError;
pub use jwt::{ManagedTokenService, MockTokenIssuer, TokenIssuer};
pub use memory::MemoryStore;
pub use profile::{Collaborators, ProfileReadService};
pub use redis::{ConfigCache, MockConfigCache, RedisService};
pub use search::{HttpLocationSearch, LocationSearch, MockLocationSearch};
pub use store::{ExternalIdentityStore, ProfileStore};
