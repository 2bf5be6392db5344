mod identifier;
mod migration;
mod resolver;

pub use identifier::{IdentifierError, TokenDigest, UserIdentifier, MAX_IDENTIFIER_LEN};
pub use migration::{plan_migration, EntryPair, MigrationDecision};
pub use resolver::{IdentifierResolver, IdentityBinding, IdentitySource, Resolution, SessionMaterial};
