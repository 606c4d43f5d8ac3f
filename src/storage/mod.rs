pub mod clickhouse;
pub mod definition;
pub mod finalize;
pub mod staging;
pub mod traits;

pub use clickhouse::ClickHouseClient;
pub use definition::{DefinitionError, Engine, EngineParams, TableDefinition};
pub use finalize::{finalize, FinalizeError, FinalizeOutcome};
pub use staging::{StagedFile, StagingError, StagingWriter};
pub use traits::{Store, StoreError};
