pub mod cli;
pub mod config;
pub mod embedding;
pub mod legacy;
pub mod logging;
pub mod migration;
pub mod store;
pub mod types;

pub use config::{ConfigError, Settings};
pub use embedding::{
    EmbeddingCache, EmbeddingError, EmbeddingProvider, FastEmbedProvider, OpenAiProvider,
    ProviderInfo, select_provider,
};
pub use legacy::{LegacyError, LegacyStoreReader, LoadReport, StoreAnalysis};
pub use migration::{
    MigrationError, MigrationOptions, MigrationOrchestrator, MigrationReport, MigrationStage,
};
pub use store::{
    InMemoryIndex, PineconeIndex, StoreError, UpsertReport, VectorIndex, VectorStoreManager,
};
pub use types::{DocumentChunk, Embedding, QueryMatch, RecordMetadata, VectorRecord};
