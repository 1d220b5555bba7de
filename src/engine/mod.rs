//! # Engine Module
//!
//! Modulo che separa le responsabilità del motore di conversione in sottomoduli:
//! - `batch_engine`: Orchestratore principale (sessione)
//! - `worker_pool`: Pool di worker e coda dei task
//! - `task_converter`: Pipeline per singolo file
//! - `completion`: Aggregazione esiti e evento di completamento
//! - `path_resolver`: Logica di calcolo path centralizzata

pub mod batch_engine;
pub mod completion;
pub mod path_resolver;
pub mod task_converter;
pub mod worker_pool;

pub use batch_engine::BatchEngine;
pub use completion::{BatchHandle, BatchId, BatchResult, CompletionAggregator, ItemOutcome};
pub use path_resolver::{OutputOwners, PathResolver};
pub use worker_pool::WorkerPool;
