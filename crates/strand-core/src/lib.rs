//! Strand core: sender key ratchets with durable state.
//!
//! Builds the persistent, concurrency-safe layer on top of the pure ratchet
//! in `strand_crypto`:
//!
//! - [`SenderKeyService`]: create, install, export, encrypt, decrypt, delete
//! - [`JobQueue`]: strict FIFO serialization per (group, sender) pair
//! - [`Storage`]: synchronous record store with in-memory, redb and
//!   fault-injecting backends
//! - [`Environment`]: source of randomness (OS or seeded)
//!
//! # Example
//!
//! ```
//! use strand_core::{
//!     GroupId, MemoryStorage, SeededEnv, SenderIdentity, SenderKeyConfig, SenderKeyId,
//!     SenderKeyService,
//! };
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let id = SenderKeyId::new(GroupId::new("group"), SenderIdentity::new("alice"));
//!
//! let alice = SenderKeyService::new(MemoryStorage::new(), SeededEnv::new(1), SenderKeyConfig::default());
//! let bob = SenderKeyService::new(MemoryStorage::new(), SeededEnv::new(2), SenderKeyConfig::default());
//!
//! let share = alice.create_sender_key(&id).await?;
//! bob.install_sender_key(&id, &share).await?;
//!
//! let sealed = alice.encrypt(&id, b"hello").await?;
//! let plaintext = bob.decrypt(&id, sealed.index, &sealed.ciphertext).await?;
//! assert_eq!(plaintext, b"hello");
//! # Ok::<(), strand_core::ServiceError>(())
//! # }).unwrap();
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
pub mod env;
mod error;
mod id;
mod queue;
mod record;
mod service;
pub mod storage;
mod system_env;

pub use config::SenderKeyConfig;
pub use env::{Environment, SeededEnv};
pub use error::ServiceError;
pub use id::{GroupId, SenderIdentity, SenderKeyId};
pub use queue::{JobQueue, Turn};
pub use record::{RecordError, StoredSenderKey};
pub use service::{GroupCiphertext, SenderKeyService, SenderKeyShare};
pub use storage::{ChaoticStorage, FaultTarget, MemoryStorage, RedbStorage, Storage, StorageError};
pub use system_env::SystemEnv;
