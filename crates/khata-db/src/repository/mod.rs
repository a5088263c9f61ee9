//! # Repository Layer
//!
//! One repository per aggregate, all stateless handles over the shared pool.
//!
//! ## Read / Write Convention
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Reads:   async fn xxx(&self, ...) -> StoreResult<T>                   │
//! │           Run on any pool connection; no transaction.                  │
//! │                                                                         │
//! │  Writes:  async fn xxx(&self, w: &mut StoreWriter, ...) -> ...         │
//! │           Run inside the writer's transaction and stage a              │
//! │           ChangeEvent that fires on commit.                            │
//! │                                                                         │
//! │  The signature is the rule: a method without a StoreWriter             │
//! │  parameter cannot mutate the store.                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod chat;
pub mod credit;
pub mod customer;
pub mod product;
pub mod receipt;
