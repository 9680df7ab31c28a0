//! Plain data types shared by the bulk engine crates: forests and partition
//! sets, documents, batches, snapshot timestamps and operation identifiers.

pub mod core;
pub mod partition;
pub mod records;
pub mod snapshot;
