// # Prefix List Provider Implementations
//
// This module provides implementations of the PrefixListProvider trait that
// need no external service.

pub mod memory;

pub use memory::{MemoryPrefixListProvider, CREATE_ENTRY_LIMIT, DEFAULT_PAGE_SIZE};
