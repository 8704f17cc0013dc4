//! Core traits for the prefix-list sync system
//!
//! This module defines the abstract interfaces of the two external collaborators.
//!
//! - [`DnsLookup`]: Resolve a hostname to raw address strings
//! - [`PrefixListProvider`]: CRUD access to the remote managed prefix lists

pub mod dns_lookup;
pub mod prefix_list_provider;

pub use dns_lookup::DnsLookup;
pub use prefix_list_provider::{
    CreatePrefixList, EntryPage, ModifyPrefixList, PrefixListEntry, PrefixListProvider,
    PrefixListState, PrefixListSummary,
};
