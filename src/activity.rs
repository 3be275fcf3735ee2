//! Group activity definitions.
//!
//! A group activity is the plug-in type a handler is parameterised with: it
//! names the shared experience (its identifier) and describes it for discovery
//! (its metadata). The [`catalog`] submodule holds the two sample activities.

pub mod catalog;
pub mod descriptor;

pub use descriptor::{ActivityCategory, ActivityDescriptor, ActivityMetadata, GroupActivity};
