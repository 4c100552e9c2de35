//! Issue editor engine for a newsletter curation CMS.
//!
//! A curator assembles an issue by dragging links between an unassigned pool
//! and topic buckets, editing link text inline, deleting links, and creating
//! new ones. Every change is buffered locally and sent to the GraphQL backend
//! as one batch on save, or thrown away on discard. Links created before the
//! server has answered carry temporary ids that are migrated in place once the
//! real id arrives.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`editor`] | [`editor::IssueEditor`], the surface the presentation layer drives |
//! | [`issue`] | Snapshot data model, ids, link patches, URL validation |
//! | [`buckets`] | Ordered partition of link ids across buckets |
//! | [`buffer`] | Pending edits, deletions, moves, and the merge view |
//! | [`identity`] | Temporary id allocation and resolution |
//! | [`drag`] | Drag gesture state and drop outcomes |
//! | [`collision`] | Drop zone registry and target resolution |
//! | [`geometry`] | Points and rectangles |
//! | [`commit`] | Save state machine, commit plan, concurrent execution |
//! | [`source`] | [`source::DataSource`] trait and the query cache |
//! | [`graphql`] | `reqwest` GraphQL client implementing the data source |
//! | [`config`] | Backend configuration from environment variables |
//! | [`consts`] | Reserved identifiers, env var names, defaults |

pub mod buckets;
pub mod buffer;
pub mod collision;
pub mod commit;
pub mod config;
pub mod consts;
pub mod drag;
pub mod editor;
pub mod geometry;
pub mod graphql;
pub mod identity;
pub mod issue;
pub mod source;
