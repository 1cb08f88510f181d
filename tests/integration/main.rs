//! Integration tests for repository queries against the in-memory store
//! and a recording SQL store.

mod helpers;

mod audit_test;
mod bulk_test;
mod graph_test;
mod member_test;
mod paging_test;
mod spec_test;
mod template_test;
