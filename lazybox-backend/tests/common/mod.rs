#![allow(dead_code)]

mod test_store;

pub use test_store::TestStore;
