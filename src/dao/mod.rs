/// Quiz repository boundary and its in-memory implementation.
pub mod quiz_store;
