//! End-to-end scenarios over a real SQLite store.

mod retrieval;
