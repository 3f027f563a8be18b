//! Integration tests for fragment documents, stores and reconciliation

mod folder_session;
mod reconciliation;
mod round_trip;
mod test_utils;
