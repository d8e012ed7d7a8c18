//! Endpoint upsert handler
//!
//! Promotes a model by creating a fresh, timestamp-named endpoint
//! configuration and swapping it under the workload's stable endpoint. The
//! endpoint keeps serving its previous configuration until the swap
//! completes. Previous configurations are never deleted.
//!
//! The update-or-create sequence is not atomic: two promotions of the same
//! workload racing each other can both observe a missing endpoint, and the
//! second create then fails upstream. Promotions are expected to arrive one
//! at a time.

mod handler;

pub use handler::{
    config_name, EndpointUpsertEvent, EndpointUpsertHandler, UpsertAction, UpsertOutcome,
    CONFIG_TIMESTAMP_FORMAT,
};
