pub mod client;
pub mod writer;

pub use client::StoreClient;
pub use writer::RawPostWriter;
