pub mod config;
pub mod db;
pub mod error;
pub mod fetch;
pub mod load;
pub mod naming;
pub mod pipeline;
pub mod report;
pub mod server;
pub mod source;
pub mod sql;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::{Config, DbConfig};
pub use error::IngestError;
pub use pipeline::run;
pub use report::{RunReport, TableReport};
