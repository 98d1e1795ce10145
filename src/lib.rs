pub mod config;
pub mod error;
pub mod matcher;
pub mod objects;
pub mod poller;
pub mod runner;
pub mod schema;
pub mod summary;
pub mod table;
pub mod tally;

#[cfg(test)]
pub(crate) mod test_support;
