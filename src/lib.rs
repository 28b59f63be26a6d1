pub mod crypto;
pub mod db;
pub mod domain;
pub mod middleware;
pub mod services;
pub mod state;
pub mod time_utils;
pub mod web;

#[cfg(test)]
pub(crate) mod test_utils;
