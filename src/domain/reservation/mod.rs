pub mod connection;
pub mod promise;
