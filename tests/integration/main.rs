//! End-to-end behavior of the data-access facade.

mod mock_server;
mod service;
mod store_transport;
mod support;
