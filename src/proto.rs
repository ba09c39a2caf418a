//! Generated gRPC stub for `proto/saleae.proto`.
//!
//! Both the client and the server halves are generated. The client backs
//! [`Manager`](crate::Manager); the server half is only useful for hosting a
//! stand-in application in tests.

#![allow(clippy::all, clippy::pedantic, clippy::nursery, missing_docs)]

tonic::include_proto!("saleae.automation");
