//! Frame codec tests, grouped by protocol

mod checksum_tests;
mod sensor_tests;
mod switch_tests;
