//! Test suites for the fleet hub server.

mod support;
