//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a subsystem end to end
//! against mock nodes. Server tests bind real sockets on `127.0.0.1:0`.

mod mock_nodes;
mod protocol_tests;
mod server_tests;
mod task_tests;
