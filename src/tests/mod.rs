//! Cross-module tests: rehearsal through the failover pool and content
//! resolver, wired the way the CLI wires them.

mod rehearsal_tests;
