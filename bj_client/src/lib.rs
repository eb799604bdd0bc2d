//! Internal modules for the blackjack client.
//!
//! This library hosts the terminal UI used by the `bj_client` binary.

pub mod tui_app;
