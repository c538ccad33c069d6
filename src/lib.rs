// ABOUTME: Terminal front end for the parley chat relay client
// ABOUTME: CLI parsing, console commands, rendering, health probe and logging setup

pub mod cli;
pub mod console;
pub mod health;
pub mod logging;
pub mod view;
