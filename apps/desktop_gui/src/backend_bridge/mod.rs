//! Backend bridge: command queue types and the worker thread that owns the controller.

pub mod commands;
pub mod runtime;
