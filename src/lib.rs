//! Message-driven Bluetooth LE profile task framework.
//!
//! Profiles run as cooperative tasks on a single-threaded [`kernel::Kernel`].
//! Each task instance is a finite-state machine that receives [`kernel::Msg`]
//! envelopes from the transport, the application, and other tasks. Client
//! profiles locate their peer service with the table-driven
//! [`gatt::Discovery`] engine and server profiles deliver notifications and
//! indications to every subscribed connection through [`gatt::FanOut`].

#![warn(missing_debug_implementations)]
#![warn(non_ascii_idents)]
#![warn(single_use_lifetimes)]
#![warn(unused_extern_crates)]
#![warn(unused_import_braces)]
#![warn(unused_lifetimes)]
#![warn(unused_qualifications)]
#![warn(clippy::nursery)]
#![warn(clippy::pedantic)]
#![allow(clippy::enum_glob_use)]
#![allow(clippy::inline_always)]
#![allow(clippy::module_name_repetitions)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::get_unwrap)]
#![warn(clippy::mod_module_files)]
#![warn(clippy::print_stdout)]
#![warn(clippy::str_to_string)]
#![warn(clippy::todo)]
#![warn(clippy::undocumented_unsafe_blocks)]

pub use prf::{Error, Result};
pub use store::*;

pub mod att;
pub mod gatt;
pub mod kernel;
pub mod le;
pub mod prf;
mod store;
mod util;
