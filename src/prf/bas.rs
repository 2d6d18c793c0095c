//! Battery Service ([BAS]).

pub use {client::*, server::*};

use super::{Client, Server};

mod client;
mod server;

/// Battery Service client task with one instance per connection.
pub type BasClient = Client<BatteryClient>;

/// Battery Service server task.
pub type BasServer = Server<BatteryServer>;
