//! Transport-neutral request handling.
//!
//! [`dispatch`] maps request/response operations onto the controller;
//! [`live`] answers messages on the live result channel.  A network
//! front end only has to move bytes to and from these two modules.

pub mod dispatch;
pub mod live;
