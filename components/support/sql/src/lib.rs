/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

#![allow(unknown_lints)]
#![warn(rust_2018_idioms)]

//! Helpers shared by components that keep their state in SQLite: a
//! connection extension trait, bound-parameter chunking, SQL variable list
//! builders and a versioned schema opener.

#[macro_use]
extern crate lazy_static;

mod conn_ext;
mod each_chunk;
pub mod open_database;
mod repeat;

pub use crate::conn_ext::*;
pub use crate::each_chunk::*;
pub use crate::repeat::*;
