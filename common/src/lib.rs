#![cfg_attr(not(feature = "std"), no_std)]

pub mod mailbox;

pub use mailbox::*;
