#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![doc = include_str!("../README.md")]

extern crate alloc;

// must stay first so the logging macros are visible to every module
#[macro_use]
mod fmt;

use device::Device;
use mac::config;

pub mod device;
pub mod mac;
pub mod node;
pub mod time;

/// Any failure of a node: a collaborator, the protocol or the configuration.
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[allow(missing_docs)]
pub enum Error<D>
where
    D: Device,
{
    Device(device::Error<D>),
    Mac(mac::Error),
    Config(config::Error),
}
