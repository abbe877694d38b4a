#[macro_use]
extern crate log;
#[macro_use]
extern crate derive_builder;
#[macro_use]
extern crate lazy_static;

pub mod browser_controller;
pub mod driver;
pub mod harvester;
pub mod locators;
pub mod paginator;
pub mod runner;
pub mod store;
pub mod types;
pub mod utils;

#[cfg(test)]
mod testing;
