//! # RC Car Bridge Library
//!
//! Drive a USB-serial robot car with a gamepad.
//!
//! This library provides the core functionality for turning gamepad stick and
//! d-pad input into single-byte motion commands (`F`, `B`, `L`, `R`, `S`) and
//! writing them to an Arduino-class board over a 9600 baud serial link.

pub mod bridge;
pub mod config;
pub mod error;
pub mod protocol;
pub mod controller;
pub mod serial;
pub mod telemetry;
