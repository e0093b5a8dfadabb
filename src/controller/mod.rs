//! # Controller Module
//!
//! Gamepad input handling.
//!
//! This module handles:
//! - Gamepad detection and event reading via evdev
//! - Decoding stick and d-pad events
//! - Applying the deadzone
//! - Mapping input to motion commands and relaying them to the car

pub mod calibration;
pub mod command_mapper;
pub mod gamepad;
pub mod mapper;
