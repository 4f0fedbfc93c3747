//! ESP32-S3 firmware-specific modules for wisp
//!
//! This crate contains the collaborators that cannot compile on desktop
//! targets: the WiFi station link, the SNTP client, the SSD1306 panel and the
//! credentials baked in at build time.

#![no_std]

pub mod network;
pub mod panel;
pub mod secrets;
pub mod sntp;
