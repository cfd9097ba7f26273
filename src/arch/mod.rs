//! # Architecture Abstraction Layer
//!
//! Target clock for hosts running on bare-metal ARM. Only built for
//! `target_os = "none"`; hosted builds bring their own clock through
//! `Port::now()`.

pub mod cortex_m4;
