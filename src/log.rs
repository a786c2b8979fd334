//! Thin forwarding shim over the `log` facade, mirroring the five levels the
//! original driver logged at (DEBUG/MSG/WARNING/ERROR/SUCCESS). `log` has no
//! distinct "success" level, so `success!` forwards to `info!` with a
//! prefix.

#![macro_use]
#![allow(unused_macros)]

macro_rules! debug {
    ($($arg:tt)*) => { ::log::debug!($($arg)*) };
}

macro_rules! msg {
    ($($arg:tt)*) => { ::log::info!($($arg)*) };
}

macro_rules! warning {
    ($($arg:tt)*) => { ::log::warn!($($arg)*) };
}

macro_rules! error {
    ($($arg:tt)*) => { ::log::error!($($arg)*) };
}

macro_rules! success {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {
        ::log::info!(concat!("success: ", $fmt) $(, $arg)*)
    };
}
