#![allow(unused_macros)]

macro_rules! cfg_capture {
    ($($item:item)*) => {
        $(
            #[cfg(feature = "capture")]
            $item
        )*
    }
}

// Logging goes through these so call sites don't need a `cfg` each. Without the `logging`
// feature the arguments are not evaluated.
macro_rules! log_debug {
    ($($arg:tt)+) => {{
        #[cfg(feature = "logging")]
        {
            log::debug!($($arg)+);
        }
    }};
}

macro_rules! log_warn {
    ($($arg:tt)+) => {{
        #[cfg(feature = "logging")]
        {
            log::warn!($($arg)+);
        }
    }};
}

macro_rules! log_error {
    ($($arg:tt)+) => {{
        #[cfg(feature = "logging")]
        {
            log::error!($($arg)+);
        }
    }};
}
