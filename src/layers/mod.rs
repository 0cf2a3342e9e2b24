//! Wirelens Layers

use std::sync::OnceLock;

use crate::errors::Error;

pub mod arp;
pub mod dns;
pub mod ethernet;
pub mod icmp;
pub mod ipv4;
pub mod tcp;
pub mod tls;
pub mod udp;

/// Register Default protocol handlers.
///
/// Each [`crate::layer::Layer`] in `wirelens` will be decoded by a certain field in the lower
/// layer for which this particular layer is a payload. For example, [`ipv4::IPv4`] is a payload
/// for [`ethernet::Ethernet`]. Thus while decoding a particular layer, the next layer to be
/// decoded is determined by a value of certain field in the current layer. In the example above,
/// EtherType in the Ethernet header determines the next layer (EtherType: 0x0800 corresponds to
/// [`ipv4::IPv4`]). Applications are picked by well known port: UDP 53 is [`dns::DNS`], TCP 443
/// is [`tls::TLS`].
///
/// Registration happens once per process, later calls return the result of the first one.
///
/// When a new layer is defined outside the crate, that particular layer may use a `register_*`
/// function in it's lower layer to request it's dissection. This glues all the dissectors for the
/// layers together.
pub fn register_defaults() -> Result<(), Error> {
    static REGISTERED: OnceLock<Result<(), String>> = OnceLock::new();

    REGISTERED
        .get_or_init(|| {
            register_all().map_err(|e| {
                log_error!("registering default dissectors: {}", e);
                e.to_string()
            })
        })
        .clone()
        .map_err(Error::RegisterError)
}

fn register_all() -> Result<(), Error> {
    ethernet::register_defaults()?;
    arp::register_defaults()?;
    ipv4::register_defaults()?;
    icmp::register_defaults()?;
    tcp::register_defaults()?;
    udp::register_defaults()?;
    dns::register_defaults()?;
    tls::register_defaults()?;

    log_debug!("default dissectors registered");
    Ok(())
}
