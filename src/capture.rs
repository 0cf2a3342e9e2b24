//! Live capture through `pcap`
//!
//! Packets are read from a device, optionally narrowed by a BPF filter, until `count` packets
//! were seen or the timeout ran out. Every frame can be saved to a pcap file as it arrives and
//! gets one summary line on the output.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use pcap::{Active, Capture, Device, Linktype};

use crate::errors::Error;
use crate::packet::{Packet, PacketMetadata, Timestamp};
use crate::types::EncapType;

// pcap read timeout, so that the overall timeout is checked regularly.
const READ_TIMEOUT_MS: i32 = 100;

const SNAPLEN: i32 = 65535;

#[derive(Debug, Clone, PartialEq)]
pub struct CaptureConfig {
    /// Device to capture on, the default device if `None`.
    pub interface: Option<String>,
    /// BPF filter expression, e.g. `tcp port 80`.
    pub filter: Option<String>,
    /// Stop after this many packets.
    pub count: usize,
    /// Stop after this long, even if fewer than `count` packets arrived.
    pub timeout: Option<Duration>,
    /// Save every captured frame to this pcap file.
    pub output: Option<PathBuf>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            interface: None,
            filter: None,
            count: 10,
            timeout: None,
            output: None,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct CaptureStats {
    pub packets: usize,
    pub bytes: usize,
    /// Frames whose dissection failed; they are still counted and saved.
    pub undecoded: usize,
}

fn capture_error(e: pcap::Error) -> Error {
    let message = e.to_string();
    if message.contains("ermission") || message.contains("not permitted") {
        Error::PermissionDenied(format!(
            "{}: capturing needs root or CAP_NET_RAW and CAP_NET_ADMIN",
            message
        ))
    } else {
        Error::Capture(message)
    }
}

// Encap types are numbered like pcap link types: Ethernet is 1, raw IPv4 is 228.
fn encap_for(linktype: Linktype) -> EncapType {
    linktype.0 as EncapType
}

fn open(config: &CaptureConfig) -> Result<Capture<Active>, Error> {
    let device = match &config.interface {
        Some(name) => Device::from(name.as_str()),
        None => Device::lookup()
            .map_err(capture_error)?
            .ok_or_else(|| Error::Capture("no capture device available".to_string()))?,
    };
    log_debug!("capturing on {}", device.name);

    let mut cap = Capture::from_device(device)
        .map_err(capture_error)?
        .promisc(true)
        .snaplen(SNAPLEN)
        .timeout(READ_TIMEOUT_MS)
        .immediate_mode(true)
        .open()
        .map_err(capture_error)?;

    if let Some(filter) = &config.filter {
        cap.filter(filter, true).map_err(capture_error)?;
    }
    Ok(cap)
}

fn to_packet(header: &pcap::PacketHeader, data: &[u8], encap: EncapType) -> Result<Packet, Error> {
    let mut packet = Packet::from_bytes(data, encap)?;
    packet.set_meta(PacketMetadata {
        timestamp: Timestamp {
            secs: header.ts.tv_sec as i64,
            usecs: header.ts.tv_usec as i64,
        },
        len: header.len,
        caplen: header.caplen,
    });
    Ok(packet)
}

/// `   1 1700000000.000042    74 bytes  Ethernet ... / IPv4 ... / TCP ...`
pub fn summary_line(index: usize, packet: &Packet) -> String {
    let meta = packet.meta();
    format!(
        "{:>4} {}.{:06} {:>5} bytes  {}",
        index,
        meta.timestamp.secs,
        meta.timestamp.usecs,
        meta.len,
        packet.summary()
    )
}

/// Capture per `config`, writing one line per packet to `out`.
pub fn capture<W: Write>(config: &CaptureConfig, out: &mut W) -> Result<CaptureStats, Error> {
    let mut cap = open(config)?;
    let encap = encap_for(cap.get_datalink());

    let mut savefile = match &config.output {
        Some(path) => Some(cap.savefile(path).map_err(capture_error)?),
        None => None,
    };

    let deadline = config.timeout.map(|t| Instant::now() + t);
    let mut stats = CaptureStats::default();

    while stats.packets < config.count {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            log_debug!("capture timeout after {} packets", stats.packets);
            break;
        }

        let frame = match cap.next_packet() {
            Ok(frame) => frame,
            Err(pcap::Error::TimeoutExpired) => continue,
            Err(e) => return Err(capture_error(e)),
        };

        if let Some(savefile) = savefile.as_mut() {
            savefile.write(&frame);
        }

        stats.packets += 1;
        stats.bytes += frame.data.len();

        match to_packet(frame.header, frame.data, encap) {
            Ok(packet) => writeln!(out, "{}", summary_line(stats.packets, &packet))?,
            Err(e) => {
                stats.undecoded += 1;
                writeln!(
                    out,
                    "{:>4} {}.{:06} {:>5} bytes  (undecoded: {})",
                    stats.packets,
                    frame.header.ts.tv_sec,
                    frame.header.ts.tv_usec,
                    frame.header.len,
                    e
                )?;
            }
        }
    }

    if let Some(mut savefile) = savefile {
        savefile.flush().map_err(capture_error)?;
    }
    Ok(stats)
}

/// Read every packet of a pcap file, dissected per the file's link type.
pub fn read_capture_file<P: AsRef<Path>>(path: P) -> Result<Vec<Packet>, Error> {
    let mut cap = Capture::from_file(path).map_err(capture_error)?;
    let encap = encap_for(cap.get_datalink());

    let mut packets = vec![];
    loop {
        match cap.next_packet() {
            Ok(frame) => packets.push(to_packet(frame.header, frame.data, encap)?),
            Err(pcap::Error::NoMorePackets) => break,
            Err(e) => return Err(capture_error(e)),
        }
    }
    log_debug!("read {} packets", packets.len());
    Ok(packets)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Classic pcap: little endian magic, version 2.4, snaplen 65535, Ethernet.
    fn pcap_file(frames: &[(u32, u32, &[u8])]) -> Vec<u8> {
        let mut out = hex::decode("d4c3b2a1020004000000000000000000ffff000001000000").unwrap();
        for (secs, usecs, data) in frames {
            out.extend(secs.to_le_bytes());
            out.extend(usecs.to_le_bytes());
            out.extend((data.len() as u32).to_le_bytes());
            out.extend((data.len() as u32).to_le_bytes());
            out.extend(*data);
        }
        out
    }

    #[test]
    fn read_back_capture_file() {
        let _ = crate::register_defaults();

        let arp = hex::decode(
            "ffffffffffff00010203040508060001080006040001000102030405c0a80101000000000000c0a80102",
        )
        .unwrap();
        let path = std::env::temp_dir().join(format!("wirelens-{}.pcap", std::process::id()));
        std::fs::write(&path, pcap_file(&[(1_700_000_000, 42, &arp[..])])).unwrap();

        let packets = read_capture_file(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].meta().len, 42);
        assert_eq!(
            summary_line(1, &packets[0]),
            format!("   1 1700000000.000042    42 bytes  {}", packets[0].summary())
        );
        assert_eq!(packets[0].layers()[1].name(), "ARP");
    }

    #[test]
    fn missing_file_is_a_capture_error() {
        let err = read_capture_file("/nonexistent/wirelens.pcap").unwrap_err();
        assert!(matches!(err, Error::Capture(_)), "{:?}", err);
    }
}
