//! Build a TCP SYN packet from scratch and look at every byte of it.
//!
//! Sending (`--send`) needs root or `CAP_NET_RAW`:
//!
//! ```text
//! cargo build --example tcp_syn && sudo ./target/debug/examples/tcp_syn --send
//! ```

use std::error::Error;

use clap::Parser;
use serde::Serialize;

use wirelens::builder::PacketBuilder;
use wirelens::layers::ipv4::IPv4;
use wirelens::layers::tcp::{TCP, TCP_FLAG_SYN};
use wirelens::lesson::{Faq, Lesson};
use wirelens::types::IPv4Address;
use wirelens::view::PacketView;
use wirelens::Packet;

const SRC: [u8; 4] = [127, 0, 0, 1];
const DST: [u8; 4] = [127, 0, 0, 1];
const SPORT: u16 = 54321;
const DPORT: u16 = 80;
const SEQ: u32 = 1000;
const WINDOW: u16 = 65535;

#[derive(Parser, Debug)]
#[command(version, about = "Build a TCP SYN packet and show every byte")]
struct Args {
    /// Send the packet through a raw socket (needs root or CAP_NET_RAW).
    #[arg(long)]
    send: bool,

    /// Print the packet and its annotations as JSON instead of text.
    #[arg(long)]
    json: bool,

    /// Leave out the questions and answers.
    #[arg(long)]
    no_faq: bool,
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    packet: &'a Packet,
    view: PacketView<'a>,
}

const KEY_CONCEPTS: &[&str] = &[
    "Protocols are structured bytes with agreed-upon meanings",
    "The builder fills in lengths, protocol numbers and checksums",
    "Defaults are sensible: version 4, TTL 64, window 8192",
    "Any field can be set explicitly and is then left alone",
    "Stacking IPv4 then TCP means \"TCP inside IPv4\"",
    "Raw sockets need root privileges, because they can forge anything",
];

const FAQ: &[Faq] = &[
    Faq::new(
        "Why does sending need root?",
        "A raw socket lets a program write any header it likes, including a forged\n\
         source address. Operating systems keep that behind a privilege: root, or\n\
         CAP_NET_RAW on Linux. Without it the send fails with 'permission denied'.",
    ),
    Faq::new(
        "What does stacking IPv4 and then TCP do?",
        "Each layer is encoded in front of the bytes of the layers above it. TCP\n\
         goes first, then IPv4 wraps it, the same way the kernel does it: your data\n\
         inside TCP, TCP inside IP, IP inside Ethernet.",
    ),
    Faq::new(
        "Where do the values I did not set come from?",
        "Every layer has defaults (TTL 64, window 8192, IP id 1). Lengths, the IP\n\
         protocol number and both checksums are computed while the packet is\n\
         built, unless you set them, in which case your value goes out as-is. That\n\
         is how you build deliberately broken packets for testing.",
    ),
    Faq::new(
        "What is a checksum?",
        "The one's complement of the one's complement sum of the 16-bit words of a\n\
         header. The receiver adds everything up again, checksum included, and\n\
         expects 0xFFFF; a flipped bit anywhere shows up as a mismatch. TCP also\n\
         covers a pseudo header with the IP addresses, so a segment delivered to the\n\
         wrong host is caught as well.",
    ),
    Faq::new(
        "Will anything answer this SYN?",
        "Only if something listens on port 80. A listener answers SYN+ACK, a closed\n\
         port answers RST+ACK. The kernel did not open this connection itself, so it\n\
         will reset it when the SYN+ACK arrives.",
    ),
];

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = Args::parse();

    let _ = wirelens::register_defaults();

    let ip = IPv4::new(IPv4Address::from(SRC), IPv4Address::from(DST));
    let tcp = TCP::new(SPORT, DPORT)
        .seq_no(SEQ)
        .flags(TCP_FLAG_SYN)
        .window(WINDOW);
    let packet = PacketBuilder::new()
        .stack(Box::new(ip))?
        .stack(Box::new(tcp))?
        .build()?;

    if args.json {
        let output = JsonOutput {
            packet: &packet,
            view: packet.view()?,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let stdout = std::io::stdout();
    let mut lesson = Lesson::new(stdout.lock());

    lesson.section("BUILDING A TCP SYN PACKET")?;
    lesson.key_concepts(KEY_CONCEPTS)?;

    lesson.example("IPv4 / TCP, flags SYN, seq 1000, 127.0.0.1:54321 > 127.0.0.1:80")?;
    lesson.packet(&packet)?;

    let b = packet.as_bytes();
    lesson.example("Byte-by-byte breakdown")?;
    lesson.line("IPv4 header (bytes 0-19):")?;
    lesson.line(&format!(
        "  Byte 0:      {:02X}          = version {}, IHL {} ({} bytes)",
        b[0],
        b[0] >> 4,
        b[0] & 0x0f,
        (b[0] & 0x0f) * 4
    ))?;
    lesson.line(&format!(
        "  Bytes 2-3:   {:02X} {:02X}       = total length {}",
        b[2],
        b[3],
        u16::from_be_bytes([b[2], b[3]])
    ))?;
    lesson.line(&format!("  Byte 8:      {:02X}          = TTL {}", b[8], b[8]))?;
    lesson.line(&format!(
        "  Byte 9:      {:02X}          = protocol {} (TCP)",
        b[9], b[9]
    ))?;
    lesson.line("  Bytes 12-15: source address, bytes 16-19: destination address")?;
    lesson.blank()?;
    lesson.line("TCP header (bytes 20-39):")?;
    lesson.line(&format!(
        "  Bytes 20-21: {:02X} {:02X}       = source port {}",
        b[20], b[21], SPORT
    ))?;
    lesson.line(&format!(
        "  Bytes 22-23: {:02X} {:02X}       = destination port {}",
        b[22], b[23], DPORT
    ))?;
    lesson.line(&format!(
        "  Bytes 24-27: {:02X} {:02X} {:02X} {:02X} = sequence number {}",
        b[24], b[25], b[26], b[27], SEQ
    ))?;
    lesson.line(&format!(
        "  Byte 33:     {:02X}          = flags (SYN only)",
        b[33]
    ))?;

    if args.send {
        lesson.example("Sending")?;
        lesson.flush()?;
        match wirelens::net::send(&packet) {
            Ok(sent) => {
                lesson.line(&format!("Packet sent ({} bytes).", sent))?;
                lesson.line("To see it: sudo tcpdump -i lo -nn -X port 80")?;
            }
            Err(e) => {
                lesson.line(&format!("Send failed: {}", e))?;
                lesson.flush()?;
                std::process::exit(1);
            }
        }
    }

    lesson.blank()?;
    lesson.section("PROTOCOL REALITY CHECK")?;
    lesson.line(&format!("This {} byte packet holds:", packet.len()))?;
    lesson.bullets(&[
        "a 20 byte IPv4 header (10 fields)",
        "a 20 byte TCP header (10 fields)",
        "no data at all",
    ])?;
    lesson.line("By hand you would pack 20 fields in network byte order, compute the IP")?;
    lesson.line("checksum over bytes 0-19 and the TCP checksum over a pseudo header plus")?;
    lesson.line("bytes 20-39. Protocols are byte layouts; the builder does the tedium.")?;

    if !args.no_faq {
        lesson.faq(FAQ)?;
    }
    lesson.flush()?;

    Ok(())
}
