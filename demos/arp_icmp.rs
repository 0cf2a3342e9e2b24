//! ARP and ICMP: how a host finds its neighbour's MAC address, and what ping puts on the wire.
//!
//! `--send` pings the target through a raw socket and waits for the echo reply, which needs root
//! or `CAP_NET_RAW`.

use std::error::Error;
use std::io::Write;
use std::time::Duration;

use clap::Parser;

use wirelens::builder::PacketBuilder;
use wirelens::layers::arp::ARP;
use wirelens::layers::ethernet::Ethernet;
use wirelens::layers::icmp::ICMP;
use wirelens::layers::ipv4::IPv4;
use wirelens::lesson::{Faq, Lesson};
use wirelens::types::{IPv4Address, MACAddress};

const HOST_MAC: [u8; 6] = [0x02, 0x00, 0x00, 0xaa, 0xbb, 0xcc];
const HOST_IP: [u8; 4] = [192, 168, 1, 100];
const GATEWAY_IP: [u8; 4] = [192, 168, 1, 1];
const PING_ID: u16 = 0x1234;
const PING_PAYLOAD: &[u8] = b"wirelens ping payload";

#[derive(Parser, Debug)]
#[command(version, about = "ARP requests and ICMP echo, byte by byte")]
struct Args {
    /// Host to ping.
    #[arg(long, default_value = "127.0.0.1")]
    target: IPv4Address,

    /// Source address of the echo request.
    #[arg(long, default_value = "127.0.0.1")]
    source: IPv4Address,

    /// Send the echo request and wait for the reply (needs root or CAP_NET_RAW).
    #[arg(long)]
    send: bool,

    /// How long to wait for the reply, in milliseconds.
    #[arg(long, default_value_t = 2000)]
    timeout: u64,

    /// Leave out the questions and answers.
    #[arg(long)]
    no_faq: bool,
}

const KEY_CONCEPTS: &[&str] = &[
    "IP addresses route between networks, MAC addresses deliver on one link",
    "ARP asks the whole link who owns an IP address, the owner answers",
    "ARP sits directly on Ethernet, there is no IP header",
    "ICMP carries control messages such as echo (ping) and unreachable",
    "An echo reply carries the identifier and sequence of the request",
];

const FAQ: &[Faq] = &[
    Faq::new(
        "Why is the ARP request sent to ff:ff:ff:ff:ff:ff?",
        "The sender does not know the target's MAC address yet, that is the point of\n\
         asking. The broadcast address reaches every host on the link; only the one\n\
         owning the target IP answers, with a unicast reply.",
    ),
    Faq::new(
        "Does ARP cross routers?",
        "No. ARP only exists on the local link. To reach a host elsewhere, the sender\n\
         ARPs for its gateway and hands the packet to it; the gateway repeats the\n\
         process on the next link.",
    ),
    Faq::new(
        "Why did my ping get no answer?",
        "Firewalls often drop ICMP echo, the host may be down, or the reply may be\n\
         going somewhere else. Note that a kernel that answers the ping itself still\n\
         answers this hand-built request: it only looks at the bytes.",
    ),
    Faq::new(
        "What are the identifier and sequence number for?",
        "ICMP has no ports. The identifier tells the pinging program which replies are\n\
         its own, the sequence number tells the replies apart so lost or reordered\n\
         ones show up.",
    ),
];

fn arp_request<W: Write>(lesson: &mut Lesson<W>) -> Result<(), Box<dyn Error>> {
    lesson.section("ARP: WHO HAS 192.168.1.1?")?;
    let host_mac = MACAddress::from(HOST_MAC);
    let packet = PacketBuilder::new()
        .stack(Box::new(Ethernet::new(host_mac, MACAddress::BROADCAST)))?
        .stack(Box::new(ARP::request(
            host_mac,
            IPv4Address::from(HOST_IP),
            IPv4Address::from(GATEWAY_IP),
        )))?
        .build()?;

    lesson.example("Ethernet (broadcast) / ARP request")?;
    lesson.packet(&packet)?;

    let b = packet.as_bytes();
    lesson.blank()?;
    lesson.line(&format!(
        "Bytes 12-13: {:02X} {:02X}  EtherType 0x0806, ARP follows",
        b[12], b[13]
    ))?;
    lesson.line(&format!(
        "Bytes 20-21: {:02X} {:02X}  operation 1, a request (2 would be a reply)",
        b[20], b[21]
    ))?;
    lesson.line("The target MAC is all zeros: it is what the request asks for.")?;
    Ok(())
}

fn echo_request<W: Write>(
    lesson: &mut Lesson<W>,
    args: &Args,
) -> Result<wirelens::Packet, Box<dyn Error>> {
    lesson.blank()?;
    lesson.section("ICMP: ECHO REQUEST (PING)")?;
    let packet = PacketBuilder::new()
        .stack(Box::new(IPv4::new(args.source, args.target)))?
        .stack(Box::new(ICMP::echo_request(PING_ID, 1)))?
        .stack_bytes(PING_PAYLOAD)
        .build()?;

    lesson.example(&format!("IPv4 / ICMP echo request, {} > {}", args.source, args.target))?;
    lesson.packet(&packet)?;
    lesson.blank()?;
    lesson.line("Byte 9 of the IP header is 01: ICMP. Type 8 code 0 is an echo request;")?;
    lesson.line("the reply comes back as type 0 with the same identifier and payload.")?;
    Ok(packet)
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = Args::parse();

    let _ = wirelens::register_defaults();

    let stdout = std::io::stdout();
    let mut lesson = Lesson::new(stdout.lock());

    lesson.section("ARP AND ICMP: THE NETWORK'S HOUSEKEEPING")?;
    lesson.key_concepts(KEY_CONCEPTS)?;
    lesson.blank()?;

    arp_request(&mut lesson)?;
    let ping = echo_request(&mut lesson, &args)?;

    if args.send {
        lesson.example("Sending and waiting for the reply")?;
        lesson.flush()?;
        match wirelens::net::sr1(&ping, Duration::from_millis(args.timeout)) {
            Ok(Some(reply)) => {
                lesson.line(&format!("Reply: {}", reply.summary()))?;
                lesson.packet(&reply)?;
            }
            Ok(None) => {
                lesson.line(&format!("No response within {} ms.", args.timeout))?;
            }
            Err(e) => {
                lesson.line(&format!("Send failed: {}", e))?;
                lesson.flush()?;
                std::process::exit(1);
            }
        }
    }

    if !args.no_faq {
        lesson.faq(FAQ)?;
    }
    lesson.flush()?;

    Ok(())
}
