//! Foundations: the four layers of TCP/IP, from the familiar to the unfamiliar.
//!
//! Application data first, then the TCP and UDP headers that carry it, the IPv4 header that
//! routes it and the Ethernet header that gets it to the next box. Ends with all four in one
//! packet.

use std::error::Error;
use std::io::Write;

use clap::Parser;

use wirelens::builder::PacketBuilder;
use wirelens::layers::dns::{DNS, DNS_TYPE_A};
use wirelens::layers::ethernet::Ethernet;
use wirelens::layers::ipv4::IPv4;
use wirelens::layers::tcp::{TCP, TCP_FLAG_ACK, TCP_FLAG_FIN, TCP_FLAG_PSH, TCP_FLAG_SYN};
use wirelens::layers::udp::UDP;
use wirelens::lesson::{Faq, Lesson};
use wirelens::types::{ETHERTYPE_IP, IPv4Address, MACAddress};
use wirelens::{Packet, ENCAP_TYPE_IPV4};

const CLIENT_IP: [u8; 4] = [192, 168, 1, 100];
const SERVER_IP: [u8; 4] = [93, 184, 216, 34];
const RESOLVER_IP: [u8; 4] = [8, 8, 8, 8];
const CLIENT_MAC: [u8; 6] = [0xaa, 0xbb, 0xcc, 0x11, 0x22, 0x33];
const ROUTER_MAC: [u8; 6] = [0xff, 0xee, 0xdd, 0x44, 0x55, 0x66];
const CLIENT_PORT: u16 = 54321;
const HTTP_PORT: u16 = 80;

const HTTP_REQUEST: &[u8] = b"GET /api/users HTTP/1.1\r\nHost: example.com\r\nUser-Agent: wirelens\r\n\r\n";
const HTTP_RESPONSE: &[u8] =
    b"HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n\r\n<html><body>Hello!</body></html>";
const JSON_DATA: &[u8] = br#"{"user": "alice", "age": 30, "active": true}"#;
const DNS_QUERY: &[u8] =
    b"\x12\x34\x01\x00\x00\x01\x00\x00\x00\x00\x00\x00\x07example\x03com\x00\x00\x01\x00\x01";
const PNG_HEADER: &[u8] = b"\x89PNG\r\n\x1a\n\x00\x00\x00\rIHDR\x00\x00\x01\x00\x00\x00\x01\x00";
const SHORT_GET: &[u8] = b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n";

#[derive(Parser, Debug)]
#[command(version, about = "The four layers of TCP/IP, byte by byte")]
struct Args {
    /// Leave out the questions and answers.
    #[arg(long)]
    no_faq: bool,
}

const KEY_CONCEPTS: &[&str] = &[
    "Protocols are structured bytes with agreed-upon field layouts",
    "Each layer has its own fields: addresses, ports, flags, lengths",
    "TCP/IP has four layers: Link, Internet, Transport, Application",
    "Higher layers travel INSIDE lower ones: Ethernet / IPv4 / TCP / data",
    "Lengths and checksums are computed when the packet is built",
];

const FAQ: &[Faq] = &[
    Faq::new(
        "Is HTTP really just that text?",
        "Yes. 'GET /api/users HTTP/1.1' followed by header lines and an empty line\n\
         IS the protocol; the hex dump shows nothing else. Other protocols, DNS for\n\
         one, are binary: the same idea, but fields are numbers in fixed places.",
    ),
    Faq::new(
        "Do all packets have all four layers?",
        "Everything that crosses an Ethernet link has a link layer header. Above it\n\
         the stack varies: ARP sits directly on Ethernet, ICMP directly on IP, and\n\
         a TCP segment can carry no data at all, like the handshake segments above.",
    ),
    Faq::new(
        "Who adds these headers?",
        "Your program writes the application data. The operating system adds TCP or\n\
         UDP and IP when you write to a socket, and the network driver adds the\n\
         Ethernet header. Routers replace the Ethernet header at every hop but keep\n\
         the IP header, apart from decrementing the TTL.",
    ),
    Faq::new(
        "Why does a TCP segment on its own have a zero checksum here?",
        "The TCP checksum covers a pseudo header made of the IP addresses. With no IP\n\
         layer below, there is nothing to compute it from, so it stays zero. Stack\n\
         the segment on IPv4 and it is filled in.",
    ),
    Faq::new(
        "Why a handshake before every connection?",
        "Both sides pick a random initial sequence number and have to learn the\n\
         other's before data can be acknowledged. SYN, SYN+ACK, ACK does exactly that\n\
         in three segments. HTTP keep-alive then reuses one connection for many\n\
         requests so the cost is paid once.",
    ),
];

fn ip(src: [u8; 4], dst: [u8; 4]) -> IPv4 {
    IPv4::new(IPv4Address::from(src), IPv4Address::from(dst))
}

fn segment(sport: u16, dport: u16, seq: u32, ack: u32, flags: u16) -> TCP {
    TCP::new(sport, dport)
        .seq_no(seq)
        .ack_no(ack)
        .flags(flags)
        .window(65535)
}

fn build_one(layer: Box<dyn wirelens::Layer + Send>) -> Result<Packet, wirelens::Error> {
    PacketBuilder::new().stack(layer)?.build()
}

fn application_layer<W: Write>(lesson: &mut Lesson<W>) -> Result<(), Box<dyn Error>> {
    lesson.section("LAYER 4: APPLICATION DATA")?;
    lesson.line("What you actually care about: requests, responses, files. To the layers")?;
    lesson.line("below it is all just bytes.")?;

    let payloads: &[(&str, &str, &[u8])] = &[
        ("Example 1: HTTP request", "Web page or API request", HTTP_REQUEST),
        ("Example 2: HTTP response", "Server answer to the request", HTTP_RESPONSE),
        ("Example 3: JSON data", "Structured API payload", JSON_DATA),
        ("Example 4: DNS query", "Name to address lookup, binary", DNS_QUERY),
        ("Example 5: PNG header", "Start of an image file, binary", PNG_HEADER),
    ];
    for (title, what, bytes) in payloads {
        lesson.example(title)?;
        lesson.line(&format!("What: {}", what))?;
        lesson.line(&format!("Size: {} bytes", bytes.len()))?;
        lesson.hexdump(bytes)?;
    }

    lesson.blank()?;
    lesson.line("The DNS query is binary: the transaction id 0x1234 comes first, the name")?;
    lesson.line("'example.com' is stored as length-prefixed labels (07 example 03 com 00).")?;
    lesson.line("Sent to UDP port 53 and dissected, the same bytes read as:")?;
    let carried = PacketBuilder::new()
        .stack(Box::new(ip(CLIENT_IP, RESOLVER_IP)))?
        .stack(Box::new(UDP::new(54326, 53)))?
        .stack_bytes(DNS_QUERY)
        .build()?;
    let dissected = Packet::from_bytes(carried.as_bytes(), ENCAP_TYPE_IPV4)?;
    lesson.line(&format!("  {}", dissected.summary()))?;
    Ok(())
}

fn transport_layer<W: Write>(lesson: &mut Lesson<W>) -> Result<(), Box<dyn Error>> {
    lesson.blank()?;
    lesson.section("LAYER 3: TRANSPORT (TCP AND UDP)")?;
    lesson.bullets(&[
        "Ports pick the application: 80 HTTP, 443 HTTPS, 53 DNS, 22 SSH",
        "TCP: reliable and ordered, connection first, 20 byte header",
        "UDP: send and forget, 8 byte header",
    ])?;

    let handshake = [
        (
            "TCP 1: SYN, the client asks for a connection",
            segment(CLIENT_PORT, HTTP_PORT, 1000, 0, TCP_FLAG_SYN),
        ),
        (
            "TCP 2: SYN+ACK, the server accepts and acknowledges seq + 1",
            segment(HTTP_PORT, CLIENT_PORT, 5000, 1001, TCP_FLAG_SYN | TCP_FLAG_ACK),
        ),
        (
            "TCP 3: ACK, the connection is established",
            segment(CLIENT_PORT, HTTP_PORT, 1001, 5001, TCP_FLAG_ACK),
        ),
        (
            "TCP 4: PSH+ACK, data follows and should be delivered right away",
            segment(CLIENT_PORT, HTTP_PORT, 1001, 5001, TCP_FLAG_PSH | TCP_FLAG_ACK),
        ),
        (
            "TCP 5: FIN+ACK, the client is done sending",
            segment(CLIENT_PORT, HTTP_PORT, 1501, 5001, TCP_FLAG_FIN | TCP_FLAG_ACK),
        ),
    ];
    for (title, tcp) in handshake {
        lesson.example(title)?;
        lesson.packet(&build_one(Box::new(tcp))?)?;
    }
    lesson.blank()?;
    lesson.line("SYN -> SYN+ACK -> ACK is the three-way handshake. Watch the ack field:")?;
    lesson.line("each side acknowledges the other's sequence number plus one.")?;

    let datagrams: [(&str, u16, u16, &[u8]); 4] = [
        ("UDP 1: DNS lookup, port 53", 54326, 53, DNS_QUERY),
        ("UDP 2: RTP media, port 5004", 54327, 5004, b"\x80\x60\x00\x01"),
        ("UDP 3: DHCP, client port 68 to server port 67", 68, 67, b""),
        ("UDP 4: NTP time sync, port 123", 54328, 123, b""),
    ];
    for (title, sport, dport, payload) in datagrams {
        lesson.example(title)?;
        let mut builder = PacketBuilder::new().stack(Box::new(UDP::new(sport, dport)))?;
        if dport == 53 {
            builder = builder.stack(Box::new(DNS::query(0x1234, "example.com", DNS_TYPE_A)?))?;
        } else if !payload.is_empty() {
            builder = builder.stack_bytes(payload);
        }
        lesson.packet(&builder.build()?)?;
    }

    lesson.blank()?;
    lesson.section("TCP vs UDP")?;
    lesson.line("TCP: reliable, ordered, handshake first. Web, mail, SSH, file transfer.")?;
    lesson.line("UDP: fast, no setup, loss is possible. DNS, streaming, games, voice.")?;
    lesson.line("IP does not care which: its protocol field says 6 for TCP, 17 for UDP.")?;
    Ok(())
}

fn internet_layer<W: Write>(lesson: &mut Lesson<W>) -> Result<(), Box<dyn Error>> {
    lesson.blank()?;
    lesson.section("LAYER 2: INTERNET (IPv4)")?;
    lesson.bullets(&[
        "Routes packets between hosts on DIFFERENT networks",
        "Source and destination IP addresses name the hosts",
        "TTL drops by one per router, the packet dies at zero",
        "20 bytes, more with options",
    ])?;
    lesson.example("IPv4 header on its own, 192.168.1.100 > 8.8.8.8")?;
    lesson.packet(&build_one(Box::new(ip(CLIENT_IP, RESOLVER_IP)))?)?;
    lesson.line("With nothing inside, the protocol field is 0.")?;
    Ok(())
}

fn link_layer<W: Write>(lesson: &mut Lesson<W>) -> Result<(), Box<dyn Error>> {
    lesson.blank()?;
    lesson.section("LAYER 1: LINK (ETHERNET)")?;
    lesson.bullets(&[
        "Moves frames between devices on the SAME network",
        "MAC addresses name network cards, not hosts",
        "14 bytes: destination MAC, source MAC, EtherType",
    ])?;
    lesson.example("Ethernet header on its own, EtherType 0x0800")?;
    let eth = Ethernet::new(
        MACAddress::from([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]),
        MACAddress::from([0x11, 0x22, 0x33, 0x44, 0x55, 0x66]),
    )
    .ethertype(ETHERTYPE_IP);
    lesson.packet(&build_one(Box::new(eth))?)?;
    Ok(())
}

fn all_together<W: Write>(lesson: &mut Lesson<W>) -> Result<(), Box<dyn Error>> {
    lesson.blank()?;
    lesson.section("PUTTING IT ALL TOGETHER: 4 LAYERS IN ONE PACKET")?;

    let packet = PacketBuilder::new()
        .stack(Box::new(Ethernet::new(
            MACAddress::from(CLIENT_MAC),
            MACAddress::from(ROUTER_MAC),
        )))?
        .stack(Box::new(ip(CLIENT_IP, SERVER_IP)))?
        .stack(Box::new(segment(
            CLIENT_PORT,
            HTTP_PORT,
            1000,
            5000,
            TCP_FLAG_PSH | TCP_FLAG_ACK,
        )))?
        .stack_bytes(SHORT_GET)
        .build()?;

    lesson.example("Ethernet / IPv4 / TCP / HTTP GET")?;
    lesson.line(&format!("Total size: {} bytes", packet.len()))?;
    lesson.line("  Ethernet header: 14 bytes")?;
    lesson.line("  IPv4 header:     20 bytes")?;
    lesson.line("  TCP header:      20 bytes")?;
    lesson.line(&format!("  HTTP data:       {} bytes", SHORT_GET.len()))?;
    lesson.packet(&packet)?;

    lesson.blank()?;
    lesson.line("Each layer wraps the one above it. Going up at the receiver:")?;
    lesson.bullets(&[
        "the network card checks the Ethernet destination, this machine",
        "the OS reads the IP header, this host",
        "the OS reads the TCP header, this port and so this application",
        "the application reads the HTTP request",
    ])?;
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = Args::parse();

    let _ = wirelens::register_defaults();

    let stdout = std::io::stdout();
    let mut lesson = Lesson::new(stdout.lock());

    lesson.section("FOUNDATIONS: THE 4 LAYERS OF TCP/IP")?;
    lesson.key_concepts(KEY_CONCEPTS)?;
    lesson.blank()?;
    lesson.line("Learning path, familiar to unfamiliar:")?;
    lesson.line("  Application -> Transport -> Internet -> Link")?;
    lesson.blank()?;

    application_layer(&mut lesson)?;
    transport_layer(&mut lesson)?;
    internet_layer(&mut lesson)?;
    link_layer(&mut lesson)?;
    all_together(&mut lesson)?;

    if !args.no_faq {
        lesson.faq(FAQ)?;
    }
    lesson.flush()?;

    Ok(())
}
