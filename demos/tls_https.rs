//! TLS and HTTPS: the same request in plaintext and encrypted, and the ClientHello that starts it.

use std::error::Error;
use std::io::Write;

use clap::Parser;

use wirelens::builder::PacketBuilder;
use wirelens::layers::tcp::{TCP, TCP_FLAG_ACK, TCP_FLAG_PSH};
use wirelens::layers::tls::{cipher_suite_name, ClientHello, TLS, TLS_VERSION_1_2};
use wirelens::lesson::{Faq, Lesson};

const CLIENT_PORT: u16 = 54321;

const PLAIN_REQUEST: &[u8] = b"GET /account?password=MySecret123 HTTP/1.1\r\nHost: bank.com\r\n\r\n";

// What the request above could look like after encryption with a session key.
const ENCRYPTED: [u8; 64] = [
    0xd4, 0x7f, 0x3a, 0x91, 0xc8, 0x25, 0x6f, 0x4e, 0xb2, 0x11, 0x83, 0x9d, 0x47, 0x2c, 0x6a, 0x15,
    0x8f, 0x9a, 0x2d, 0x73, 0x11, 0x6c, 0x84, 0x9f, 0x3d, 0x4a, 0x71, 0x5e, 0x88, 0xb3, 0x21, 0x09,
    0x6d, 0x4f, 0x82, 0x7a, 0x93, 0x1c, 0x5f, 0x68, 0xa4, 0x0f, 0x97, 0x2b, 0x44, 0x1d, 0x89, 0x73,
    0xf5, 0x8c, 0x61, 0x3e, 0x29, 0x94, 0xb7, 0x6f, 0x11, 0xc5, 0x82, 0x3a, 0x67, 0x94, 0x1f, 0x28,
];

const OFFERED_CIPHERS: &[u16] = &[0xC02F, 0xC030, 0x009E];

#[derive(Parser, Debug)]
#[command(version, about = "HTTP in plaintext next to HTTPS, and the TLS ClientHello")]
struct Args {
    /// Put a server_name extension naming this host in the ClientHello.
    #[arg(long)]
    sni: Option<String>,

    /// Leave out the questions and answers.
    #[arg(long)]
    no_faq: bool,
}

const KEY_CONCEPTS: &[&str] = &[
    "HTTP is plaintext, anyone on the path can read it",
    "HTTPS is HTTP inside TLS records, inside TCP",
    "TLS encrypts the application data before TCP ever sees it",
    "A TLS handshake agrees on keys before any encrypted data flows",
    "Ports still show: 443 says TLS comes first",
];

const FAQ: &[Faq] = &[
    Faq::new(
        "What does the S in HTTPS stand for?",
        "Secure: HTTP carried over TLS. The requests and responses are the same text\n\
         as plain HTTP, they are just encrypted before they go into TCP.",
    ),
    Faq::new(
        "Can an eavesdropper see anything at all?",
        "The IP addresses and TCP ports, the sizes and timing of the records, and\n\
         unless encrypted ClientHello is in use, the host name in the SNI extension.\n\
         The URL path, headers, cookies and bodies stay hidden.",
    ),
    Faq::new(
        "Why is the ClientHello readable?",
        "There are no keys yet when it is sent. The ClientHello and ServerHello are\n\
         exchanged in the clear so the two sides can agree on a cipher suite and\n\
         derive keys; everything after the handshake is encrypted.",
    ),
    Faq::new(
        "Is the TLS handshake the same as the TCP handshake?",
        "No. SYN, SYN+ACK, ACK are TCP flags and only open the connection. The TLS\n\
         handshake runs afterwards, as data inside that connection, and produces the\n\
         encryption keys.",
    ),
    Faq::new(
        "Why do the record headers say TLS 1.2 even for TLS 1.3?",
        "Middleboxes broke on unknown version numbers, so TLS 1.3 keeps 0x0303 in the\n\
         record header and announces itself in the supported_versions extension.",
    ),
];

fn segment(dport: u16, seq: u32, ack: u32) -> TCP {
    TCP::new(CLIENT_PORT, dport)
        .seq_no(seq)
        .ack_no(ack)
        .flags(TCP_FLAG_PSH | TCP_FLAG_ACK)
        .window(65535)
}

fn plaintext<W: Write>(lesson: &mut Lesson<W>) -> Result<(), Box<dyn Error>> {
    lesson.section("DEMO 1: HTTP WITHOUT ENCRYPTION")?;
    let packet = PacketBuilder::new()
        .stack(Box::new(segment(80, 1000, 5000)))?
        .stack_bytes(PLAIN_REQUEST)
        .build()?;
    lesson.line(&format!("Total size: {} bytes", packet.len()))?;
    lesson.line("  TCP header: 20 bytes")?;
    lesson.line(&format!("  HTTP data:  {} bytes", PLAIN_REQUEST.len()))?;
    lesson.packet(&packet)?;
    lesson.blank()?;
    lesson.line("The password is right there in the ASCII column: 'password=MySecret123'.")?;
    lesson.line("Anyone running a sniffer on the path sees the URL, credentials, cookies.")?;
    Ok(())
}

fn encrypted<W: Write>(lesson: &mut Lesson<W>) -> Result<(), Box<dyn Error>> {
    lesson.blank()?;
    lesson.section("DEMO 2: HTTPS WITH ENCRYPTION")?;
    lesson.line("After the TCP and TLS handshakes, the client encrypts the request with the")?;
    lesson.line("session key and wraps it in a TLS application_data record:")?;

    let packet = PacketBuilder::new()
        .stack(Box::new(segment(443, 2000, 6000)))?
        .stack(Box::new(TLS::application_data(&ENCRYPTED)))?
        .build()?;
    lesson.line(&format!("Total size: {} bytes", packet.len()))?;
    lesson.line("  TCP header:       20 bytes")?;
    lesson.line(&format!("  TLS record:       {} bytes", 5 + ENCRYPTED.len()))?;
    lesson.line("    record header:   5 bytes (type, version, length)")?;
    lesson.line(&format!("    encrypted data: {} bytes", ENCRYPTED.len()))?;
    lesson.packet(&packet)?;
    lesson.blank()?;
    lesson.line("After byte 24 nothing is readable. The blob is the same request as in")?;
    lesson.line("demo 1; only the server holds the key to turn it back.")?;
    Ok(())
}

fn handshake<W: Write>(lesson: &mut Lesson<W>, sni: Option<&str>) -> Result<(), Box<dyn Error>> {
    lesson.blank()?;
    lesson.section("DEMO 3: THE TLS HANDSHAKE STARTS WITH A CLIENTHELLO")?;
    lesson.bullets(&[
        "ClientHello: the versions and cipher suites the client supports",
        "ServerHello: the server picks one of them",
        "Certificate: the server proves who it is",
        "Key exchange: both sides derive the same secret",
        "Finished: from here on everything is encrypted",
    ])?;

    let mut hello = ClientHello::new(OFFERED_CIPHERS).version(TLS_VERSION_1_2);
    if let Some(host) = sni {
        hello = hello.server_name(host);
    }
    let packet = PacketBuilder::new()
        .stack(Box::new(TLS::client_hello(hello)))?
        .build()?;

    lesson.example("TLS ClientHello, TLS 1.2, three cipher suites")?;
    lesson.packet(&packet)?;
    Ok(())
}

fn cipher_suites<W: Write>(lesson: &mut Lesson<W>) -> Result<(), Box<dyn Error>> {
    lesson.blank()?;
    lesson.section("WHAT ARE CIPHER SUITES?")?;
    lesson.line("The suites offered above:")?;
    for suite in OFFERED_CIPHERS {
        lesson.line(&format!(
            "  0x{:04X}  {}",
            suite,
            cipher_suite_name(*suite).unwrap_or("(unknown)")
        ))?;
    }
    lesson.blank()?;
    lesson.line("TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256 reads as:")?;
    lesson.line("  ECDHE        key exchange, how both sides agree on a secret")?;
    lesson.line("  RSA          authentication, how the server proves its identity")?;
    lesson.line("  AES_128_GCM  the cipher that encrypts the records")?;
    lesson.line("  SHA256       the hash used to derive keys")?;
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = Args::parse();

    let _ = wirelens::register_defaults();

    let stdout = std::io::stdout();
    let mut lesson = Lesson::new(stdout.lock());

    lesson.section("TLS AND HTTPS: WHY ENCRYPTION MATTERS")?;
    lesson.key_concepts(KEY_CONCEPTS)?;
    lesson.blank()?;
    lesson.line("Without TLS:  [Ethernet] [IP] [TCP port 80]  [HTTP, readable]")?;
    lesson.line("With TLS:     [Ethernet] [IP] [TCP port 443] [TLS: HTTP, encrypted]")?;
    lesson.blank()?;

    plaintext(&mut lesson)?;
    encrypted(&mut lesson)?;
    handshake(&mut lesson, args.sni.as_deref())?;
    cipher_suites(&mut lesson)?;

    if !args.no_faq {
        lesson.faq(FAQ)?;
    }
    lesson.flush()?;

    Ok(())
}
