//! DNS: a name lookup as it travels, IPv4 / UDP / DNS, and the answer that comes back.
//!
//! `--send` asks a real resolver through a raw socket (root or `CAP_NET_RAW`). The default
//! resolver is the local stub at 127.0.0.53; for another one pass `--server` together with a
//! `--source` address the reply can come back to.

use std::error::Error;
use std::io::Write;
use std::time::Duration;

use clap::Parser;

use wirelens::builder::PacketBuilder;
use wirelens::layers::dns::{DNSQRecord, DNSResRecord, DNS, DNS_TYPE_A};
use wirelens::layers::ipv4::IPv4;
use wirelens::layers::udp::UDP;
use wirelens::lesson::{Faq, Lesson};
use wirelens::types::IPv4Address;

const CLIENT_PORT: u16 = 54326;
const QUERY_ID: u16 = 0x1234;

#[derive(Parser, Debug)]
#[command(version, about = "A DNS query and its answer, byte by byte")]
struct Args {
    /// Name to look up.
    #[arg(default_value = "example.com")]
    name: String,

    /// Resolver to ask.
    #[arg(long, default_value = "127.0.0.53")]
    server: IPv4Address,

    /// Source address of the query.
    #[arg(long, default_value = "127.0.0.1")]
    source: IPv4Address,

    /// Send the query and print the reply (needs root or CAP_NET_RAW).
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
    "DNS turns names into addresses, usually over UDP port 53",
    "A 12 byte header: id, flags and four record counts",
    "Names travel as length-prefixed labels ending in a zero byte",
    "Responses repeat the question and point back to it to save space",
    "The id pairs a response with its query",
];

const FAQ: &[Faq] = &[
    Faq::new(
        "Why UDP and not TCP?",
        "One small question, one small answer: a handshake would triple the time a\n\
         lookup takes. If the answer does not fit, the server sets the TC flag and\n\
         the client retries over TCP.",
    ),
    Faq::new(
        "What is the C0 0C in a response?",
        "A compression pointer. The top two bits 11 mark a pointer, the remaining 14\n\
         bits are an offset from the start of the DNS message: 0x0C is 12, right\n\
         after the header, where the question's name starts.",
    ),
    Faq::new(
        "What does RD mean?",
        "Recursion desired: please chase the answer through the root, TLD and\n\
         authoritative servers for me. A resolver that does so sets RA, recursion\n\
         available, in its response.",
    ),
    Faq::new(
        "Can someone see my lookups?",
        "Yes. Classic DNS is plaintext, so everyone on the path sees which names you\n\
         resolve. DNS over TLS or HTTPS puts the same messages inside TLS.",
    ),
];

fn query<W: Write>(lesson: &mut Lesson<W>, args: &Args) -> Result<wirelens::Packet, Box<dyn Error>> {
    lesson.section("DNS QUERY")?;
    let packet = PacketBuilder::new()
        .stack(Box::new(IPv4::new(args.source, args.server)))?
        .stack(Box::new(UDP::new(CLIENT_PORT, 53)))?
        .stack(Box::new(DNS::query(QUERY_ID, &args.name, DNS_TYPE_A)?))?
        .build()?;

    lesson.example(&format!("IPv4 / UDP / DNS, A record of {}", args.name))?;
    lesson.packet(&packet)?;
    lesson.blank()?;
    lesson.line("Flags 0x0100: a query (QR 0) with only RD set. One question, no records.")?;
    Ok(packet)
}

fn sample_response<W: Write>(lesson: &mut Lesson<W>, args: &Args) -> Result<(), Box<dyn Error>> {
    lesson.blank()?;
    lesson.section("WHAT A RESPONSE LOOKS LIKE")?;
    let dns = DNS::new(QUERY_ID)
        .recursion_desired(true)
        .response(0)
        .question(DNSQRecord::new(&args.name, DNS_TYPE_A)?)
        .answer(DNSResRecord::a(
            &args.name,
            300,
            IPv4Address::from([93, 184, 216, 34]),
        )?);
    let packet = PacketBuilder::new()
        .stack(Box::new(IPv4::new(args.server, args.source)))?
        .stack(Box::new(UDP::new(53, CLIENT_PORT)))?
        .stack(Box::new(dns))?
        .build()?;

    lesson.example("Same id, QR set, the question repeated and one A record")?;
    lesson.packet(&packet)?;
    lesson.blank()?;
    lesson.line("Built here the answer repeats the name in full. Real servers point back")?;
    lesson.line("to the question with C0 0C instead, as a real reply below shows.")?;
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = Args::parse();

    let _ = wirelens::register_defaults();

    let stdout = std::io::stdout();
    let mut lesson = Lesson::new(stdout.lock());

    lesson.section("DNS: FROM NAMES TO ADDRESSES")?;
    lesson.key_concepts(KEY_CONCEPTS)?;
    lesson.blank()?;

    let request = query(&mut lesson, &args)?;
    sample_response(&mut lesson, &args)?;

    if args.send {
        lesson.example(&format!("Asking {}", args.server))?;
        lesson.flush()?;
        match wirelens::net::sr1(&request, Duration::from_millis(args.timeout)) {
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
