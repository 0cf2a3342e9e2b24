//! Sending packets through a raw socket
//!
//! [`send`] writes a packet that starts with an IPv4 header as-is, the kernel adds only the link
//! layer. [`sr1`] sends and then waits for the first packet that answers it. Both need root or
//! `CAP_NET_RAW`.

use std::io::{self, Read};
use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::{Duration, Instant};

use socket2::{Domain, Protocol, SockAddr, Socket, Type};

use crate::errors::Error;
use crate::layers::icmp::{ICMP_ECHO_REPLY, ICMP_ECHO_REQUEST, IPPROTO_ICMP};
use crate::layers::tcp::IPPROTO_TCP;
use crate::layers::udp::IPPROTO_UDP;
use crate::packet::Packet;
use crate::types::ENCAP_TYPE_IPV4;

const IPPROTO_RAW: i32 = 255;

// Large enough for any IPv4 datagram.
const RECV_BUFFER_SIZE: usize = 65535;

/// Moves bytes on and off the wire, a raw socket outside of tests.
pub trait Transport {
    fn send_to(&mut self, bytes: &[u8], dst: Ipv4Addr) -> io::Result<usize>;

    /// One IPv4 datagram, header included. Running out of `timeout` is an error of kind
    /// `WouldBlock` or `TimedOut`.
    fn recv(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize>;
}

/// An `IPPROTO_RAW` socket for sending, and for receiving a raw socket of the protocol expected
/// in the reply.
pub struct RawSocket {
    send: Socket,
    recv: Option<Socket>,
}

impl RawSocket {
    /// A socket that can only send.
    pub fn sender() -> Result<Self, Error> {
        let send = Socket::new(Domain::IPV4, Type::RAW, Some(Protocol::from(IPPROTO_RAW)))
            .map_err(socket_error)?;
        Ok(Self { send, recv: None })
    }

    /// A socket that sends and receives datagrams of protocol `proto`.
    pub fn for_protocol(proto: u8) -> Result<Self, Error> {
        let mut socket = Self::sender()?;
        let recv = Socket::new(Domain::IPV4, Type::RAW, Some(Protocol::from(proto as i32)))
            .map_err(socket_error)?;
        socket.recv = Some(recv);
        Ok(socket)
    }
}

impl Transport for RawSocket {
    fn send_to(&mut self, bytes: &[u8], dst: Ipv4Addr) -> io::Result<usize> {
        let addr = SockAddr::from(SocketAddrV4::new(dst, 0));
        self.send.send_to(bytes, &addr)
    }

    fn recv(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        let Some(recv) = &self.recv else {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "socket opened for sending only",
            ));
        };
        recv.set_read_timeout(Some(timeout))?;
        let mut reader: &Socket = recv;
        reader.read(buf)
    }
}

fn socket_error(e: io::Error) -> Error {
    match e.kind() {
        io::ErrorKind::PermissionDenied => Error::PermissionDenied(format!(
            "{}: raw sockets need root, try sudo or grant CAP_NET_RAW \
             (setcap cap_net_raw+ep <program>)",
            e
        )),
        _ => Error::Network(e.to_string()),
    }
}

/// The parts of an IPv4 datagram that tell request and reply apart.
#[derive(Debug, PartialEq)]
struct Datagram<'a> {
    proto: u8,
    src: [u8; 4],
    dst: [u8; 4],
    payload: &'a [u8],
}

impl<'a> Datagram<'a> {
    fn parse(bytes: &'a [u8]) -> Option<Self> {
        if bytes.len() < 20 || bytes[0] >> 4 != 4 {
            return None;
        }
        let ihl = ((bytes[0] & 0x0f) as usize) * 4;
        if ihl < 20 || bytes.len() < ihl {
            return None;
        }
        Some(Self {
            proto: bytes[9],
            src: bytes[12..16].try_into().ok()?,
            dst: bytes[16..20].try_into().ok()?,
            payload: &bytes[ihl..],
        })
    }

    fn ports(&self) -> Option<(u16, u16)> {
        let p = self.payload;
        if p.len() < 4 {
            return None;
        }
        Some(((p[0] as u16) << 8 | p[1] as u16, (p[2] as u16) << 8 | p[3] as u16))
    }

    /// Whether `self` answers `request`.
    fn answers(&self, request: &Datagram<'_>) -> bool {
        if self.proto != request.proto || self.src != request.dst || self.dst != request.src {
            return false;
        }
        match self.proto {
            IPPROTO_TCP | IPPROTO_UDP => match (self.ports(), request.ports()) {
                (Some((sport, dport)), Some((req_sport, req_dport))) => {
                    sport == req_dport && dport == req_sport
                }
                _ => false,
            },
            IPPROTO_ICMP => {
                let (p, q) = (self.payload, request.payload);
                p.len() >= 8
                    && q.len() >= 8
                    && q[0] == ICMP_ECHO_REQUEST
                    && p[0] == ICMP_ECHO_REPLY
                    && p[4..6] == q[4..6]
            }
            // No ports or ids to go by, only our own request echoed on loopback is ruled out.
            _ => self.payload != request.payload,
        }
    }
}

fn request_datagram(packet: &Packet) -> Result<Datagram<'_>, Error> {
    match packet.layers().first().map(|l| l.name()) {
        Some("IPv4") => Datagram::parse(packet.as_bytes())
            .ok_or_else(|| Error::Network("malformed IPv4 header".to_string())),
        first => Err(Error::Network(format!(
            "only packets starting with IPv4 can be sent, this one starts with {}",
            first.unwrap_or("raw bytes")
        ))),
    }
}

/// Send `packet`, whose first layer must be IPv4. Returns the number of bytes sent.
pub fn send(packet: &Packet) -> Result<usize, Error> {
    let mut socket = RawSocket::sender()?;
    send_with(&mut socket, packet)
}

/// Send `packet` and wait up to `timeout` for the first reply to it.
///
/// A reply has the same protocol, swapped addresses and for TCP and UDP swapped ports. An ICMP echo
/// request is answered by the echo reply with the same identifier. Nothing arriving in time is
/// `Ok(None)`.
pub fn sr1(packet: &Packet, timeout: Duration) -> Result<Option<Packet>, Error> {
    let request = request_datagram(packet)?;
    let mut socket = RawSocket::for_protocol(request.proto)?;
    sr1_with(&mut socket, packet, timeout)
}

pub fn send_with<T: Transport>(transport: &mut T, packet: &Packet) -> Result<usize, Error> {
    let request = request_datagram(packet)?;
    let dst = Ipv4Addr::from(request.dst);
    let sent = transport
        .send_to(packet.as_bytes(), dst)
        .map_err(socket_error)?;
    log_debug!("sent {} bytes to {}", sent, dst);
    Ok(sent)
}

pub fn sr1_with<T: Transport>(
    transport: &mut T,
    packet: &Packet,
    timeout: Duration,
) -> Result<Option<Packet>, Error> {
    let request = request_datagram(packet)?;
    send_with(transport, packet)?;

    let deadline = Instant::now() + timeout;
    let mut buf = vec![0_u8; RECV_BUFFER_SIZE];
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            log_debug!("no reply within {:?}", timeout);
            return Ok(None);
        }

        let received = match transport.recv(&mut buf, remaining) {
            Ok(n) => n,
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                log_debug!("no reply within {:?}", timeout);
                return Ok(None);
            }
            Err(e) => return Err(socket_error(e)),
        };

        let bytes = &buf[..received];
        match Datagram::parse(bytes) {
            Some(reply) if reply.answers(&request) => {
                log_debug!("reply of {} bytes", received);
                return Packet::from_bytes(bytes, ENCAP_TYPE_IPV4).map(Some);
            }
            _ => log_debug!("ignoring {} unrelated bytes", received),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::PacketBuilder;
    use crate::layers::icmp::ICMP;
    use crate::layers::ipv4::IPv4;
    use crate::layers::tcp::{TCP, TCP_FLAG_ACK, TCP_FLAG_SYN};
    use std::collections::VecDeque;

    #[derive(Default)]
    struct FakeTransport {
        sent: Vec<(Vec<u8>, Ipv4Addr)>,
        replies: VecDeque<io::Result<Vec<u8>>>,
    }

    impl Transport for FakeTransport {
        fn send_to(&mut self, bytes: &[u8], dst: Ipv4Addr) -> io::Result<usize> {
            self.sent.push((bytes.to_vec(), dst));
            Ok(bytes.len())
        }

        fn recv(&mut self, buf: &mut [u8], _timeout: Duration) -> io::Result<usize> {
            match self.replies.pop_front() {
                Some(Ok(bytes)) => {
                    buf[..bytes.len()].copy_from_slice(&bytes);
                    Ok(bytes.len())
                }
                Some(Err(e)) => Err(e),
                None => Err(io::ErrorKind::WouldBlock.into()),
            }
        }
    }

    #[test]
    fn loopback_echo_of_other_protocol_is_no_reply() {
        let gre = |payload: &'static [u8]| Datagram {
            proto: 47,
            src: [127, 0, 0, 1],
            dst: [127, 0, 0, 1],
            payload,
        };
        let request = gre(b"\x00\x00\x08\x00request");
        assert!(!gre(b"\x00\x00\x08\x00request").answers(&request));
        assert!(gre(b"\x00\x00\x08\x00reply").answers(&request));
    }

    fn syn() -> Packet {
        PacketBuilder::new()
            .stack(Box::new(IPv4::new([10, 0, 0, 1].into(), [10, 0, 0, 2].into())))
            .unwrap()
            .stack(Box::new(TCP::new(54321, 80).seq_no(1000).flags(TCP_FLAG_SYN)))
            .unwrap()
            .build()
            .unwrap()
    }

    fn syn_ack(sport: u16, dport: u16) -> Vec<u8> {
        PacketBuilder::new()
            .stack(Box::new(IPv4::new([10, 0, 0, 2].into(), [10, 0, 0, 1].into())))
            .unwrap()
            .stack(Box::new(
                TCP::new(sport, dport)
                    .seq_no(5000)
                    .ack_no(1001)
                    .flags(TCP_FLAG_SYN | TCP_FLAG_ACK),
            ))
            .unwrap()
            .build()
            .unwrap()
            .as_bytes()
            .to_vec()
    }

    #[test]
    fn send_goes_to_ip_destination() {
        let mut fake = FakeTransport::default();
        let packet = syn();
        assert_eq!(send_with(&mut fake, &packet).unwrap(), 40);
        assert_eq!(fake.sent[0].1, Ipv4Addr::new(10, 0, 0, 2));
        assert_eq!(fake.sent[0].0, packet.as_bytes());
    }

    #[test]
    fn sr1_skips_unrelated_traffic() {
        let _ = crate::register_defaults();

        let mut fake = FakeTransport::default();
        fake.replies.push_back(Ok(syn_ack(443, 54321)));
        fake.replies.push_back(Ok(syn_ack(80, 54321)));
        let reply = sr1_with(&mut fake, &syn(), Duration::from_secs(1))
            .unwrap()
            .unwrap();
        assert_eq!(reply.layers().len(), 2);
        assert!(reply.summary().contains("TCP 80 > 54321 [SYN+ACK]"), "{}", reply.summary());
    }

    #[test]
    fn sr1_timeout_is_none() {
        let mut fake = FakeTransport::default();
        let reply = sr1_with(&mut fake, &syn(), Duration::from_millis(50)).unwrap();
        assert!(reply.is_none());
    }

    #[test]
    fn permission_denied_has_a_hint() {
        let mut fake = FakeTransport::default();
        fake.replies
            .push_back(Err(io::ErrorKind::PermissionDenied.into()));
        let err = sr1_with(&mut fake, &syn(), Duration::from_secs(1)).unwrap_err();
        assert!(
            matches!(err, Error::PermissionDenied(ref hint) if hint.contains("CAP_NET_RAW")),
            "{:?}",
            err
        );
    }

    #[test]
    fn raw_socket_opens_or_asks_for_privilege() {
        // Unprivileged runs get the hint, never a panic or an unrelated error.
        match RawSocket::for_protocol(IPPROTO_ICMP) {
            Ok(socket) => assert!(socket.recv.is_some()),
            Err(err) => assert!(matches!(err, Error::PermissionDenied(_)), "{:?}", err),
        }
    }

    #[test]
    fn echo_reply_must_match_identifier() {
        let request = PacketBuilder::new()
            .stack(Box::new(IPv4::new([10, 0, 0, 1].into(), [8, 8, 8, 8].into())))
            .unwrap()
            .stack(Box::new(ICMP::echo_request(0x1234, 1)))
            .unwrap()
            .build()
            .unwrap();
        let reply = |id| {
            PacketBuilder::new()
                .stack(Box::new(IPv4::new([8, 8, 8, 8].into(), [10, 0, 0, 1].into())))
                .unwrap()
                .stack(Box::new(ICMP::echo_reply(id, 1)))
                .unwrap()
                .build()
                .unwrap()
        };

        let req = Datagram::parse(request.as_bytes()).unwrap();
        let good = reply(0x1234);
        let other = reply(0x4321);
        assert!(Datagram::parse(good.as_bytes()).unwrap().answers(&req));
        assert!(!Datagram::parse(other.as_bytes()).unwrap().answers(&req));
        // Our own request, as seen on loopback, is not its reply.
        assert!(!req.answers(&req));
    }

    #[test]
    fn only_ipv4_packets_are_sent() {
        let packet = PacketBuilder::new().stack_bytes(b"hello").build().unwrap();
        let mut fake = FakeTransport::default();
        assert!(matches!(
            send_with(&mut fake, &packet),
            Err(Error::Network(_))
        ));
        assert!(fake.sent.is_empty());
    }
}
