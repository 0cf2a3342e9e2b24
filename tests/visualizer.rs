//! Build, dissect and annotate whole packets through the public API.

use wirelens::builder::PacketBuilder;
use wirelens::errors::Error;
use wirelens::field::FieldValue;
use wirelens::layers::arp::ARP;
use wirelens::layers::dns::{DNS, DNS_TYPE_A};
use wirelens::layers::ethernet::Ethernet;
use wirelens::layers::icmp::ICMP;
use wirelens::layers::ipv4::IPv4;
use wirelens::layers::tcp::{TCP, TCP_FLAG_ACK, TCP_FLAG_PSH, TCP_FLAG_SYN};
use wirelens::layers::tls::TLS;
use wirelens::layers::udp::UDP;
use wirelens::types::{IPv4Address, MACAddress};
use wirelens::view::{annotate, hexdump};
use wirelens::{Packet, ENCAP_TYPE_ETH, ENCAP_TYPE_IPV4};

fn localhost() -> IPv4Address {
    "127.0.0.1".parse().unwrap()
}

fn syn_packet() -> Packet {
    let _ = wirelens::register_defaults();
    PacketBuilder::new()
        .stack(Box::new(IPv4::new(localhost(), localhost())))
        .unwrap()
        .stack(Box::new(
            TCP::new(54321, 80)
                .seq_no(1000)
                .flags(TCP_FLAG_SYN)
                .window(65535),
        ))
        .unwrap()
        .build()
        .unwrap()
}

#[test]
fn syn_fields_sit_where_the_bytes_are() {
    let packet = syn_packet();
    assert_eq!(packet.len(), 40);

    let view = packet.view().unwrap();
    let sport = view.field("TCP", "sport").unwrap();
    assert_eq!(sport.range, 20..22);
    assert_eq!(&packet.as_bytes()[20..22], &[0xd4, 0x31]);
    assert_eq!(sport.value, FieldValue::Uint(54321));

    let flags = view.field("TCP", "flags").unwrap();
    assert_eq!(flags.range, 33..34);
    assert_eq!(packet.as_bytes()[33], 0x02);
    assert!(flags.text.contains("SYN"), "{}", flags.text);

    let proto = view.field("IPv4", "proto").unwrap();
    assert_eq!(proto.value, FieldValue::Uint(6));
}

#[test]
fn syn_checksums_verify() {
    let packet = syn_packet();
    let bytes = packet.as_bytes();
    assert!(wirelens::checksum::verify_checksum(&bytes[..20]));

    let mut pseudo = vec![];
    pseudo.extend_from_slice(&bytes[12..20]);
    pseudo.extend_from_slice(&[0, 6, 0, 20]);
    pseudo.extend_from_slice(&bytes[20..]);
    assert!(wirelens::checksum::verify_checksum(&pseudo));
}

#[test]
fn declared_widths_cover_the_buffer() {
    let packet = syn_packet();
    let view = packet.view().unwrap();

    let total: usize = view.annotations().map(|a| a.range.len()).sum();
    assert_eq!(total, packet.len());

    let mut next = 0;
    for a in view.annotations() {
        assert_eq!(a.range.start, next, "{} {}", a.layer, a.label);
        next = a.range.end;
    }
}

#[test]
fn every_field_reencodes_to_its_bytes() {
    let packet = syn_packet();
    let view = packet.view().unwrap();
    for a in view.annotations() {
        assert_eq!(
            a.value.to_bytes(a.range.len()),
            &packet.as_bytes()[a.range.clone()],
            "{}.{}",
            a.layer,
            a.label
        );
    }
    let seq = view.field("TCP", "seq").unwrap();
    assert_eq!(
        &packet.as_bytes()[seq.range.clone()],
        &[0x00, 0x00, 0x03, 0xe8]
    );
}

#[test]
fn arp_operation_at_offset_20() {
    let _ = wirelens::register_defaults();
    let mac = MACAddress::from([0x02, 0, 0, 0xaa, 0xbb, 0xcc]);
    let packet = PacketBuilder::new()
        .stack(Box::new(Ethernet::new(mac, MACAddress::BROADCAST)))
        .unwrap()
        .stack(Box::new(ARP::request(
            mac,
            IPv4Address::from([192, 168, 1, 100]),
            IPv4Address::from([192, 168, 1, 1]),
        )))
        .unwrap()
        .build()
        .unwrap();

    assert_eq!(packet.len(), 42);
    assert_eq!(&packet.as_bytes()[12..14], &[0x08, 0x06]);

    let view = packet.view().unwrap();
    let op = view.field("ARP", "op").unwrap();
    assert_eq!(op.range, 20..22);
    assert_eq!(op.value, FieldValue::Uint(1));
}

#[test]
fn short_buffer_is_a_length_mismatch() {
    let packet = syn_packet();
    let specs = packet.layer_specs();

    let err = annotate(&specs, &packet.as_bytes()[..39]).unwrap_err();
    assert_eq!(
        err,
        Error::LengthMismatch {
            layer: "TCP".to_string(),
            declared: 40,
            available: 39,
        }
    );

    let mut longer = packet.as_bytes().to_vec();
    longer.push(0);
    assert!(matches!(
        annotate(&specs, &longer),
        Err(Error::LengthMismatch { available: 41, .. })
    ));
}

#[test]
fn hexdump_is_stable() {
    let packet = syn_packet();
    let first = hexdump(packet.as_bytes());
    assert_eq!(first, hexdump(packet.as_bytes()));
    assert_eq!(first.lines().count(), 3);
    assert!(first.starts_with("0000  45 00 00 28"));

    let view = packet.view().unwrap();
    assert_eq!(view.render_hex(), packet.view().unwrap().render_hex());
}

#[test]
fn built_packet_dissects_to_the_same_view() {
    let _ = wirelens::register_defaults();
    let built = PacketBuilder::new()
        .stack(Box::new(Ethernet::new(
            MACAddress::from([0xaa, 0xbb, 0xcc, 0x11, 0x22, 0x33]),
            MACAddress::from([0xff, 0xee, 0xdd, 0x44, 0x55, 0x66]),
        )))
        .unwrap()
        .stack(Box::new(IPv4::new(
            IPv4Address::from([192, 168, 1, 100]),
            IPv4Address::from([93, 184, 216, 34]),
        )))
        .unwrap()
        .stack(Box::new(
            TCP::new(54321, 80)
                .seq_no(1000)
                .ack_no(5000)
                .flags(TCP_FLAG_PSH | TCP_FLAG_ACK)
                .window(65535),
        ))
        .unwrap()
        .stack_bytes(b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n")
        .build()
        .unwrap();

    let dissected = Packet::from_bytes(built.as_bytes(), ENCAP_TYPE_ETH).unwrap();
    assert_eq!(dissected.summary(), built.summary());
    assert_eq!(
        dissected.view().unwrap().render_fields(),
        built.view().unwrap().render_fields()
    );
    assert_eq!(dissected.unprocessed().len(), 38);
}

#[test]
fn dns_over_udp_round_trip() {
    let _ = wirelens::register_defaults();
    let built = PacketBuilder::new()
        .stack(Box::new(IPv4::new(
            IPv4Address::from([192, 168, 1, 100]),
            IPv4Address::from([8, 8, 8, 8]),
        )))
        .unwrap()
        .stack(Box::new(UDP::new(54326, 53)))
        .unwrap()
        .stack(Box::new(DNS::query(0x1234, "example.com", DNS_TYPE_A).unwrap()))
        .unwrap()
        .build()
        .unwrap();

    assert_eq!(built.len(), 20 + 8 + 29);
    let dissected = Packet::from_bytes(built.as_bytes(), ENCAP_TYPE_IPV4).unwrap();
    let names: Vec<_> = dissected.layers().iter().map(|l| l.name()).collect();
    assert_eq!(names, ["IPv4", "UDP", "DNS"]);

    let view = dissected.view().unwrap();
    let qname = view.field("DNS", "qd[0].qname").unwrap();
    assert_eq!(qname.range, 40..53);
}

#[test]
fn tls_record_behind_port_443() {
    let _ = wirelens::register_defaults();
    let built = PacketBuilder::new()
        .stack(Box::new(
            TCP::new(54321, 443)
                .seq_no(2000)
                .ack_no(6000)
                .flags(TCP_FLAG_PSH | TCP_FLAG_ACK),
        ))
        .unwrap()
        .stack(Box::new(TLS::application_data(&[0x5a; 64])))
        .unwrap()
        .build()
        .unwrap();

    assert_eq!(built.len(), 20 + 5 + 64);
    assert_eq!(&built.as_bytes()[20..25], &[0x17, 0x03, 0x03, 0x00, 0x40]);
    let view = built.view().unwrap();
    assert_eq!(view.field("TLS", "fragment").unwrap().range, 25..89);
}

#[test]
fn echo_request_carries_payload() {
    let _ = wirelens::register_defaults();
    let built = PacketBuilder::new()
        .stack(Box::new(IPv4::new(localhost(), localhost())))
        .unwrap()
        .stack(Box::new(ICMP::echo_request(0x1234, 1)))
        .unwrap()
        .stack_bytes(b"ping")
        .build()
        .unwrap();

    assert_eq!(built.as_bytes()[9], 1);
    assert!(wirelens::checksum::verify_checksum(&built.as_bytes()[20..]));
    let dissected = Packet::from_bytes(built.as_bytes(), ENCAP_TYPE_IPV4).unwrap();
    assert_eq!(dissected.layers().len(), 2);
    assert_eq!(dissected.unprocessed(), b"ping");
}
