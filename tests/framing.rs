//! Property tests for packet framing over arbitrarily split input

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use proptest::prelude::*;
use proto_proxy::core::codec::PacketWriter;
use proto_proxy::core::packet::{ClientPacket, ServerPacket};
use proto_proxy::core::queue::ByteQueue;
use proto_proxy::protocol::dispatcher::{next_packet, Dispatch};

fn packet_strategy() -> impl Strategy<Value = (ClientPacket, Vec<u8>)> {
    prop_oneof![
        any::<i32>().prop_map(|id| {
            let bytes = PacketWriter::new(0x00).i32(id).finish().to_vec();
            (ClientPacket::KeepAlive { id }, bytes)
        }),
        "[a-zA-Z0-9 ]{0,40}".prop_map(|message| {
            let bytes = PacketWriter::new(0x03).string16(&message).finish().to_vec();
            (ClientPacket::ChatMessage { message }, bytes)
        }),
        any::<i16>().prop_map(|slot| {
            let bytes = PacketWriter::new(0x10).i16(slot).finish().to_vec();
            (ClientPacket::SlotSelect { slot }, bytes)
        }),
        (any::<i32>(), any::<u8>()).prop_map(|(entity_id, animation)| {
            let bytes = PacketWriter::new(0x12).i32(entity_id).u8(animation).finish().to_vec();
            (
                ClientPacket::Animation {
                    entity_id,
                    animation: animation as i8,
                },
                bytes,
            )
        }),
        Just((ClientPacket::Ping, vec![0xfe])),
    ]
}

/// Dispatch everything complete in `queue`, committing after each packet
fn drain(queue: &mut ByteQueue, out: &mut Vec<ClientPacket>) {
    loop {
        match next_packet::<ClientPacket>(queue).expect("stream is well formed") {
            Dispatch::Packet(_, packet) => {
                queue.commit();
                out.push(packet);
            }
            Dispatch::Incomplete | Dispatch::Empty => return,
            Dispatch::Unknown(id) => panic!("unexpected id 0x{id:02x}"),
        }
    }
}

proptest! {
    #[test]
    fn prop_split_points_do_not_change_packets(
        packets in prop::collection::vec(packet_strategy(), 1..20),
        cuts in prop::collection::vec(any::<prop::sample::Index>(), 0..10),
    ) {
        let stream: Vec<u8> = packets.iter().flat_map(|(_, bytes)| bytes.clone()).collect();
        let expected: Vec<ClientPacket> = packets.into_iter().map(|(packet, _)| packet).collect();

        let mut points: Vec<usize> = cuts.iter().map(|ix| ix.index(stream.len() + 1)).collect();
        points.push(0);
        points.push(stream.len());
        points.sort_unstable();
        points.dedup();

        let mut queue = ByteQueue::new(stream.len().max(1));
        let mut decoded = Vec::new();
        for window in points.windows(2) {
            queue.write(&stream[window[0]..window[1]]).unwrap();
            drain(&mut queue, &mut decoded);
        }

        prop_assert_eq!(decoded, expected);
        prop_assert_eq!(queue.uncommitted(), 0);
    }

    #[test]
    fn prop_interrupted_read_leaves_queue_unchanged(
        message in "[a-z]{1,64}",
        cut in any::<prop::sample::Index>(),
    ) {
        let bytes = PacketWriter::new(0x03).string16(&message).finish().to_vec();
        let cut = 1 + cut.index(bytes.len() - 1);

        let mut queue = ByteQueue::new(bytes.len());
        queue.write(&bytes[..cut]).unwrap();
        let before = (queue.uncommitted(), queue.readable());

        let step = next_packet::<ClientPacket>(&mut queue).unwrap();
        prop_assert_eq!(step, Dispatch::Incomplete);
        prop_assert_eq!((queue.uncommitted(), queue.readable()), before);

        queue.write(&bytes[cut..]).unwrap();
        let step = next_packet::<ClientPacket>(&mut queue).unwrap();
        let is_chat = matches!(step, Dispatch::Packet(_, ClientPacket::ChatMessage { .. }));
        prop_assert!(is_chat);
    }
}

#[test]
fn test_unknown_id_consumes_only_the_id_byte() {
    let mut queue = ByteQueue::new(16);
    queue.write(&[0x99, 0x01, 0x02]).unwrap();
    assert_eq!(
        next_packet::<ClientPacket>(&mut queue).unwrap(),
        Dispatch::Unknown(0x99)
    );
    assert_eq!(queue.readable(), 2);
    assert_eq!(queue.uncommitted(), 3);
}

#[test]
fn test_update_health_fixture_in_two_reads() {
    let bytes = hex::decode("080014001440a00000").unwrap();
    let mut queue = ByteQueue::new(16);

    queue.write(&bytes[..5]).unwrap();
    assert_eq!(
        next_packet::<ServerPacket>(&mut queue).unwrap(),
        Dispatch::Incomplete
    );
    assert_eq!(queue.uncommitted(), 5);

    queue.write(&bytes[5..]).unwrap();
    let Dispatch::Packet(_, packet) = next_packet::<ServerPacket>(&mut queue).unwrap() else {
        panic!("update health should decode");
    };
    assert_eq!(
        packet,
        ServerPacket::UpdateHealth {
            health: 20,
            food: 20,
            saturation: 5.0,
        }
    );
    assert_eq!(queue.read_again(), &bytes[..]);
    queue.commit();
    assert_eq!(queue.uncommitted(), 0);
}
