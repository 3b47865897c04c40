//! Integration tests for the CTAP HID transport layer
//!
//! Drives the public API the way a host-facing runner would: INIT
//! handshake on the broadcast channel, then fragmented traffic over the
//! allocated channel, all through raw 64-byte frames.

use softkey_transport::{split, Cmd, Event, Framer, Message, BROADCAST_CID, PACKET_SIZE};

/// Build a raw initialization packet with bcnt derived from the payload
fn init_frame(cid: u32, cmd: Cmd, payload: &[u8]) -> Vec<u8> {
    let mut frame = vec![0u8; PACKET_SIZE];
    frame[0..4].copy_from_slice(&cid.to_be_bytes());
    frame[4] = cmd.to_u8_init();
    frame[5..7].copy_from_slice(&(payload.len() as u16).to_be_bytes());
    frame[7..7 + payload.len()].copy_from_slice(payload);
    frame
}

/// INIT handshake against a production framer; returns the allocated CID
fn open_channel(framer: &mut Framer) -> u32 {
    let nonce = [0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88];
    let event = framer.handle(&init_frame(BROADCAST_CID, Cmd::Init, &nonce));

    let message = match event {
        Event::Complete(message) => message,
        other => panic!("INIT handshake failed: {other:?}"),
    };
    assert_eq!(message.cmd, Cmd::Init);
    assert_eq!(message.cid, BROADCAST_CID);
    assert_eq!(message.data.len(), 17);
    assert_eq!(&message.data[0..8], &nonce);

    u32::from_be_bytes([
        message.data[8],
        message.data[9],
        message.data[10],
        message.data[11],
    ])
}

#[test]
fn test_init_handshake() {
    let mut framer = Framer::new();

    let cid = open_channel(&mut framer);
    assert_ne!(cid, 0);
    assert_ne!(cid, BROADCAST_CID);
    assert!(framer.is_allocated(cid));
}

#[test]
fn test_two_handshakes_allocate_distinct_channels() {
    let mut framer = Framer::new();

    let first = open_channel(&mut framer);
    let second = open_channel(&mut framer);
    assert_ne!(first, second);
    assert!(framer.is_allocated(first));
    assert!(framer.is_allocated(second));
}

#[test]
fn test_ping_round_trip() {
    let mut framer = Framer::new();
    let cid = open_channel(&mut framer);

    // Large enough to need fragmentation in both directions
    let payload: Vec<u8> = (0..500u32).map(|i| (i % 251) as u8).collect();

    let mut delivered = None;
    for packet in split(cid, Cmd::Ping, &payload).unwrap() {
        match framer.handle(packet.as_bytes()) {
            Event::InProgress => {}
            Event::Complete(message) => delivered = Some(message),
            Event::Error(message) => panic!("framer error: {:?}", message.data),
        }
    }

    let request = delivered.expect("ping never completed");
    assert_eq!(request, Message::new(cid, Cmd::Ping, payload.clone()));

    // Echo it back out and check the emitted frames reassemble identically
    let mut echo_framer = Framer::new();
    let echo_cid = open_channel(&mut echo_framer);
    let frames: Vec<_> = echo_framer
        .emit(Cmd::Ping, echo_cid, &request.data)
        .unwrap()
        .collect();
    assert!(!frames.is_empty());
    for frame in &frames {
        assert_eq!(frame.as_bytes().len(), PACKET_SIZE);
    }

    let mut delivered = None;
    for frame in &frames {
        if let Event::Complete(message) = echo_framer.handle(frame.as_bytes()) {
            delivered = Some(message);
        }
    }
    assert_eq!(delivered, Some(Message::new(echo_cid, Cmd::Ping, payload)));
}

#[test]
fn test_cancel_delivered_as_event() {
    let mut framer = Framer::new();
    let cid = open_channel(&mut framer);

    let event = framer.handle(&init_frame(cid, Cmd::Cancel, &[]));
    assert_eq!(event, Event::Complete(Message::new(cid, Cmd::Cancel, vec![])));
}

#[test]
fn test_error_message_splits_into_single_frame() {
    let mut framer = Framer::new();

    // Unknown channel: the framer answers with a CTAPHID_ERROR message
    let bogus = init_frame(0x0102_0304, Cmd::Cbor, &[0x04]);
    let message = match framer.handle(&bogus) {
        Event::Error(message) => message,
        other => panic!("expected error, got {other:?}"),
    };
    assert!(message.is_error());
    assert_eq!(message.data, vec![0x0B]);

    let frames: Vec<_> = message.to_packets().unwrap();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].cmd(), Some(Cmd::Error));
    assert_eq!(frames[0].payload_len(), Some(1));
}
