//! Transport bridge
//!
//! Connects the CTAP HID transport layer (`softkey-transport`) with the
//! protocol layer by driving the framer and the dispatcher from a single
//! packet-in/packets-out entry point. Only available with the `transport`
//! feature.

use alloc::vec;
use alloc::vec::Vec;

use softkey_transport::{Cmd, ErrorCode, Event, Framer, Message, Packet};

use crate::dispatcher::Authenticator;

/// One packet-driven authenticator: framer plus dispatcher
///
/// Feed raw 64-byte HID reports into [`TransportBridge::process_packet`]
/// and write the returned packets back to the host. INIT handshakes and
/// framing errors are answered by the framer; PING and WINK are echoed
/// here; CBOR requests go through the dispatcher.
pub struct TransportBridge {
    framer: Framer,
    authenticator: Authenticator,
}

impl TransportBridge {
    /// Create a bridge around an authenticator, with a fresh framer
    pub fn new(authenticator: Authenticator) -> Self {
        Self {
            framer: Framer::new(),
            authenticator,
        }
    }

    /// Get a reference to the authenticator
    pub fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }

    /// Get a mutable reference to the authenticator
    pub fn authenticator_mut(&mut self) -> &mut Authenticator {
        &mut self.authenticator
    }

    /// Get a reference to the framer
    pub fn framer(&self) -> &Framer {
        &self.framer
    }

    /// Process one inbound HID packet and produce the response packets
    ///
    /// Returns an empty vector while a message is still assembling and for
    /// commands that have no response (CANCEL).
    pub fn process_packet(&mut self, packet: &[u8]) -> Vec<Packet> {
        let message = match self.framer.handle(packet) {
            Event::InProgress => return vec![],
            // INIT responses and framing errors arrive fully formed
            Event::Complete(message) | Event::Error(message) => message,
        };

        let reply = match message.cmd {
            Cmd::Init | Cmd::Error => Some(message),
            Cmd::Ping => Some(message),
            Cmd::Wink => Some(Message::new(message.cid, Cmd::Wink, vec![])),
            Cmd::Cancel => None,
            Cmd::Cbor => {
                let cid = message.cid;
                match self.authenticator.cbor(&message.data) {
                    Ok(data) => Some(Message::new(cid, Cmd::Cbor, data)),
                    // Encode failures are programmer errors in the
                    // settings; the host still deserves an answer
                    Err(_) => Some(Message::new(
                        cid,
                        Cmd::Error,
                        vec![ErrorCode::Other.to_u8()],
                    )),
                }
            }
            // MSG is advertised as unsupported (NMSG); LOCK and the
            // outbound-only commands have no inbound meaning here
            Cmd::Msg | Cmd::Lock | Cmd::Keepalive => Some(Message::new(
                message.cid,
                Cmd::Error,
                vec![ErrorCode::InvalidCmd.to_u8()],
            )),
        };

        match reply {
            Some(message) => message
                .to_packets()
                .unwrap_or_else(|_| vec![Packet::error(message.cid, ErrorCode::Other)]),
            None => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cbor::{self, Value};
    use softkey_transport::{BROADCAST_CID, PACKET_SIZE};

    fn init_frame(cid: u32, cmd: Cmd, payload: &[u8]) -> Vec<u8> {
        let mut frame = vec![0u8; PACKET_SIZE];
        frame[0..4].copy_from_slice(&cid.to_be_bytes());
        frame[4] = cmd.to_u8_init();
        frame[5..7].copy_from_slice(&(payload.len() as u16).to_be_bytes());
        frame[7..7 + payload.len()].copy_from_slice(payload);
        frame
    }

    /// Reassemble a response message from its emitted packets
    fn reassemble(packets: &[Packet]) -> (u32, Cmd, Vec<u8>) {
        let first = &packets[0];
        let cid = first.cid();
        let cmd = first.cmd().unwrap();
        let total = first.payload_len().unwrap() as usize;

        let mut data = Vec::with_capacity(total);
        data.extend_from_slice(&first.payload()[..total.min(first.payload().len())]);
        for packet in &packets[1..] {
            assert_eq!(packet.cid(), cid);
            let wanted = total - data.len();
            data.extend_from_slice(&packet.payload()[..wanted.min(packet.payload().len())]);
        }
        assert_eq!(data.len(), total);
        (cid, cmd, data)
    }

    fn open_channel(bridge: &mut TransportBridge) -> u32 {
        let packets = bridge.process_packet(&init_frame(BROADCAST_CID, Cmd::Init, &[0x55; 8]));
        let (cid, cmd, data) = reassemble(&packets);
        assert_eq!(cid, BROADCAST_CID);
        assert_eq!(cmd, Cmd::Init);
        assert_eq!(data.len(), 17);
        u32::from_be_bytes([data[8], data[9], data[10], data[11]])
    }

    #[test]
    fn test_init_then_get_info() {
        let mut bridge = TransportBridge::new(Authenticator::default());
        let cid = open_channel(&mut bridge);

        let packets = bridge.process_packet(&init_frame(cid, Cmd::Cbor, &[0x04]));
        let (reply_cid, cmd, data) = reassemble(&packets);
        assert_eq!(reply_cid, cid);
        assert_eq!(cmd, Cmd::Cbor);

        // Status byte then the canonical getInfo map
        assert_eq!(data[0], 0x00);
        let decoded = cbor::decode_all(&data[1..]).unwrap();
        let versions = decoded
            .map_get(&Value::Unsigned(0x01))
            .and_then(Value::as_array)
            .unwrap();
        assert_eq!(versions, &[Value::from("FIDO_2_1")]);
    }

    #[test]
    fn test_ping_echoes() {
        let mut bridge = TransportBridge::new(Authenticator::default());
        let cid = open_channel(&mut bridge);

        let payload = [0xDE, 0xAD, 0xBE, 0xEF];
        let packets = bridge.process_packet(&init_frame(cid, Cmd::Ping, &payload));
        let (_, cmd, data) = reassemble(&packets);
        assert_eq!(cmd, Cmd::Ping);
        assert_eq!(data, payload);
    }

    #[test]
    fn test_wink_answers_empty() {
        let mut bridge = TransportBridge::new(Authenticator::default());
        let cid = open_channel(&mut bridge);

        let packets = bridge.process_packet(&init_frame(cid, Cmd::Wink, &[]));
        let (_, cmd, data) = reassemble(&packets);
        assert_eq!(cmd, Cmd::Wink);
        assert!(data.is_empty());
    }

    #[test]
    fn test_msg_is_rejected() {
        let mut bridge = TransportBridge::new(Authenticator::default());
        let cid = open_channel(&mut bridge);

        let packets = bridge.process_packet(&init_frame(cid, Cmd::Msg, &[0x00, 0x01]));
        let (_, cmd, data) = reassemble(&packets);
        assert_eq!(cmd, Cmd::Error);
        assert_eq!(data, vec![0x01]);
    }

    #[test]
    fn test_cancel_has_no_response() {
        let mut bridge = TransportBridge::new(Authenticator::default());
        let cid = open_channel(&mut bridge);

        let packets = bridge.process_packet(&init_frame(cid, Cmd::Cancel, &[]));
        assert!(packets.is_empty());
    }

    #[test]
    fn test_framing_error_is_forwarded() {
        let mut bridge = TransportBridge::new(Authenticator::default());

        // Unknown channel straight to an error packet
        let packets = bridge.process_packet(&init_frame(0x0102_0304, Cmd::Cbor, &[0x04]));
        let (_, cmd, data) = reassemble(&packets);
        assert_eq!(cmd, Cmd::Error);
        assert_eq!(data, vec![0x0B]);
    }

    #[test]
    fn test_registered_handler_over_the_wire() {
        let mut authenticator = Authenticator::default();
        authenticator.register(0x02, |_: &Value| vec![0x00, 0xAB]);
        let mut bridge = TransportBridge::new(authenticator);
        let cid = open_channel(&mut bridge);

        let packets = bridge.process_packet(&init_frame(cid, Cmd::Cbor, &[0x02, 0xA0]));
        let (_, cmd, data) = reassemble(&packets);
        assert_eq!(cmd, Cmd::Cbor);
        assert_eq!(data, vec![0x00, 0xAB]);
    }
}
