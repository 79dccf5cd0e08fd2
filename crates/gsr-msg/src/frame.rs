//! Synthetic LoRaWAN PDU construction for injected uplinks.

/// Device address stamped into every synthetic frame, little-endian on the
/// wire.
const DEV_ADDR: [u8; 4] = [0x01, 0x00, 0x00, 0x00];

/// Fixed application payload carried by every synthetic frame.
const APP_PAYLOAD: [u8; 6] = [0x0A, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F];

const MHDR_UNCONFIRMED_DATA_UP: u8 = 0x40;

/// Build an UnconfirmedDataUp frame for the given frame counter and port.
///
/// Layout: MHDR | DevAddr (LE) | FCtrl | FCnt (LE, low 16 bits) | FPort |
/// FRMPayload | MIC. The agent's simulation build forwards the frame without
/// verifying the MIC, so a zero MIC is sufficient.
pub fn build_uplink_frame(fcnt: u32, port: u8) -> Vec<u8> {
    let mut buf = Vec::with_capacity(12 + APP_PAYLOAD.len() + 4);
    buf.push(MHDR_UNCONFIRMED_DATA_UP);
    buf.extend_from_slice(&DEV_ADDR);
    buf.push(0x00); // FCtrl: no ADR, no ACK, no options
    buf.extend_from_slice(&((fcnt & 0xFFFF) as u16).to_le_bytes());
    buf.push(port);
    buf.extend_from_slice(&APP_PAYLOAD);
    buf.extend_from_slice(&[0u8; 4]);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_layout_matches_lorawan_data_up() {
        let frame = build_uplink_frame(0x0204, 1);
        assert_eq!(frame.len(), 1 + 4 + 1 + 2 + 1 + 6 + 4);
        assert_eq!(frame[0], 0x40);
        assert_eq!(&frame[1..5], &DEV_ADDR);
        assert_eq!(frame[5], 0x00);
        // FCnt little-endian
        assert_eq!(&frame[6..8], &[0x04, 0x02]);
        assert_eq!(frame[8], 1);
        assert_eq!(&frame[9..15], &APP_PAYLOAD);
    }

    #[test]
    fn frame_counter_truncates_to_16_bits() {
        let frame = build_uplink_frame(0x0001_0007, 3);
        assert_eq!(&frame[6..8], &[0x07, 0x00]);
        assert_eq!(frame[8], 3);
    }
}
