use std::fmt;

/// Length of a light control packet.
pub const PACKET_LEN: usize = 20;

const HEADER: [u8; 3] = [0x33, 0x05, 0x0d];

/// Solid white, as shipped to the lights.
pub const WHITE: ColorPayload = ColorPayload::solid(0xff, 0xff, 0xff);

/// Solid pink, as shipped to the lights.
pub const PINK: ColorPayload = ColorPayload::solid(0xff, 0x15, 0xd8);

/// Bytes written verbatim to the light's control characteristic.
///
/// The scanner never looks inside; it only forwards them.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ColorPayload([u8; PACKET_LEN]);

impl ColorPayload {
    /// Encode a "set solid color" packet: header, RGB, zero padding and a
    /// trailing XOR checksum over the preceding 19 bytes.
    pub const fn solid(red: u8, green: u8, blue: u8) -> Self {
        let mut bytes = [0u8; PACKET_LEN];
        bytes[0] = HEADER[0];
        bytes[1] = HEADER[1];
        bytes[2] = HEADER[2];
        bytes[3] = red;
        bytes[4] = green;
        bytes[5] = blue;

        let mut checksum = 0u8;
        let mut i = 0;
        while i < PACKET_LEN - 1 {
            checksum ^= bytes[i];
            i += 1;
        }
        bytes[PACKET_LEN - 1] = checksum;

        ColorPayload(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for ColorPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}
