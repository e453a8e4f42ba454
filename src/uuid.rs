use uuid::Uuid;

/// The Bluetooth base UUID, `00000000-0000-1000-8000-00805F9B34FB`.
const BASE_UUID: u128 = 0x0000_0000_0000_1000_8000_0080_5F9B_34FB;
const SHORT_MASK: u128 = 0xFFFF_FFFF_0000_0000_0000_0000_0000_0000;

/// Client Characteristic Configuration descriptor.
pub const CLIENT_CHARACTERISTIC_CONFIGURATION: u16 = 0x2902;

/// Conversions between full 128-bit UUIDs and the 16-bit assigned numbers
/// that sit on top of the Bluetooth base UUID.
pub trait ShortUuid {
    fn from_u16(short: u16) -> Self;

    fn to_u16(&self) -> Option<u16>;

    fn to_short_string(&self) -> String;
}

impl ShortUuid for Uuid {
    fn from_u16(short: u16) -> Self {
        Uuid::from_u128(BASE_UUID | ((short as u128) << 96))
    }

    fn to_u16(&self) -> Option<u16> {
        let value = self.as_u128();
        if value & !SHORT_MASK != BASE_UUID {
            return None;
        }
        u16::try_from(value >> 96).ok()
    }

    fn to_short_string(&self) -> String {
        match self.to_u16() {
            Some(short) => format!("{short:04X}"),
            None => self.hyphenated().to_string().to_uppercase(),
        }
    }
}

pub fn is_cccd(uuid: &Uuid) -> bool {
    uuid.to_u16() == Some(CLIENT_CHARACTERISTIC_CONFIGURATION)
}
