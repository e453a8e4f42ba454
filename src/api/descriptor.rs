use uuid::Uuid;

use crate::api::characteristic::Characteristic;
use crate::uuid::is_cccd;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    pub uuid: Uuid,
    pub value: Option<DescriptorValue>,
}

/// Descriptor values are typed by the platform according to the descriptor
/// kind: user descriptions arrive as text, extended properties as a flag,
/// everything else as raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorValue {
    Bool(bool),
    Text(String),
    Bytes(Vec<u8>),
    Unknown,
}

impl Descriptor {
    pub fn new(uuid: Uuid) -> Self {
        Descriptor { uuid, value: None }
    }

    pub fn is_cccd(&self) -> bool {
        is_cccd(&self.uuid)
    }

    /// Display value of the descriptor. The CCCD reflects the notification
    /// state of `parent` instead of its own bytes.
    pub fn value_string(&self, parent: &Characteristic) -> String {
        if self.is_cccd() {
            return if parent.is_notifying {
                "Enabled".to_string()
            } else {
                "Disabled".to_string()
            };
        }
        match &self.value {
            None => String::new(),
            Some(DescriptorValue::Bool(value)) => value.to_string(),
            Some(DescriptorValue::Text(text)) => text.clone(),
            Some(DescriptorValue::Bytes(bytes)) => format!("0x{}", hex::encode_upper(bytes)),
            Some(DescriptorValue::Unknown) => "Unknown".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::characteristic::CharacteristicProperties;
    use crate::uuid::ShortUuid;

    #[test]
    fn cccd_shows_parent_notification_state() {
        let mut parent = Characteristic::new(Uuid::from_u16(0x2A37), CharacteristicProperties::NOTIFY);
        let mut cccd = Descriptor::new(Uuid::from_u16(0x2902));
        cccd.value = Some(DescriptorValue::Bytes(vec![0x01, 0x00]));

        assert_eq!(cccd.value_string(&parent), "Disabled");
        parent.is_notifying = true;
        assert_eq!(cccd.value_string(&parent), "Enabled");
    }

    #[test]
    fn typed_values_render() {
        let parent = Characteristic::new(Uuid::nil(), CharacteristicProperties::READ);
        let mut descriptor = Descriptor::new(Uuid::from_u16(0x2901));
        assert_eq!(descriptor.value_string(&parent), "");

        descriptor.value = Some(DescriptorValue::Text("Heart Rate".into()));
        assert_eq!(descriptor.value_string(&parent), "Heart Rate");

        descriptor.value = Some(DescriptorValue::Bool(true));
        assert_eq!(descriptor.value_string(&parent), "true");

        descriptor.value = Some(DescriptorValue::Bytes(vec![0xbe, 0xef]));
        assert_eq!(descriptor.value_string(&parent), "0xBEEF");

        descriptor.value = Some(DescriptorValue::Unknown);
        assert_eq!(descriptor.value_string(&parent), "Unknown");
    }
}
