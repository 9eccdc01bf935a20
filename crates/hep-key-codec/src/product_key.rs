//! Product keys: a full [`ItemDescriptor`] (or dataset-level descriptor)
//! followed by a `label#type_name` UTF-8 suffix (§3.2).

use crate::descriptor::{ItemDescriptor, ITEM_DESCRIPTOR_LEN};
use crate::error::Error;

/// Identifies a product attached to some item: a human-chosen `label` plus a
/// stable textual name for the product's type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProductKey {
    pub label: String,
    pub type_name: String,
}

impl ProductKey {
    pub fn new(label: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            type_name: type_name.into(),
        }
    }

    /// The on-wire suffix: `label#type_name`, UTF-8 encoded.
    fn suffix_bytes(&self) -> Vec<u8> {
        let mut s = String::with_capacity(self.label.len() + 1 + self.type_name.len());
        s.push_str(&self.label);
        s.push('#');
        s.push_str(&self.type_name);
        s.into_bytes()
    }

    fn parse_suffix(bytes: &[u8]) -> Result<Self, Error> {
        let text = std::str::from_utf8(bytes)?;
        let idx = text.rfind('#').ok_or(Error::MissingProductSeparator)?;
        Ok(Self {
            label: text[..idx].to_string(),
            type_name: text[idx + 1..].to_string(),
        })
    }
}

/// Encodes the full product key: `item`'s full 40-byte descriptor followed
/// by `product`'s `label#type_name` suffix.
pub fn encode_product_key(item: &ItemDescriptor, product: &ProductKey) -> Vec<u8> {
    let mut buf = Vec::with_capacity(ITEM_DESCRIPTOR_LEN + product.label.len() + product.type_name.len() + 1);
    buf.extend_from_slice(&item.to_full_bytes());
    buf.extend_from_slice(&product.suffix_bytes());
    buf
}

/// Decodes a product key back into its item descriptor and `(label, type)`.
pub fn decode_product_key(bytes: &[u8]) -> Result<(ItemDescriptor, ProductKey), Error> {
    if bytes.len() < ITEM_DESCRIPTOR_LEN {
        return Err(Error::WrongLength {
            expected: ITEM_DESCRIPTOR_LEN,
            actual: bytes.len(),
        });
    }
    let mut descriptor_bytes = [0u8; ITEM_DESCRIPTOR_LEN];
    descriptor_bytes.copy_from_slice(&bytes[..ITEM_DESCRIPTOR_LEN]);
    let item = ItemDescriptor::from_full_bytes(&descriptor_bytes);
    let product = ProductKey::parse_suffix(&bytes[ITEM_DESCRIPTOR_LEN..])?;
    Ok((item, product))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::DatasetId;

    #[test]
    fn round_trip() {
        let item = ItemDescriptor::event(DatasetId::from_bytes([7; 16]), 36, 42, 13);
        let product = ProductKey::new("mylabel", "hep::Electron");
        let encoded = encode_product_key(&item, &product);
        let (decoded_item, decoded_product) = decode_product_key(&encoded).unwrap();
        assert_eq!(decoded_item, item);
        assert_eq!(decoded_product, product);
    }

    #[test]
    fn label_may_contain_hash_and_still_round_trips_via_rightmost_split() {
        let item = ItemDescriptor::dataset(DatasetId::from_bytes([1; 16]));
        let product = ProductKey::new("run#1#summary", "hep::Summary");
        let encoded = encode_product_key(&item, &product);
        let (_, decoded) = decode_product_key(&encoded).unwrap();
        assert_eq!(decoded, product);
    }
}
