/// Implements hex-string serde for a fixed-size byte newtype.
///
/// Records travel as CBOR on the graph and as JSON inside encrypted
/// messages; both carry identifiers and keys as lowercase hex text.
macro_rules! impl_hex_serde {
    ($ty:ident, $len:expr) => {
        impl serde::Serialize for $ty {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&hex::encode(self.0))
            }
        }

        impl<'de> serde::Deserialize<'de> for $ty {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = <String as serde::Deserialize>::deserialize(deserializer)?;
                let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
                let arr: [u8; $len] = bytes.try_into().map_err(|b: Vec<u8>| {
                    serde::de::Error::invalid_length(b.len(), &concat!(stringify!($len), " bytes"))
                })?;
                Ok(Self(arr))
            }
        }
    };
}
