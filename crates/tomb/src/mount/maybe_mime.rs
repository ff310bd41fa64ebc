use std::path::Path;
use std::str::FromStr;

use mime::Mime;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// An optional MIME type that serializes as a plain string (or null).
///
/// `mime::Mime` does not implement serde, and we want the encoded form to
/// be a bare string rather than a struct, so this wraps the option with
/// its own impls.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MaybeMime(pub Option<Mime>);

impl MaybeMime {
    /// Guess the MIME type from a path's extension.
    pub fn from_path(path: &Path) -> Self {
        MaybeMime(mime_guess::from_path(path).first())
    }
}

impl Serialize for MaybeMime {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match &self.0 {
            Some(mime) => serializer.serialize_str(mime.as_ref()),
            None => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for MaybeMime {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let opt: Option<String> = Option::deserialize(deserializer)?;
        match opt {
            Some(s) => {
                let mime = Mime::from_str(&s).map_err(serde::de::Error::custom)?;
                Ok(MaybeMime(Some(mime)))
            }
            None => Ok(MaybeMime(None)),
        }
    }
}
