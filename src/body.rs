//! Request payload codecs.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;

use crate::{CastError, Result};

pub(crate) const JSON: &str = "application/json";
pub(crate) const XML: &str = "application/xml";
pub(crate) const TEXT: &str = "text/plain; charset=utf-8";
pub(crate) const FORM: &str = "application/x-www-form-urlencoded";

/// Type-erased serializable value.
///
/// Payloads are kept unserialized so every attempt encodes a fresh byte
/// buffer from the same source value.
pub(crate) trait Payload: Send + Sync {
    fn to_json(&self) -> std::result::Result<Vec<u8>, String>;
    fn to_xml(&self) -> std::result::Result<String, String>;
    fn to_form(&self) -> std::result::Result<String, String>;
}

impl<T> Payload for T
where
    T: Serialize + Send + Sync,
{
    fn to_json(&self) -> std::result::Result<Vec<u8>, String> {
        serde_json::to_vec(self).map_err(|err| err.to_string())
    }

    fn to_xml(&self) -> std::result::Result<String, String> {
        quick_xml::se::to_string(self).map_err(|err| err.to_string())
    }

    fn to_form(&self) -> std::result::Result<String, String> {
        serde_urlencoded::to_string(self).map_err(|err| err.to_string())
    }
}

#[derive(Clone, Default)]
enum Inner {
    #[default]
    Empty,
    Json(Arc<dyn Payload>),
    Xml(Arc<dyn Payload>),
    Text(String),
    Form(Arc<dyn Payload>),
}

/// Request body together with its declared encoding.
#[derive(Clone, Default)]
pub struct Body(Inner);

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Inner::Text(text) => f.debug_tuple("Text").field(text).finish(),
            _ => f.write_str(self.encoding().unwrap_or("empty")),
        }
    }
}

/// Encoded body bytes and the content type they were encoded as.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedBody {
    pub bytes: Bytes,
    pub content_type: &'static str,
}

impl Body {
    pub fn empty() -> Self {
        Self(Inner::Empty)
    }

    pub fn json<T: Serialize + Send + Sync + 'static>(payload: T) -> Self {
        Self(Inner::Json(Arc::new(payload)))
    }

    pub fn xml<T: Serialize + Send + Sync + 'static>(payload: T) -> Self {
        Self(Inner::Xml(Arc::new(payload)))
    }

    pub fn text(payload: impl Into<String>) -> Self {
        Self(Inner::Text(payload.into()))
    }

    pub fn form<T: Serialize + Send + Sync + 'static>(payload: T) -> Self {
        Self(Inner::Form(Arc::new(payload)))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.0, Inner::Empty)
    }

    /// Short name of the declared encoding, `None` for an empty body.
    pub fn encoding(&self) -> Option<&'static str> {
        match self.0 {
            Inner::Empty => None,
            Inner::Json(_) => Some("json"),
            Inner::Xml(_) => Some("xml"),
            Inner::Text(_) => Some("text"),
            Inner::Form(_) => Some("form"),
        }
    }

    /// Serializes the payload into a new buffer.
    pub fn encode(&self) -> Result<Option<EncodedBody>> {
        let encoding = self.encoding().unwrap_or("empty");
        let failed = |message: String| CastError::BodyEncoding { encoding, message };

        let (bytes, content_type) = match &self.0 {
            Inner::Empty => return Ok(None),
            Inner::Json(payload) => (Bytes::from(payload.to_json().map_err(failed)?), JSON),
            Inner::Xml(payload) => (Bytes::from(payload.to_xml().map_err(failed)?), XML),
            Inner::Text(text) => (Bytes::from(text.clone()), TEXT),
            Inner::Form(payload) => (Bytes::from(payload.to_form().map_err(failed)?), FORM),
        };
        Ok(Some(EncodedBody {
            bytes,
            content_type,
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde::Serialize;

    use super::{Body, FORM, JSON, TEXT, XML};
    use crate::CastError;

    #[derive(Serialize)]
    struct User {
        id: u32,
        name: String,
    }

    fn kit() -> User {
        User {
            id: 7,
            name: "Kit".to_owned(),
        }
    }

    #[test]
    fn empty_body_encodes_to_nothing() {
        assert!(Body::empty().encode().expect("must encode").is_none());
        assert!(Body::default().is_empty());
    }

    #[test]
    fn json_body() {
        let encoded = Body::json(kit()).encode().unwrap().unwrap();
        assert_eq!(encoded.content_type, JSON);
        assert_eq!(&encoded.bytes[..], br#"{"id":7,"name":"Kit"}"#);
    }

    #[test]
    fn xml_body_uses_struct_name_as_root() {
        let encoded = Body::xml(kit()).encode().unwrap().unwrap();
        assert_eq!(encoded.content_type, XML);
        assert_eq!(&encoded.bytes[..], b"<User><id>7</id><name>Kit</name></User>");
    }

    #[test]
    fn text_body() {
        let encoded = Body::text("ping").encode().unwrap().unwrap();
        assert_eq!(encoded.content_type, TEXT);
        assert_eq!(&encoded.bytes[..], b"ping");
    }

    #[test]
    fn form_body() {
        let encoded = Body::form(kit()).encode().unwrap().unwrap();
        assert_eq!(encoded.content_type, FORM);
        assert_eq!(&encoded.bytes[..], b"id=7&name=Kit");
    }

    #[test]
    fn encoding_is_repeatable() {
        let body = Body::json(kit());
        assert_eq!(body.encode().unwrap(), body.encode().unwrap());
    }

    #[test]
    fn unserializable_payload_is_a_body_encoding_error() {
        let mut nested = BTreeMap::new();
        nested.insert("outer", BTreeMap::from([("inner", 1)]));
        let err = Body::form(nested).encode().expect_err("nested maps are not form-encodable");
        assert!(matches!(
            err,
            CastError::BodyEncoding {
                encoding: "form",
                ..
            }
        ));
    }

    #[test]
    fn non_string_json_keys_fail() {
        let map = BTreeMap::from([((1, 2), "pair")]);
        let err = Body::json(map).encode().expect_err("tuple keys are not JSON");
        assert!(matches!(err, CastError::BodyEncoding { encoding: "json", .. }));
    }
}
