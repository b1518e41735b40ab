use std::collections::{hash_map, HashMap};

use bytes::{Bytes, BytesMut};
use http::{
    header::{HeaderName, HeaderValue},
    HeaderMap, StatusCode, Version,
};

use crate::{
    label::{KeyLabel, StringKeyLabel, StringKeyLabelCiFast},
    Result,
};

/// Header map keyed by case-insensitive names. Values keep their exact bytes.
#[derive(Clone, Debug, Default)]
pub struct Headers {
    map: HashMap<StringKeyLabelCiFast, StringKeyLabel>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn get(&self, name: &StringKeyLabelCiFast) -> Option<&StringKeyLabel> {
        self.map.get(name)
    }

    #[inline]
    pub fn contains(&self, name: &StringKeyLabelCiFast) -> bool {
        self.map.contains_key(name)
    }

    /// Insert or replace, returning the previous value.
    pub fn put(
        &mut self,
        name: impl Into<StringKeyLabelCiFast>,
        value: impl Into<StringKeyLabel>,
    ) -> Option<StringKeyLabel> {
        self.map.insert(name.into(), value.into())
    }

    /// Insert unless `name` is already present. Returns whether it was inserted.
    pub fn put_if_absent(
        &mut self,
        name: impl Into<StringKeyLabelCiFast>,
        value: impl Into<StringKeyLabel>,
    ) -> bool {
        match self.map.entry(name.into()) {
            hash_map::Entry::Occupied(_) => false,
            hash_map::Entry::Vacant(e) => {
                e.insert(value.into());
                true
            }
        }
    }

    #[inline]
    pub fn remove(&mut self, name: &StringKeyLabelCiFast) -> Option<StringKeyLabel> {
        self.map.remove(name)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&StringKeyLabelCiFast, &StringKeyLabel)> {
        self.map.iter()
    }

    /// Build an [`HeaderMap`]. Values share the labels' buffers instead of being
    /// copied; names are validated and lowercased by `http`.
    pub fn to_header_map(&self) -> Result<HeaderMap> {
        let mut map = HeaderMap::with_capacity(self.len());
        for (name, value) in self.iter() {
            let name = HeaderName::from_bytes(name.as_bytes())?;
            let value = match value.memory_handle() {
                Some(shared) => HeaderValue::from_maybe_shared(shared.clone())?,
                None => HeaderValue::from_static(""),
            };
            map.append(name, value);
        }
        Ok(map)
    }

    /// Label every entry of `map` into `arena`. Repeated names keep their first value.
    fn collect(map: &HeaderMap, arena: &mut Arena) -> Vec<(Span, Span)> {
        map.iter()
            .map(|(name, value)| {
                (
                    arena.push(name.as_str().as_bytes()),
                    arena.push(value.as_bytes()),
                )
            })
            .collect()
    }

    fn from_spans(spans: Vec<(Span, Span)>, buffer: &Bytes) -> Result<Self> {
        let mut headers = Headers::new();
        for (name, value) in spans {
            let name: StringKeyLabelCiFast = name.label(buffer)?;
            let value: StringKeyLabel = value.label(buffer)?;
            headers.put_if_absent(name, value);
        }
        Ok(headers)
    }
}

/// Request line and headers of an incoming request.
#[derive(Clone, Debug, Default)]
pub struct RequestHead {
    pub method: StringKeyLabel,
    pub path: StringKeyLabel,
    pub protocol: StringKeyLabelCiFast,
    pub headers: Headers,
}

impl RequestHead {
    /// Copy the head once into a single shared buffer and label every part of it.
    pub fn from_parts(parts: &http::request::Parts) -> Result<Self> {
        let mut arena = Arena::default();
        let method = arena.push(parts.method.as_str().as_bytes());
        let path = arena.push(
            parts
                .uri
                .path_and_query()
                .map_or("/", |pq| pq.as_str())
                .as_bytes(),
        );
        let protocol = arena.push(protocol_token(parts.version).as_bytes());
        let headers = Headers::collect(&parts.headers, &mut arena);

        let buffer = arena.freeze();
        Ok(Self {
            method: method.label(&buffer)?,
            path: path.label(&buffer)?,
            protocol: protocol.label(&buffer)?,
            headers: Headers::from_spans(headers, &buffer)?,
        })
    }
}

/// Status and headers of an outgoing response.
#[derive(Clone, Debug, Default)]
pub struct ResponseHead {
    pub status: StatusCode,
    pub headers: Headers,
}

impl ResponseHead {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
        }
    }

    pub fn from_parts(parts: &http::response::Parts) -> Result<Self> {
        let mut arena = Arena::default();
        let headers = Headers::collect(&parts.headers, &mut arena);
        let buffer = arena.freeze();
        Ok(Self {
            status: parts.status,
            headers: Headers::from_spans(headers, &buffer)?,
        })
    }

    /// Write status and headers back into `parts`, replacing its header map.
    pub fn apply_to(&self, parts: &mut http::response::Parts) -> Result<()> {
        parts.status = self.status;
        parts.headers = self.headers.to_header_map()?;
        Ok(())
    }
}

fn protocol_token(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_2 => "HTTP/2.0",
        Version::HTTP_3 => "HTTP/3.0",
        _ => "HTTP/1.1",
    }
}

#[derive(Clone, Copy, Debug)]
struct Span {
    offset: usize,
    size: usize,
}

impl Span {
    fn label<S>(self, buffer: &Bytes) -> Result<KeyLabel<S>> {
        KeyLabel::new(buffer, self.offset, self.size)
    }
}

#[derive(Default)]
struct Arena {
    buf: BytesMut,
}

impl Arena {
    fn push(&mut self, data: &[u8]) -> Span {
        let offset = self.buf.len();
        self.buf.extend_from_slice(data);
        Span {
            offset,
            size: data.len(),
        }
    }

    fn freeze(self) -> Bytes {
        self.buf.freeze()
    }
}
