//! Turns a [`RequestSpec`] into a [`TransportRequest`] for one attempt.

use std::collections::BTreeMap;
use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use url::{form_urlencoded, Url};

use crate::{body::Payload, template, CastError, RequestSpec, Result, TransportRequest};

/// How configured headers combine with headers already present.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum MergeMode {
    /// Keep existing values and add the new ones.
    #[default]
    Append,
    /// Drop existing values for every name present in the source.
    Replace,
}

/// Merges `source` into `target`.
pub fn merge_headers(target: &mut HeaderMap, source: &HeaderMap, mode: MergeMode) {
    if mode == MergeMode::Replace {
        for name in source.keys() {
            target.remove(name);
        }
    }
    for (name, value) in source {
        target.append(name.clone(), value.clone());
    }
}

/// Builds the request for one attempt.
///
/// Performs no I/O and allocates a fresh body buffer on every call; the same
/// spec always yields an identical request.
pub fn assemble(spec: &RequestSpec) -> Result<TransportRequest> {
    let path = template::expand(&spec.path, &spec.path_params)?;
    let mut url = join_url(&spec.base_url, &path)?;
    merge_query(&mut url, &spec.query)?;

    let body = spec.body.encode()?;

    let mut headers = spec.headers.clone();
    if let Some(encoded) = &body {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(encoded.content_type));
    }
    if let Some(auth) = &spec.basic_auth {
        headers.insert(AUTHORIZATION, auth.header_value()?);
    }

    Ok(TransportRequest {
        method: spec.method.clone(),
        url,
        headers,
        body: body.map(|encoded| encoded.bytes),
        timeout: spec.timeout,
    })
}

/// Appends `path` to the path of `base_url` with a single slash between them.
/// A query on either side is kept; the path's pairs follow the base's.
fn join_url(base_url: &str, path: &str) -> Result<Url> {
    if base_url.is_empty() {
        return parse_url(path);
    }
    let mut url = parse_url(base_url)?;

    let (path, path_query) = match path.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (path, None),
    };
    if !path.is_empty() {
        let joined = format!(
            "{}/{}",
            url.path().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        url.set_path(&joined);
    }

    let query = match (url.query(), path_query) {
        (Some(base), Some(extra)) if !base.is_empty() => Some(format!("{base}&{extra}")),
        (_, Some(extra)) => Some(extra.to_owned()),
        (base, None) => base.map(str::to_owned),
    };
    url.set_query(query.as_deref());
    Ok(url)
}

fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|err| CastError::InvalidRequest(format!("invalid url '{raw}': {err}")))
}

/// Parses the query already on `url`, adds every source on top, and writes
/// the result back sorted by key. Values under one key keep their order.
fn merge_query(url: &mut Url, sources: &[Arc<dyn Payload>]) -> Result<()> {
    let mut merged: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in url.query_pairs() {
        merged
            .entry(name.into_owned())
            .or_default()
            .push(value.into_owned());
    }

    for source in sources {
        let encoded = source.to_form().map_err(CastError::QueryEncoding)?;
        for (name, value) in form_urlencoded::parse(encoded.as_bytes()) {
            merged
                .entry(name.into_owned())
                .or_default()
                .push(value.into_owned());
        }
    }

    if merged.is_empty() {
        url.set_query(None);
        return Ok(());
    }

    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (name, values) in &merged {
        for value in values {
            serializer.append_pair(name, value);
        }
    }
    url.set_query(Some(&serializer.finish()));
    Ok(())
}
