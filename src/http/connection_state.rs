use super::{
    header::{self, value},
    RequestHead, ResponseHead, PROTOCOL_HTTP_1_1,
};
use crate::label::{equals_ci_fast, MemoryLabel};

/// What to do with the connection once the response is written.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    KeepAlive,
    Close,
    /// Hand the connection over to another protocol.
    Upgrade,
}

/// Decide whether the connection survives `response`, and make the response's
/// `Connection` header agree with the decision.
///
/// An explicit `Connection` header on the response always wins. Otherwise the
/// request decides: `Connection: keep-alive` or an HTTP/1.1 request line keeps the
/// connection open, anything else (or no request at all) closes it. When the
/// response has no `Connection` header, the decided value is added to it.
///
/// Header values are compared with [`equals_ci_fast`], in place.
pub fn consider_connection_state(
    request: Option<&RequestHead>,
    response: &mut ResponseHead,
) -> ConnectionState {
    let out_state = response.headers.get(&header::CONNECTION).cloned();
    if let Some(out) = &out_state {
        if token_equals(out, &value::CONNECTION_UPGRADE) {
            return ConnectionState::Upgrade;
        }
    }

    if let Some(request) = request {
        let keep_alive_requested = request
            .headers
            .get(&header::CONNECTION)
            .is_some_and(|v| token_equals(v, &value::CONNECTION_KEEP_ALIVE));
        if keep_alive_requested || request.protocol.equals(PROTOCOL_HTTP_1_1.as_bytes()) {
            return mirror_or_default(out_state.as_deref(), response, ConnectionState::KeepAlive);
        }
    }

    mirror_or_default(out_state.as_deref(), response, ConnectionState::Close)
}

/// Follow the response's own header if it has one, otherwise write `default` into it.
fn mirror_or_default(
    out_state: Option<&MemoryLabel>,
    response: &mut ResponseHead,
    default: ConnectionState,
) -> ConnectionState {
    match out_state {
        Some(out) if token_equals(out, &value::CONNECTION_KEEP_ALIVE) => {
            ConnectionState::KeepAlive
        }
        Some(_) => ConnectionState::Close,
        None => {
            let injected = match default {
                ConnectionState::KeepAlive => value::CONNECTION_KEEP_ALIVE,
                _ => value::CONNECTION_CLOSE,
            };
            response.headers.put(header::CONNECTION, injected);
            default
        }
    }
}

#[inline]
fn token_equals(label: &MemoryLabel, token: &MemoryLabel) -> bool {
    label.size() == token.size() && equals_ci_fast(label.as_bytes(), token.as_bytes())
}

#[cfg(test)]
mod tests {
    use http::{Request, Version};

    use super::*;
    use crate::label::StringKeyLabelCiFast;

    fn request(protocol: &'static str, connection: Option<&'static str>) -> RequestHead {
        let mut head = RequestHead {
            protocol: StringKeyLabelCiFast::from_static(protocol),
            ..Default::default()
        };
        if let Some(v) = connection {
            head.headers.put(header::CONNECTION, v);
        }
        head
    }

    fn response(connection: Option<&'static str>) -> ResponseHead {
        let mut head = ResponseHead::default();
        if let Some(v) = connection {
            head.headers.put(header::CONNECTION, v);
        }
        head
    }

    fn connection_header(head: &ResponseHead) -> Option<String> {
        head.headers
            .get(&header::CONNECTION)
            .map(|v| v.to_owned_string())
    }

    #[test]
    fn response_upgrade_wins() {
        let req = request("HTTP/1.1", Some("close"));
        let mut resp = response(Some("upgrade"));
        assert_eq!(
            consider_connection_state(Some(&req), &mut resp),
            ConnectionState::Upgrade
        );
        assert_eq!(
            consider_connection_state(None, &mut response(Some("UPGRADE"))),
            ConnectionState::Upgrade
        );
    }

    #[test]
    fn keep_alive_request_without_response_header() {
        let req = request("HTTP/1.0", Some("Keep-Alive"));
        let mut resp = response(None);
        assert_eq!(
            consider_connection_state(Some(&req), &mut resp),
            ConnectionState::KeepAlive
        );
        assert_eq!(connection_header(&resp).as_deref(), Some("keep-alive"));
    }

    #[test]
    fn keep_alive_request_mirrors_response() {
        let req = request("HTTP/1.0", Some("keep-alive"));
        assert_eq!(
            consider_connection_state(Some(&req), &mut response(Some("close"))),
            ConnectionState::Close
        );
        assert_eq!(
            consider_connection_state(Some(&req), &mut response(Some("KEEP-ALIVE"))),
            ConnectionState::KeepAlive
        );
    }

    #[test]
    fn http11_defaults_to_keep_alive() {
        let req = request("HTTP/1.1", None);
        let mut resp = response(None);
        assert_eq!(
            consider_connection_state(Some(&req), &mut resp),
            ConnectionState::KeepAlive
        );
        assert_eq!(connection_header(&resp).as_deref(), Some("keep-alive"));

        let mut resp = response(Some("close"));
        assert_eq!(
            consider_connection_state(Some(&req), &mut resp),
            ConnectionState::Close
        );
        assert_eq!(connection_header(&resp).as_deref(), Some("close"));
    }

    #[test]
    fn http10_defaults_to_close() {
        let req = request("HTTP/1.0", None);
        let mut resp = response(None);
        assert_eq!(
            consider_connection_state(Some(&req), &mut resp),
            ConnectionState::Close
        );
        assert_eq!(connection_header(&resp).as_deref(), Some("close"));

        assert_eq!(
            consider_connection_state(Some(&req), &mut response(Some("keep-alive"))),
            ConnectionState::KeepAlive
        );
    }

    #[test]
    fn no_request() {
        let mut resp = response(None);
        assert_eq!(
            consider_connection_state(None, &mut resp),
            ConnectionState::Close
        );
        assert_eq!(connection_header(&resp).as_deref(), Some("close"));

        assert_eq!(
            consider_connection_state(None, &mut response(Some("Keep-Alive"))),
            ConnectionState::KeepAlive
        );
    }

    #[test]
    fn unknown_response_value_closes() {
        let req = request("HTTP/1.1", None);
        assert_eq!(
            consider_connection_state(Some(&req), &mut response(Some("keep-alive, foo"))),
            ConnectionState::Close
        );
    }

    #[test]
    fn decision_from_http_parts() {
        let (parts, ()) = Request::builder()
            .version(Version::HTTP_11)
            .uri("/")
            .body(())
            .unwrap()
            .into_parts();
        let req = RequestHead::from_parts(&parts).unwrap();
        let mut resp = ResponseHead::default();
        assert_eq!(
            consider_connection_state(Some(&req), &mut resp),
            ConnectionState::KeepAlive
        );
        let map = resp.headers.to_header_map().unwrap();
        assert_eq!(map["connection"], "keep-alive");
    }
}
