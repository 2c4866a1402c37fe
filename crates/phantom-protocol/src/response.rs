//! Response interpretation.
//!
//! Every response is one CRLF-terminated line. Its body may start with a
//! success marker (`OK!` or `Ok!`) or be a failure (`ERR: <reason>`). Several
//! logical lines can be packed into one response by joining them with the
//! escaped separator `\r\n` written as text.
//!
//! # Response shapes
//!
//! ```text
//! OK!                                  bare acknowledgement (set, startdata, trig)
//! MockPhantom                          get: values without a marker
//! OK! 10 \r\n 20 \r\n 30                get: multi-valued attribute
//! OK! {cine: -1, res: 64x32, fmt: 272}  image request: one tagged list
//! ERR: name info.bogus is unknown       failure with reason
//! ```
//!
//! The camera is not consistent about markers, so the helpers here accept a
//! body with or without one. Only `ERR:` is significant: [`strip_marker`] and
//! everything built on it turn it into `Error::Command`.
//!
//! # Camera side
//!
//! [`format_ok`] and [`format_error`] build response text, so the mock camera
//! and the client agree on the wire shape:
//!
//! ```
//! use phantom_protocol::{format_error, format_ok, is_ack, parse_response};
//!
//! assert!(is_ack(&format_ok(&[])));
//!
//! let text = format_ok(&["1".to_string(), "2".to_string()]);
//! assert_eq!(parse_response(&text).unwrap(), vec!["1", "2"]);
//!
//! let err = parse_response(&format_error("busy")).unwrap_err();
//! assert_eq!(err.to_string(), "Camera rejected command: busy");
//! ```

use crate::{parser::parse_tagged_list, value::TaggedList};
use phantom_core::{Error, Result, constants::*};

/// Remove the success marker from `text`, or turn an error marker into
/// `Error::Command`.
///
/// # Errors
/// Returns `Error::Command` carrying the reason when `text` starts with `ERR:`.
pub fn strip_marker(text: &str) -> Result<&str> {
    let text = text.trim_start();
    if let Some(reason) = text.strip_prefix(ERROR_MARKER) {
        return Err(Error::Command {
            reason: reason.trim().to_string(),
        });
    }
    let body = text
        .strip_prefix(OK_MARKER)
        .or_else(|| text.strip_prefix(OK_MARKER_ALT))
        .unwrap_or(text);
    Ok(body.trim_start())
}

/// Split a response into its logical lines.
///
/// ```
/// use phantom_protocol::parse_response;
///
/// assert_eq!(parse_response(r"OK! 1 \r\n 2 \r\n 3").unwrap(), vec!["1", "2", "3"]);
/// assert_eq!(parse_response("OK! solo").unwrap(), vec!["solo"]);
/// assert!(parse_response("ERR: name foo is unknown").is_err());
/// ```
///
/// # Errors
/// Returns `Error::Command` if the camera answered with `ERR:`.
pub fn parse_response(text: &str) -> Result<Vec<String>> {
    let body = strip_marker(text)?;
    Ok(body
        .split(RESPONSE_SEPARATOR)
        .map(|line| line.trim().to_string())
        .collect())
}

/// Parse a response whose body is a single tagged list, such as the reply
/// to an image request.
///
/// # Errors
/// Returns `Error::Command` for `ERR:` replies and `Error::ProtocolSyntax` if the
/// body is not a tagged list.
pub fn parse_response_params(text: &str) -> Result<TaggedList> {
    parse_tagged_list(strip_marker(text)?)
}

/// `true` for a bare acknowledgement (`OK!` with nothing after it).
///
/// An empty line also counts: once the marker is stripped nothing is left.
pub fn is_ack(text: &str) -> bool {
    matches!(strip_marker(text), Ok(body) if body.trim().is_empty())
}

/// Build the text of a success response carrying `lines`.
pub fn format_ok(lines: &[String]) -> String {
    if lines.is_empty() {
        OK_MARKER.to_string()
    } else {
        format!("{OK_MARKER} {}", lines.join(RESPONSE_SEPARATOR))
    }
}

/// Build the text of an error response.
pub fn format_error(reason: impl std::fmt::Display) -> String {
    format!("{ERROR_MARKER} {reason}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Value;
    use phantom_core::Resolution;
    use rstest::rstest;

    #[rstest]
    #[case(r"OK! 1 \r\n 2 \r\n 3", &["1", "2", "3"])]
    #[case("OK! solo", &["solo"])]
    #[case("Ok!solo", &["solo"])]
    #[case("OK!", &[""])]
    #[case(r#""MockPhantom"\r\n"second""#, &["\"MockPhantom\"", "\"second\""])]
    #[case("1280x800", &["1280x800"])]
    fn test_parse_response_lines(#[case] text: &str, #[case] expected: &[&str]) {
        assert_eq!(parse_response(text).unwrap(), expected);
    }

    #[test]
    fn test_error_marker_carries_reason() {
        match parse_response("ERR: name info.bogus is unknown") {
            Err(Error::Command { reason }) => assert_eq!(reason, "name info.bogus is unknown"),
            other => panic!("expected command error, got {other:?}"),
        }
    }

    #[test]
    fn test_real_line_break_is_not_a_separator() {
        let lines = parse_response("OK! a\r\nb").unwrap();
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn test_parse_response_params() {
        let params = parse_response_params("OK! { cine: -1, res:1920x1080, fmt:272}").unwrap();
        assert_eq!(params.get("cine"), Some(&Value::SignedInt(-1)));
        assert_eq!(
            params.get("res").and_then(Value::as_resolution),
            Some(Resolution::new(1920, 1080))
        );
    }

    #[test]
    fn test_parse_response_params_error() {
        assert!(matches!(
            parse_response_params("ERR: unknown command img"),
            Err(Error::Command { .. })
        ));
        assert!(matches!(
            parse_response_params("OK! 12"),
            Err(Error::ProtocolSyntax { .. })
        ));
    }

    #[test]
    fn test_ack() {
        assert!(is_ack("OK!"));
        assert!(is_ack("Ok! "));
        assert!(!is_ack("OK! 1"));
        assert!(!is_ack("ERR: nope"));
    }

    #[test]
    fn test_format_helpers() {
        assert_eq!(format_ok(&[]), "OK!");
        assert_eq!(
            format_ok(&["1".to_string(), "2".to_string()]),
            r"OK! 1\r\n2"
        );
        assert_eq!(format_error("unknown command zap"), "ERR: unknown command zap");
    }
}
