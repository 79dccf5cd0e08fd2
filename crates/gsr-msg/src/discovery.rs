use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Initial "where do I connect" query sent by the agent.
///
/// The `router` field is an opaque identifier (EUI string or integer) the
/// discovery answer echoes back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterInfoRequest {
    pub router: JsonValue,
}

/// Redirect answer pointing the agent at the control-plane endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterInfoResponse {
    pub router: JsonValue,
    pub muxs: String,
    pub uri: String,
}

/// Error answer for a request the discovery endpoint could not parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterInfoError {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_accepts_string_and_integer_ids() {
        let req: RouterInfoRequest = serde_json::from_str(r#"{"router":"::0"}"#).unwrap();
        assert_eq!(req.router, json!("::0"));
        let req: RouterInfoRequest = serde_json::from_str(r#"{"router":1}"#).unwrap();
        assert_eq!(req.router, json!(1));
    }

    #[test]
    fn response_carries_redirect_uri() {
        let resp = RouterInfoResponse {
            router: json!("::0"),
            muxs: "muxs-::0".to_owned(),
            uri: "ws://127.0.0.1:6039/router".to_owned(),
        };
        let encoded = serde_json::to_value(&resp).unwrap();
        assert_eq!(encoded["uri"], json!("ws://127.0.0.1:6039/router"));
        assert_eq!(encoded["muxs"], json!("muxs-::0"));
    }
}
