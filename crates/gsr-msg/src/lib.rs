//! Wire data model for every protocol channel the harness emulates.
//!
//! Each channel gets its own tagged-variant message type decoded with
//! explicit schema validation at the transport boundary: the discovery
//! redirect ([`discovery`]), the LNS control plane ([`mux`]), the radio
//! concentrator link ([`sim`]), and the GNSS sentence feed ([`nmea`]).
//! Regional channel-plan templates live in [`regions`] and the synthetic
//! LoRaWAN PDU builder in [`frame`].

pub mod discovery;
pub mod frame;
pub mod mux;
pub mod nmea;
pub mod regions;
pub mod sim;

use thiserror::Error;

/// Uplink port value at or above which a frame signals end of scenario.
pub const EOS_PORT_MIN: u8 = 3;

/// Decode failure at a transport boundary.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The payload was not valid JSON or did not match the channel schema.
    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),
    /// The payload carried a `msgtype` tag this channel does not know.
    /// Recoverable: callers log a diagnostic and keep the connection alive.
    #[error("unknown message kind `{0}`")]
    UnknownKind(String),
    /// The payload carried no `msgtype` tag at all.
    #[error("message is missing a msgtype tag")]
    MissingKind,
}

pub(crate) fn decode_tagged<T>(text: &str, known: &[&str]) -> Result<T, ParseError>
where
    T: serde::de::DeserializeOwned,
{
    let value: serde_json::Value = serde_json::from_str(text)?;
    let kind = value
        .get("msgtype")
        .and_then(|v| v.as_str())
        .ok_or(ParseError::MissingKind)?;
    if !known.contains(&kind) {
        return Err(ParseError::UnknownKind(kind.to_owned()));
    }
    Ok(serde_json::from_value(value)?)
}
