//! Wire protocol for Cellar.
//!
//! Defines the JSON documents exchanged over HTTP for the three cell calls
//! (GetLatestCell, GetCell, PutCell), the error envelope and its numeric
//! codes, and the endpoint paths. Record bodies travel as JSON text;
//! timestamps travel as UTC `YYYY-MM-DDTHH:MM:SSZ`.

pub mod endpoint;
pub mod error;
pub mod message;

pub use endpoint::{endpoints, HealthResponse, InfoResponse, NamespacesResponse};
pub use error::{ProtocolError, ProtocolResult};
pub use message::{
    body_from_text, body_to_text, codes, error_code, format_timestamp, parse_timestamp,
    CellResponse, ErrorBody, ErrorResponse, PutCellRequest, INTERNAL_KIND, PROTOCOL_VERSION,
    TIMEOUT_KIND,
};
