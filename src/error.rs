use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Identifies which wrapper a failure came from. The serialized names double
/// as the keys of the health map.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Service {
    #[serde(rename = "market-data")]
    MarketData,
    #[serde(rename = "weather")]
    Weather,
    #[serde(rename = "prediction")]
    Prediction,
    #[serde(rename = "confidential-compute")]
    ConfidentialCompute,
    #[serde(rename = "confidential-compute-rpc")]
    ConfidentialComputeRpc,
    #[serde(rename = "validation")]
    Validation,
    #[serde(rename = "server")]
    Server,
}

impl Service {
    pub fn name(self) -> &'static str {
        match self {
            Service::MarketData => "market-data",
            Service::Weather => "weather",
            Service::Prediction => "prediction",
            Service::ConfidentialCompute => "confidential-compute",
            Service::ConfidentialComputeRpc => "confidential-compute-rpc",
            Service::Validation => "validation",
            Service::Server => "server",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error taxonomy. `Http(n)` serializes as the bare status code string
/// (`"429"`, `"404"`, ...) to keep the wire form the callers already match on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    Http(u16),
    Timeout,
    ConnectionError,
    SymbolNotFound,
    InvalidResponse,
    Validation,
    SdkInit,
    Encryption,
    Decryption,
    Computation,
    Server,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::Http(status) => write!(f, "{status}"),
            ErrorCode::Timeout => f.write_str("TIMEOUT"),
            ErrorCode::ConnectionError => f.write_str("CONNECTION_ERROR"),
            ErrorCode::SymbolNotFound => f.write_str("SYMBOL_NOT_FOUND"),
            ErrorCode::InvalidResponse => f.write_str("INVALID_RESPONSE"),
            ErrorCode::Validation => f.write_str("VALIDATION_ERROR"),
            ErrorCode::SdkInit => f.write_str("SDK_INIT_ERROR"),
            ErrorCode::Encryption => f.write_str("ENCRYPTION_ERROR"),
            ErrorCode::Decryption => f.write_str("DECRYPTION_ERROR"),
            ErrorCode::Computation => f.write_str("COMPUTATION_ERROR"),
            ErrorCode::Server => f.write_str("SERVER_ERROR"),
        }
    }
}

impl FromStr for ErrorCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(status) = s.parse::<u16>() {
            return Ok(ErrorCode::Http(status));
        }
        match s {
            "TIMEOUT" => Ok(ErrorCode::Timeout),
            "CONNECTION_ERROR" => Ok(ErrorCode::ConnectionError),
            "SYMBOL_NOT_FOUND" => Ok(ErrorCode::SymbolNotFound),
            "INVALID_RESPONSE" => Ok(ErrorCode::InvalidResponse),
            "VALIDATION_ERROR" => Ok(ErrorCode::Validation),
            "SDK_INIT_ERROR" => Ok(ErrorCode::SdkInit),
            "ENCRYPTION_ERROR" => Ok(ErrorCode::Encryption),
            "DECRYPTION_ERROR" => Ok(ErrorCode::Decryption),
            "COMPUTATION_ERROR" => Ok(ErrorCode::Computation),
            "SERVER_ERROR" => Ok(ErrorCode::Server),
            other => Err(format!("unknown error code: {other}")),
        }
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ErrorCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(D::Error::custom)
    }
}

/// The one shape every externally visible failure is normalized into.
///
/// Vendor SDK and transport errors are caught at each client boundary and
/// mapped here; no raw vendor error crosses the API surface.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{service}: {message} ({code})")]
pub struct ServiceError {
    pub service: Service,
    pub code: ErrorCode,
    pub message: String,
    /// HTTP status the API surface should mirror. Defaults to 500 when absent.
    pub status_code: Option<u16>,
}

impl ServiceError {
    pub fn new(service: Service, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            service,
            code,
            message: message.into(),
            status_code: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status_code = Some(status);
        self
    }

    /// Connect/read deadline exceeded. Surfaces as 503 so callers can retry.
    pub fn timeout(service: Service, vendor: &str) -> Self {
        Self::new(
            service,
            ErrorCode::Timeout,
            format!("{vendor} timeout - service unreachable"),
        )
        .with_status(503)
    }

    pub fn unreachable(service: Service, vendor: &str) -> Self {
        Self::new(
            service,
            ErrorCode::ConnectionError,
            format!("{vendor} unreachable - check network connection"),
        )
        .with_status(503)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(Service::Validation, ErrorCode::Validation, message).with_status(400)
    }
}

// Wire envelope: {"success":false,"service":...,"error":...,"code":...,"statusCode"?}
impl Serialize for ServiceError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let fields = if self.status_code.is_some() { 5 } else { 4 };
        let mut map = serializer.serialize_map(Some(fields))?;
        map.serialize_entry("success", &false)?;
        map.serialize_entry("service", &self.service)?;
        map.serialize_entry("error", &self.message)?;
        map.serialize_entry("code", &self.code)?;
        if let Some(status) = self.status_code {
            map.serialize_entry("statusCode", &status)?;
        }
        map.end()
    }
}
