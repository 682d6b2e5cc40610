//! Request, response and error envelopes.
//!
//! Every message carries a correlation id that stays the same across a
//! request/response pair.

use super::parameters::Parameters;
use super::results::RpcResult;
use super::tags;
use crate::codec::{CodecError, Record};
use std::fmt;
use uuid::Uuid;

/// Reserved error codes. The numeric values are wire-stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
    ServerError,
}

impl ErrorCode {
    /// Numeric code carried on the wire.
    pub fn code(self) -> i64 {
        match self {
            ErrorCode::ParseError => -32700,
            ErrorCode::InvalidRequest => -32600,
            ErrorCode::MethodNotFound => -32601,
            ErrorCode::InvalidParams => -32602,
            ErrorCode::InternalError => -32603,
            ErrorCode::ServerError => -32000,
        }
    }

    /// The code for a wire number, if it is one of the six known ones.
    pub fn from_code(code: i64) -> Option<Self> {
        Some(match code {
            -32700 => ErrorCode::ParseError,
            -32600 => ErrorCode::InvalidRequest,
            -32601 => ErrorCode::MethodNotFound,
            -32602 => ErrorCode::InvalidParams,
            -32603 => ErrorCode::InternalError,
            -32000 => ErrorCode::ServerError,
            _ => return None,
        })
    }

    /// Message used when none is given explicitly.
    pub fn default_message(self) -> &'static str {
        match self {
            // Shares the internal error text; kept as deployed peers send it.
            ErrorCode::ParseError => "Internal error",
            ErrorCode::InvalidRequest => "Invalid request",
            ErrorCode::MethodNotFound => "Method not found",
            ErrorCode::InvalidParams => "Invalid params",
            ErrorCode::InternalError => "Internal error",
            ErrorCode::ServerError => "Server error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub id: Uuid,
    pub method: String,
    pub parameters: Option<Parameters>,
}

impl Request {
    /// Creates a request with a fresh correlation id.
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            method: method.into(),
            parameters: None,
        }
    }

    pub fn with_parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = Some(parameters);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub id: Uuid,
    pub result: Option<RpcResult>,
}

impl Response {
    pub fn empty(id: Uuid) -> Self {
        Self { id, result: None }
    }

    pub fn success(id: Uuid, result: RpcResult) -> Self {
        Self {
            id,
            result: Some(result),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ErrorResponse {
    pub id: Uuid,
    pub code: ErrorCode,
    pub message: String,
    pub data: Option<String>,
}

impl ErrorResponse {
    /// An error with the code's default message.
    pub fn new(id: Uuid, code: ErrorCode) -> Self {
        Self {
            id,
            code,
            message: code.default_message().to_string(),
            data: None,
        }
    }

    /// Replaces the default message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Attaches detail, such as the offending method name or fragment.
    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = Some(data.into());
        self
    }

    /// The body could not be decoded. Sent with a nil id, since the request
    /// id is unknown.
    pub fn parse_error(id: Uuid, detail: impl Into<String>) -> Self {
        Self::new(id, ErrorCode::ParseError).with_data(detail)
    }

    pub fn invalid_request(id: Uuid, detail: impl Into<String>) -> Self {
        Self::new(id, ErrorCode::InvalidRequest).with_data(detail)
    }

    /// Neither a built-in method nor a registered action is called `method`.
    pub fn method_not_found(id: Uuid, method: &str) -> Self {
        Self::new(id, ErrorCode::MethodNotFound).with_data(method)
    }

    /// Parameters of the wrong variant, or naming an unregistered type.
    pub fn invalid_params(id: Uuid, detail: impl Into<String>) -> Self {
        Self::new(id, ErrorCode::InvalidParams).with_data(detail)
    }

    pub fn internal_error(id: Uuid, detail: impl Into<String>) -> Self {
        Self::new(id, ErrorCode::InternalError).with_data(detail)
    }

    /// The store failed while running the method.
    pub fn server_error(id: Uuid, detail: impl Into<String>) -> Self {
        Self::new(id, ErrorCode::ServerError).with_data(detail)
    }
}

#[derive(Debug, Clone, PartialEq)]
/// Any top-level message on the wire.
pub enum Message {
    Request(Request),
    Response(Response),
    Error(ErrorResponse),
}

impl Message {
    /// Correlation id; a response carries the id of its request.
    pub fn id(&self) -> Uuid {
        match self {
            Message::Request(r) => r.id,
            Message::Response(r) => r.id,
            Message::Error(e) => e.id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Message::Request(_) => tags::REQUEST,
            Message::Response(_) => tags::RESPONSE,
            Message::Error(_) => tags::ERROR_RESPONSE,
        }
    }

    /// Converts to the record the codec writes.
    ///
    /// Requests carry `Method` and `Parameters`, responses `Result`, and
    /// errors `ErrorCode`, `ErrorMessage` and `ErrorData`.
    pub fn to_record(&self) -> Record {
        match self {
            Message::Request(r) => Record::with_id(r.id, tags::REQUEST)
                .with("Method", r.method.as_str())
                .with("Parameters", r.parameters.as_ref().map(Parameters::to_record)),
            Message::Response(r) => Record::with_id(r.id, tags::RESPONSE)
                .with("Result", r.result.as_ref().map(RpcResult::to_record)),
            Message::Error(e) => Record::with_id(e.id, tags::ERROR_RESPONSE)
                .with("ErrorCode", e.code.code())
                .with("ErrorMessage", e.message.as_str())
                .with("ErrorData", e.data.clone()),
        }
    }

    /// Reads a decoded record back into a message.
    ///
    /// # Returns
    ///
    /// An `InvalidRecord` error when the tag is not a message tag or a
    /// required property is missing or of the wrong shape
    pub fn from_record(mut r: Record) -> Result<Self, CodecError> {
        let tag = r.type_tag.clone();
        Ok(match tag.as_str() {
            tags::REQUEST => Message::Request(Request {
                id: r.id,
                method: r.text("Method")?,
                parameters: r.opt_record("Parameters")?.map(Parameters::from_record).transpose()?,
            }),
            tags::RESPONSE => Message::Response(Response {
                id: r.id,
                result: r.opt_record("Result")?.map(RpcResult::from_record).transpose()?,
            }),
            tags::ERROR_RESPONSE => {
                let raw = r.int("ErrorCode")?;
                let code = ErrorCode::from_code(raw).ok_or_else(|| {
                    CodecError::invalid_record(tags::ERROR_RESPONSE, format!("unknown error code {}", raw))
                })?;
                let message = r
                    .opt_text("ErrorMessage")?
                    .unwrap_or_else(|| code.default_message().to_string());
                Message::Error(ErrorResponse {
                    id: r.id,
                    code,
                    message,
                    data: r.opt_text("ErrorData")?,
                })
            }
            other => return Err(CodecError::invalid_record(other, "not a message")),
        })
    }
}

impl From<Request> for Message {
    fn from(r: Request) -> Self {
        Message::Request(r)
    }
}

impl From<Response> for Message {
    fn from(r: Response) -> Self {
        Message::Response(r)
    }
}

impl From<ErrorResponse> for Message {
    fn from(e: ErrorResponse) -> Self {
        Message::Error(e)
    }
}
