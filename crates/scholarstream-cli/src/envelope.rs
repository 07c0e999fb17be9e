use scholarstream_core::Error;
use serde::Serialize;

pub(crate) const SCHEMA_VERSION: u64 = 1;

/// The error was already printed as part of the command's own output.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub(crate) struct Reported(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ErrorCode {
    InvalidParams,
    NotConfigured,
    TransportFailed,
    HttpError,
    BackendError,
    DecodeFailed,
    SearchInFlight,
    ExportFailed,
    IoError,
    UnexpectedError,
}

impl ErrorCode {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::InvalidParams => "invalid_params",
            Self::NotConfigured => "not_configured",
            Self::TransportFailed => "transport_failed",
            Self::HttpError => "http_error",
            Self::BackendError => "backend_error",
            Self::DecodeFailed => "decode_failed",
            Self::SearchInFlight => "search_in_flight",
            Self::ExportFailed => "export_failed",
            Self::IoError => "io_error",
            Self::UnexpectedError => "unexpected_error",
        }
    }

    pub(crate) fn retryable(self) -> bool {
        match self {
            Self::TransportFailed | Self::HttpError | Self::SearchInFlight => true,
            // Configuration + invalid input are not retryable without changing something.
            Self::InvalidParams
            | Self::NotConfigured
            | Self::BackendError
            | Self::DecodeFailed
            | Self::ExportFailed
            | Self::IoError
            | Self::UnexpectedError => false,
        }
    }

    pub(crate) fn hint(self) -> &'static str {
        match self {
            Self::NotConfigured | Self::TransportFailed => {
                "Is the backend running? Check --base-url / SCHOLARSTREAM_BASE_URL (see `scholarstream doctor`)."
            }
            Self::HttpError => "The backend answered with a non-success status; check its logs.",
            Self::ExportFailed => {
                "PDF export needs a TrueType family on disk; set SCHOLARSTREAM_FONT_DIR or export as markdown/text."
            }
            Self::SearchInFlight => "Wait for the running search to finish.",
            _ => "",
        }
    }

    pub(crate) fn of(e: &Error) -> Self {
        match e {
            Error::InvalidInput(_) => Self::InvalidParams,
            Error::NotConfigured(_) => Self::NotConfigured,
            Error::Transport(_) => Self::TransportFailed,
            Error::Http { .. } => Self::HttpError,
            Error::Backend(_) => Self::BackendError,
            Error::Decode(_) => Self::DecodeFailed,
            Error::SearchInFlight => Self::SearchInFlight,
            Error::Export(_) => Self::ExportFailed,
            Error::Io(_) => Self::IoError,
        }
    }

    pub(crate) fn of_any(e: &anyhow::Error) -> Self {
        e.downcast_ref::<Error>()
            .map(Self::of)
            .unwrap_or(Self::UnexpectedError)
    }
}

pub(crate) fn error_obj(code: ErrorCode, message: impl ToString) -> serde_json::Value {
    #[derive(Serialize)]
    struct ErrorObject {
        code: &'static str,
        message: String,
        hint: &'static str,
        retryable: bool,
    }

    let e = ErrorObject {
        code: code.as_str(),
        message: message.to_string(),
        hint: code.hint(),
        retryable: code.retryable(),
    };
    serde_json::to_value(e).unwrap_or_else(|_| {
        serde_json::json!({
            "code": code.as_str(),
            "message": message.to_string(),
            "hint": code.hint(),
            "retryable": code.retryable()
        })
    })
}

pub(crate) fn add_envelope_fields(payload: &mut serde_json::Value, kind: &str, elapsed_ms: u128) {
    payload["schema_version"] = serde_json::json!(SCHEMA_VERSION);
    payload["kind"] = serde_json::json!(kind);
    payload["elapsed_ms"] = serde_json::json!(elapsed_ms);
    if payload.get("ok").is_none() {
        payload["ok"] = serde_json::json!(true);
    }
    if payload.get("error").is_none() {
        payload["error"] = serde_json::Value::Null;
    }
}

pub(crate) fn failure(kind: &str, elapsed_ms: u128, e: &anyhow::Error) -> serde_json::Value {
    let mut v = serde_json::json!({
        "ok": false,
        "error": error_obj(ErrorCode::of_any(e), format!("{e:#}")),
    });
    add_envelope_fields(&mut v, kind, elapsed_ms);
    v
}
