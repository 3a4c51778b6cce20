//! The `{success, error, ...}` wrapper every service response carries.

use crate::error::ClientError;
use crate::transport::TransportError;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Split a response into its payload or a tagged failure.
///
/// `success` must be a boolean. `success: false` becomes
/// [`ClientError::ServiceRejected`] carrying the service's message
/// verbatim; `success: true` returns the whole object for the
/// operation-specific reconciler.
pub fn open(response: Value) -> Result<Value, ClientError> {
    match response.get("success") {
        Some(Value::Bool(true)) => Ok(response),
        Some(Value::Bool(false)) => {
            let message = response
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            Err(ClientError::ServiceRejected(message.to_string()))
        }
        Some(other) => Err(ClientError::MalformedResponse(format!(
            "`success` is not a boolean: {other}"
        ))),
        None => Err(ClientError::MalformedResponse(
            "missing field `success`".into(),
        )),
    }
}

/// Fold a transport result and the envelope into one result.
pub fn interpret(result: Result<Value, TransportError>) -> Result<Value, ClientError> {
    open(result?)
}

/// Deserialize one required field of a success payload.
pub(crate) fn field<T: DeserializeOwned>(payload: &Value, name: &str) -> Result<T, ClientError> {
    let raw = payload
        .get(name)
        .ok_or_else(|| ClientError::MalformedResponse(format!("missing field `{name}`")))?;
    T::deserialize(raw)
        .map_err(|e| ClientError::MalformedResponse(format!("field `{name}`: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_passes_payload_through() {
        let payload = open(json!({"success": true, "classes": []})).unwrap();
        assert_eq!(payload["classes"], json!([]));
    }

    #[test]
    fn test_rejection_carries_message() {
        let err = open(json!({"success": false, "error": "Student not found"})).unwrap_err();
        assert_eq!(err, ClientError::ServiceRejected("Student not found".into()));
    }

    #[test]
    fn test_rejection_without_message() {
        let err = open(json!({"success": false})).unwrap_err();
        assert_eq!(err, ClientError::ServiceRejected("unknown error".into()));
    }

    #[test]
    fn test_missing_success_is_malformed() {
        let err = open(json!({"classes": []})).unwrap_err();
        assert_eq!(err.kind(), "malformed_response");
    }

    #[test]
    fn test_non_bool_success_is_malformed() {
        let err = open(json!({"success": "yes"})).unwrap_err();
        assert_eq!(err.kind(), "malformed_response");
    }

    #[test]
    fn test_transport_failure_stays_distinct() {
        let err = interpret(Err(TransportError::Connect("refused".into()))).unwrap_err();
        assert_eq!(
            err,
            ClientError::TransportFailure(TransportError::Connect("refused".into()))
        );
    }

    #[test]
    fn test_field_wrong_shape() {
        let payload = json!({"success": true, "classes": "nope"});
        let err = field::<Vec<crate::types::ClassRef>>(&payload, "classes").unwrap_err();
        assert!(err.to_string().contains("field `classes`"));
    }
}
