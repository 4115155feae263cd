//! Request decoding for the serve loop.
//!
//! The wire carries one JSON value per call. A request is any JSON object
//! with a string `method`; `id` is echoed back in the response and `params`
//! defaults to `null`. The decoded value is kept intact for handlers that
//! need fields beyond the envelope.

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::errors::DispatchError;

/// One decoded method call.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    id: Option<Value>,
    method: String,
    params: Value,
    raw: Value,
}

impl Request {
    /// Builds a request from a decoded JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::InvalidRequest`] when the value is not an
    /// object or lacks a non-empty string `method`.
    pub fn from_value(raw: Value) -> Result<Self, DispatchError> {
        let Value::Object(fields) = &raw else {
            return Err(DispatchError::invalid_request("request must be a JSON object"));
        };
        let method = match fields.get("method") {
            Some(Value::String(method)) if !method.is_empty() => method.clone(),
            Some(Value::String(_)) => {
                return Err(DispatchError::invalid_request("method field is empty"));
            }
            Some(_) => {
                return Err(DispatchError::invalid_request("method field must be a string"));
            }
            None => return Err(DispatchError::invalid_request("missing method field")),
        };
        let id = fields.get("id").cloned();
        let params = fields.get("params").cloned().unwrap_or(Value::Null);
        Ok(Self {
            id,
            method,
            params,
            raw,
        })
    }

    /// Method name used for routing.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Caller-chosen request id, echoed in the response.
    #[must_use]
    pub fn id(&self) -> Option<&Value> {
        self.id.as_ref()
    }

    /// The `params` member, or `null` when absent.
    #[must_use]
    pub fn params(&self) -> &Value {
        &self.params
    }

    /// The request exactly as decoded from the wire.
    #[must_use]
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Deserializes `params` into a typed structure.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::InvalidParams`] when the params do not match.
    pub fn parse_params<T>(&self) -> Result<T, DispatchError>
    where
        T: DeserializeOwned,
    {
        T::deserialize(&self.params)
            .map_err(|error| DispatchError::invalid_params(&self.method, error.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_minimal_request() {
        let request =
            Request::from_value(json!({"method": "heartbeat.post"})).expect("parse minimal");
        assert_eq!(request.method(), "heartbeat.post");
        assert_eq!(request.id(), None);
        assert_eq!(request.params(), &Value::Null);
    }

    #[test]
    fn keeps_id_params_and_raw_value() {
        let value = json!({"id": "r-1", "method": "echo", "params": [1, 2], "payload": "hi"});
        let request = Request::from_value(value.clone()).expect("parse full");
        assert_eq!(request.id(), Some(&json!("r-1")));
        assert_eq!(request.params(), &json!([1, 2]));
        assert_eq!(request.raw(), &value);
    }

    #[rstest]
    #[case::not_object(json!([1, 2, 3]))]
    #[case::missing_method(json!({"id": 1}))]
    #[case::empty_method(json!({"method": ""}))]
    #[case::numeric_method(json!({"method": 12}))]
    fn rejects_malformed_envelopes(#[case] value: Value) {
        let result = Request::from_value(value);
        assert!(matches!(result, Err(DispatchError::InvalidRequest { .. })));
    }

    #[test]
    fn parse_params_reports_mismatch() {
        #[derive(Debug, Deserialize)]
        struct Params {
            #[expect(dead_code, reason = "only the shape matters for this test")]
            count: u32,
        }

        let request = Request::from_value(json!({"method": "m", "params": {"count": "x"}}))
            .expect("parse request");
        let result = request.parse_params::<Params>();
        assert!(matches!(result, Err(DispatchError::InvalidParams { .. })));
    }
}
