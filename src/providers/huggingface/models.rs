use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Serialize)]
pub struct InferenceRequest<'a> {
    pub inputs: &'a str,
    pub parameters: &'a Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct InferenceError {
    pub error: Option<String>,
}
