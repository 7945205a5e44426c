use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct OperationResponse {
    pub data: serde_json::Value,
}
