use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use monie_plugin::{Endpoint, HttpRequest, InvokeOutput, PluginError};

/// `GET /duck/:id`.
pub struct Duck;

#[async_trait]
impl Endpoint for Duck {
    async fn invoke(
        &self,
        request: HttpRequest,
        values: HashMap<String, String>,
        _settings: Map<String, Value>,
    ) -> Result<InvokeOutput, PluginError> {
        let id = values
            .get("id")
            .ok_or_else(|| PluginError::InvalidRequest("missing duck id".into()))?;
        let loud = request.query.get("loud").is_some_and(|v| v == "1");

        InvokeOutput::value(json!({
            "status": 200,
            "headers": {"content-type": "application/json"},
            "body": {
                "id": id,
                "says": if loud { "QUACK" } else { "quack" },
                "host": request.header("host"),
            },
        }))
    }
}
