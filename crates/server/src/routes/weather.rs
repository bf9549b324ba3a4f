//! Weather resolution handlers.
//!
//! Both verbs accept the same fields: `city`, `latitude`, `longitude`. A
//! successful response merges the provider payload with a `source` tag:
//!
//! ```json
//! {"source": "open-meteo", "current_weather": {"temperature": 14.2}}
//! ```
//!
//! Payloads that are not JSON objects are nested under `data`.

use axum::{
    Json,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
};
use serde::Deserialize;
use serde_json::{Map, Value};

use weathervane_core::NumericInput;

use crate::error::{AppError, Result};
use crate::middleware::{ClientIp, OptionalAttribution};
use crate::resolver::{ResolvedWeather, WeatherRequest};
use crate::state::AppState;

/// Location fields accepted from the query string or a JSON body.
#[derive(Debug, Default, Deserialize)]
pub struct WeatherParams {
    pub city: Option<String>,
    pub latitude: Option<NumericInput>,
    pub longitude: Option<NumericInput>,
}

/// `GET /weather`
#[tracing::instrument(skip_all)]
pub async fn get_weather(
    State(state): State<AppState>,
    OptionalAttribution(authorization): OptionalAttribution,
    ClientIp(ip): ClientIp,
    params: std::result::Result<Query<WeatherParams>, QueryRejection>,
) -> Result<Json<Value>> {
    let Query(params) = params.map_err(|e| AppError::BadRequest(e.body_text()))?;
    resolve(&state, params, authorization, ip).await
}

/// `POST /weather`
#[tracing::instrument(skip_all)]
pub async fn post_weather(
    State(state): State<AppState>,
    OptionalAttribution(authorization): OptionalAttribution,
    ClientIp(ip): ClientIp,
    params: std::result::Result<Json<WeatherParams>, JsonRejection>,
) -> Result<Json<Value>> {
    let Json(params) = params.map_err(|e| AppError::BadRequest(e.body_text()))?;
    resolve(&state, params, authorization, ip).await
}

async fn resolve(
    state: &AppState,
    params: WeatherParams,
    authorization: Option<String>,
    ip: Option<String>,
) -> Result<Json<Value>> {
    let request = WeatherRequest {
        city: params.city,
        latitude: params.latitude,
        longitude: params.longitude,
        authorization,
        ip,
    };

    let resolved = state.resolver().resolve(request).await?;
    Ok(Json(tag_payload(resolved)))
}

fn tag_payload(resolved: ResolvedWeather) -> Value {
    let source = Value::String(resolved.source.as_str().to_owned());

    match resolved.payload {
        Value::Object(mut fields) => {
            fields.insert("source".to_owned(), source);
            Value::Object(fields)
        }
        other => {
            let mut fields = Map::with_capacity(2);
            fields.insert("source".to_owned(), source);
            fields.insert("data".to_owned(), other);
            Value::Object(fields)
        }
    }
}
