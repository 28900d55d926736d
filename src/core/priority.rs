//! Priority list and savings forecast operations.

use super::{Fetched, Gateway, array_field, response::Classified};
use crate::entities::{
    PriorityEntry, SavingsForecast,
    priority::{ensure_unique, priority_list_from_json, renumbered},
};
use crate::errors::{Error, Result};
use crate::transport::{HttpRequest, Method};
use serde_json::json;
use tracing::{info, instrument};

const PRIORITY_LIST_PATH: &str = "/api/prioritylist";

/// Fetches the forecasts for every envelope and replaces the cached ones.
#[instrument(skip(api))]
pub async fn fetch_forecast(api: &Gateway) -> Result<Fetched<Vec<SavingsForecast>>> {
    let value = match api
        .call(HttpRequest::new(Method::Get, "/api/moneyboxes/savings_forecast"))
        .await?
    {
        Classified::NoContent => return Ok(Fetched::Empty),
        Classified::Json(value) => value,
    };

    let forecasts = array_field(&value, "moneyboxForecasts")?
        .iter()
        .map(SavingsForecast::from_json)
        .collect::<Result<Vec<_>>>()?;
    api.store.write().await.set_forecasts(forecasts.clone());
    Ok(Fetched::Present(forecasts))
}

/// Fetches the priority list; a 204 is an empty list.
#[instrument(skip(api))]
pub async fn fetch_priority_list(api: &Gateway) -> Result<Vec<PriorityEntry>> {
    let list = match api
        .call(HttpRequest::new(Method::Get, PRIORITY_LIST_PATH))
        .await?
    {
        Classified::NoContent => Vec::new(),
        Classified::Json(value) => priority_list_from_json(array_field(&value, "prioritylist")?)?,
    };
    api.store.write().await.set_priority_list(list.clone())?;
    Ok(list)
}

/// Stores a new distribution order.
///
/// Ranks are renumbered from list position starting at 1 before sending, so
/// the caller only has to get the order right. The overflow envelope never
/// takes part in the ordering.
#[instrument(skip(api, order), fields(len = order.len()))]
pub async fn update_priority_list(
    api: &Gateway,
    order: &[PriorityEntry],
) -> Result<Vec<PriorityEntry>> {
    if order.is_empty() {
        return Err(Error::precondition("priority list must not be empty"));
    }
    ensure_unique(order)?;
    if let Some(overflow) = api.store.read().await.overflow()
        && order.iter().any(|entry| entry.envelope_id == overflow.id())
    {
        return Err(Error::precondition(
            "the overflow envelope has no distribution priority",
        ));
    }

    let ranked = renumbered(order);
    let body = json!({ "prioritylist": ranked });
    let list = match api
        .call(HttpRequest::with_json(Method::Patch, PRIORITY_LIST_PATH, body))
        .await?
    {
        Classified::NoContent => ranked,
        Classified::Json(value) => priority_list_from_json(array_field(&value, "prioritylist")?)?,
    };

    api.store.write().await.set_priority_list(list.clone())?;
    info!("Stored priority list of {} envelopes", list.len());
    Ok(list)
}
