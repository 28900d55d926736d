//! Envelope operations - list, fetch, create, update, delete and move money.
//!
//! Every function validates its inputs locally first; a rejected input never
//! reaches the network. Successful results are written into the store.

use super::{Fetched, Gateway, array_field, response::Classified};
use crate::entities::{Envelope, EnvelopeChange, EnvelopeId, fields::Fields};
use crate::errors::{Error, Result};
use crate::transport::{HttpRequest, Method};
use serde_json::{Map, Value, json};
use tracing::{error, info, instrument, warn};

/// Fields for a new envelope; the server assigns id, balance and priority.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewEnvelope {
    pub name: String,
    pub savings_amount: i64,
    /// `None` means unlimited
    pub savings_target: Option<i64>,
    pub description: Option<String>,
}

/// Partial update; only `Some` fields are sent.
///
/// `savings_target: Some(None)` clears the target.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EnvelopePatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub savings_target: Option<Option<i64>>,
    pub savings_amount: Option<i64>,
}

impl EnvelopePatch {
    /// Wire payload with every unset field dropped.
    #[must_use]
    pub fn payload(&self) -> Map<String, Value> {
        let mut payload = Map::new();
        if let Some(name) = &self.name {
            payload.insert("name".to_string(), json!(name));
        }
        if let Some(description) = &self.description {
            payload.insert("description".to_string(), json!(description));
        }
        if let Some(target) = self.savings_target {
            payload.insert("savingsTarget".to_string(), json!(target));
        }
        if let Some(amount) = self.savings_amount {
            payload.insert("savingsAmount".to_string(), json!(amount));
        }
        payload
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.savings_target.is_none()
            && self.savings_amount.is_none()
    }

    fn changes(&self) -> Vec<EnvelopeChange> {
        let mut changes = Vec::new();
        if let Some(name) = &self.name {
            changes.push(EnvelopeChange::Name(name.clone()));
        }
        if let Some(description) = &self.description {
            changes.push(EnvelopeChange::Description(description.clone()));
        }
        if let Some(target) = self.savings_target {
            changes.push(EnvelopeChange::SavingsTarget(target));
        }
        if let Some(amount) = self.savings_amount {
            changes.push(EnvelopeChange::SavingsAmount(amount));
        }
        changes
    }

    /// Rejects values no envelope may hold, checked against `cached` when known.
    fn check(&self, cached: Option<&Envelope>) -> Result<()> {
        if self.name.as_deref().is_some_and(|name| name.trim().is_empty()) {
            return Err(Error::validation("name", "must not be empty"));
        }
        if self.savings_amount.is_some_and(|amount| amount < 0) {
            return Err(Error::validation("savingsAmount", "must be >= 0"));
        }
        if self.savings_target.flatten().is_some_and(|target| target < 0) {
            return Err(Error::validation("savingsTarget", "must be >= 0 or null"));
        }
        if let Some(cached) = cached {
            let mut candidate = cached.clone();
            for change in self.changes() {
                candidate.update(change)?;
            }
        }
        Ok(())
    }
}

fn envelope_path(id: EnvelopeId) -> String {
    format!("/api/moneybox/{id}")
}

fn ensure_positive_amount(amount: i64) -> Result<()> {
    if amount <= 0 {
        return Err(Error::precondition(format!(
            "amount must be positive, got {amount}"
        )));
    }
    Ok(())
}

/// Fetches the full envelope list and merges it into the store.
///
/// A 204 is returned as [`Fetched::Empty`]; a body without `moneyboxes` is
/// `Error::MalformedPayload`.
#[instrument(skip(api))]
pub async fn list_envelopes(api: &Gateway) -> Result<Fetched<Vec<Envelope>>> {
    let value = match api
        .call(HttpRequest::new(Method::Get, "/api/moneyboxes"))
        .await?
    {
        Classified::NoContent => {
            info!("Server reports no envelopes");
            return Ok(Fetched::Empty);
        }
        Classified::Json(value) => value,
    };

    let envelopes = array_field(&value, "moneyboxes")?
        .iter()
        .map(Envelope::from_json)
        .collect::<Result<Vec<_>>>()?;

    api.store
        .write()
        .await
        .merge_envelopes(envelopes.clone())?;
    Ok(Fetched::Present(envelopes))
}

/// Fetches one ordinary envelope by id and caches it if absent.
///
/// The overflow envelope is never fetched through this route.
#[instrument(skip(api))]
pub async fn get_envelope(api: &Gateway, id: EnvelopeId) -> Result<Envelope> {
    if id <= 0 {
        return Err(Error::precondition(format!("invalid envelope id {id}")));
    }
    if api
        .store
        .read()
        .await
        .find(id)
        .is_some_and(Envelope::is_overflow)
    {
        return Err(Error::precondition(
            "the overflow envelope is not addressable by id",
        ));
    }

    let value = api
        .call_for_value(HttpRequest::new(Method::Get, envelope_path(id)), "envelope")
        .await?;
    let envelope = Envelope::from_json(&value)?;
    if envelope.id() != id {
        return Err(Error::validation(
            "id",
            format!("requested envelope {id}, received {}", envelope.id()),
        ));
    }
    if envelope.is_overflow() {
        return Err(Error::validation(
            "isOverflow",
            "single-item lookup returned the overflow envelope",
        ));
    }

    api.store.write().await.add_envelope(envelope.clone())?;
    Ok(envelope)
}

/// Creates an envelope on the server and inserts it into the store.
#[instrument(skip(api, new), fields(name = %new.name))]
pub async fn add_envelope(api: &Gateway, new: NewEnvelope) -> Result<Envelope> {
    let name = new.name.trim();
    if name.is_empty() {
        return Err(Error::precondition("a new envelope needs a name"));
    }
    if new.savings_amount < 0 {
        return Err(Error::precondition("savings amount must be >= 0"));
    }
    if new.savings_target.is_some_and(|target| target < 0) {
        return Err(Error::precondition("savings target must be >= 0"));
    }

    let mut body = json!({
        "name": name,
        "savingsAmount": new.savings_amount,
        "savingsTarget": new.savings_target,
    });
    if let Some(description) = &new.description {
        body["description"] = json!(description);
    }

    let value = api
        .call_for_value(
            HttpRequest::with_json(Method::Post, "/api/moneybox", body),
            "new envelope",
        )
        .await?;
    let envelope = Envelope::from_json(&value)?;
    api.store.write().await.add_envelope(envelope.clone())?;
    info!("Created envelope {} ({})", envelope.id(), envelope.name());
    Ok(envelope)
}

/// Sends a partial update and copies the patched fields back from the response.
///
/// # Errors
/// `Error::LocalPrecondition` for an empty patch and `Error::Validation` for a
/// patch no envelope could hold, both before any network call.
#[instrument(skip(api, patch))]
pub async fn update_envelope(
    api: &Gateway,
    id: EnvelopeId,
    patch: &EnvelopePatch,
) -> Result<Envelope> {
    if patch.is_empty() {
        return Err(Error::precondition(
            "empty update; provide at least one field",
        ));
    }
    patch.check(api.store.read().await.find(id))?;

    let value = api
        .call_for_value(
            HttpRequest::with_json(Method::Patch, envelope_path(id), Value::Object(patch.payload())),
            "updated envelope",
        )
        .await?;
    let fields = Fields::new(&value, "moneybox")?;

    let mut changes = Vec::new();
    if patch.name.is_some() {
        changes.push(EnvelopeChange::Name(fields.string(&["name"])?));
    }
    if patch.description.is_some() {
        changes.push(EnvelopeChange::Description(
            fields.opt_string(&["description"])?.unwrap_or_default(),
        ));
    }
    if patch.savings_target.is_some() {
        changes.push(EnvelopeChange::SavingsTarget(
            fields.opt_int(&["savingsTarget"])?,
        ));
    }
    if patch.savings_amount.is_some() {
        changes.push(EnvelopeChange::SavingsAmount(fields.int(&["savingsAmount"])?));
    }
    if let Some(modified) = fields.opt_timestamp(&["modifiedAt"])? {
        changes.push(EnvelopeChange::ModifiedAt(Some(modified)));
    }

    match api.store.write().await.update_envelope(id, changes)? {
        Some(updated) => Ok(updated),
        None => {
            warn!("Updated envelope {} is not cached, using server copy", id);
            Envelope::from_json(&value)
        }
    }
}

/// Deletes an envelope on the server, then from the store.
///
/// # Errors
/// `Error::LocalPrecondition` for the overflow envelope, before any network call.
#[instrument(skip(api, envelope), fields(id = envelope.id()))]
pub async fn delete_envelope(api: &Gateway, envelope: &Envelope) -> Result<()> {
    if envelope.is_overflow() {
        return Err(Error::precondition(
            "deleting the overflow envelope is not allowed",
        ));
    }

    api.call(HttpRequest::new(Method::Delete, envelope_path(envelope.id())))
        .await?;
    api.store.write().await.delete_envelope(envelope.id())?;
    info!("Deleted envelope {}", envelope.id());
    Ok(())
}

/// Replaces the balance of `envelope` with the one the server reports.
async fn apply_authoritative_balance(
    api: &Gateway,
    envelope: &Envelope,
    value: &Value,
) -> Result<Envelope> {
    let balance = Fields::new(value, "moneybox")?.int(&["balance"])?;
    let cached = api
        .store
        .write()
        .await
        .update_envelope(envelope.id(), [EnvelopeChange::Balance(balance)])?;
    match cached {
        Some(updated) => Ok(updated),
        None => {
            let mut detached = envelope.clone();
            detached.update(EnvelopeChange::Balance(balance))?;
            Ok(detached)
        }
    }
}

async fn move_money(
    api: &Gateway,
    envelope: &Envelope,
    action: &'static str,
    amount: i64,
    description: &str,
) -> Result<Envelope> {
    ensure_positive_amount(amount)?;
    let value = api
        .call_for_value(
            HttpRequest::with_json(
                Method::Post,
                format!("{}/{action}", envelope_path(envelope.id())),
                json!({"amount": amount, "description": description}),
            ),
            action,
        )
        .await?;
    apply_authoritative_balance(api, envelope, &value).await
}

/// Deposits `amount` and adopts the server's resulting balance.
#[instrument(skip(api, envelope, description), fields(id = envelope.id()))]
pub async fn deposit_into(
    api: &Gateway,
    envelope: &Envelope,
    amount: i64,
    description: &str,
) -> Result<Envelope> {
    move_money(api, envelope, "deposit", amount, description).await
}

/// Withdraws `amount` and adopts the server's resulting balance.
#[instrument(skip(api, envelope, description), fields(id = envelope.id()))]
pub async fn withdraw_from(
    api: &Gateway,
    envelope: &Envelope,
    amount: i64,
    description: &str,
) -> Result<Envelope> {
    move_money(api, envelope, "withdraw", amount, description).await
}

/// Transfers `amount` from `source` to `destination`.
///
/// After the server accepts the transfer both cached balances are adjusted
/// locally by `amount`; nothing is re-fetched. The two adjustments are
/// validated together and applied together.
#[instrument(skip(api, source, destination, description), fields(from = source.id(), to = destination.id()))]
pub async fn transfer_between(
    api: &Gateway,
    source: &Envelope,
    amount: i64,
    destination: &Envelope,
    description: &str,
) -> Result<(Envelope, Envelope)> {
    ensure_positive_amount(amount)?;
    if source.id() == destination.id() {
        return Err(Error::precondition(
            "source and destination must be different envelopes",
        ));
    }

    api.call(HttpRequest::with_json(
        Method::Post,
        format!("{}/transfer", envelope_path(source.id())),
        json!({
            "amount": amount,
            "toMoneyboxId": destination.id(),
            "description": description,
        }),
    ))
    .await?;

    let mut store = api.store.write().await;
    let mut from = store.find(source.id()).cloned().unwrap_or_else(|| source.clone());
    let mut to = store
        .find(destination.id())
        .cloned()
        .unwrap_or_else(|| destination.clone());

    let adjusted = from
        .balance()
        .checked_sub(amount)
        .zip(to.balance().checked_add(amount));
    let Some((from_balance, to_balance)) = adjusted else {
        return Err(Error::validation("balance", "transfer overflows the balance range"));
    };
    if let Err(e) = from
        .update(EnvelopeChange::Balance(from_balance))
        .and_then(|()| to.update(EnvelopeChange::Balance(to_balance)))
    {
        error!(
            "Server accepted transfer of {} but the cached balances cannot absorb it: {}",
            amount, e
        );
        return Err(e);
    }

    store.update_envelope(from.id(), [EnvelopeChange::Balance(from_balance)])?;
    store.update_envelope(to.id(), [EnvelopeChange::Balance(to_balance)])?;
    info!("Transferred {} from {} to {}", amount, from.id(), to.id());
    Ok((from, to))
}
