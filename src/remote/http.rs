//! Hosted backend over a PostgREST-style HTTP API.
//!
//! Table reads go to `/rest/v1/<table>`, procedures to
//! `/rest/v1/rpc/<name>`. Every request runs on its own `spawn_local` task
//! and pushes its completion into a shared queue that `poll` drains on the
//! next frame.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use gloo_net::http::{Request as HttpRequest, RequestBuilder, Response as HttpResponse};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{Activation, Completion, RemoteError, RemoteStore, Request, Response, Ticket, TicketCounter};
use crate::config::RemoteConfig;
use crate::empire::state::{
    AutoclickerSession, EpochMs, Planet, Profile, RandomEvent, Tier, VersionedWallet, Wallet,
};

pub struct HttpRemote {
    client: Rc<Client>,
    tickets: TicketCounter,
    done: Rc<RefCell<VecDeque<Completion>>>,
}

impl HttpRemote {
    pub fn new(config: &RemoteConfig) -> Self {
        Self {
            client: Rc::new(Client {
                base: config.url.trim_end_matches('/').to_string(),
                anon_key: config.anon_key.clone(),
                bearer: config
                    .access_token
                    .clone()
                    .unwrap_or_else(|| config.anon_key.clone()),
            }),
            tickets: TicketCounter::default(),
            done: Rc::new(RefCell::new(VecDeque::new())),
        }
    }
}

impl RemoteStore for HttpRemote {
    fn send(&mut self, request: Request, now_ms: EpochMs) -> Ticket {
        let ticket = self.tickets.next();
        let client = Rc::clone(&self.client);
        let done = Rc::clone(&self.done);
        wasm_bindgen_futures::spawn_local(async move {
            let name = request.name();
            let result = client.execute(request, now_ms).await;
            if let Err(e) = &result {
                log::debug!("{name} failed: {e}");
            }
            done.borrow_mut().push_back(Completion { ticket, result });
        });
        ticket
    }

    fn poll(&mut self, _now_ms: EpochMs) -> Vec<Completion> {
        self.done.borrow_mut().drain(..).collect()
    }
}

struct Client {
    base: String,
    anon_key: String,
    bearer: String,
}

#[derive(Deserialize)]
struct WalletRow {
    #[serde(default)]
    energy: u64,
    #[serde(default)]
    rare_resources: u64,
    #[serde(default)]
    fuel: u64,
    #[serde(default)]
    yes_tokens: u64,
    #[serde(default)]
    mini_yes: u64,
    #[serde(default)]
    version: u64,
}

#[derive(Deserialize)]
struct SessionRow {
    id: String,
    tier: Tier,
    energy_per_second: u64,
    #[serde(default)]
    started_at: Option<String>,
    expires_at: String,
}

#[derive(Deserialize)]
struct EventRow {
    id: String,
    event_type: String,
    event_name: String,
    #[serde(default)]
    event_description: String,
    #[serde(default)]
    energy_reward: u64,
    #[serde(default)]
    rare_reward: u64,
    #[serde(default)]
    fuel_reward: u64,
    expires_at: String,
}

fn parse_time(iso: &str) -> Result<EpochMs, RemoteError> {
    let ms = js_sys::Date::parse(iso);
    if ms.is_nan() || ms < 0.0 {
        return Err(RemoteError::Decode(format!("bad timestamp {iso}")));
    }
    Ok(ms as EpochMs)
}

fn iso_time(ms: EpochMs) -> String {
    js_sys::Date::new(&(ms as f64).into()).to_iso_string().into()
}

fn encode(value: &str) -> String {
    js_sys::encode_uri_component(value).into()
}

fn field_u64(data: &Value, key: &str) -> Result<u64, RemoteError> {
    data.get(key)
        .and_then(Value::as_u64)
        .ok_or_else(|| RemoteError::Decode(format!("missing {key}")))
}

fn field_str(data: &Value, key: &str) -> Result<String, RemoteError> {
    data.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| RemoteError::Decode(format!("missing {key}")))
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, RemoteError> {
    serde_json::from_value(value).map_err(|e| RemoteError::Decode(e.to_string()))
}

impl Client {
    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.anon_key)
            .header("Authorization", &format!("Bearer {}", self.bearer))
    }

    async fn check(response: HttpResponse) -> Result<HttpResponse, RemoteError> {
        let status = response.status();
        if (200..=299).contains(&status) {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(RemoteError::from_status(status, &body))
    }

    async fn select<T: DeserializeOwned>(&self, table: &str, query: &str) -> Result<Vec<T>, RemoteError> {
        let url = format!("{}/rest/v1/{table}?{query}", self.base);
        let response = self
            .authorize(HttpRequest::get(&url))
            .send()
            .await
            .map_err(|e| RemoteError::Network(e.to_string()))?;
        Self::check(response)
            .await?
            .json::<Vec<T>>()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))
    }

    /// Call a procedure; `success: false` becomes `Rejected`.
    async fn rpc(&self, name: &str, args: Value) -> Result<Value, RemoteError> {
        let url = format!("{}/rest/v1/rpc/{name}", self.base);
        let request = self
            .authorize(HttpRequest::post(&url))
            .json(&args)
            .map_err(|e| RemoteError::Decode(e.to_string()))?;
        let response = request
            .send()
            .await
            .map_err(|e| RemoteError::Network(e.to_string()))?;
        let data: Value = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))?;
        match data.get("success").and_then(Value::as_bool) {
            Some(false) => Err(RemoteError::Rejected(
                data.get("error")
                    .and_then(Value::as_str)
                    .unwrap_or("request rejected")
                    .to_string(),
            )),
            _ => Ok(data),
        }
    }

    async fn execute(&self, request: Request, now_ms: EpochMs) -> Result<Response, RemoteError> {
        match request {
            Request::SignIn { username } => {
                let rows: Vec<Profile> = self
                    .select("users", &format!("username=eq.{}&select=id,username", encode(&username)))
                    .await?;
                rows.into_iter()
                    .next()
                    .map(Response::Profile)
                    .ok_or(RemoteError::Unauthorized)
            }
            Request::Register { .. } => Err(RemoteError::Rejected(
                "registration is not available on the hosted backend".into(),
            )),
            Request::FetchWallet { user_id } => {
                let rows: Vec<WalletRow> = self
                    .select("wallets", &format!("user_id=eq.{}&select=*", encode(&user_id)))
                    .await?;
                let row = rows.into_iter().next().ok_or(RemoteError::NotFound("wallet"))?;
                Ok(Response::Wallet(VersionedWallet {
                    wallet: Wallet {
                        energy: row.energy,
                        rare_resources: row.rare_resources,
                        fuel: row.fuel,
                        yes_tokens: row.yes_tokens,
                        mini_yes: row.mini_yes,
                    },
                    version: row.version,
                }))
            }
            Request::FetchPlanet { user_id } => {
                let rows: Vec<Planet> = self
                    .select("planets", &format!("user_id=eq.{}&select=*", encode(&user_id)))
                    .await?;
                Ok(Response::Planet(rows.into_iter().next()))
            }
            Request::FetchActiveSession { user_id } => {
                let query = format!(
                    "user_id=eq.{}&is_active=eq.true&expires_at=gt.{}&order=created_at.desc&limit=1&select=*",
                    encode(&user_id),
                    encode(&iso_time(now_ms))
                );
                let rows: Vec<SessionRow> = self.select("autoclicker_sessions", &query).await?;
                let session = match rows.into_iter().next() {
                    Some(row) => Some(AutoclickerSession {
                        id: row.id,
                        tier: row.tier,
                        energy_per_second: row.energy_per_second,
                        started_at: match row.started_at {
                            Some(s) => parse_time(&s)?,
                            None => now_ms,
                        },
                        expires_at: parse_time(&row.expires_at)?,
                    }),
                    None => None,
                };
                Ok(Response::Session(session))
            }
            Request::ApplyWalletDelta { user_id, delta } => {
                let data = self
                    .rpc(
                        "apply_wallet_delta",
                        json!({
                            "p_user_id": user_id,
                            "p_energy": delta.energy,
                            "p_rare_resources": delta.rare_resources,
                            "p_fuel": delta.fuel,
                        }),
                    )
                    .await?;
                let version = data.get("version").and_then(Value::as_u64).unwrap_or(0);
                Ok(Response::WalletUpdated { version })
            }
            Request::ActivateAutoclicker { user_id, tier, payment } => {
                let data = self
                    .rpc(
                        "activate_autoclicker",
                        json!({
                            "p_user_id": user_id,
                            "p_tier": tier.code(),
                            "p_payment_method": payment.code(),
                        }),
                    )
                    .await?;
                let expires_at = match data.get("expires_at") {
                    Some(Value::String(s)) => parse_time(s)?,
                    _ => field_u64(&data, "expires_at")?,
                };
                Ok(Response::Activated(Activation {
                    session_id: field_str(&data, "session_id")?,
                    tier: data
                        .get("tier")
                        .cloned()
                        .map(decode)
                        .transpose()?
                        .unwrap_or(tier),
                    energy_per_second: field_u64(&data, "energy_per_second")?,
                    expires_at,
                    duration_minutes: data
                        .get("duration_minutes")
                        .and_then(Value::as_u64)
                        .unwrap_or_else(|| tier.duration_minutes()),
                }))
            }
            Request::ClaimAutoclickerEnergy { user_id } => {
                let data = self
                    .rpc("claim_autoclicker_energy", json!({ "p_user_id": user_id }))
                    .await?;
                Ok(Response::Claimed {
                    energy_generated: field_u64(&data, "energy_generated")?,
                })
            }
            Request::CraftFuel { user_id, amount } => {
                self.rpc("craft_fuel", json!({ "p_user_id": user_id, "p_amount": amount }))
                    .await?;
                Ok(Response::Crafted { fuel: amount })
            }
            Request::TriggerRandomEvent { user_id } => {
                let data = self
                    .rpc("trigger_random_event", json!({ "p_user_id": user_id }))
                    .await?;
                let event = match data.get("event") {
                    Some(Value::Null) | None => None,
                    Some(raw) => {
                        let row: EventRow = decode(raw.clone())?;
                        Some(RandomEvent {
                            id: row.id,
                            event_type: row.event_type,
                            event_name: row.event_name,
                            event_description: row.event_description,
                            energy_reward: row.energy_reward,
                            rare_reward: row.rare_reward,
                            fuel_reward: row.fuel_reward,
                            expires_at: parse_time(&row.expires_at)?,
                        })
                    }
                };
                Ok(Response::Event(event))
            }
            Request::GenerateStarterPlanet { user_id } => {
                let data = self
                    .rpc("generate_starter_planet", json!({ "p_user_id": user_id }))
                    .await?;
                let planet = data.get("planet").cloned().unwrap_or(data);
                Ok(Response::PlanetGenerated(decode(planet)?))
            }
        }
    }
}
