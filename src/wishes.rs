//! Wish provider boundary and the shell-side wish state.
//!
//! One remote call behind a button: fetch a batch of bilingual greetings,
//! cache it for the session, pick at random afterwards. A transport failure
//! is surfaced as an error status with no retry; a malformed payload is
//! silently replaced by a fixed fallback entry.

use log::{info, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Environment variable holding the API credential. The only env contract
/// in the program, consumed solely by this boundary.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

const WISH_PROMPT: &str = "Generate a list of 8 unique, heartwarming Christmas wishes. \
Each wish must be bilingual, including both German and Chinese versions. \
The response should be a JSON array of objects.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wish {
    pub title: String,
    pub message: String,
    pub language: String,
}

/// Entry substituted when the remote payload cannot be used.
pub fn fallback_wish() -> Wish {
    Wish {
        title: "Frohe Weihnachten | 圣诞快乐".to_string(),
        message: "Möge dein Herz von Wärme und Freude erfüllt sein. 愿你的心中充满温暖与快乐。"
            .to_string(),
        language: "German & Chinese".to_string(),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WishError {
    #[error("wish request failed: {0}")]
    Transport(String),
    #[error("missing API key (set {API_KEY_ENV})")]
    MissingApiKey,
    #[error("a wish request is already in flight")]
    Busy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShellStatus {
    #[default]
    Idle,
    Loading,
    Active,
    Error,
}

impl ShellStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShellStatus::Idle => "IDLE",
            ShellStatus::Loading => "LOADING",
            ShellStatus::Active => "ACTIVE",
            ShellStatus::Error => "ERROR",
        }
    }
}

/// Seam for the remote call, so the desk is testable without a network.
pub trait WishFetcher {
    fn fetch(&self) -> Result<Vec<Wish>, WishError>;
}

/// Session-scoped wish state: cached pool, displayed entry, shell status.
#[derive(Debug, Default)]
pub struct WishDesk {
    pool: Vec<Wish>,
    current: Option<Wish>,
    status: ShellStatus,
}

impl WishDesk {
    pub fn status(&self) -> ShellStatus {
        self.status
    }

    pub fn current(&self) -> Option<&Wish> {
        self.current.as_ref()
    }

    pub fn dismiss(&mut self) {
        self.current = None;
    }

    /// Start a magic-wish request. Returns `true` when a network fetch is
    /// needed (no cached pool yet); rejects while one is already in flight.
    fn begin(&mut self) -> Result<bool, WishError> {
        if self.status == ShellStatus::Loading {
            return Err(WishError::Busy);
        }
        if self.pool.is_empty() {
            self.status = ShellStatus::Loading;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Record the outcome of the network fetch. A failure is final for this
    /// invocation; the pool stays empty so a later press retries.
    fn complete(&mut self, fetched: Result<Vec<Wish>, WishError>) -> Result<(), WishError> {
        match fetched {
            Ok(pool) => {
                self.pool = if pool.is_empty() {
                    vec![fallback_wish()]
                } else {
                    pool
                };
                self.status = ShellStatus::Active;
                info!("wish pool cached ({} entries)", self.pool.len());
                Ok(())
            }
            Err(e) => {
                self.status = ShellStatus::Error;
                warn!("wish fetch failed: {e}");
                Err(e)
            }
        }
    }

    /// Uniform pick from the cached pool.
    fn pick(&mut self) -> Wish {
        let wish = if self.pool.is_empty() {
            fallback_wish()
        } else {
            let idx = rand::thread_rng().gen_range(0..self.pool.len());
            self.pool[idx].clone()
        };
        self.current = Some(wish.clone());
        self.status = ShellStatus::Active;
        wish
    }

    pub fn mark_error(&mut self) {
        self.status = ShellStatus::Error;
    }
}

/// The magic-wish operation. The lock is released around the fetch so status
/// reads stay live; the `Loading` gate keeps it to a single in-flight
/// request.
pub fn magic_wish(desk: &Mutex<WishDesk>, fetcher: &dyn WishFetcher) -> Result<Wish, WishError> {
    let needs_fetch = desk.lock().unwrap().begin()?;
    if needs_fetch {
        let fetched = fetcher.fetch();
        let mut d = desk.lock().unwrap();
        d.complete(fetched)?;
        Ok(d.pick())
    } else {
        Ok(desk.lock().unwrap().pick())
    }
}

/// Production fetcher: a single `generateContent` request against the
/// Generative Language API, structured-JSON response requested via schema.
pub struct GeminiFetcher {
    api_key: String,
    model: String,
    endpoint: String,
}

impl GeminiFetcher {
    pub fn from_env(cfg: &crate::config::WishConfig) -> Result<Self, WishError> {
        let api_key = std::env::var(API_KEY_ENV).map_err(|_| WishError::MissingApiKey)?;
        Ok(Self {
            api_key,
            model: cfg.model.clone(),
            endpoint: cfg.endpoint.trim_end_matches('/').to_string(),
        })
    }
}

impl WishFetcher for GeminiFetcher {
    fn fetch(&self) -> Result<Vec<Wish>, WishError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.endpoint, self.model, self.api_key
        );
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": WISH_PROMPT }] }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": {
                    "type": "ARRAY",
                    "items": {
                        "type": "OBJECT",
                        "properties": {
                            "title": { "type": "STRING" },
                            "message": { "type": "STRING" },
                            "language": { "type": "STRING" }
                        },
                        "required": ["title", "message", "language"]
                    }
                }
            }
        });

        let resp = ureq::post(&url)
            .set("Content-Type", "application/json")
            .send_json(body)
            .map_err(|e| WishError::Transport(e.to_string()))?;
        let raw = resp
            .into_string()
            .map_err(|e| WishError::Transport(e.to_string()))?;
        Ok(parse_wish_payload(&raw))
    }
}

/// Walk the generateContent envelope down to the model text, then parse it
/// as a wish array. Any shape surprise degrades to the fallback entry.
fn parse_wish_payload(raw: &str) -> Vec<Wish> {
    #[derive(Deserialize)]
    struct Envelope {
        #[serde(default)]
        candidates: Vec<Candidate>,
    }
    #[derive(Deserialize)]
    struct Candidate {
        content: Option<Content>,
    }
    #[derive(Deserialize)]
    struct Content {
        #[serde(default)]
        parts: Vec<Part>,
    }
    #[derive(Deserialize)]
    struct Part {
        text: Option<String>,
    }

    let text = serde_json::from_str::<Envelope>(raw)
        .ok()
        .and_then(|e| e.candidates.into_iter().next())
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().next())
        .and_then(|p| p.text);

    match text.and_then(|t| serde_json::from_str::<Vec<Wish>>(t.trim()).ok()) {
        Some(wishes) if !wishes.is_empty() => wishes,
        _ => {
            warn!("wish payload malformed; using fallback entry");
            vec![fallback_wish()]
        }
    }
}
