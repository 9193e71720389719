//! Shell-facing op handling: the wish button, the dismiss action, and the
//! cosmetic make-a-wish submission.

use log::info;
use serde_json::{Value, json};
use std::sync::Mutex;

use crate::config::WishConfig;
use crate::wishes::{self, GeminiFetcher, WishDesk, WishError};

pub fn dispatch_wish_op(op: &str, req: &Value, desk: &Mutex<WishDesk>, cfg: &WishConfig) -> Value {
    match op {
        "wish" => {
            let outcome =
                GeminiFetcher::from_env(cfg).and_then(|f| wishes::magic_wish(desk, &f));
            match outcome {
                Ok(wish) => {
                    let status = desk.lock().unwrap().status();
                    json!({"ok": true, "data": {"wish": wish, "status": status.as_str()}})
                }
                Err(e @ WishError::Busy) => json!({"ok": false, "error": e.to_string()}),
                Err(e) => {
                    // missing key never reached the desk; surface it the
                    // same way a failed call would
                    let mut d = desk.lock().unwrap();
                    d.mark_error();
                    json!({"ok": false, "error": e.to_string(), "data": {"status": d.status().as_str()}})
                }
            }
        }

        "dismiss" => {
            desk.lock().unwrap().dismiss();
            json!({"ok": true, "data": {"dismissed": true}})
        }

        // deliberately cosmetic: acknowledge and drop, there is no delivery
        // channel
        "send" => {
            let text = req.get("text").and_then(|v| v.as_str()).unwrap_or("").trim();
            if text.is_empty() {
                json!({"ok": false, "error": "wish text is empty"})
            } else {
                info!("make-a-wish received ({} chars)", text.chars().count());
                json!({"ok": true, "data": {"toast": "WISH SENT TO THE STARS"}})
            }
        }

        other => json!({"ok": false, "error": format!("unknown wish op: {other}")}),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wishes::ShellStatus;

    #[test]
    fn send_requires_text() {
        let desk = Mutex::new(WishDesk::default());
        let cfg = WishConfig::default();

        let r = dispatch_wish_op("send", &json!({"op": "send", "text": "  "}), &desk, &cfg);
        assert_eq!(r["ok"], false);

        let r = dispatch_wish_op(
            "send",
            &json!({"op": "send", "text": "I wish for snow"}),
            &desk,
            &cfg,
        );
        assert_eq!(r["ok"], true);
        assert_eq!(r["data"]["toast"], "WISH SENT TO THE STARS");
        // nothing is stored
        assert!(desk.lock().unwrap().current().is_none());
    }

    #[test]
    fn dismiss_is_always_ok() {
        let desk = Mutex::new(WishDesk::default());
        let cfg = WishConfig::default();
        let r = dispatch_wish_op("dismiss", &json!({"op": "dismiss"}), &desk, &cfg);
        assert_eq!(r["ok"], true);
    }

    #[test]
    fn wish_without_api_key_reports_error_status() {
        // run only when the environment has no key, to avoid a live call
        if std::env::var_os(crate::wishes::API_KEY_ENV).is_some() {
            return;
        }
        let desk = Mutex::new(WishDesk::default());
        let cfg = WishConfig::default();
        let r = dispatch_wish_op("wish", &json!({"op": "wish"}), &desk, &cfg);
        assert_eq!(r["ok"], false);
        assert_eq!(desk.lock().unwrap().status(), ShellStatus::Error);
    }
}
