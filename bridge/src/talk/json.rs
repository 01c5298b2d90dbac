//! JSON adapter for the talk domain types.
//!
//! Maps [`TalkParams`] and [`CastInfo`] onto a generic `serde_json::Value`
//! tree. All numbers are plain JSON numbers; there is no integer/float
//! distinction on the wire. `TalkParams` emits only the sub-fields whose
//! flag is set, plus `num_params` and a `params` array of that length;
//! parsing inverts this, setting each recognized field together with its
//! flag and ignoring unknown keys.

use serde_json::{json, Map, Value};

use super::params::{CastInfo, TalkParams, NAMED_FLOAT_PARAMS};

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("expected a JSON object")]
    NotAnObject,

    #[error("expected a JSON array")]
    NotAnArray,

    #[error("malformed document: {0}")]
    Json(#[from] serde_json::Error),
}

fn number(v: f64) -> Value {
    serde_json::Number::from_f64(v)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

pub fn params_to_json(p: &TalkParams) -> Value {
    let mut obj = Map::new();
    if p.is_set(super::params::ParamFlag::Mute) {
        obj.insert("mute".into(), Value::from(p.mute() as i32));
    }
    if p.is_set(super::params::ParamFlag::ForceMono) {
        obj.insert("force_mono".into(), Value::from(p.force_mono() as i32));
    }
    for &(name, flag) in NAMED_FLOAT_PARAMS {
        if p.is_set(flag) {
            obj.insert(name.into(), number(p.value_of(flag) as f64));
        }
    }
    if p.is_set(super::params::ParamFlag::Cast) {
        obj.insert("cast".into(), Value::from(p.cast()));
    }

    obj.insert("num_params".into(), Value::from(p.num_params() as u64));
    obj.insert(
        "params".into(),
        Value::Array(p.params().iter().map(|&v| number(v as f64)).collect()),
    );
    Value::Object(obj)
}

pub fn params_from_json(v: &Value) -> Result<TalkParams, ParseError> {
    let obj = v.as_object().ok_or(ParseError::NotAnObject)?;

    let mut p = TalkParams::new();
    for (key, value) in obj {
        match key.as_str() {
            "num_params" => {
                if let Some(n) = value.as_f64() {
                    p.set_num_params(n as usize);
                }
            }
            "params" => {
                if let Some(entries) = value.as_array() {
                    p.set_num_params(entries.len());
                    for (i, entry) in entries.iter().take(p.num_params()).enumerate() {
                        if let Some(n) = entry.as_f64() {
                            p.set_param(i, n as f32);
                        }
                    }
                }
            }
            name => {
                if let Some(n) = value.as_f64() {
                    // Unknown keys are ignored.
                    p.set_by_name(name, n as f32);
                }
            }
        }
    }
    Ok(p)
}

pub fn casts_to_json(casts: &[CastInfo]) -> Value {
    serde_json::to_value(casts).unwrap_or(Value::Array(Vec::new()))
}

pub fn casts_from_json(v: &Value) -> Result<Vec<CastInfo>, ParseError> {
    if !v.is_array() {
        return Err(ParseError::NotAnArray);
    }
    Ok(serde_json::from_value(v.clone())?)
}

/// Build the `/params` reply document.
pub fn params_reply_to_json(params: &TalkParams, casts: &[CastInfo]) -> Value {
    json!({
        "params": params_to_json(params),
        "avators": casts_to_json(casts),
    })
}

/// Parse a `/params` reply document (the client side of the exchange).
pub fn parse_params_reply(text: &str) -> Result<(TalkParams, Vec<CastInfo>), ParseError> {
    let doc: Value = serde_json::from_str(text)?;
    let obj = doc.as_object().ok_or(ParseError::NotAnObject)?;
    let params = params_from_json(obj.get("params").unwrap_or(&Value::Null))?;
    let casts = casts_from_json(obj.get("avators").unwrap_or(&Value::Array(Vec::new())))?;
    Ok((params, casts))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pitch_only_document() {
        let mut p = TalkParams::new();
        p.set_pitch(1.25);

        let doc = params_to_json(&p);
        assert_eq!(doc, json!({"pitch": 1.25, "num_params": 0, "params": []}));

        let back = params_from_json(&doc).unwrap();
        assert_eq!(back, p);
        assert!(back.is_set(super::super::params::ParamFlag::Pitch));
        assert_eq!(back.flags(), p.flags());
    }

    #[test]
    fn full_roundtrip() {
        let mut p = TalkParams::new();
        p.set_mute(true);
        p.set_force_mono(false);
        p.set_cast(2);
        p.set_volume(0.5);
        p.set_joy(1.0);
        p.set_num_params(3);
        p.set_param(0, 0.25);
        p.set_param(1, 0.5);
        p.set_param(2, 0.75);

        let doc = params_to_json(&p);
        let back = params_from_json(&doc).unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let doc = json!({"pitch": 2.0, "volumee": 1.0, "num_params": 0, "params": []});
        let p = params_from_json(&doc).unwrap();
        assert_eq!(p.pitch(), 2.0);
        assert_eq!(p.flags(), super::super::params::ParamFlag::Pitch.bit());
    }

    #[test]
    fn non_object_fails() {
        assert!(params_from_json(&json!([1, 2])).is_err());
        assert!(casts_from_json(&json!({"id": 1})).is_err());
    }

    #[test]
    fn cast_info_roundtrip() {
        let casts = vec![
            CastInfo {
                id: 0,
                name: "Yukari".into(),
                param_names: vec!["happy".into(), "angry".into()],
            },
            CastInfo {
                id: 1,
                name: "Akane".into(),
                param_names: Vec::new(),
            },
        ];

        let doc = casts_to_json(&casts);
        // Empty param_names is omitted entirely.
        assert!(doc[1].get("param_names").is_none());

        let back = casts_from_json(&doc).unwrap();
        assert_eq!(back, casts);
    }

    #[test]
    fn params_reply_roundtrip() {
        let mut p = TalkParams::new();
        p.set_speed(1.5);
        let casts = vec![CastInfo {
            id: 7,
            name: "A".into(),
            param_names: Vec::new(),
        }];

        let text = params_reply_to_json(&p, &casts).to_string();
        let (p2, c2) = parse_params_reply(&text).unwrap();
        assert_eq!(p2, p);
        assert_eq!(c2, casts);
    }
}
