//! Credential validation for the on-screen password entry.
//! 屏幕密码输入的校验规则：根据安全类型选择 WEP 或 WPA 规则。

use serde::{Deserialize, Deserializer, Serialize};

/// The security scheme reported for the network being joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SecurityScheme {
    /// Open networks and WPA/WPA2 personal (passphrase based).
    OpenOrWpa,
    /// Static WEP keys.
    StaticWep,
}

/// NetworkManager-style security type code for static WEP.
const NM_SECURITY_STATIC_WEP: i32 = 1;

// WPA passphrase bounds, counted in characters.
const WPA_MIN_LEN: usize = 8;
const WPA_MAX_LEN: usize = 64;

impl SecurityScheme {
    /// Maps the security type code reported by the display shell.
    /// Only static WEP gets the WEP rule; everything else is treated as WPA.
    pub fn from_nm_security_type(code: i32) -> Self {
        if code == NM_SECURITY_STATIC_WEP {
            SecurityScheme::StaticWep
        } else {
            SecurityScheme::OpenOrWpa
        }
    }

    /// Maps a scan label such as `"WEP"`, `"WPA2"` or `"Open"`.
    pub fn from_security_label(label: &str) -> Self {
        if label.trim().eq_ignore_ascii_case("wep") {
            SecurityScheme::StaticWep
        } else {
            SecurityScheme::OpenOrWpa
        }
    }
}

// The shell may send the numeric security type, our own camelCase names,
// or a scan label.
impl<'de> Deserialize<'de> for SecurityScheme {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Code(i32),
            Label(String),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Code(code) => SecurityScheme::from_nm_security_type(code),
            Repr::Label(label) => match label.trim() {
                "staticWep" => SecurityScheme::StaticWep,
                "openOrWpa" => SecurityScheme::OpenOrWpa,
                // numeric codes arriving as text, e.g. from a query string
                other => match other.parse::<i32>() {
                    Ok(code) => SecurityScheme::from_nm_security_type(code),
                    Err(_) => SecurityScheme::from_security_label(other),
                },
            },
        })
    }
}

/// Returns true when `input` is an acceptable secret for `scheme`.
///
/// WEP accepts exactly one of the four key encodings: 5 or 13 arbitrary
/// characters (ASCII keys), 10 or 26 hex digits (hex keys). WPA accepts any
/// passphrase between 8 and 64 characters inclusive.
pub fn validate(scheme: SecurityScheme, input: &str) -> bool {
    rejection_reason(scheme, input).is_none()
}

/// A short hint for the input field, or `None` when the input is valid.
pub fn rejection_reason(scheme: SecurityScheme, input: &str) -> Option<&'static str> {
    let len = input.chars().count();
    match scheme {
        SecurityScheme::StaticWep => {
            let ok = match len {
                5 | 13 => true,
                10 | 26 => is_hex(input),
                _ => false,
            };
            if ok {
                None
            } else if len == 10 || len == 26 {
                Some("hex WEP keys may only contain 0-9 and A-F")
            } else {
                Some("WEP keys are 5 or 13 characters, or 10 or 26 hex digits")
            }
        }
        SecurityScheme::OpenOrWpa => {
            if (WPA_MIN_LEN..=WPA_MAX_LEN).contains(&len) {
                None
            } else if len < WPA_MIN_LEN {
                Some("password must be at least 8 characters")
            } else {
                Some("password must be at most 64 characters")
            }
        }
    }
}

fn is_hex(s: &str) -> bool {
    s.chars().all(|c| c.is_ascii_hexdigit())
}
