use crate::signal::ConnectivityReading;
use crate::traits::{ConnectionHandler, ConnectivitySource};
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::convert::TryFrom;
use std::sync::Arc;
use tokio::sync::Mutex;
use zbus::zvariant::{ObjectPath, OwnedObjectPath, OwnedValue, Value};
use zbus::{Connection, Proxy};

// NetworkManager over the system bus. Only the calls the password page and
// the strength indicator need: AddAndActivateConnection, State, Strength.

const NM_SERVICE: &str = "org.freedesktop.NetworkManager";
const NM_PATH: &str = "/org/freedesktop/NetworkManager";
const NM_IFACE: &str = "org.freedesktop.NetworkManager";
const NM_DEVICE_IFACE: &str = "org.freedesktop.NetworkManager.Device";
const NM_WIRELESS_IFACE: &str = "org.freedesktop.NetworkManager.Device.Wireless";
const NM_AP_IFACE: &str = "org.freedesktop.NetworkManager.AccessPoint";

// NM_802_11_AP_FLAGS_PRIVACY
const AP_FLAGS_PRIVACY: u32 = 0x1;
// NM_DEVICE_TYPE_WIFI
const DEVICE_TYPE_WIFI: u32 = 2;

/// Key management NetworkManager should use for an access point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyMgmt {
    Open,
    Wep,
    WpaPsk,
}

impl KeyMgmt {
    fn from_ap_flags(flags: u32, wpa_flags: u32, rsn_flags: u32) -> Self {
        if rsn_flags != 0 || wpa_flags != 0 {
            KeyMgmt::WpaPsk
        } else if flags & AP_FLAGS_PRIVACY != 0 {
            KeyMgmt::Wep
        } else {
            KeyMgmt::Open
        }
    }
}

#[derive(Debug)]
pub struct NmDbusHandler {
    interface_name: String,
    // Hold a zbus connection (lazy-init on first use)
    conn: Arc<Mutex<Option<Connection>>>,
}

impl NmDbusHandler {
    fn ov<'a, V>(v: V) -> Result<OwnedValue>
    where
        V: Into<Value<'a>>,
    {
        let value: Value<'a> = v.into();
        OwnedValue::try_from(value)
            .map_err(|e| Error::CommandFailed(format!("Invalid setting value: {}", e)))
    }

    pub fn new(interface_name: impl Into<String>) -> Self {
        Self {
            interface_name: interface_name.into(),
            conn: Arc::new(Mutex::new(None)),
        }
    }

    async fn ensure_conn(&self) -> Result<Connection> {
        let mut guard = self.conn.lock().await;
        if let Some(c) = guard.clone() {
            return Ok(c);
        }
        let c = Connection::system()
            .await
            .map_err(|e| Error::CommandFailed(format!("DBus connect failed: {}", e)))?;
        *guard = Some(c.clone());
        Ok(c)
    }

    async fn nm_proxy(&self, conn: &Connection) -> Result<Proxy<'static>> {
        Proxy::new(conn, NM_SERVICE, NM_PATH, NM_IFACE)
            .await
            .map_err(|e| Error::CommandFailed(format!("Proxy create error: {}", e)))
    }

    async fn key_mgmt_for(&self, conn: &Connection, ap_path: &ObjectPath<'_>) -> Result<KeyMgmt> {
        let ap = Proxy::new(conn, NM_SERVICE, ap_path.clone(), NM_AP_IFACE)
            .await
            .map_err(|e| Error::CommandFailed(format!("AP proxy error: {}", e)))?;
        let flags: u32 = ap
            .get_property::<u32>("Flags")
            .await
            .map_err(|e| Error::CommandFailed(format!("Get Flags failed: {}", e)))?;
        let wpa: u32 = ap
            .get_property::<u32>("WpaFlags")
            .await
            .map_err(|e| Error::CommandFailed(format!("Get WpaFlags failed: {}", e)))?;
        let rsn: u32 = ap
            .get_property::<u32>("RsnFlags")
            .await
            .map_err(|e| Error::CommandFailed(format!("Get RsnFlags failed: {}", e)))?;
        Ok(KeyMgmt::from_ap_flags(flags, wpa, rsn))
    }

    // Helper: pick a wireless device (prefer the configured interface)
    async fn get_wifi_device_path(&self, conn: &Connection) -> Result<OwnedObjectPath> {
        let nm = self.nm_proxy(conn).await?;
        let msg = nm
            .call_method("GetDevices", &())
            .await
            .map_err(|e| Error::CommandFailed(format!("GetDevices call failed: {}", e)))?;
        let devices: Vec<OwnedObjectPath> = msg
            .body()
            .deserialize()
            .map_err(|e| Error::CommandFailed(format!("GetDevices decode failed: {}", e)))?;
        let mut chosen: Option<OwnedObjectPath> = None;
        for dpath in devices {
            let dev = Proxy::new(conn, NM_SERVICE, dpath.clone(), NM_DEVICE_IFACE)
                .await
                .map_err(|e| Error::CommandFailed(format!("Device proxy error: {}", e)))?;
            let dtype: u32 = dev
                .get_property::<u32>("DeviceType")
                .await
                .map_err(|e| Error::CommandFailed(format!("Get DeviceType failed: {}", e)))?;
            if dtype != DEVICE_TYPE_WIFI {
                continue;
            }
            let ifname: String = dev
                .get_property::<String>("Interface")
                .await
                .map_err(|e| Error::CommandFailed(format!("Get Interface failed: {}", e)))?;
            if ifname == self.interface_name {
                return Ok(dpath);
            }
            if chosen.is_none() {
                chosen = Some(dpath);
            }
        }
        chosen.ok_or_else(|| Error::CommandFailed("No wireless device found".into()))
    }

    async fn active_strength(&self, conn: &Connection) -> Result<Option<u8>> {
        let dpath = self.get_wifi_device_path(conn).await?;
        let wifi = Proxy::new(conn, NM_SERVICE, dpath, NM_WIRELESS_IFACE)
            .await
            .map_err(|e| Error::CommandFailed(format!("Wireless proxy error: {}", e)))?;
        let ap_path: OwnedObjectPath = wifi
            .get_property("ActiveAccessPoint")
            .await
            .map_err(|e| Error::CommandFailed(format!("Get ActiveAccessPoint failed: {}", e)))?;
        if ap_path.as_str() == "/" {
            return Ok(None);
        }
        let ap = Proxy::new(conn, NM_SERVICE, ap_path, NM_AP_IFACE)
            .await
            .map_err(|e| Error::CommandFailed(format!("AP proxy error: {}", e)))?;
        let strength: u8 = ap
            .get_property::<u8>("Strength")
            .await
            .map_err(|e| Error::CommandFailed(format!("Get Strength failed: {}", e)))?;
        Ok(Some(strength))
    }
}

/// Builds the partial connection settings handed to AddAndActivateConnection.
/// NetworkManager fills in SSID and mode from the access point object.
fn security_settings(
    key_mgmt: KeyMgmt,
    secret: &str,
) -> Result<Option<HashMap<String, OwnedValue>>> {
    if secret.is_empty() || key_mgmt == KeyMgmt::Open {
        return Ok(None);
    }
    let mut s_sec: HashMap<String, OwnedValue> = HashMap::new();
    match key_mgmt {
        KeyMgmt::Wep => {
            s_sec.insert("key-mgmt".into(), NmDbusHandler::ov("none")?);
            s_sec.insert("wep-key0".into(), NmDbusHandler::ov(secret.to_string())?);
            // NM_WEP_KEY_TYPE_KEY: 5/13 ASCII or 10/26 hex
            s_sec.insert("wep-key-type".into(), NmDbusHandler::ov(1u32)?);
        }
        KeyMgmt::WpaPsk => {
            s_sec.insert("key-mgmt".into(), NmDbusHandler::ov("wpa-psk")?);
            s_sec.insert("psk".into(), NmDbusHandler::ov(secret.to_string())?);
        }
        KeyMgmt::Open => {}
    }
    Ok(Some(s_sec))
}

#[async_trait]
impl ConnectionHandler for NmDbusHandler {
    async fn add_and_activate_connection(
        &self,
        device_path: &str,
        specific_path: &str,
        secret: &str,
    ) -> Result<()> {
        let device = ObjectPath::try_from(device_path)
            .map_err(|e| Error::CommandFailed(format!("Invalid device path: {}", e)))?;
        let specific = ObjectPath::try_from(specific_path)
            .map_err(|e| Error::CommandFailed(format!("Invalid object path: {}", e)))?;

        let conn = self.ensure_conn().await?;
        let key_mgmt = self.key_mgmt_for(&conn, &specific).await?;
        let nm = self.nm_proxy(&conn).await?;

        let mut settings: HashMap<String, HashMap<String, OwnedValue>> = HashMap::new();
        if let Some(s_sec) = security_settings(key_mgmt, secret)? {
            settings.insert("802-11-wireless-security".into(), s_sec);
        }

        tracing::debug!(?key_mgmt, device_path, specific_path, "Calling AddAndActivateConnection");
        let reply = nm
            .call_method("AddAndActivateConnection", &(settings, &device, &specific))
            .await
            .map_err(|e| Error::CommandFailed(format!("AddAndActivateConnection failed: {}", e)))?;
        let (con_path, ac_path): (OwnedObjectPath, OwnedObjectPath) = reply
            .body()
            .deserialize()
            .map_err(|e| Error::CommandFailed(format!("AddAndActivate decode failed: {}", e)))?;
        tracing::info!(
            connection = con_path.as_str(),
            active = ac_path.as_str(),
            "✅ Connection added and activating"
        );
        Ok(())
    }
}

#[async_trait]
impl ConnectivitySource for NmDbusHandler {
    async fn reading(&self) -> Result<ConnectivityReading> {
        let conn = self.ensure_conn().await?;
        let nm = self.nm_proxy(&conn).await?;
        let state: u32 = nm
            .get_property("State")
            .await
            .map_err(|e| Error::CommandFailed(format!("Failed to get NM state: {}", e)))?;
        // NM_STATE_CONNECTED_GLOBAL
        let strength = if state == 70 {
            self.active_strength(&conn).await?
        } else {
            None
        };
        Ok(ConnectivityReading::from_nm_state(state, strength))
    }
}
