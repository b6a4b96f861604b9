//! Named ClickHouse connection profiles from a clickhouse-client config file.
//!
//! Only the `<connections_credentials>` section is read:
//!
//! ```xml
//! <config>
//!   <connections_credentials>
//!     <connection>
//!       <name>github</name>
//!       <hostname>example.clickhouse.cloud</hostname>
//!       <port>9440</port>
//!       <user>default</user>
//!       <password>secret</password>
//!       <database>default</database>
//!       <secure>1</secure>
//!     </connection>
//!   </connections_credentials>
//! </config>
//! ```

use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

#[derive(Debug, Default, Deserialize)]
struct ClientConfigFile {
    #[serde(default)]
    connections_credentials: Option<ConnectionsCredentials>,
}

#[derive(Debug, Default, Deserialize)]
struct ConnectionsCredentials {
    #[serde(rename = "connection", default)]
    connections: Vec<RawConnection>,
}

#[derive(Debug, Deserialize)]
struct RawConnection {
    name: String,
    hostname: Option<String>,
    port: Option<u16>,
    user: Option<String>,
    password: Option<String>,
    database: Option<String>,
    secure: Option<String>,
}

#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionProfile {
    pub name: String,
    pub host: String,
    /// Port as written in the profile (usually the native protocol port).
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
    pub secure: bool,
}

impl ConnectionProfile {
    pub fn load(path: &Path, name: &str) -> Result<Self> {
        let xml = fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("cannot read ClickHouse config {}: {e}", path.display()))
        })?;
        Self::parse(&xml, name)
    }

    pub fn parse(xml: &str, name: &str) -> Result<Self> {
        let file: ClientConfigFile = quick_xml::de::from_str(xml)
            .map_err(|e| Error::Configuration(format!("unparseable ClickHouse config: {e}")))?;
        let raw = file
            .connections_credentials
            .unwrap_or_default()
            .connections
            .into_iter()
            .find(|c| c.name.trim() == name)
            .ok_or_else(|| Error::Configuration(format!("connection '{name}' not found in config")))?;

        let host = raw
            .hostname
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .ok_or_else(|| Error::Configuration(format!("connection '{name}' has no hostname")))?;
        let secure = raw.secure.as_deref().map(str::trim) == Some("1")
            || raw.secure.as_deref().map(str::trim) == Some("true");
        let port = raw.port.unwrap_or(if secure { 9440 } else { 9000 });

        Ok(Self {
            name: name.to_string(),
            host,
            port,
            username: raw.user.unwrap_or_else(|| "default".to_string()),
            password: raw.password.unwrap_or_default(),
            database: raw.database.unwrap_or_else(|| "default".to_string()),
            secure,
        })
    }

    /// HTTP interface port. Native ports map to their HTTP counterparts;
    /// anything else is assumed to already be an HTTP port.
    pub fn http_port(&self, override_port: Option<u16>) -> u16 {
        if let Some(port) = override_port {
            return port;
        }
        match self.port {
            9000 => 8123,
            9440 => 8443,
            other => other,
        }
    }

    pub fn base_url(&self, override_port: Option<u16>) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{scheme}://{}:{}", self.host, self.http_port(override_port))
    }
}

// Password never leaves the process through logs.
impl fmt::Debug for ConnectionProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionProfile")
            .field("name", &self.name)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"***")
            .field("database", &self.database)
            .field("secure", &self.secure)
            .finish()
    }
}
