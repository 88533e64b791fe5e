const MQTT_BROKER: &str = "MQTT_BROKER";

const DEFAULT_BROKER: &str = "localhost";

pub fn get_broker() -> String {
    std::env::var(MQTT_BROKER).unwrap_or_else(|_| DEFAULT_BROKER.to_string())
}

const MQTT_PORT: &str = "MQTT_PORT";

const DEFAULT_MQTT_PORT: u16 = 1883;

pub fn get_broker_port() -> u16 {
    let port_from_env = std::env::var(MQTT_PORT);
    port_from_env.map_or(DEFAULT_MQTT_PORT, |res| {
        res.parse().unwrap_or(DEFAULT_MQTT_PORT)
    })
}

const MQTT_CLIENT_ID: &str = "MQTT_CLIENT_ID";

const DEFAULT_CLIENT_ID: &str = "wattgrid-hub";

pub fn get_client_id() -> String {
    std::env::var(MQTT_CLIENT_ID).unwrap_or_else(|_| DEFAULT_CLIENT_ID.to_string())
}

const MQTT_USERNAME: &str = "MQTT_USERNAME";

pub fn get_mqtt_username() -> Option<String> {
    std::env::var(MQTT_USERNAME).ok()
}

const MQTT_PASSWORD: &str = "MQTT_PASSWORD";

pub fn get_mqtt_password() -> Option<String> {
    std::env::var(MQTT_PASSWORD).ok()
}

/// Current wall-clock time in milliseconds since epoch.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
