//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements               | Connects to                  |
//! |-------------|--------------------------|------------------------------|
//! | `hardware`  | GpioPort, IndicatorPort  | ESP32 GPIO, buzzer           |
//! | `http`      | StatusPort               | ESP-IDF HTTP server          |
//! | `log_sink`  | EventSink                | Serial log output            |
//! | `mqtt`      | ChannelPort              | ESP-IDF MQTT client          |
//! | `storage`   | ManifestSource           | SPIFFS data partition        |
//! | `time`      | (clock)                  | ESP32 system timer           |
//! | `wifi`      | LinkPort                 | ESP-IDF WiFi STA             |

pub mod hardware;
pub mod http;
pub mod log_sink;
pub mod mqtt;
pub mod storage;
pub mod time;
pub mod wifi;
