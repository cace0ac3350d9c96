//! Adapters: concrete implementations of the port traits.
//!
//! | Adapter    | Implements                | Connects to                 |
//! |------------|---------------------------|-----------------------------|
//! | `led`      | embedded-hal `OutputPin`  | simulated status LED        |
//! | `log_sink` | `log::Log`                | frames on the log address   |
//! | `nvs`      | SettingsStore             | in-memory map / directory   |
//! | `sensor`   | SensorSource              | simulated DHT22             |
//! | `wifi`     | WifiDriver                | simulated station radio     |

pub mod led;
pub mod log_sink;
pub mod nvs;
pub mod sensor;
pub mod wifi;
